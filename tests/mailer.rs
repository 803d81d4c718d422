// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use formail::{
    build_email_params, EmailJob, EmailMessage, EmailSettings, MailError, MailTransport, Mailer,
    MailerHook, SendReport, TransportError, Value,
};

/// Records sends, tracks concurrency and fails on demand.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<EmailMessage>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_to: Option<String>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send_mail(&self, message: &EmailMessage) -> Result<SendReport, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_to.as_deref() == Some(message.to.as_str()) {
            return Err(TransportError {
                transport: message.transport.clone(),
                reason: "connection refused".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SendReport::sent(format!("msg-{}", sent.len())))
    }
}

fn job(to: &str, subject: &str, html: &str, context_json: &str) -> EmailJob {
    EmailJob {
        message: EmailMessage {
            from: "noreply@example.org".to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            transport: "smtp".to_string(),
            rendering_method: "dynamic".to_string(),
            ..EmailMessage::default()
        },
        context: Value::from_json_str(context_json).unwrap(),
        table_html: None,
    }
}

fn settings(batch_size: usize) -> EmailSettings {
    EmailSettings {
        batch_size,
        ..EmailSettings::default()
    }
}

#[tokio::test]
async fn renders_templates_into_the_outbound_message() {
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(transport.clone(), settings(10));

    let job = job(
        "user@example.org",
        "New entry from {{ data.name }}",
        "<p>{{ data.name }} submitted.</p>",
        r#"{"data": {"name": "Ada"}}"#,
    );
    let report = mailer.send(&job).await.unwrap();
    assert!(!report.skipped);

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New entry from Ada");
    assert_eq!(sent[0].html, "<p>Ada submitted.</p>");
}

#[tokio::test]
async fn batches_bound_concurrency_and_all_jobs_settle() {
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(transport.clone(), settings(2));

    let jobs: Vec<EmailJob> = (0..5)
        .map(|i| {
            job(
                &format!("user{i}@example.org"),
                "hello",
                "body",
                r#"{"data": {}}"#,
            )
        })
        .collect();
    let results = mailer.send_all(&jobs).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(transport.sent.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn a_failing_job_does_not_cancel_its_siblings() {
    let transport = Arc::new(RecordingTransport {
        fail_to: Some("bad@example.org".to_string()),
        ..RecordingTransport::default()
    });
    let mailer = Mailer::new(transport.clone(), settings(3));

    let jobs = vec![
        job("ok1@example.org", "s", "b", r#"{"data": {}}"#),
        job("bad@example.org", "s", "b", r#"{"data": {}}"#),
        job("ok2@example.org", "s", "b", r#"{"data": {}}"#),
    ];
    let results = mailer.send_all(&jobs).await;

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(MailError::Transport(_))));
    assert!(results[2].is_ok());
    assert_eq!(transport.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn template_timeout_fails_only_its_own_job() {
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(
        transport.clone(),
        EmailSettings {
            batch_size: 4,
            evaluate_timeout_ms: 0,
            ..EmailSettings::default()
        },
    );

    let runaway = "{{ n }} ".repeat(2000);
    let jobs = vec![
        job("ok@example.org", "plain subject", "plain body", r#"{"n": 1}"#),
        job("slow@example.org", "plain subject", &runaway, r#"{"n": 1}"#),
    ];
    let results = mailer.send_all(&jobs).await;

    assert!(results[0].is_ok());
    match &results[1] {
        Err(MailError::Template(e)) => assert!(e.is_timeout()),
        other => panic!("expected a fatal timeout, got {other:?}"),
    }
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn a_broken_field_degrades_instead_of_failing_the_job() {
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(transport.clone(), settings(4));

    let job = job(
        "user@example.org",
        "{{ data.name | noSuchFilter }}",
        "<p>{{ data.name }}</p>",
        r#"{"data": {"name": "Ada"}}"#,
    );
    let report = mailer.send(&job).await.unwrap();
    assert!(!report.skipped);

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "");
    assert_eq!(sent[0].html, "<p>Ada</p>");
}

struct VetoSubjects;

impl MailerHook for VetoSubjects {
    fn intercept(&self, message: EmailMessage) -> Option<EmailMessage> {
        if message.subject.contains("spam") {
            None
        } else {
            Some(message)
        }
    }
}

#[tokio::test]
async fn a_hook_veto_discards_the_message_silently() {
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(transport.clone(), settings(4)).with_hook(Arc::new(VetoSubjects));

    let jobs = vec![
        job("a@example.org", "spam offer", "b", r#"{"data": {}}"#),
        job("b@example.org", "real subject", "b", r#"{"data": {}}"#),
    ];
    let results = mailer.send_all(&jobs).await;

    assert!(matches!(&results[0], Ok(r) if r.skipped));
    assert!(matches!(&results[1], Ok(r) if !r.skipped));
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn email_params_project_the_request_through_an_allow_list() {
    let form = Value::from_json_str(r#"{"components": []}"#).unwrap();
    let submission = Value::from_json_str(r#"{"data": {"name": "Ada"}}"#).unwrap();
    let req = Value::from_json_str(
        r#"{"user": {"email": "a@b.co"}, "headers": {"cookie": "secret"}, "query": {"q": "1"}}"#,
    )
    .unwrap();
    let res = Value::from_json_str(r#"{"token": "t", "body": "internal"}"#).unwrap();

    let params = build_email_params(
        &form,
        &submission,
        "<table></table>",
        &req,
        &res,
        &Value::new_object(),
    );

    assert_eq!(params["data"]["name"].as_str(), Some("Ada"));
    assert_eq!(params["req"]["user"]["email"].as_str(), Some("a@b.co"));
    assert!(params["req"]["headers"].is_undefined());
    assert_eq!(params["res"]["token"].as_str(), Some("t"));
    assert!(params["res"]["body"].is_undefined());

    // The params object feeds straight into a template context.
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Mailer::new(transport.clone(), settings(1));
    let j = EmailJob {
        message: EmailMessage {
            from: "noreply@example.org".to_string(),
            to: "{{ req.user.email }}".to_string(),
            subject: "table: {{ 'x' | submissionTable }}".to_string(),
            html: "{{ content }}".to_string(),
            transport: "smtp".to_string(),
            ..EmailMessage::default()
        },
        context: params,
        table_html: Some("<table></table>".to_string()),
    };
    mailer.send(&j).await.unwrap();
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].to, "a@b.co");
    assert_eq!(sent[0].html, "<table></table>");
}
