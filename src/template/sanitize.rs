// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pre-compilation defense against host-escaping template text.
//!
//! Interpolations that reach for constructor/prototype-chain access or
//! call-via-bracket tricks are rewritten into literal, non-evaluated text
//! before the template ever reaches the lexer. The grammar itself has no
//! such constructs, so this is defense in depth for template text pasted in
//! from other engines.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INTERPOLATION: Regex = Regex::new(r"\{\{[\s\S]*?\}\}").unwrap();
    static ref HOST_ESCAPE: Regex = Regex::new(
        r"(?x)
          constructor
        | __proto__
        | prototype
        | process\s*\.
        | require\s*\(
        | \]\s*\(        # call through a bracket-indexed member
        "
    )
    .unwrap();
}

/// True when text matches a host-escaping pattern. Used to screen bare
/// expressions that bypass the interpolation rewrite.
pub fn is_hostile(src: &str) -> bool {
    HOST_ESCAPE.is_match(src)
}

/// Neutralizes dangerous interpolations by splitting their delimiters, so
/// the block renders as literal text instead of being compiled.
pub fn sanitize(src: &str) -> Cow<'_, str> {
    INTERPOLATION.replace_all(src, |caps: &regex::Captures| {
        let block = &caps[0];
        if HOST_ESCAPE.is_match(block) {
            block.replace("{{", "{ {").replace("}}", "} }")
        } else {
            block.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_interpolation_untouched() {
        let src = "Hello {{ data.name }}!";
        assert_eq!(sanitize(src), src);
    }

    #[test]
    fn test_constructor_access_neutralized() {
        let src = "{{ data.constructor }}";
        assert_eq!(sanitize(src), "{ { data.constructor } }");
    }

    #[test]
    fn test_prototype_chain_neutralized() {
        assert_eq!(
            sanitize("{{ a.__proto__.x }}"),
            "{ { a.__proto__.x } }"
        );
        assert_eq!(
            sanitize("{{ a['prototype'] }}"),
            "{ { a['prototype'] } }"
        );
    }

    #[test]
    fn test_bracket_call_neutralized() {
        assert_eq!(
            sanitize("{{ a['f']('x') }}"),
            "{ { a['f']('x') } }"
        );
    }

    #[test]
    fn test_only_offending_blocks_rewritten() {
        let src = "{{ ok }} and {{ bad.constructor }}";
        assert_eq!(sanitize(src), "{{ ok }} and { { bad.constructor } }");
    }
}
