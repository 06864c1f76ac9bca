//! `${expression}` placeholder substitution

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\$\{([^}]*)\}").expect("placeholder regex must compile")
    })
}

/// Replace every `${...}` in `template` with `resolve(expression)`.
///
/// A `None` resolution substitutes the empty string. Text outside placeholders,
/// including an unterminated `${`, is copied unchanged.
pub(crate) fn expand<F>(template: &str, mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let re = placeholder_re();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in re.captures_iter(template) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let expression = inner.as_str().trim();
        let value = resolve(expression).map_err(|source| Error::Expander {
            placeholder: inner.as_str().to_string(),
            source: Box::new(source),
        })?;
        if let Some(value) = value {
            out.push_str(&value);
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_and_blanks_nulls() {
        let out = expand("Hello ${name}, ${ missing }!", |expr| {
            Ok(match expr {
                "name" => Some("Fred".to_string()),
                _ => None,
            })
        })
        .unwrap();
        assert_eq!(out, "Hello Fred, !");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let out = expand("plain ${ text", |_| Ok(Some("x".into()))).unwrap();
        assert_eq!(out, "plain ${ text");
    }

    #[test]
    fn test_failure_wraps_placeholder() {
        let err = expand("a ${b.} c", |expr| {
            Err(Error::Parse {
                expression: expr.to_string(),
                offset: 1,
                message: "trailing dot",
            })
        })
        .unwrap_err();
        assert!(matches!(err, Error::Expander { ref placeholder, .. } if placeholder == "b."));
    }
}
