//! Per-device directives embedded in free-text annotations
//!
//! Operators attach extra DNS data to a device by putting a JSON object on a
//! line of its own inside the device comment, wrapped in backticks:
//!
//! ```text
//! Rack 4, top unit
//! `{"cnames": ["www", "intranet"], "secondary_ips": ["10.0.1.9"]}`
//! ```
//!
//! The comment is human-authored text, so parsing is opportunistic: lines
//! that do not look like a directive, or that fail to parse, are ignored.

use serde_json::Value;
use tracing::debug;

const OPEN: &str = "`{";
const CLOSE: &str = "}`";

/// Structured data extracted from a device annotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    /// Hostname aliases, published as CNAME records
    pub cnames: Option<Vec<String>>,

    /// Extra addresses, published as PTR records
    pub secondary_ips: Option<Vec<String>>,
}

impl Directive {
    /// Whether no field was set
    pub fn is_empty(&self) -> bool {
        self.cnames.is_none() && self.secondary_ips.is_none()
    }

    /// Overwrite fields of `self` with the fields set in `other`
    ///
    /// Fields are replaced, not concatenated.
    pub fn overwrite_with(&mut self, other: Directive) {
        if other.cnames.is_some() {
            self.cnames = other.cnames;
        }
        if other.secondary_ips.is_some() {
            self.secondary_ips = other.secondary_ips;
        }
    }

    /// Read the directive fields of a JSON object
    ///
    /// A field is accepted only when it is an array made entirely of
    /// strings. Returns `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            cnames: object.get("cnames").and_then(string_list),
            secondary_ips: object.get("secondary_ips").and_then(string_list),
        })
    }
}

/// Parse all directive lines of an annotation
///
/// Returns an empty [`Directive`] when the annotation is absent, contains no
/// directive line, or only malformed ones. When several lines qualify, later
/// lines overwrite earlier ones field by field.
pub fn parse_directives(annotation: Option<&str>) -> Directive {
    let mut directive = Directive::default();

    let Some(annotation) = annotation else {
        return directive;
    };

    for line in annotation.lines() {
        if let Some(parsed) = parse_line(line) {
            directive.overwrite_with(parsed);
        }
    }

    directive
}

/// Parse one annotation line, `None` if it is not a well-formed directive
fn parse_line(line: &str) -> Option<Directive> {
    let line = line.trim();
    if line.len() < OPEN.len() + CLOSE.len() {
        return None;
    }
    if !line.starts_with(OPEN) || !line.ends_with(CLOSE) {
        return None;
    }

    // Drop the backticks, the braces belong to the JSON object
    let payload = &line[1..line.len() - 1];

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring malformed directive {}: {}", line, e);
            return None;
        }
    };

    let directive = Directive::from_value(&value);
    if directive.is_none() {
        debug!("Ignoring directive that is not an object: {}", line);
    }
    directive
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cnames_directive() {
        let directive = parse_directives(Some("`{\"cnames\": [\"x\",\"y\"]}`"));
        assert_eq!(
            directive.cnames,
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(directive.secondary_ips, None);
    }

    #[test]
    fn test_malformed_directive_is_ignored() {
        let directive = parse_directives(Some("`{not json}`"));
        assert!(directive.is_empty());
    }

    #[test]
    fn test_absent_and_plain_annotation() {
        assert!(parse_directives(None).is_empty());
        assert!(parse_directives(Some("")).is_empty());
        assert!(parse_directives(Some("core switch, do not reboot")).is_empty());
    }

    #[test]
    fn test_directive_among_free_text_with_whitespace() {
        let annotation = "Rack 4\n   `{\"secondary_ips\": [\"10.0.1.9\"]}`   \nowner: netops";
        let directive = parse_directives(Some(annotation));
        assert_eq!(directive.secondary_ips, Some(vec!["10.0.1.9".to_string()]));
        assert_eq!(directive.cnames, None);
    }

    #[test]
    fn test_inline_directive_does_not_qualify() {
        let directive = parse_directives(Some("see `{\"cnames\": [\"x\"]}` below"));
        assert!(directive.is_empty());
    }

    #[test]
    fn test_mixed_type_list_rejected_wholesale() {
        let annotation = "`{\"cnames\": [\"x\", 1], \"secondary_ips\": [\"10.0.0.9\"]}`";
        let directive = parse_directives(Some(annotation));
        assert_eq!(directive.cnames, None);
        assert_eq!(directive.secondary_ips, Some(vec!["10.0.0.9".to_string()]));
    }

    #[test]
    fn test_non_list_field_rejected() {
        let directive = parse_directives(Some("`{\"cnames\": \"www\"}`"));
        assert!(directive.is_empty());
    }

    #[test]
    fn test_later_line_overwrites_per_field() {
        let annotation = "`{\"cnames\": [\"a\"], \"secondary_ips\": [\"10.0.0.9\"]}`\n\
                          `{\"cnames\": [\"b\"]}`";
        let directive = parse_directives(Some(annotation));
        assert_eq!(directive.cnames, Some(vec!["b".to_string()]));
        assert_eq!(directive.secondary_ips, Some(vec!["10.0.0.9".to_string()]));
    }

    #[test]
    fn test_malformed_later_line_keeps_earlier_result() {
        let annotation = "`{\"cnames\": [\"a\"]}`\n`{\"cnames\": [\"b\"}`";
        let directive = parse_directives(Some(annotation));
        assert_eq!(directive.cnames, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_minimal_delimiters() {
        assert!(parse_directives(Some("`{}`")).is_empty());
        assert!(parse_directives(Some("`{`")).is_empty());
        assert!(parse_directives(Some("`}`")).is_empty());
    }
}
