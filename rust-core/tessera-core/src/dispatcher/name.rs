//! Raw request names to canonical identifiers.
//!
//! `"foo-bar"` becomes `FooBarController` / `fooBarAction`; path-delimited
//! controller names such as `"admin_user-list"` keep their segments and are
//! rejoined with `_` (`Admin_UserListController`).

use crate::error::{Error, Result};
use serde_json::Value;

/// Suffix appended to formatted controller names
pub const CONTROLLER_SUFFIX: &str = "Controller";
/// Suffix appended to formatted action names
pub const ACTION_SUFFIX: &str = "Action";

/// Word/path delimiter configuration and the pure formatting functions over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFormatter {
    word_delimiter: Vec<String>,
    path_delimiter: String,
}

impl Default for NameFormatter {
    fn default() -> Self {
        Self {
            word_delimiter: vec!["-".to_string(), ".".to_string()],
            path_delimiter: "_".to_string(),
        }
    }
}

impl NameFormatter {
    /// Formatter with the default delimiters (`-`, `.` and `_`)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Word delimiters in replacement order
    #[must_use]
    pub fn word_delimiter(&self) -> &[String] {
        &self.word_delimiter
    }

    /// Replace the word delimiters
    ///
    /// # Errors
    ///
    /// `Error::InvalidDelimiter` if the list is empty or holds an empty string.
    pub fn set_word_delimiter<I, S>(&mut self, spec: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let delimiters: Vec<String> = spec.into_iter().map(Into::into).collect();
        if delimiters.is_empty() || delimiters.iter().any(String::is_empty) {
            return Err(Error::InvalidDelimiter {
                reason: "Invalid word delimiter".to_string(),
            });
        }
        self.word_delimiter = delimiters;
        Ok(())
    }

    /// Path delimiter separating namespaced controller segments
    #[must_use]
    pub fn path_delimiter(&self) -> &str {
        &self.path_delimiter
    }

    /// Replace the path delimiter
    ///
    /// # Errors
    ///
    /// `Error::InvalidPathDelimiter` for an empty delimiter.
    pub fn set_path_delimiter(&mut self, delimiter: impl Into<String>) -> Result<()> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(Error::InvalidPathDelimiter);
        }
        self.path_delimiter = delimiter;
        Ok(())
    }

    /// `admin` -> `Admin`, `my-blog` -> `MyBlog`
    #[must_use]
    pub fn format_module_name(&self, unformatted: &str) -> String {
        ucfirst(&self.format_name(unformatted, false))
    }

    /// `foo-bar` -> `FooBarController`
    #[must_use]
    pub fn format_controller_name(&self, unformatted: &str) -> String {
        let mut name = ucfirst(&self.format_name(unformatted, false));
        name.push_str(CONTROLLER_SUFFIX);
        name
    }

    /// `foo-bar` -> `fooBarAction`
    ///
    /// Action names are never split on the path delimiter.
    #[must_use]
    pub fn format_action_name(&self, unformatted: &str) -> String {
        let formatted = self.format_name(unformatted, true);
        let mut chars = formatted.chars();
        let mut name = match chars.next() {
            Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        name.push_str(ACTION_SUFFIX);
        name
    }

    fn format_name(&self, unformatted: &str, is_action: bool) -> String {
        let segments: Vec<&str> = if is_action {
            vec![unformatted]
        } else {
            unformatted.split(self.path_delimiter.as_str()).collect()
        };

        segments
            .into_iter()
            .map(|segment| self.format_segment(segment))
            .collect::<Vec<_>>()
            .join("_")
    }

    fn format_segment(&self, segment: &str) -> String {
        let mut segment = segment.to_ascii_lowercase();
        for delimiter in &self.word_delimiter {
            segment = segment.replace(delimiter.as_str(), " ");
        }

        segment
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
            .collect::<String>()
            .split(' ')
            .map(ucfirst)
            .collect()
    }
}

fn ucfirst(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Check a word delimiter specification coming from untyped input
///
/// A string is a single delimiter; an array must hold only strings.
///
/// # Errors
///
/// `Error::InvalidDelimiter` for non-string array elements or any other shape.
pub fn verify_delimiter(spec: &Value) -> Result<Vec<String>> {
    match spec {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidDelimiter {
                        reason: "Word delimiter array must contain only strings".to_string(),
                    })
            })
            .collect(),
        _ => Err(Error::InvalidDelimiter {
            reason: "Invalid word delimiter".to_string(),
        }),
    }
}

/// Check a path delimiter specification coming from untyped input
///
/// # Errors
///
/// `Error::InvalidPathDelimiter` unless the value is a string.
pub fn verify_path_delimiter(spec: &Value) -> Result<String> {
    spec.as_str()
        .map(str::to_string)
        .ok_or(Error::InvalidPathDelimiter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_controller_and_action_names() {
        let f = NameFormatter::new();
        assert_eq!(f.format_controller_name("foo-bar"), "FooBarController");
        assert_eq!(f.format_action_name("foo-bar"), "fooBarAction");
        assert_eq!(f.format_controller_name("index"), "IndexController");
        assert_eq!(f.format_action_name("view.all"), "viewAllAction");
    }

    #[test]
    fn test_path_segments_are_preserved() {
        let f = NameFormatter::new();
        assert_eq!(f.format_controller_name("admin_user-list"), "Admin_UserListController");
        // actions do not split on the path delimiter; `_` is simply stripped
        assert_eq!(f.format_action_name("list_all"), "listallAction");
    }

    #[test]
    fn test_non_alphanumerics_stripped() {
        let f = NameFormatter::new();
        assert_eq!(f.format_controller_name("Foo!Bar@2"), "Foobar2Controller");
        assert_eq!(f.format_module_name("my-BLOG"), "MyBlog");
        assert_eq!(f.format_action_name("café-menu"), "cafMenuAction");
    }

    #[test]
    fn test_empty_input() {
        let f = NameFormatter::new();
        assert_eq!(f.format_module_name(""), "");
        assert_eq!(f.format_controller_name(""), "Controller");
        assert_eq!(f.format_action_name(""), "Action");
    }

    #[test]
    fn test_repeated_delimiters_collapse() {
        let f = NameFormatter::new();
        assert_eq!(f.format_controller_name("foo--bar..baz"), "FooBarBazController");
    }

    #[test]
    fn test_formatted_output_has_no_delimiters() {
        let f = NameFormatter::new();
        for raw in ["a-b", "x.y-z", "one-2-three", "news_item-view"] {
            let formatted = f.format_controller_name(raw);
            assert!(!formatted.contains('-'));
            assert!(!formatted.contains('.'));
            assert!(formatted.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            // re-formatting the word part is stable
            let base = formatted.trim_end_matches(CONTROLLER_SUFFIX);
            assert_eq!(f.format_module_name(&base.to_ascii_lowercase()), f.format_module_name(base));
        }
    }

    #[test]
    fn test_custom_delimiters() {
        let mut f = NameFormatter::new();
        f.set_word_delimiter(["+"]).unwrap();
        f.set_path_delimiter("/").unwrap();
        assert_eq!(f.format_controller_name("blog/post+comment"), "Blog_PostCommentController");
        // `-` is no longer a delimiter, so it is stripped like any punctuation
        assert_eq!(f.format_controller_name("blog/post-comment"), "Blog_PostcommentController");
    }

    #[test]
    fn test_empty_delimiters_rejected() {
        let mut f = NameFormatter::new();
        assert!(matches!(
            f.set_word_delimiter(Vec::<String>::new()),
            Err(Error::InvalidDelimiter { .. })
        ));
        assert!(matches!(f.set_word_delimiter([""]), Err(Error::InvalidDelimiter { .. })));
        assert!(matches!(f.set_path_delimiter(""), Err(Error::InvalidPathDelimiter)));
        assert_eq!(f, NameFormatter::default());
    }

    #[test]
    fn test_verify_delimiter() {
        assert_eq!(verify_delimiter(&json!("-")).unwrap(), vec!["-".to_string()]);
        assert_eq!(
            verify_delimiter(&json!(["-", "."])).unwrap(),
            vec!["-".to_string(), ".".to_string()]
        );

        let err = verify_delimiter(&json!(["-", 3])).unwrap_err();
        assert_eq!(err.to_string(), "Word delimiter array must contain only strings");

        let err = verify_delimiter(&json!(42)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid word delimiter");
    }

    #[test]
    fn test_verify_path_delimiter() {
        assert_eq!(verify_path_delimiter(&json!("/")).unwrap(), "/");
        assert!(matches!(
            verify_path_delimiter(&json!(["/"])),
            Err(Error::InvalidPathDelimiter)
        ));
    }
}
