//! # Response
//!
//! Response object handed through the dispatcher to controllers. The
//! dispatcher never inspects it.

use std::collections::HashMap;

/// Response accumulated by plugins and controllers
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "text/html; charset=utf-8".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create an empty 200 response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "application/json".to_string(),
            ..Self::default()
        }
    }

    /// Create a text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header; `Content-Type` updates `content_type`
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Append to the body
    pub fn append_body(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }

    /// Issue a redirect
    pub fn redirect(&mut self, location: &str, status: u16) {
        self.status = status;
        self.headers
            .insert("Location".to_string(), location.to_string());
    }

    /// Whether a redirect was issued
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.headers.contains_key("Location")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_json() {
        let resp = Response::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_response_with_status() {
        let resp = Response::text("Not Found").with_status(404);
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_content_type_header_updates_field() {
        let resp = Response::new().with_header("Content-Type", "text/csv");
        assert_eq!(resp.content_type, "text/csv");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_append_and_redirect() {
        let mut resp = Response::new();
        resp.append_body("hello ");
        resp.append_body("world");
        assert_eq!(resp.body, "hello world");
        assert!(!resp.is_redirect());

        resp.redirect("/login", 302);
        assert!(resp.is_redirect());
        assert_eq!(resp.headers.get("Location"), Some(&"/login".to_string()));
    }
}
