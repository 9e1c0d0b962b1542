//! # Request
//!
//! The request abstraction consumed by the router and dispatcher, and a
//! concrete HTTP-shaped implementation.

use crate::types::ParamValue;
use std::collections::HashMap;
use std::fmt;

/// HTTP methods understood by requests and routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// HTTP GET
    #[default]
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        })
    }
}

/// What the dispatcher needs from a request
///
/// Names are stored raw (as routed); formatting happens in the dispatcher.
/// The dispatched flag is how hooks and controllers cancel or re-queue a
/// dispatch: clearing it after `pre_dispatch` skips the action, clearing it
/// inside an action makes the front controller loop again.
pub trait DispatchRequest {
    /// Raw module name, if any
    fn module_name(&self) -> Option<&str>;
    /// Set the raw module name
    fn set_module_name(&mut self, module: Option<String>);
    /// Raw controller name, if any
    fn controller_name(&self) -> Option<&str>;
    /// Set the raw controller name
    fn set_controller_name(&mut self, controller: Option<String>);
    /// Raw action name, if any
    fn action_name(&self) -> Option<&str>;
    /// Set the raw action name
    fn set_action_name(&mut self, action: Option<String>);
    /// Whether the request is marked dispatched
    fn is_dispatched(&self) -> bool;
    /// Mark or unmark the request as dispatched
    fn set_dispatched(&mut self, dispatched: bool);
    /// Look up a user parameter
    fn user_param(&self, name: &str) -> Option<&ParamValue>;
    /// Set a user parameter
    fn set_user_param(&mut self, name: String, value: ParamValue);
    /// Path the router matches against
    fn path_info(&self) -> &str {
        "/"
    }
}

/// Concrete request carrying HTTP data plus dispatch state
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    query_string: Option<String>,
    query_params: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
    module: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    dispatched: bool,
    params: HashMap<String, ParamValue>,
}

impl Request {
    /// Create a request from a method and a path that may carry a query string
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        let query_params = parse_query_string(query_string.as_deref());

        Self {
            method,
            path,
            query_string,
            query_params,
            ..Self::default()
        }
    }

    /// Shorthand for a GET request
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Build a request already pointed at a module/controller/action
    #[must_use]
    pub fn for_action(module: Option<&str>, controller: &str, action: &str) -> Self {
        let mut request = Self::default();
        request.module = module.map(str::to_string);
        request.controller = Some(controller.to_string());
        request.action = Some(action.to_string());
        request
    }

    /// Attach a body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a header (names are case-insensitive)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    /// All headers, keyed by lower-cased name
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Look up a parameter: user params first, then the query string
    #[must_use]
    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.params
            .get(name)
            .cloned()
            .or_else(|| self.query_params.get(name).cloned().map(ParamValue::String))
    }

    /// All user params
    #[must_use]
    pub const fn params(&self) -> &HashMap<String, ParamValue> {
        &self.params
    }

    /// Remove all user params
    pub fn clear_params(&mut self) {
        self.params.clear();
    }
}

impl DispatchRequest for Request {
    fn path_info(&self) -> &str {
        &self.path
    }

    fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    fn set_module_name(&mut self, module: Option<String>) {
        self.module = module;
    }

    fn controller_name(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    fn set_controller_name(&mut self, controller: Option<String>) {
        self.controller = controller;
    }

    fn action_name(&self) -> Option<&str> {
        self.action.as_deref()
    }

    fn set_action_name(&mut self, action: Option<String>) {
        self.action = action;
    }

    fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    fn set_dispatched(&mut self, dispatched: bool) {
        self.dispatched = dispatched;
    }

    fn user_param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    fn set_user_param(&mut self, name: String, value: ParamValue) {
        self.params.insert(name, value);
    }
}

/// Parse query string into HashMap
///
/// Handles URL decoding and duplicate keys (last value wins).
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Percent-decoding with `+` as space; invalid escapes are kept verbatim
pub(crate) fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => match hex::decode(&bytes[i + 1..i + 3]) {
                Ok(byte) => {
                    out.extend(byte);
                    i += 2;
                }
                Err(_) => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
