//! # Routes
//!
//! A route turns a request path into module/controller/action names plus
//! parameters. Two kinds exist:
//!
//! - [`DefaultRoute`]: `/[module/]controller/action/key/value/...`
//! - [`PatternRoute`]: an explicit pattern such as `/archive/{year:int}` with
//!   fixed defaults for the names it does not capture.

use crate::error::{Error, Result};
use crate::request::url_decode;
use crate::types::{convert_param, parse_param_pattern, ParamType, ParamValue};
use matchit::Router as MatchitRouter;
use std::collections::{HashMap, HashSet};

/// Placeholder names that set dispatch names instead of params
const MODULE_KEY: &str = "module";
const CONTROLLER_KEY: &str = "controller";
const ACTION_KEY: &str = "action";

/// Result of matching a path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteMatch {
    /// Raw module name
    pub module: Option<String>,
    /// Raw controller name
    pub controller: Option<String>,
    /// Raw action name
    pub action: Option<String>,
    /// Extracted parameters
    pub params: HashMap<String, ParamValue>,
}

/// A path matcher
pub trait Route: Send + Sync {
    /// Match a request path, without query string
    fn match_path(&self, path: &str) -> Option<RouteMatch>;
}

/// Names and params a pattern route supplies when the path does not
#[derive(Debug, Clone, Default)]
pub struct RouteDefaults {
    module: Option<String>,
    controller: Option<String>,
    action: Option<String>,
    params: HashMap<String, ParamValue>,
}

impl RouteDefaults {
    /// Empty defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default module
    #[must_use]
    pub fn module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    /// Default controller
    #[must_use]
    pub fn controller(mut self, controller: &str) -> Self {
        self.controller = Some(controller.to_string());
        self
    }

    /// Default action
    #[must_use]
    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    /// Default parameter
    #[must_use]
    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Explicit route backed by a matchit pattern
///
/// Placeholders may carry a type (`{id:int}`); values that fail conversion
/// are kept as strings. `{module}`, `{controller}` and `{action}`
/// placeholders fill the dispatch names.
pub struct PatternRoute {
    /// Original pattern (e.g., "/users/{id:int}")
    pub path_pattern: String,
    /// Normalized pattern for matchit (e.g., "/users/{id}")
    pub match_pattern: String,
    /// Parameter name to type mapping
    pub param_types: HashMap<String, ParamType>,
    defaults: RouteDefaults,
    matcher: MatchitRouter<()>,
}

impl std::fmt::Debug for PatternRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRoute")
            .field("path_pattern", &self.path_pattern)
            .field("match_pattern", &self.match_pattern)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl PatternRoute {
    /// Compile a pattern
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoutePattern` if matchit rejects the normalized pattern.
    pub fn new(path: &str, defaults: RouteDefaults) -> Result<Self> {
        let (match_pattern, param_types) = parse_path_pattern(path);

        let mut matcher = MatchitRouter::new();
        matcher
            .insert(match_pattern.as_str(), ())
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path_pattern: path.to_string(),
            match_pattern,
            param_types,
            defaults,
            matcher,
        })
    }

    /// Declared type for a parameter; `String` when undeclared
    #[must_use]
    pub fn param_type(&self, name: &str) -> ParamType {
        self.param_types.get(name).copied().unwrap_or_default()
    }
}

impl Route for PatternRoute {
    fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let matched = self.matcher.at(path).ok()?;

        let mut result = RouteMatch {
            module: self.defaults.module.clone(),
            controller: self.defaults.controller.clone(),
            action: self.defaults.action.clone(),
            params: self.defaults.params.clone(),
        };

        for (name, raw) in matched.params.iter() {
            let raw = url_decode(raw);
            match name {
                MODULE_KEY => result.module = Some(raw),
                CONTROLLER_KEY => result.controller = Some(raw),
                ACTION_KEY => result.action = Some(raw),
                _ => {
                    let value = convert_param(&raw, self.param_type(name))
                        .unwrap_or(ParamValue::String(raw));
                    result.params.insert(name.to_string(), value);
                }
            }
        }

        Some(result)
    }
}

/// Convert `{name:type}` segments to `{name}` and collect the declared types
fn parse_path_pattern(path: &str) -> (String, HashMap<String, ParamType>) {
    let mut param_types = HashMap::new();
    let mut normalized_parts = Vec::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some((name, param_type)) = parse_param_pattern(segment) {
            normalized_parts.push(format!("{{{name}}}"));
            param_types.insert(name, param_type);
        } else {
            normalized_parts.push(segment.to_string());
        }
    }

    let normalized = if normalized_parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", normalized_parts.join("/"))
    };

    (normalized, param_types)
}

/// The conventional `/[module/]controller/action/key/value` route
///
/// The first segment is taken as a module only when it names a known
/// module. Missing controller/action segments fall back to the defaults.
/// A trailing key without a value gets an empty string.
#[derive(Debug, Clone)]
pub struct DefaultRoute {
    default_controller: String,
    default_action: String,
    modules: HashSet<String>,
}

impl Default for DefaultRoute {
    fn default() -> Self {
        Self::new("index", "index")
    }
}

impl DefaultRoute {
    /// Route with the given default controller and action
    #[must_use]
    pub fn new(default_controller: &str, default_action: &str) -> Self {
        Self {
            default_controller: default_controller.to_string(),
            default_action: default_action.to_string(),
            modules: HashSet::new(),
        }
    }

    /// Declare the modules recognized in the first path segment
    #[must_use]
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(modules.into_iter().map(Into::into));
        self
    }
}

impl Route for DefaultRoute {
    fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let mut segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(url_decode)
            .peekable();

        let module = segments.next_if(|s| self.modules.contains(s));
        let controller = segments
            .next()
            .unwrap_or_else(|| self.default_controller.clone());
        let action = segments
            .next()
            .unwrap_or_else(|| self.default_action.clone());

        let mut params = HashMap::new();
        while let Some(key) = segments.next() {
            let value = segments.next().unwrap_or_default();
            params.insert(key, ParamValue::String(value));
        }

        Some(RouteMatch {
            module,
            controller: Some(controller),
            action: Some(action),
            params,
        })
    }
}
