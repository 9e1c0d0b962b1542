//! # Router
//!
//! Ordered collection of named routes. Routes are tried from the most
//! recently added to the first; the first match writes its names and params
//! into the request.

use crate::error::{Error, Result};
use crate::request::DispatchRequest;
use crate::route::{DefaultRoute, PatternRoute, Route, RouteDefaults, RouteMatch};
use tracing::debug;

/// Name under which [`Router::with_default_route`] registers its route
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// Named route table
#[derive(Default)]
pub struct Router {
    routes: Vec<(String, Box<dyn Route>)>,
    current: Option<String>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.route_names())
            .field("current", &self.current)
            .finish()
    }
}

impl Router {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router holding only a [`DefaultRoute`]
    #[must_use]
    pub fn with_default_route(route: DefaultRoute) -> Self {
        let mut router = Self::new();
        router.add_route(DEFAULT_ROUTE_NAME, route);
        router
    }

    /// Add a route; a route with the same name is replaced in place
    pub fn add_route<T: Route + 'static>(&mut self, name: &str, route: T) -> &mut Self {
        let route: Box<dyn Route> = Box::new(route);
        if let Some(slot) = self.routes.iter_mut().find(|(n, _)| n == name) {
            slot.1 = route;
        } else {
            self.routes.push((name.to_string(), route));
        }
        self
    }

    /// Compile and add a pattern route
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoutePattern` if the pattern cannot be compiled.
    pub fn add_pattern(
        &mut self,
        name: &str,
        pattern: &str,
        defaults: RouteDefaults,
    ) -> Result<&mut Self> {
        let route = PatternRoute::new(pattern, defaults)?;
        Ok(self.add_route(name, route))
    }

    /// Remove a route by name
    pub fn remove_route(&mut self, name: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|(n, _)| n != name);
        self.routes.len() != before
    }

    /// Whether a route with this name exists
    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.routes.iter().any(|(n, _)| n == name)
    }

    /// Route names in insertion order
    #[must_use]
    pub fn route_names(&self) -> Vec<&str> {
        self.routes.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Name of the route that matched last
    #[must_use]
    pub fn current_route_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Match a path without touching a request
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&str, RouteMatch)> {
        self.routes
            .iter()
            .rev()
            .find_map(|(name, route)| route.match_path(path).map(|m| (name.as_str(), m)))
    }

    /// Route a request in place
    ///
    /// Names the match leaves unset are left untouched on the request.
    ///
    /// # Errors
    ///
    /// `Error::RouteNotFound` if no route matches the request path.
    pub fn route<R: DispatchRequest>(&mut self, request: &mut R) -> Result<()> {
        let path = request.path_info().to_string();
        let Some((name, matched)) = self.match_path(&path) else {
            return Err(Error::RouteNotFound { path });
        };
        let name = name.to_string();

        debug!(route = %name, path = %path, "Route matched");

        if matched.module.is_some() {
            request.set_module_name(matched.module);
        }
        if matched.controller.is_some() {
            request.set_controller_name(matched.controller);
        }
        if matched.action.is_some() {
            request.set_action_name(matched.action);
        }
        for (key, value) in matched.params {
            request.set_user_param(key, value);
        }

        self.current = Some(name);
        Ok(())
    }
}
