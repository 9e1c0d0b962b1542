//! # Front Controller Plugins
//!
//! Hooks around routing and the dispatch loop.
//!
//! Startup and `pre_dispatch` hooks run in registration order; shutdown and
//! `post_dispatch` hooks run in reverse, so the first plugin registered
//! wraps all the others.

use crate::error::Result;
use crate::request::DispatchRequest;
use crate::response::Response;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Front controller hook set
///
/// Every hook defaults to a no-op. Clearing the request's dispatched flag in
/// `pre_dispatch` skips the dispatch for the current loop iteration.
pub trait Plugin<R: DispatchRequest>: Send + Sync {
    /// Before the router runs
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn route_startup(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// After the router ran
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn route_shutdown(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// Before the first dispatch loop iteration
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn dispatch_loop_startup(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// Before each dispatch
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn pre_dispatch(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// After each dispatch
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn post_dispatch(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// After the dispatch loop finished
    ///
    /// # Errors
    ///
    /// Any error aborts the request.
    fn dispatch_loop_shutdown(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        Ok(())
    }

    /// Plugin name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Ordered plugin list
pub struct PluginBroker<R: DispatchRequest> {
    plugins: Vec<Arc<dyn Plugin<R>>>,
}

impl<R: DispatchRequest> Default for PluginBroker<R> {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }
}

impl<R: DispatchRequest> Clone for PluginBroker<R> {
    fn clone(&self) -> Self {
        Self {
            plugins: self.plugins.clone(),
        }
    }
}

impl<R: DispatchRequest> std::fmt::Debug for PluginBroker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginBroker")
            .field("plugins", &self.names())
            .finish()
    }
}

macro_rules! forward_hook {
    ($hook:ident) => {
        #[doc = concat!("Run `", stringify!($hook), "` on every plugin in registration order")]
        ///
        /// # Errors
        ///
        /// Stops at the first plugin error.
        pub fn $hook(&self, request: &mut R, response: &mut Response) -> Result<()> {
            for plugin in &self.plugins {
                plugin.$hook(request, response)?;
            }
            Ok(())
        }
    };
    (rev $hook:ident) => {
        #[doc = concat!("Run `", stringify!($hook), "` on every plugin in reverse order")]
        ///
        /// # Errors
        ///
        /// Stops at the first plugin error.
        pub fn $hook(&self, request: &mut R, response: &mut Response) -> Result<()> {
            for plugin in self.plugins.iter().rev() {
                plugin.$hook(request, response)?;
            }
            Ok(())
        }
    };
}

impl<R: DispatchRequest> PluginBroker<R> {
    /// Create an empty broker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin
    pub fn register<P: Plugin<R> + 'static>(&mut self, plugin: P) {
        self.plugins.push(Arc::new(plugin));
    }

    /// Register an already shared plugin
    pub fn register_shared(&mut self, plugin: Arc<dyn Plugin<R>>) {
        self.plugins.push(plugin);
    }

    /// Unregister every plugin with this name
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name() != name);
        self.plugins.len() != before
    }

    /// Whether a plugin with this name is registered
    #[must_use]
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Plugin names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Get the number of plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if no plugin is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    forward_hook!(route_startup);
    forward_hook!(rev route_shutdown);
    forward_hook!(dispatch_loop_startup);
    forward_hook!(pre_dispatch);
    forward_hook!(rev post_dispatch);
    forward_hook!(rev dispatch_loop_shutdown);
}

/// Structured request lifecycle lines at info level
#[derive(Debug, Default)]
pub struct LoggingPlugin;

impl LoggingPlugin {
    /// Create a new logging plugin
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<R: DispatchRequest> Plugin<R> for LoggingPlugin {
    fn route_startup(&self, request: &mut R, _response: &mut Response) -> Result<()> {
        info!(path = %request.path_info(), "Request received");
        Ok(())
    }

    fn route_shutdown(&self, request: &mut R, _response: &mut Response) -> Result<()> {
        info!(
            module = request.module_name().unwrap_or("-"),
            controller = request.controller_name().unwrap_or("-"),
            action = request.action_name().unwrap_or("-"),
            "Request routed"
        );
        Ok(())
    }

    fn dispatch_loop_shutdown(&self, request: &mut R, response: &mut Response) -> Result<()> {
        info!(
            path = %request.path_info(),
            status = response.status,
            "Response ready"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingPlugin"
    }
}

/// Dispatch loop duration at debug level
#[derive(Debug, Default)]
pub struct TimingPlugin {
    started: Mutex<Option<Instant>>,
}

impl TimingPlugin {
    /// Create a new timing plugin
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: DispatchRequest> Plugin<R> for TimingPlugin {
    fn dispatch_loop_startup(&self, _request: &mut R, _response: &mut Response) -> Result<()> {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        Ok(())
    }

    fn dispatch_loop_shutdown(&self, request: &mut R, _response: &mut Response) -> Result<()> {
        if let Ok(mut started) = self.started.lock() {
            if let Some(start) = started.take() {
                debug!(
                    path = %request.path_info(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Dispatch timing"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TimingPlugin"
    }
}
