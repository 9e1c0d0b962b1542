//! # Front Controller
//!
//! Routes a request once, then runs the dispatch loop until the request
//! stays dispatched. Controllers and plugins re-queue work by clearing the
//! dispatched flag (see [`ActionContext::forward`](crate::controller::ActionContext::forward)).

use crate::dispatcher::{Dispatcher, DEFAULT_MODULE};
use crate::error::{Error, Result};
use crate::plugin::{Plugin, PluginBroker};
use crate::request::{DispatchRequest, Request};
use crate::response::Response;
use crate::route::DefaultRoute;
use crate::router::{Router, DEFAULT_ROUTE_NAME};
use tracing::{debug, info};

/// Default bound on dispatch loop iterations
pub const DEFAULT_MAX_DISPATCH_LOOPS: usize = 100;

/// Router, dispatcher and plugins wired together
pub struct FrontController<R: DispatchRequest = Request> {
    router: Router,
    dispatcher: Dispatcher<R>,
    plugins: PluginBroker<R>,
    max_dispatch_loops: usize,
}

impl<R: DispatchRequest> Default for FrontController<R> {
    fn default() -> Self {
        Self::new(Dispatcher::default())
    }
}

impl<R: DispatchRequest> std::fmt::Debug for FrontController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontController")
            .field("router", &self.router)
            .field("dispatcher", &self.dispatcher)
            .field("plugins", &self.plugins)
            .field("max_dispatch_loops", &self.max_dispatch_loops)
            .finish()
    }
}

impl<R: DispatchRequest> FrontController<R> {
    /// Front controller around a configured dispatcher
    ///
    /// The router starts empty; if it is still empty at the first request a
    /// [`DefaultRoute`] is installed using the dispatcher's defaults and its
    /// registered modules.
    #[must_use]
    pub fn new(dispatcher: Dispatcher<R>) -> Self {
        Self {
            router: Router::new(),
            dispatcher,
            plugins: PluginBroker::new(),
            max_dispatch_loops: DEFAULT_MAX_DISPATCH_LOOPS,
        }
    }

    /// Router
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Mutable router
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Dispatcher
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher<R> {
        &self.dispatcher
    }

    /// Mutable dispatcher
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<R> {
        &mut self.dispatcher
    }

    /// Plugin broker
    #[must_use]
    pub const fn plugins(&self) -> &PluginBroker<R> {
        &self.plugins
    }

    /// Register a plugin
    pub fn register_plugin<P: Plugin<R> + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.register(plugin);
        self
    }

    /// Dispatch loop bound
    #[must_use]
    pub const fn max_dispatch_loops(&self) -> usize {
        self.max_dispatch_loops
    }

    /// Change the dispatch loop bound
    pub fn set_max_dispatch_loops(&mut self, limit: usize) -> &mut Self {
        self.max_dispatch_loops = limit;
        self
    }

    /// Route and dispatch a request
    ///
    /// # Errors
    ///
    /// - `Error::RouteNotFound` if no route matches
    /// - `Error::DispatchLoopExceeded` if controllers keep forwarding
    /// - any plugin, dispatcher or controller error
    pub fn handle(&mut self, request: &mut R) -> Result<Response> {
        let mut response = Response::new();

        if self.router.route_names().is_empty() {
            let route = self.default_route();
            self.router.add_route(DEFAULT_ROUTE_NAME, route);
        }

        self.plugins.route_startup(request, &mut response)?;
        self.router.route(request)?;
        self.plugins.route_shutdown(request, &mut response)?;

        self.plugins.dispatch_loop_startup(request, &mut response)?;
        self.run_dispatch_loop(request, &mut response)?;
        self.plugins.dispatch_loop_shutdown(request, &mut response)?;

        info!(
            path = %request.path_info(),
            status = response.status,
            "Request handled"
        );
        Ok(response)
    }

    fn run_dispatch_loop(&mut self, request: &mut R, response: &mut Response) -> Result<()> {
        let mut iterations = 0;

        loop {
            if iterations == self.max_dispatch_loops {
                return Err(Error::DispatchLoopExceeded {
                    limit: self.max_dispatch_loops,
                });
            }
            iterations += 1;

            request.set_dispatched(true);
            self.plugins.pre_dispatch(request, response)?;

            if request.is_dispatched() {
                self.dispatcher.dispatch(request, response)?;
                self.plugins.post_dispatch(request, response)?;
            }

            if request.is_dispatched() || response.is_redirect() {
                debug!(iterations, "Dispatch loop finished");
                return Ok(());
            }

            debug!(
                controller = request.controller_name().unwrap_or("-"),
                action = request.action_name().unwrap_or("-"),
                "Request forwarded"
            );
        }
    }

    fn default_route(&self) -> DefaultRoute {
        DefaultRoute::new(
            self.dispatcher.default_controller(),
            self.dispatcher.default_action(),
        )
        .with_modules(
            self.dispatcher
                .controller_directory()
                .keys()
                .filter(|module| module.as_str() != DEFAULT_MODULE)
                .cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions;
    use crate::controller::{ActionContext, ActionController, InvokeParams};
    use crate::route::RouteDefaults;
    use crate::types::ParamValue;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct PageController;

    #[actions]
    impl PageController {
        fn index_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            ctx.response.append_body("home");
            Ok(())
        }

        fn show_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            let id = ctx
                .request
                .param("id")
                .map_or_else(|| "none".to_string(), |v| v.as_string());
            ctx.response.append_body(&format!("page {id}"));
            Ok(())
        }

        fn old_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            ctx.response.append_body("[old]");
            ctx.forward("show", None, None);
            Ok(())
        }

        fn loop_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            ctx.forward("loop", None, None);
            Ok(())
        }

        fn moved_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            ctx.redirect("/page/show");
            Ok(())
        }
    }

    impl ActionController for PageController {
        fn has_action(&self, action: &str) -> bool {
            Self::ACTIONS.contains(&action)
        }

        fn invoke_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> Result<()> {
            match self.dispatch_action(action, ctx) {
                Some(result) => result,
                None => self.call_missing(action, ctx),
            }
        }
    }

    fn front() -> FrontController {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_default_controller::<PageController>(None, "page")
            .unwrap();
        dispatcher
            .register_default_controller::<PageController>(None, "index")
            .unwrap();
        FrontController::new(dispatcher)
    }

    #[test]
    fn test_handle_default_route() {
        let mut front = front();
        let mut request = Request::get("/page/show/id/42");
        let response = front.handle(&mut request).unwrap();

        assert_eq!(response.body, "page 42");
        assert!(request.is_dispatched());
        assert_eq!(front.router().current_route_name(), Some(DEFAULT_ROUTE_NAME));
    }

    #[test]
    fn test_handle_root_uses_defaults() {
        let mut front = front();
        let mut request = Request::get("/");
        let response = front.handle(&mut request).unwrap();
        assert_eq!(response.body, "home");
        assert_eq!(request.controller_name(), Some("index"));
        assert_eq!(request.action_name(), Some("index"));
    }

    #[test]
    fn test_forward_runs_another_iteration() {
        let mut front = front();
        let mut request = Request::get("/page/old");
        let response = front.handle(&mut request).unwrap();
        assert_eq!(response.body, "[old]page none");
        assert_eq!(request.action_name(), Some("show"));
    }

    #[test]
    fn test_dispatch_loop_bound() {
        let mut front = front();
        front.set_max_dispatch_loops(5);
        let mut request = Request::get("/page/loop");
        let err = front.handle(&mut request).unwrap_err();
        assert!(matches!(err, Error::DispatchLoopExceeded { limit: 5 }));
    }

    #[test]
    fn test_redirect_ends_loop() {
        let mut front = front();
        let mut request = Request::get("/page/moved");
        let response = front.handle(&mut request).unwrap();
        assert!(response.is_redirect());
        assert_eq!(response.headers.get("Location").map(String::as_str), Some("/page/show"));
    }

    #[test]
    fn test_pattern_route_wins_over_default() {
        let mut front = front();
        front
            .router_mut()
            .add_route(DEFAULT_ROUTE_NAME, DefaultRoute::default())
            .add_pattern(
                "item",
                "/item/{id:int}",
                RouteDefaults::new().controller("page").action("show"),
            )
            .unwrap();

        let mut request = Request::get("/item/9");
        let response = front.handle(&mut request).unwrap();
        assert_eq!(response.body, "page 9");
        assert_eq!(request.user_param("id"), Some(&ParamValue::Int(9)));
    }

    #[test]
    fn test_route_not_found() {
        let mut front = front();
        front
            .router_mut()
            .add_pattern("only", "/only", RouteDefaults::new().controller("page"))
            .unwrap();
        let mut request = Request::get("/elsewhere");
        assert!(matches!(
            front.handle(&mut request),
            Err(Error::RouteNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_controller_propagates() {
        let mut front = front();
        let mut request = Request::get("/missing/index");
        let err = front.handle(&mut request).unwrap_err();
        assert!(matches!(err, Error::ControllerNotFound { class } if class == "MissingController"));
    }

    struct Maintenance {
        hits: Arc<Mutex<usize>>,
    }

    impl Plugin<Request> for Maintenance {
        fn pre_dispatch(&self, request: &mut Request, _response: &mut Response) -> Result<()> {
            let mut hits = self.hits.lock().unwrap();
            *hits += 1;
            if request.action_name() != Some("index") {
                request.set_action_name(Some("index".to_string()));
                request.set_dispatched(false);
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Maintenance"
        }
    }

    #[test]
    fn test_plugin_pre_dispatch_reroutes() {
        let hits = Arc::new(Mutex::new(0));
        let mut front = front();
        front.register_plugin(Maintenance {
            hits: Arc::clone(&hits),
        });

        let mut request = Request::get("/page/show/id/1");
        let response = front.handle(&mut request).unwrap();
        assert_eq!(response.body, "home");
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn test_default_route_knows_modules() {
        let dir = TempDir::new().unwrap();
        let mut dispatcher: Dispatcher = Dispatcher::with_params(InvokeParams::new());
        dispatcher
            .add_controller_directory(dir.path(), Some("admin"))
            .unwrap();
        dispatcher
            .register_default_controller::<PageController>(Some("admin"), "page")
            .unwrap();

        let mut front = FrontController::new(dispatcher);
        let mut request = Request::get("/admin/page/show/id/3");
        let response = front.handle(&mut request).unwrap();
        assert_eq!(response.body, "page 3");
        assert_eq!(request.module_name(), Some("admin"));
        assert_eq!(front.dispatcher().current_module(), Some("Admin"));
    }
}
