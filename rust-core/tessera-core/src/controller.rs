//! # Action Controllers
//!
//! Controllers are plain types implementing [`ActionController`]. They are
//! made available to the dispatcher through a [`ControllerRegistry`], which
//! maps a formatted class name (`IndexController`, `Admin_UserController`)
//! to a factory. The registry is the only way a controller comes into being;
//! there is no lookup by source file.
//!
//! ```ignore
//! #[derive(Default)]
//! struct IndexController;
//!
//! #[actions]
//! impl IndexController {
//!     fn index_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
//!         ctx.response.append_body("home");
//!         Ok(())
//!     }
//! }
//!
//! impl ActionController for IndexController {
//!     fn has_action(&self, action: &str) -> bool {
//!         Self::ACTIONS.contains(&action)
//!     }
//!
//!     fn invoke_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> Result<()> {
//!         self.dispatch_action(action, ctx).unwrap_or_else(|| self.call_missing(action, ctx))
//!     }
//! }
//! ```

use crate::dispatcher::name::CONTROLLER_SUFFIX;
use crate::error::{Error, Result};
use crate::request::{DispatchRequest, Request};
use crate::response::Response;
use crate::types::ParamValue;
use std::collections::HashMap;

/// Parameters handed to every controller the dispatcher instantiates
pub type InvokeParams = HashMap<String, ParamValue>;

/// Everything a hook or action may touch during one dispatch
pub struct ActionContext<'a, R: DispatchRequest = Request> {
    /// The request being dispatched
    pub request: &'a mut R,
    /// The response passed through from the caller
    pub response: &'a mut Response,
    params: &'a InvokeParams,
}

impl<'a, R: DispatchRequest> ActionContext<'a, R> {
    /// Bundle request, response and invocation parameters
    pub fn new(request: &'a mut R, response: &'a mut Response, params: &'a InvokeParams) -> Self {
        Self {
            request,
            response,
            params,
        }
    }

    /// A single invocation parameter
    #[must_use]
    pub fn invoke_param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// All invocation parameters
    #[must_use]
    pub const fn invoke_params(&self) -> &InvokeParams {
        self.params
    }

    /// Re-target the request and clear its dispatched flag
    ///
    /// Called from `pre_dispatch` this cancels the current action; called
    /// from an action it makes the front controller dispatch again.
    pub fn forward(&mut self, action: &str, controller: Option<&str>, module: Option<&str>) {
        if let Some(module) = module {
            self.request.set_module_name(Some(module.to_string()));
        }
        if let Some(controller) = controller {
            self.request.set_controller_name(Some(controller.to_string()));
        }
        self.request.set_action_name(Some(action.to_string()));
        self.request.set_dispatched(false);
    }

    /// Redirect and stop the current dispatch
    pub fn redirect(&mut self, location: &str) {
        self.response.redirect(location, 302);
        self.request.set_dispatched(false);
    }
}

/// The controller capability set
///
/// `has_action`/`invoke_action` are usually generated with `#[actions]`.
pub trait ActionController<R: DispatchRequest = Request> {
    /// Runs before every action; may clear the dispatched flag to skip it
    ///
    /// # Errors
    ///
    /// Any error aborts the dispatch.
    fn pre_dispatch(&mut self, _ctx: &mut ActionContext<'_, R>) -> Result<()> {
        Ok(())
    }

    /// Runs after the action when the dispatch was not cancelled
    ///
    /// # Errors
    ///
    /// Any error aborts the dispatch.
    fn post_dispatch(&mut self, _ctx: &mut ActionContext<'_, R>) -> Result<()> {
        Ok(())
    }

    /// Whether `action` (a formatted name such as `listAction`) exists
    fn has_action(&self, action: &str) -> bool;

    /// Invoke an action known to exist
    ///
    /// # Errors
    ///
    /// Whatever the action returns.
    fn invoke_action(&mut self, action: &str, ctx: &mut ActionContext<'_, R>) -> Result<()>;

    /// Fallback for actions that do not exist
    ///
    /// # Errors
    ///
    /// `Error::ActionNotFound` unless overridden.
    fn call_missing(&mut self, action: &str, _ctx: &mut ActionContext<'_, R>) -> Result<()> {
        Err(Error::ActionNotFound {
            action: action.to_string(),
            controller: self.controller_name().to_string(),
        })
    }

    /// Name used in diagnostics
    fn controller_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Builds a controller from the dispatcher's invocation parameters
pub type ControllerFactory<R> =
    Box<dyn Fn(&InvokeParams) -> Box<dyn ActionController<R>> + Send + Sync>;

/// Class name to factory table
pub struct ControllerRegistry<R: DispatchRequest = Request> {
    factories: HashMap<String, ControllerFactory<R>>,
}

impl<R: DispatchRequest> Default for ControllerRegistry<R> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<R: DispatchRequest> std::fmt::Debug for ControllerRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<&String> = self.factories.keys().collect();
        classes.sort();
        f.debug_struct("ControllerRegistry")
            .field("classes", &classes)
            .finish()
    }
}

impl<R: DispatchRequest> ControllerRegistry<R> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a formatted class name
    ///
    /// Re-registering a class replaces its factory.
    ///
    /// # Errors
    ///
    /// `Error::InvalidController` if `class` is not shaped like a formatted
    /// controller class name.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&InvokeParams) -> Box<dyn ActionController<R>> + Send + Sync + 'static,
    {
        let class = class.into();
        validate_class_name(&class)?;
        self.factories.insert(class, Box::new(factory));
        Ok(())
    }

    /// Register a `Default`-constructible controller type
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_default<C>(&mut self, class: impl Into<String>) -> Result<()>
    where
        C: ActionController<R> + Default + 'static,
    {
        self.register(class, |_: &InvokeParams| {
            Box::new(C::default()) as Box<dyn ActionController<R>>
        })
    }

    /// Whether a class is registered
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Instantiate a registered class
    #[must_use]
    pub fn create(&self, class: &str, params: &InvokeParams) -> Option<Box<dyn ActionController<R>>> {
        self.factories.get(class).map(|factory| factory(params))
    }

    /// Registered class names, sorted
    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Number of registered classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

fn validate_class_name(class: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidController {
            class: class.to_string(),
            reason: reason.to_string(),
        })
    };

    let Some(base) = class.strip_suffix(CONTROLLER_SUFFIX) else {
        return reject("class name must end in `Controller`");
    };
    if base.is_empty() {
        return reject("class name has no base name");
    }
    if !class.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return reject("class name may only contain [A-Za-z0-9_]");
    }
    Ok(())
}
