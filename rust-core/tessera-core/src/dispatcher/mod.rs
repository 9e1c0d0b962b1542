//! # Dispatcher
//!
//! Resolves a request's module/controller/action triple to a registered
//! controller and runs it:
//!
//! 1. resolve the controller class (falling back to the default controller),
//! 2. qualify it with the module when the module is valid and look it up,
//! 3. instantiate it with the invocation parameters,
//! 4. resolve the action (falling back to the default action),
//! 5. `pre_dispatch`, then the action and `post_dispatch` unless the hook
//!    cleared the dispatched flag.
//!
//! Controller directories are kept for `is_dispatchable` and for the
//! `useModuleDefault` probe, both of which look for the controller's source
//! file on disk. Dispatching itself goes through the registry only.

pub mod name;

use crate::controller::{ActionContext, ActionController, ControllerRegistry, InvokeParams};
use crate::error::{Error, Result};
use crate::request::{DispatchRequest, Request};
use crate::response::Response;
use crate::types::ParamValue;
use name::NameFormatter;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, warn};

/// Module name reserved for the global controller directories
pub const DEFAULT_MODULE: &str = "default";

/// Invocation parameter enabling per-module default controllers
pub const USE_MODULE_DEFAULT: &str = "useModuleDefault";

/// Input accepted by [`Dispatcher::set_controller_directory`]
#[derive(Debug, Clone)]
pub enum DirectorySpec {
    /// One default directory
    Path(PathBuf),
    /// Several default directories
    List(Vec<PathBuf>),
    /// Module name to directory; `"default"` entries join the default list
    Modules(Vec<(String, PathBuf)>),
}

impl From<&str> for DirectorySpec {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for DirectorySpec {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for DirectorySpec {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<PathBuf>> for DirectorySpec {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::List(paths)
    }
}

impl From<Vec<(String, PathBuf)>> for DirectorySpec {
    fn from(modules: Vec<(String, PathBuf)>) -> Self {
        Self::Modules(modules)
    }
}

impl From<HashMap<String, PathBuf>> for DirectorySpec {
    fn from(modules: HashMap<String, PathBuf>) -> Self {
        Self::Modules(modules.into_iter().collect())
    }
}

/// Request-to-controller dispatcher
pub struct Dispatcher<R: DispatchRequest = Request> {
    directories: BTreeMap<String, Vec<PathBuf>>,
    invoke_params: InvokeParams,
    formatter: NameFormatter,
    default_controller: String,
    default_action: String,
    controller_extension: String,
    registry: ControllerRegistry<R>,
    current_module: Option<String>,
    current_directory: Vec<PathBuf>,
}

impl<R: DispatchRequest> Default for Dispatcher<R> {
    fn default() -> Self {
        Self {
            directories: BTreeMap::new(),
            invoke_params: InvokeParams::new(),
            formatter: NameFormatter::default(),
            default_controller: "index".to_string(),
            default_action: "index".to_string(),
            controller_extension: "rs".to_string(),
            registry: ControllerRegistry::default(),
            current_module: None,
            current_directory: Vec::new(),
        }
    }
}

impl<R: DispatchRequest> std::fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("directories", &self.directories)
            .field("invoke_params", &self.invoke_params)
            .field("formatter", &self.formatter)
            .field("default_controller", &self.default_controller)
            .field("default_action", &self.default_action)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<R: DispatchRequest> Dispatcher<R> {
    /// Dispatcher with default names (`index`/`index`) and no directories
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher seeded with invocation parameters
    #[must_use]
    pub fn with_params(params: InvokeParams) -> Self {
        let mut dispatcher = Self::default();
        dispatcher.set_params(params);
        dispatcher
    }

    // ----------------------------------------------------------------
    // Name formatting
    // ----------------------------------------------------------------

    /// Formatter holding the delimiter configuration
    #[must_use]
    pub const fn formatter(&self) -> &NameFormatter {
        &self.formatter
    }

    /// See [`NameFormatter::format_module_name`]
    #[must_use]
    pub fn format_module_name(&self, unformatted: &str) -> String {
        self.formatter.format_module_name(unformatted)
    }

    /// See [`NameFormatter::format_controller_name`]
    #[must_use]
    pub fn format_controller_name(&self, unformatted: &str) -> String {
        self.formatter.format_controller_name(unformatted)
    }

    /// See [`NameFormatter::format_action_name`]
    #[must_use]
    pub fn format_action_name(&self, unformatted: &str) -> String {
        self.formatter.format_action_name(unformatted)
    }

    /// Word delimiters
    #[must_use]
    pub fn word_delimiter(&self) -> &[String] {
        self.formatter.word_delimiter()
    }

    /// Replace the word delimiters
    ///
    /// # Errors
    ///
    /// `Error::InvalidDelimiter` for an empty list or an empty delimiter.
    pub fn set_word_delimiter<I, S>(&mut self, spec: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formatter.set_word_delimiter(spec)?;
        Ok(self)
    }

    /// Path delimiter
    #[must_use]
    pub fn path_delimiter(&self) -> &str {
        self.formatter.path_delimiter()
    }

    /// Replace the path delimiter
    ///
    /// # Errors
    ///
    /// `Error::InvalidPathDelimiter` for an empty delimiter.
    pub fn set_path_delimiter(&mut self, delimiter: impl Into<String>) -> Result<&mut Self> {
        self.formatter.set_path_delimiter(delimiter)?;
        Ok(self)
    }

    /// Map a class name to its source file, relative to a controller directory
    ///
    /// `Admin_UserController` -> `Admin/UserController.rs`
    #[must_use]
    pub fn class_to_filename(&self, class: &str) -> PathBuf {
        let mut file = class.replace('_', &MAIN_SEPARATOR.to_string());
        file.push('.');
        file.push_str(&self.controller_extension);
        PathBuf::from(file)
    }

    /// Extension used by [`class_to_filename`](Self::class_to_filename)
    #[must_use]
    pub fn controller_extension(&self) -> &str {
        &self.controller_extension
    }

    /// Change the controller source extension (without the dot)
    pub fn set_controller_extension(&mut self, extension: impl Into<String>) -> &mut Self {
        self.controller_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    // ----------------------------------------------------------------
    // Directories
    // ----------------------------------------------------------------

    /// Append a directory to a module's list, or to the default list
    ///
    /// # Errors
    ///
    /// `Error::DirectoryNotReadable` if the path is not a readable directory.
    pub fn add_controller_directory(
        &mut self,
        path: impl AsRef<Path>,
        module: Option<&str>,
    ) -> Result<&mut Self> {
        let path = checked_directory(path.as_ref())?;
        let module = module.unwrap_or(DEFAULT_MODULE);

        self.directories
            .entry(DEFAULT_MODULE.to_string())
            .or_default();
        self.directories
            .entry(module.to_string())
            .or_default()
            .push(path);
        Ok(self)
    }

    /// Replace every registered directory
    ///
    /// All paths are checked before anything is replaced.
    ///
    /// # Errors
    ///
    /// `Error::DirectoryNotReadable` for the first path that is not a readable
    /// directory; the existing configuration is then left untouched.
    pub fn set_controller_directory(&mut self, spec: impl Into<DirectorySpec>) -> Result<&mut Self> {
        let entries: Vec<(String, PathBuf)> = match spec.into() {
            DirectorySpec::Path(path) => vec![(DEFAULT_MODULE.to_string(), path)],
            DirectorySpec::List(paths) => paths
                .into_iter()
                .map(|path| (DEFAULT_MODULE.to_string(), path))
                .collect(),
            DirectorySpec::Modules(modules) => modules,
        };

        let mut directories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        directories.insert(DEFAULT_MODULE.to_string(), Vec::new());
        for (module, path) in entries {
            let path = checked_directory(&path)?;
            directories.entry(module).or_default().push(path);
        }

        self.directories = directories;
        Ok(self)
    }

    /// Registered directories by module
    #[must_use]
    pub const fn controller_directory(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.directories
    }

    /// Directories selected by the most recent resolution
    #[must_use]
    pub fn dispatch_directory(&self) -> &[PathBuf] {
        &self.current_directory
    }

    /// Formatted module selected by the most recent resolution
    #[must_use]
    pub fn current_module(&self) -> Option<&str> {
        self.current_module.as_deref()
    }

    // ----------------------------------------------------------------
    // Invocation parameters
    // ----------------------------------------------------------------

    /// Add or replace one invocation parameter
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.invoke_params.insert(name.into(), value.into());
        self
    }

    /// Merge invocation parameters (incoming values win)
    pub fn set_params(&mut self, params: InvokeParams) -> &mut Self {
        self.invoke_params.extend(params);
        self
    }

    /// One invocation parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.invoke_params.get(name)
    }

    /// All invocation parameters
    #[must_use]
    pub const fn params(&self) -> &InvokeParams {
        &self.invoke_params
    }

    /// Clear all parameters, or only the named ones
    pub fn clear_params(&mut self, names: Option<&[&str]>) -> &mut Self {
        match names {
            None => self.invoke_params.clear(),
            Some(names) => {
                for name in names {
                    self.invoke_params.remove(*name);
                }
            }
        }
        self
    }

    // ----------------------------------------------------------------
    // Defaults
    // ----------------------------------------------------------------

    /// Default controller (unformatted)
    #[must_use]
    pub fn default_controller(&self) -> &str {
        &self.default_controller
    }

    /// Set the default controller (unformatted)
    pub fn set_default_controller(&mut self, controller: impl Into<String>) -> &mut Self {
        self.default_controller = controller.into();
        self
    }

    /// Default action (unformatted)
    #[must_use]
    pub fn default_action(&self) -> &str {
        &self.default_action
    }

    /// Set the default action (unformatted)
    pub fn set_default_action(&mut self, action: impl Into<String>) -> &mut Self {
        self.default_action = action.into();
        self
    }

    // ----------------------------------------------------------------
    // Controllers
    // ----------------------------------------------------------------

    /// The class-name-to-factory table
    #[must_use]
    pub const fn registry(&self) -> &ControllerRegistry<R> {
        &self.registry
    }

    /// Mutable access to the registry
    pub fn registry_mut(&mut self) -> &mut ControllerRegistry<R> {
        &mut self.registry
    }

    /// Register a controller by its raw names
    ///
    /// `("admin", "user-list")` is registered as `Admin_UserListController`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidController` if the formatted name is unusable.
    pub fn register_controller<F>(
        &mut self,
        module: Option<&str>,
        controller: &str,
        factory: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&InvokeParams) -> Box<dyn ActionController<R>> + Send + Sync + 'static,
    {
        let class = self.qualified_class(module, controller);
        self.registry.register(class, factory)?;
        Ok(self)
    }

    /// Register a `Default`-constructible controller by its raw names
    ///
    /// # Errors
    ///
    /// `Error::InvalidController` if the formatted name is unusable.
    pub fn register_default_controller<C>(
        &mut self,
        module: Option<&str>,
        controller: &str,
    ) -> Result<&mut Self>
    where
        C: ActionController<R> + Default + 'static,
    {
        let class = self.qualified_class(module, controller);
        self.registry.register_default::<C>(class)?;
        Ok(self)
    }

    fn qualified_class(&self, module: Option<&str>, controller: &str) -> String {
        let class = self.format_controller_name(controller);
        match module.filter(|m| *m != DEFAULT_MODULE) {
            Some(module) => format!("{}_{class}", self.format_module_name(module)),
            None => class,
        }
    }

    // ----------------------------------------------------------------
    // Resolution
    // ----------------------------------------------------------------

    /// Whether the request's controller source file exists
    ///
    /// Advisory only: `dispatch` may still succeed through the default
    /// controller when this returns `false`.
    pub fn is_dispatchable(&mut self, request: &R) -> bool {
        let Some(class) = self.resolve_controller(request) else {
            return false;
        };

        let file = self.class_to_filename(&class);
        self.current_directory
            .iter()
            .any(|dir| is_readable_file(&dir.join(&file)))
    }

    /// Dispatch a request to its controller
    ///
    /// # Errors
    ///
    /// `Error::ControllerNotFound` when the resolved class is not registered,
    /// and whatever the controller's hooks or action return.
    pub fn dispatch(&mut self, request: &mut R, response: &mut Response) -> Result<()> {
        let class = match self.resolve_controller(request) {
            Some(class) => class,
            None => self.resolve_default_controller(request),
        };

        let class = match &self.current_module {
            Some(module) => format!("{module}_{class}"),
            None => class,
        };

        let mut controller = self
            .registry
            .create(&class, &self.invoke_params)
            .ok_or_else(|| Error::ControllerNotFound {
                class: class.clone(),
            })?;

        let action = self.resolve_action(request);
        let use_fallback = !controller.has_action(&action);
        debug!(
            controller = %class,
            action = %action,
            fallback = use_fallback,
            "Dispatching"
        );

        request.set_dispatched(true);
        let mut ctx = ActionContext::new(request, response, &self.invoke_params);
        controller.pre_dispatch(&mut ctx)?;

        if ctx.request.is_dispatched() {
            if use_fallback {
                controller.call_missing(&action, &mut ctx)?;
            } else {
                controller.invoke_action(&action, &mut ctx)?;
            }
            controller.post_dispatch(&mut ctx)?;
        } else {
            debug!(controller = %class, action = %action, "Dispatch cancelled in pre_dispatch");
        }
        Ok(())
    }

    /// Formatted controller class for the request, selecting module and directory
    ///
    /// `None` when the request names no controller.
    fn resolve_controller(&mut self, request: &R) -> Option<String> {
        self.current_module = None;
        self.current_directory = self.default_directories();

        let controller = request.controller_name().filter(|c| !c.is_empty())?;
        let class = self.format_controller_name(controller);

        if let Some(module) = request.module_name().filter(|m| self.is_valid_module(m)) {
            self.current_module = Some(self.format_module_name(module));
            self.current_directory = self.directories.get(module).cloned().unwrap_or_default();
        }

        Some(class)
    }

    /// Formatted default controller class, written back into the request
    fn resolve_default_controller(&mut self, request: &mut R) -> String {
        let controller = self.default_controller.clone();
        let class = self.format_controller_name(&controller);
        request.set_controller_name(Some(controller));

        let use_module_default = self
            .param(USE_MODULE_DEFAULT)
            .is_some_and(ParamValue::is_truthy);

        if !use_module_default {
            return class;
        }

        if let Some(module) = request.module_name().filter(|m| self.is_valid_module(m)) {
            let module_dirs = self.directories.get(module).cloned().unwrap_or_default();
            let file = self.class_to_filename(&class);
            if module_dirs.iter().any(|dir| is_readable_file(&dir.join(&file))) {
                self.current_module = Some(self.format_module_name(module));
                self.current_directory = module_dirs;
            } else {
                warn!(module = %module, controller = %class, "Module default controller missing, using global default");
            }
        }

        class
    }

    /// Formatted action method name, defaulting the request's action if unset
    fn resolve_action(&self, request: &mut R) -> String {
        let action = match request.action_name().filter(|a| !a.is_empty()) {
            Some(action) => action.to_string(),
            None => {
                request.set_action_name(Some(self.default_action.clone()));
                self.default_action.clone()
            }
        };
        self.format_action_name(&action)
    }

    fn is_valid_module(&self, module: &str) -> bool {
        module != DEFAULT_MODULE && self.directories.contains_key(module)
    }

    fn default_directories(&self) -> Vec<PathBuf> {
        self.directories
            .get(DEFAULT_MODULE)
            .cloned()
            .unwrap_or_default()
    }
}

fn checked_directory(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() || fs::read_dir(path).is_err() {
        return Err(Error::DirectoryNotReadable {
            path: path.display().to_string(),
        });
    }

    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        Ok(path.to_path_buf())
    } else {
        Ok(PathBuf::from(trimmed))
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && fs::File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records hook order; `skip` makes pre_dispatch cancel the action
    struct Recorder {
        log: Log,
        skip: bool,
    }

    #[actions]
    impl Recorder {
        fn index_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push("index".to_string());
            ctx.response.append_body("index");
            Ok(())
        }

        fn list_all_action(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push("listAll".to_string());
            ctx.response.append_body("list");
            Ok(())
        }
    }

    impl ActionController for Recorder {
        fn pre_dispatch(&mut self, ctx: &mut ActionContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push("pre".to_string());
            if self.skip {
                ctx.request.set_dispatched(false);
            }
            Ok(())
        }

        fn post_dispatch(&mut self, _ctx: &mut ActionContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push("post".to_string());
            Ok(())
        }

        fn has_action(&self, action: &str) -> bool {
            Self::ACTIONS.contains(&action)
        }

        fn invoke_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> Result<()> {
            match self.dispatch_action(action, ctx) {
                Some(result) => result,
                None => self.call_missing(action, ctx),
            }
        }

        fn call_missing(&mut self, action: &str, _ctx: &mut ActionContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("missing:{action}"));
            Ok(())
        }
    }

    fn recorder(dispatcher: &mut Dispatcher, module: Option<&str>, name: &str, log: &Log, skip: bool) {
        let log = Arc::clone(log);
        dispatcher
            .register_controller(module, name, move |_: &InvokeParams| {
                Box::new(Recorder {
                    log: Arc::clone(&log),
                    skip,
                }) as Box<dyn ActionController>
            })
            .unwrap();
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "// controller").unwrap();
    }

    #[test]
    fn test_defaults() {
        let dispatcher: Dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.default_controller(), "index");
        assert_eq!(dispatcher.default_action(), "index");
        assert_eq!(dispatcher.word_delimiter(), ["-", "."]);
        assert_eq!(dispatcher.path_delimiter(), "_");
        assert!(dispatcher.controller_directory().is_empty());
    }

    #[test]
    fn test_dispatch_runs_hooks_in_order() {
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        recorder(&mut dispatcher, None, "report", &log, false);

        let mut request = Request::for_action(None, "report", "list-all");
        let mut response = Response::new();
        dispatcher.dispatch(&mut request, &mut response).unwrap();

        assert_eq!(entries(&log), vec!["pre", "listAll", "post"]);
        assert_eq!(response.body, "list");
        assert!(request.is_dispatched());
    }

    #[test]
    fn test_pre_dispatch_can_cancel() {
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        recorder(&mut dispatcher, None, "report", &log, true);

        let mut request = Request::for_action(None, "report", "index");
        let mut response = Response::new();
        dispatcher.dispatch(&mut request, &mut response).unwrap();

        assert_eq!(entries(&log), vec!["pre"]);
        assert!(response.body.is_empty());
        assert!(!request.is_dispatched());
    }

    #[test]
    fn test_missing_action_uses_fallback() {
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        recorder(&mut dispatcher, None, "report", &log, false);

        let mut request = Request::for_action(None, "report", "export");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();

        assert_eq!(entries(&log), vec!["pre", "missing:exportAction", "post"]);
    }

    #[test]
    fn test_default_controller_and_action() {
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        recorder(&mut dispatcher, None, "index", &log, false);

        let mut request = Request::default();
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();

        assert_eq!(request.controller_name(), Some("index"));
        assert_eq!(request.action_name(), Some("index"));
        assert_eq!(entries(&log), vec!["pre", "index", "post"]);
    }

    #[test]
    fn test_unknown_controller_fails() {
        let mut dispatcher: Dispatcher = Dispatcher::new();
        let mut request = Request::for_action(None, "ghost", "index");

        let err = dispatcher
            .dispatch(&mut request, &mut Response::new())
            .unwrap_err();
        assert!(matches!(err, Error::ControllerNotFound { class } if class == "GhostController"));
    }

    #[test]
    fn test_module_qualified_dispatch() {
        let admin = TempDir::new().unwrap();
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher
            .add_controller_directory(admin.path(), Some("admin"))
            .unwrap();
        recorder(&mut dispatcher, Some("admin"), "user", &log, false);

        let mut request = Request::for_action(Some("admin"), "user", "index");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();

        assert_eq!(dispatcher.current_module(), Some("Admin"));
        assert_eq!(dispatcher.dispatch_directory(), [admin.path().to_path_buf()]);
        assert_eq!(entries(&log), vec!["pre", "index", "post"]);
    }

    #[test]
    fn test_module_class_missing_fails() {
        let admin = TempDir::new().unwrap();
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher
            .add_controller_directory(admin.path(), Some("admin"))
            .unwrap();
        // registered globally, but the module qualifies the lookup
        recorder(&mut dispatcher, None, "user", &log, false);

        let mut request = Request::for_action(Some("admin"), "user", "index");
        let err = dispatcher
            .dispatch(&mut request, &mut Response::new())
            .unwrap_err();
        assert!(matches!(err, Error::ControllerNotFound { class } if class == "Admin_UserController"));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_unknown_module_uses_global_controllers() {
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        recorder(&mut dispatcher, None, "user", &log, false);

        let mut request = Request::for_action(Some("shop"), "user", "index");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();

        assert_eq!(dispatcher.current_module(), None);
        assert_eq!(entries(&log), vec!["pre", "index", "post"]);
    }

    #[test]
    fn test_module_default_controller_requires_param_and_file() {
        let global = TempDir::new().unwrap();
        let blog = TempDir::new().unwrap();
        let global_log = Log::default();
        let blog_log = Log::default();

        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.add_controller_directory(global.path(), None).unwrap();
        dispatcher
            .add_controller_directory(blog.path(), Some("blog"))
            .unwrap();
        recorder(&mut dispatcher, None, "index", &global_log, false);
        recorder(&mut dispatcher, Some("blog"), "index", &blog_log, false);

        // without the parameter the global default wins
        let mut request = Request::for_action(Some("blog"), "", "index");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();
        assert_eq!(entries(&global_log).len(), 3);
        assert!(entries(&blog_log).is_empty());

        // parameter set, but no source file in the module directory
        dispatcher.set_param(USE_MODULE_DEFAULT, true);
        let mut request = Request::for_action(Some("blog"), "", "index");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();
        assert!(entries(&blog_log).is_empty());

        touch(blog.path(), "IndexController.rs");
        let mut request = Request::for_action(Some("blog"), "", "index");
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();
        assert_eq!(entries(&blog_log), vec!["pre", "index", "post"]);
        assert_eq!(dispatcher.current_module(), Some("Blog"));
    }

    #[test]
    fn test_is_dispatchable_checks_files() {
        let global = TempDir::new().unwrap();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.add_controller_directory(global.path(), None).unwrap();

        let request = Request::for_action(None, "news-item", "view");
        assert!(!dispatcher.is_dispatchable(&request));

        touch(global.path(), "NewsItemController.rs");
        assert!(dispatcher.is_dispatchable(&request));

        let empty = Request::default();
        assert!(!dispatcher.is_dispatchable(&empty));
    }

    #[test]
    fn test_is_dispatchable_false_but_dispatch_falls_back() {
        let global = TempDir::new().unwrap();
        let log = Log::default();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.add_controller_directory(global.path(), None).unwrap();
        recorder(&mut dispatcher, None, "index", &log, false);

        let request = Request::for_action(None, "", "index");
        assert!(!dispatcher.is_dispatchable(&request));

        let mut request = request;
        dispatcher.dispatch(&mut request, &mut Response::new()).unwrap();
        assert_eq!(entries(&log), vec!["pre", "index", "post"]);
    }

    #[test]
    fn test_class_to_filename() {
        let dispatcher: Dispatcher = Dispatcher::new();
        let expected: PathBuf = ["Admin", "UserController.rs"].iter().collect();
        assert_eq!(dispatcher.class_to_filename("Admin_UserController"), expected);
    }

    #[test]
    fn test_add_directory_rejects_missing_path() {
        let mut dispatcher: Dispatcher = Dispatcher::new();
        let err = dispatcher
            .add_controller_directory("/definitely/not/here", None)
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryNotReadable { .. }));
    }

    #[test]
    fn test_add_directory_keeps_default_key_and_trims() {
        let dir = TempDir::new().unwrap();
        let with_slash = format!("{}/", dir.path().display());

        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher
            .add_controller_directory(&with_slash, Some("admin"))
            .unwrap();

        let dirs = dispatcher.controller_directory();
        assert!(dirs.contains_key(DEFAULT_MODULE));
        assert_eq!(dirs["admin"], vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_set_controller_directory_is_atomic() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.set_controller_directory(a.path()).unwrap();

        let modules = vec![
            ("blog".to_string(), b.path().to_path_buf()),
            ("shop".to_string(), PathBuf::from("/definitely/not/here")),
        ];
        assert!(dispatcher.set_controller_directory(modules).is_err());
        assert_eq!(dispatcher.controller_directory()[DEFAULT_MODULE], vec![a.path().to_path_buf()]);
        assert!(!dispatcher.controller_directory().contains_key("blog"));

        let modules = vec![
            ("default".to_string(), a.path().to_path_buf()),
            ("blog".to_string(), b.path().to_path_buf()),
        ];
        dispatcher.set_controller_directory(modules).unwrap();
        assert_eq!(dispatcher.controller_directory().len(), 2);
    }

    #[test]
    fn test_params() {
        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.set_param("a", 1).set_param("b", "two");

        let mut more = InvokeParams::new();
        more.insert("b".to_string(), ParamValue::from("three"));
        more.insert("c".to_string(), ParamValue::Bool(true));
        dispatcher.set_params(more);

        assert_eq!(dispatcher.param("a"), Some(&ParamValue::Int(1)));
        assert_eq!(dispatcher.param("b"), Some(&ParamValue::from("three")));

        dispatcher.clear_params(Some(&["a", "missing"][..]));
        assert_eq!(dispatcher.params().len(), 2);
        dispatcher.clear_params(None);
        assert!(dispatcher.params().is_empty());
    }

    #[test]
    fn test_invoke_params_reach_controller() {
        struct Echo;

        impl ActionController for Echo {
            fn has_action(&self, _action: &str) -> bool {
                true
            }

            fn invoke_action(&mut self, _action: &str, ctx: &mut ActionContext<'_>) -> Result<()> {
                let greeting = ctx
                    .invoke_param("greeting")
                    .map(ParamValue::as_string)
                    .unwrap_or_default();
                ctx.response.append_body(&greeting);
                Ok(())
            }
        }

        let mut dispatcher: Dispatcher = Dispatcher::new();
        dispatcher.set_param("greeting", "hello");
        dispatcher
            .register_controller(None, "echo", |_: &InvokeParams| {
                Box::new(Echo) as Box<dyn ActionController>
            })
            .unwrap();

        let mut request = Request::for_action(None, "echo", "say");
        let mut response = Response::new();
        dispatcher.dispatch(&mut request, &mut response).unwrap();
        assert_eq!(response.body, "hello");
    }
}
