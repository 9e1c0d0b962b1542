//! # Configuration
//!
//! Framework settings loaded from a JSON document. Every field has a default,
//! so `{}` is a complete configuration.
//!
//! ```json
//! {
//!   "dispatcher": {
//!     "default_controller": "home",
//!     "word_delimiter": ["-", "."],
//!     "controller_directories": { "default": "app/controllers", "admin": "app/admin" }
//!   },
//!   "front": { "max_dispatch_loops": 50 },
//!   "database": { "url": "sqlite::memory:", "fetch_mode": "num" }
//! }
//! ```

use crate::database::{DatabasePool, FetchMode, DEFAULT_MAX_CONNECTIONS};
use crate::dispatcher::name::{verify_delimiter, verify_path_delimiter, NameFormatter};
use crate::dispatcher::{Dispatcher, USE_MODULE_DEFAULT};
use crate::error::{Error, Result};
use crate::front::{FrontController, DEFAULT_MAX_DISPATCH_LOOPS};
use crate::request::DispatchRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "TESSERA_CONFIG";

/// Dispatcher section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Controller used when the request names none
    pub default_controller: String,
    /// Action used when the request names none
    pub default_action: String,
    /// A string or an array of strings
    pub word_delimiter: Value,
    /// A string
    pub path_delimiter: Value,
    /// Probe module directories for the default controller
    pub use_module_default: bool,
    /// Module name to controller directory
    pub controller_directories: BTreeMap<String, PathBuf>,
    /// Controller source extension
    pub controller_extension: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_controller: "index".to_string(),
            default_action: "index".to_string(),
            word_delimiter: Value::Array(vec![Value::from("-"), Value::from(".")]),
            path_delimiter: Value::from("_"),
            use_module_default: false,
            controller_directories: BTreeMap::new(),
            controller_extension: "rs".to_string(),
        }
    }
}

/// Front controller section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontConfig {
    /// Upper bound on dispatch iterations per request
    pub max_dispatch_loops: usize,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            max_dispatch_loops: DEFAULT_MAX_DISPATCH_LOOPS,
        }
    }
}

/// Database section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (`sqlite:` or `postgres:`)
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
    /// Default statement fetch mode
    pub fetch_mode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            fetch_mode: "assoc".to_string(),
        }
    }
}

/// Complete framework configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Dispatcher settings
    pub dispatcher: DispatcherConfig,
    /// Front controller settings
    pub front: FrontConfig,
    /// Database settings
    pub database: DatabaseConfig,
}

impl FrameworkConfig {
    /// Parse and verify a JSON document
    ///
    /// # Errors
    ///
    /// `Error::Config` for malformed JSON, the delimiter errors for a bad
    /// delimiter specification, `Error::InvalidFetchMode` for a bad fetch mode.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = crate::json::parse_json(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// `Error::Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes = std::fs::read(path)?;
        let config: Self = crate::json::parse_json_bytes(&mut bytes)?;
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load from the file named by `TESSERA_CONFIG`, or the defaults if unset
    ///
    /// # Errors
    ///
    /// As [`from_file`](Self::from_file).
    pub fn from_env() -> Result<Self> {
        Self::from_env_var(CONFIG_ENV_VAR)
    }

    /// Load from the file named by `var`, or the defaults if unset
    ///
    /// # Errors
    ///
    /// As [`from_file`](Self::from_file).
    pub fn from_env_var(var: &str) -> Result<Self> {
        match std::env::var_os(var) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Check delimiters and the fetch mode
    ///
    /// # Errors
    ///
    /// See [`from_json_str`](Self::from_json_str).
    pub fn validate(&self) -> Result<()> {
        let mut formatter = NameFormatter::new();
        formatter.set_word_delimiter(verify_delimiter(&self.dispatcher.word_delimiter)?)?;
        formatter.set_path_delimiter(verify_path_delimiter(&self.dispatcher.path_delimiter)?)?;
        self.fetch_mode()?;
        Ok(())
    }

    /// Configured statement fetch mode
    ///
    /// # Errors
    ///
    /// `Error::InvalidFetchMode` for an unknown name or `column`, which is
    /// only valid per fetch call.
    pub fn fetch_mode(&self) -> Result<FetchMode> {
        match self.database.fetch_mode.parse::<FetchMode>()? {
            FetchMode::Column => Err(Error::InvalidFetchMode {
                mode: self.database.fetch_mode.clone(),
            }),
            mode => Ok(mode),
        }
    }

    /// Connect the configured database, if a URL is set
    ///
    /// # Errors
    ///
    /// `Error::Database` for an unsupported URL or a failed connection.
    pub async fn connect_database(&self) -> Result<Option<DatabasePool>> {
        match &self.database.url {
            Some(url) => {
                let pool = DatabasePool::connect(url, Some(self.database.max_connections))
                    .await?
                    .with_fetch_mode(self.fetch_mode()?)?;
                Ok(Some(pool))
            }
            None => Ok(None),
        }
    }

    /// Push the dispatcher section into a dispatcher
    ///
    /// # Errors
    ///
    /// The delimiter errors, or `Error::DirectoryNotReadable` for a missing
    /// controller directory. Directories are replaced only when all exist.
    pub fn apply<R: DispatchRequest>(&self, dispatcher: &mut Dispatcher<R>) -> Result<()> {
        let section = &self.dispatcher;
        dispatcher
            .set_word_delimiter(verify_delimiter(&section.word_delimiter)?)?
            .set_path_delimiter(verify_path_delimiter(&section.path_delimiter)?)?
            .set_default_controller(section.default_controller.as_str())
            .set_default_action(section.default_action.as_str())
            .set_controller_extension(section.controller_extension.as_str());

        if !section.controller_directories.is_empty() {
            let modules: Vec<(String, PathBuf)> = section
                .controller_directories
                .iter()
                .map(|(module, path)| (module.clone(), path.clone()))
                .collect();
            dispatcher.set_controller_directory(modules)?;
        }

        if section.use_module_default {
            dispatcher.set_param(USE_MODULE_DEFAULT, true);
        }
        Ok(())
    }

    /// Front controller with a dispatcher configured from this document
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply).
    pub fn build_front_controller<R: DispatchRequest>(&self) -> Result<FrontController<R>> {
        let mut dispatcher = Dispatcher::new();
        self.apply(&mut dispatcher)?;

        let mut front = FrontController::new(dispatcher);
        front.set_max_dispatch_loops(self.front.max_dispatch_loops);
        Ok(front)
    }
}
