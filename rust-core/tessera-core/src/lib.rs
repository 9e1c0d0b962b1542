//! # Tessera Core
//!
//! Core library for the Tessera MVC framework.
//! Routes requests to module/controller/action triples, dispatches them to
//! registered controllers, and runs SQL through prepared statements.
//!
//! ## Architecture
//!
//! A [`FrontController`] owns the [`Router`], the [`Dispatcher`] and the
//! plugin chain. Controllers are not loaded from disk: each class name is
//! registered with a factory, and `#[actions]` generates the action table.
//!
//! ## Modules
//!
//! - `front` - Front controller and dispatch loop
//! - `dispatcher` - Name formatting, controller directories, dispatch protocol
//! - `controller` - Action controller trait and registry
//! - `router` - Named routes tried in reverse order
//! - `route` - Default module route and matchit pattern routes
//! - `plugin` - Front controller lifecycle hooks
//! - `request` / `response` - Dispatch request and response types
//! - `database` - SQLx pools, prepared statements, SELECT builder
//! - `validation` - Validator base with translatable messages
//! - `config` - JSON framework configuration
//! - `logging` - Tracing subscriber setup
//! - `json` - JSON parsing with simd-json
//! - `types` - Parameter types and conversion
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod controller;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod front;
pub mod json;
pub mod logging;
pub mod plugin;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod types;
pub mod validation;

pub use config::FrameworkConfig;
pub use controller::{ActionContext, ActionController, ControllerRegistry, InvokeParams};
pub use database::{Adapter, Backend, DatabasePool, DbValue, FetchMode, Select, Statement};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use front::FrontController;
pub use json::{parse_json, to_json};
pub use logging::init_tracing;
pub use plugin::{LoggingPlugin, Plugin, PluginBroker, TimingPlugin};
pub use request::{DispatchRequest, Request};
pub use response::Response;
pub use route::{DefaultRoute, PatternRoute, Route, RouteDefaults, RouteMatch};
pub use router::Router;
pub use tessera_macros::actions;
pub use types::{ParamType, ParamValue};
pub use validation::{
    ArrayTranslator, Translator, ValidationErrors, ValidationMessages, Validator, ValidatorBase,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
