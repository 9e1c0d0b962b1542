//! Tracing subscriber setup.

use crate::error::{Error, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Directive applied when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "tessera_core=info";

/// Install a JSON `fmt` subscriber filtered by `RUST_LOG`
///
/// `default_directive` (for example `"tessera_core=debug"`) is added on top of
/// the environment filter. Calling this more than once is harmless: the
/// first subscriber stays installed.
///
/// # Errors
///
/// `Error::Config` if `default_directive` is not a valid filter directive.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let directive: Directive = default_directive.parse().map_err(|e| Error::Config {
        message: format!("Invalid log directive '{default_directive}': {e}"),
    })?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .json()
        .try_init();
    Ok(())
}
