//! Bridge construction options.
//!
//! # Environment
//!
//! - `FARCALL_DOMAIN` - default `domain` when none is given (else `http://localhost`)
//! - `FARCALL_DISABLE_WORKERS` - `1` or `true` makes the default capability
//!   probe report no worker support, forcing the sandboxed frame
//!
//! # Example
//!
//! ```
//! use farcall::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_domain("http://localhost:8080")
//!     .with_import_script("lib/math.js")
//!     .with_definition("add", "(a, b) => a + b");
//! assert!(options.validate().is_ok());
//! ```

use farcall_common::protocol::error::Result;
use farcall_common::protocol::ErrorTypeRegistry;
use std::fmt;
use std::sync::Arc;

use crate::bootstrap::validate_domain;
use crate::definitions::{Definition, DefinitionRegistry};
use crate::scripts;

pub const DOMAIN_ENV: &str = "FARCALL_DOMAIN";
pub const DISABLE_WORKERS_ENV: &str = "FARCALL_DISABLE_WORKERS";
pub const DEFAULT_DOMAIN: &str = "http://localhost";

/// Answers "can a dedicated worker context be created on this host".
#[derive(Clone)]
pub struct CapabilityProbe(Arc<dyn Fn() -> bool + Send + Sync>);

impl CapabilityProbe {
    pub fn new<F>(probe: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(probe))
    }

    /// A probe that always gives `supported`.
    pub fn fixed(supported: bool) -> Self {
        Self::new(move || supported)
    }

    pub fn supports_workers(&self) -> bool {
        (self.0)()
    }
}

impl Default for CapabilityProbe {
    /// Workers are supported unless `FARCALL_DISABLE_WORKERS` says otherwise.
    fn default() -> Self {
        Self::new(|| !workers_disabled(std::env::var(DISABLE_WORKERS_ENV).ok().as_deref()))
    }
}

impl fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapabilityProbe")
    }
}

/// Options a [`Bridge`](crate::Bridge) is built from.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Script locations loaded before command dispatch becomes active
    pub import_scripts: Vec<String>,
    /// Initial definitions
    pub definitions: DefinitionRegistry,
    /// Origin scoping cross-context messages
    pub domain: String,
    /// Error types reconstructed by name; anything else becomes `Error`
    pub error_types: ErrorTypeRegistry,
    pub capability_probe: CapabilityProbe,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            import_scripts: Vec::new(),
            definitions: DefinitionRegistry::new(),
            domain: default_domain(std::env::var(DOMAIN_ENV).ok()),
            error_types: ErrorTypeRegistry::standard(),
            capability_probe: CapabilityProbe::default(),
        }
    }
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.import_scripts.extend(scripts.into_iter().map(Into::into));
        self
    }

    pub fn with_import_script(mut self, location: impl Into<String>) -> Self {
        self.import_scripts.push(location.into());
        self
    }

    pub fn with_definition(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.definitions.register(key, source);
        self
    }

    pub fn with_definitions<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = Definition>,
    {
        self.definitions.extend(definitions);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_error_types(mut self, error_types: ErrorTypeRegistry) -> Self {
        self.error_types = error_types;
        self
    }

    pub fn with_capability_probe(mut self, probe: CapabilityProbe) -> Self {
        self.capability_probe = probe;
        self
    }

    /// Checks the domain and script locations.
    ///
    /// Definitions are checked when the bootstrap program is built, since
    /// more can be added through [`Bridge::define`](crate::Bridge::define).
    pub fn validate(&self) -> Result<()> {
        validate_domain(&self.domain)?;
        for location in &self.import_scripts {
            scripts::resolve_location(location)?;
        }
        Ok(())
    }
}

fn default_domain(from_env: Option<String>) -> String {
    from_env
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
}

fn workers_disabled(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}
