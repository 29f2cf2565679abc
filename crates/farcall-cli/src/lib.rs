// Copyright 2025 farcall Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # farcall CLI
//!
//! Helpers behind the `farcall` binary: turning command-line flags into
//! [`BridgeOptions`] and rendering bootstrap programs.
//!
//! ## Definition Flags
//!
//! - `-d key=source` registers one definition; may be repeated
//! - `--definitions file.json` loads either a list of `{"key", "source"}`
//!   objects or an object mapping keys to sources (applied in key order)
//!
//! File definitions are registered before `-d` definitions, so a `-d` flag
//! overrides a file entry with the same key.

use anyhow::{anyhow, Context, Result};
use farcall::{BootstrapBuilder, BridgeOptions, CapabilityProbe, Definition, DefinitionRegistry, TransportKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};


/// Flags shared by every subcommand that builds a bridge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeArgs {
    pub definitions: Vec<String>,
    pub definitions_file: Option<PathBuf>,
    pub import_scripts: Vec<String>,
    pub domain: Option<String>,
    /// Force the sandboxed frame transport.
    pub frame: bool,
}

impl BridgeArgs {
    pub fn transport_kind(&self) -> TransportKind {
        if self.frame {
            TransportKind::SandboxedFrame
        } else {
            TransportKind::Dedicated
        }
    }

    /// Builds validated bridge options from the flags.
    pub fn to_options(&self) -> Result<BridgeOptions> {
        let mut options = BridgeOptions::new().with_import_scripts(self.import_scripts.iter().cloned());

        if let Some(domain) = &self.domain {
            options = options.with_domain(domain.clone());
        }
        if self.frame {
            options = options.with_capability_probe(CapabilityProbe::fixed(false));
        }
        if let Some(path) = &self.definitions_file {
            options = options.with_definitions(load_definitions_file(path)?.iter().cloned());
        }
        for flag in &self.definitions {
            options = options.with_definitions([parse_definition(flag)?]);
        }

        options.validate()?;
        Ok(options)
    }

    /// The bootstrap program a bridge built from these flags would run.
    pub fn render_bootstrap(&self) -> Result<String> {
        let options = self.to_options()?;
        let program = BootstrapBuilder::new(options.domain)
            .with_import_scripts(options.import_scripts)
            .with_definitions(&options.definitions)
            .build(self.transport_kind())?;
        Ok(program)
    }
}

/// Parses a `key=source` flag. Only the first `=` separates.
pub fn parse_definition(flag: &str) -> Result<Definition> {
    let (key, source) = flag
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid definition '{}': expected key=source", flag))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid definition '{}': key is empty", flag));
    }
    Ok(Definition::new(key, source))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionsFile {
    List(DefinitionRegistry),
    Map(BTreeMap<String, String>),
}

/// Loads definitions from a JSON file.
pub fn load_definitions_file(path: &Path) -> Result<DefinitionRegistry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definitions file {}", path.display()))?;

    let parsed: DefinitionsFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid definitions file {}", path.display()))?;

    Ok(match parsed {
        DefinitionsFile::List(registry) => registry,
        DefinitionsFile::Map(map) => map
            .into_iter()
            .map(|(key, source)| Definition::new(key, source))
            .collect(),
    })
}

/// Parses the positional arguments of `call`, which must be a JSON array.
/// Missing means no arguments.
pub fn parse_call_args(text: Option<&str>) -> Result<Vec<Value>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };

    match serde_json::from_str(text).map_err(|e| anyhow!("Invalid JSON in args: {}", e))? {
        Value::Array(args) => Ok(args),
        other => Err(anyhow!(
            "Invalid args: expected a JSON array of positional arguments, got {}",
            other
        )),
    }
}
