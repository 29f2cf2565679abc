//! Bootstrap Program Builder
//!
//! Produces the JavaScript source evaluated once inside a remote context.
//! The program installs the definitions into a private command map, wires the
//! inbound message handler for the transport's global scope, and posts back a
//! Response Envelope for every Request Envelope it dispatches.
//!
//! # Script Loading
//!
//! - Dedicated: `importScripts` runs eagerly, after the handler is installed.
//! - Sandboxed frame: scripts are injected one after another on the first
//!   command; every command waits on the same loading chain. A load failure
//!   answers the waiting command with an exception envelope.
//!
//! Every interpolated value except function source is emitted as a JSON
//! string literal. The output depends only on the inputs, so building twice
//! gives the same text.

use farcall_common::protocol::error::{FarcallError, Result};

use crate::definitions::{Definition, DefinitionRegistry};
use crate::scripts;
use crate::transport::TransportKind;

const SHARED_PRELUDE: &str = r#"
  function exceptionOf(e) {
    if (e !== null && typeof e === 'object') {
      return {
        type: (e.constructor && e.constructor.name) || e.name || 'Error',
        message: e.message === undefined ? '' : String(e.message)
      };
    }
    return { type: 'Error', message: String(e) };
  }

  function dispatch(envelope) {
    var messageId = envelope.messageId;
    Promise.resolve()
      .then(function () {
        var fn = definitions[envelope.command];
        if (typeof fn !== 'function') {
          throw new ReferenceError(envelope.command + ' is not defined');
        }
        return fn.apply(null, envelope.args || []);
      })
      .then(function (result) {
        if (result === undefined) {
          result = null;
        } else if (JSON.stringify(result) === undefined) {
          throw new TypeError(envelope.command + ' returned a value with no JSON form');
        }
        post({ messageId: messageId, result: result });
      })
      .catch(function (e) {
        post({ messageId: messageId, exception: exceptionOf(e) });
      });
  }
"#;

const WORKER_WIRING: &str = r#"
  function post(envelope) {
    postMessage(JSON.stringify(envelope));
  }

  self.onmessage = function (event) {
    var envelope = typeof event.data === 'string' ? JSON.parse(event.data) : event.data;
    dispatch(envelope);
  };

  importScripts.apply(self, importScriptsList);
"#;

const FRAME_WIRING: &str = r#"
  var ready = null;

  function post(envelope) {
    parent.postMessage(JSON.stringify(envelope), domain);
  }

  function loadScripts() {
    return importScriptsList.reduce(function (chain, location) {
      return chain.then(function () { return document.loadScript(location); });
    }, Promise.resolve());
  }

  addEventListener('message', function (event) {
    if (event.origin !== domain) return;

    var envelope;
    try {
      envelope = typeof event.data === 'string' ? JSON.parse(event.data) : event.data;
    } catch (e) {
      return;
    }
    // Responses share this channel; only commands are dispatched.
    if (envelope === null || typeof envelope !== 'object' || typeof envelope.command !== 'string') {
      return;
    }

    if (ready === null) {
      ready = loadScripts();
    }
    ready.then(
      function () { dispatch(envelope); },
      function (e) { post({ messageId: envelope.messageId, exception: exceptionOf(e) }); }
    );
  });
"#;

/// Builds bootstrap programs from a domain, script list and definitions.
#[derive(Debug, Clone)]
pub struct BootstrapBuilder {
    domain: String,
    import_scripts: Vec<String>,
    definitions: Vec<Definition>,
}

impl BootstrapBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            import_scripts: Vec::new(),
            definitions: Vec::new(),
        }
    }

    pub fn with_import_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.import_scripts.extend(scripts.into_iter().map(Into::into));
        self
    }

    /// Snapshot of `registry`; later registrations are not picked up.
    pub fn with_definitions(mut self, registry: &DefinitionRegistry) -> Self {
        self.definitions.extend(registry.iter().cloned());
        self
    }

    /// Generate the program for `kind`.
    ///
    /// # Errors
    ///
    /// - `InvalidDomain` if the domain is not a `scheme://authority` origin
    /// - `InvalidScriptLocation` if a script location is not loadable
    /// - `InvalidDefinition` for an empty or control-character key, or empty source
    pub fn build(&self, kind: TransportKind) -> Result<String> {
        validate_domain(&self.domain)?;
        for location in &self.import_scripts {
            scripts::resolve_location(location)?;
        }
        for definition in &self.definitions {
            validate_definition(definition)?;
        }

        let mut program = String::new();
        program.push_str("(function () {\n");
        program.push_str(&format!("  var domain = {};\n", js_string_literal(&self.domain)?));
        program.push_str(&format!(
            "  var importScriptsList = [{}];\n",
            self.import_scripts
                .iter()
                .map(|s| js_string_literal(s))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        ));
        program.push_str("  var definitions = Object.create(null);\n");

        for definition in &self.definitions {
            program.push_str(&format!(
                "  definitions[{}] = (\n{}\n);\n",
                js_string_literal(&definition.key)?,
                definition.source
            ));
        }

        program.push_str(SHARED_PRELUDE);
        program.push_str(match kind {
            TransportKind::Dedicated => WORKER_WIRING,
            TransportKind::SandboxedFrame => FRAME_WIRING,
        });
        program.push_str("})();\n");

        tracing::debug!(
            ?kind,
            definitions = self.definitions.len(),
            scripts = self.import_scripts.len(),
            bytes = program.len(),
            "built bootstrap program"
        );
        Ok(program)
    }
}

/// Checks that `domain` is an origin of the form `scheme://authority`.
pub fn validate_domain(domain: &str) -> Result<()> {
    let invalid = |reason: &str| FarcallError::InvalidDomain(format!("'{}': {}", domain, reason));

    let (scheme, authority) = domain
        .split_once("://")
        .ok_or_else(|| invalid("expected scheme://authority"))?;

    let mut scheme_chars = scheme.chars();
    let scheme_ok = scheme_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(invalid("malformed scheme"));
    }

    if authority.is_empty() {
        return Err(invalid("missing authority"));
    }
    if authority
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '`' | '\\' | '<' | '>' | '/'))
    {
        return Err(invalid("authority contains forbidden characters"));
    }

    Ok(())
}

fn validate_definition(definition: &Definition) -> Result<()> {
    if definition.key.is_empty() {
        return Err(FarcallError::InvalidDefinition("definition key is empty".into()));
    }
    if definition.key.chars().any(char::is_control) {
        return Err(FarcallError::InvalidDefinition(format!(
            "definition key {:?} contains control characters",
            definition.key
        )));
    }
    if definition.source.trim().is_empty() {
        return Err(FarcallError::InvalidDefinition(format!(
            "definition '{}' has empty source",
            definition.key
        )));
    }
    Ok(())
}

/// JSON string literal that is also safe inside an inline `<script>`.
fn js_string_literal(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}
