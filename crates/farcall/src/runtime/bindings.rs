//! Host bindings for the remote context
//!
//! This module is the single place where native Rust functions are exposed to
//! the JavaScript running inside a remote context. The natives live on a
//! private `__host` object; a small JavaScript prelude then builds the global
//! scope the bootstrap program expects on top of them.
//!
//! # Natives
//!
//! - `__host.readScript(location)` - read a script's source text (throws `Error` if unreadable)
//! - `__host.runScript(source)` - evaluate source text in the global scope
//! - `__host.log(level, message)` - emit a `tracing` event under `farcall::remote`
//!
//! # Global Scope
//!
//! Both flavors get `console` plus the internal outbox used to collect posted
//! messages. The dedicated flavor adds a worker scope (`self`, `onmessage`,
//! `postMessage`, `importScripts`). The frame flavor adds a window scope
//! (`addEventListener`, `parent.postMessage`, `document.loadScript`).

use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject},
    property::Attribute,
    value::JsValue,
    Context, JsNativeError, Source,
};
use farcall_common::protocol::error::{FarcallError, Result};

use crate::scripts;
use crate::transport::TransportKind;

/// Target used for every `console.*` call made by remote code.
pub const REMOTE_LOG_TARGET: &str = "farcall::remote";

const COMMON_PRELUDE: &str = r#"
var __farcallOutbox = [];
var __farcallUncaught = [];

function __farcallDescribe(e) {
  if (e !== null && typeof e === 'object') {
    var name = (e.constructor && e.constructor.name) || e.name || 'Error';
    return name + ': ' + e.message;
  }
  return String(e);
}

function __farcallReport(e) {
  __farcallUncaught.push(__farcallDescribe(e));
}

function __farcallDrain() {
  var turn = { posts: __farcallOutbox, uncaught: __farcallUncaught };
  __farcallOutbox = [];
  __farcallUncaught = [];
  return turn;
}

var console = (function () {
  function format(args) {
    return Array.prototype.map.call(args, function (arg) {
      if (typeof arg === 'string') return arg;
      try {
        var text = JSON.stringify(arg);
        return text === undefined ? String(arg) : text;
      } catch (e) {
        return String(arg);
      }
    }).join(' ');
  }
  function level(name) {
    return function () { __host.log(name, format(arguments)); };
  }
  return {
    log: level('info'),
    info: level('info'),
    warn: level('warn'),
    error: level('error'),
    debug: level('debug')
  };
})();
"#;

const WORKER_PRELUDE: &str = r#"
var self = globalThis;
var onmessage = null;

function postMessage(data) {
  __farcallOutbox.push({ data: data, targetOrigin: null });
}

function importScripts() {
  for (var i = 0; i < arguments.length; i++) {
    __host.runScript(__host.readScript(String(arguments[i])));
  }
}

function __farcallDeliver(data, origin) {
  if (typeof self.onmessage !== 'function') return;
  try {
    self.onmessage({ data: data, origin: origin });
  } catch (e) {
    __farcallReport(e);
  }
}
"#;

const FRAME_PRELUDE: &str = r#"
var window = globalThis;
var self = globalThis;
var __farcallListeners = [];

function addEventListener(type, listener) {
  if (type === 'message' && typeof listener === 'function') {
    __farcallListeners.push(listener);
  }
}

function removeEventListener(type, listener) {
  __farcallListeners = __farcallListeners.filter(function (l) { return l !== listener; });
}

var parent = {
  postMessage: function (data, targetOrigin) {
    __farcallOutbox.push({
      data: data,
      targetOrigin: targetOrigin === undefined ? null : String(targetOrigin)
    });
  }
};

var document = {
  loadScript: function (location) {
    return new Promise(function (resolve, reject) {
      var source;
      try {
        source = __host.readScript(String(location));
      } catch (e) {
        reject(e);
        return;
      }
      try {
        __host.runScript(source);
      } catch (e) {
        __farcallReport(e);
      }
      resolve();
    });
  }
};

function __farcallDeliver(data, origin) {
  var event = { data: data, origin: origin };
  var listeners = __farcallListeners.slice();
  for (var i = 0; i < listeners.length; i++) {
    try {
      listeners[i].call(window, event);
    } catch (e) {
      __farcallReport(e);
    }
  }
}
"#;

/// Install the host natives and the global scope for `kind` into `ctx`.
///
/// # Errors
///
/// Returns `FarcallError::JavaScriptExecution` if the `__host` object cannot
/// be registered or a prelude fails to evaluate.
pub(crate) fn install_host_bindings(ctx: &mut Context, kind: TransportKind) -> Result<()> {
    let host = JsObject::default(ctx.intrinsics());

    let read_script = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, _context| {
            let location = args
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| JsNativeError::typ().with_message("script location must be a string"))?
                .to_std_string_escaped();

            let source = scripts::load_script(&location).map_err(|e| {
                JsNativeError::error()
                    .with_message(format!("Failed to load script '{}': {}", location, e))
            })?;

            Ok(JsValue::from(js_string!(source)))
        }),
    )
    .name(js_string!("readScript"))
    .length(1)
    .build();

    host.set(js_string!("readScript"), read_script, false, ctx)
        .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

    // Evaluated as a classic script so top-level declarations become globals.
    let run_script = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, context| {
            let source = args
                .first()
                .and_then(|v| v.as_string())
                .ok_or_else(|| JsNativeError::typ().with_message("script source must be a string"))?
                .to_std_string_escaped();

            context.eval(Source::from_bytes(source.as_bytes()))?;
            Ok(JsValue::undefined())
        }),
    )
    .name(js_string!("runScript"))
    .length(1)
    .build();

    host.set(js_string!("runScript"), run_script, false, ctx)
        .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

    let log = FunctionObjectBuilder::new(
        ctx.realm(),
        NativeFunction::from_copy_closure(|_this, args, context| {
            let level = args
                .first()
                .map(|v| v.to_string(context))
                .transpose()?
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default();
            let message = args
                .get(1)
                .map(|v| v.to_string(context))
                .transpose()?
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default();

            match level.as_str() {
                "error" => tracing::error!(target: REMOTE_LOG_TARGET, "{}", message),
                "warn" => tracing::warn!(target: REMOTE_LOG_TARGET, "{}", message),
                "debug" => tracing::debug!(target: REMOTE_LOG_TARGET, "{}", message),
                _ => tracing::info!(target: REMOTE_LOG_TARGET, "{}", message),
            }
            Ok(JsValue::undefined())
        }),
    )
    .name(js_string!("log"))
    .length(2)
    .build();

    host.set(js_string!("log"), log, false, ctx)
        .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

    ctx.register_global_property(js_string!("__host"), host, Attribute::all())
        .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

    let scope = match kind {
        TransportKind::Dedicated => WORKER_PRELUDE,
        TransportKind::SandboxedFrame => FRAME_PRELUDE,
    };

    for prelude in [COMMON_PRELUDE, scope] {
        ctx.eval(Source::from_bytes(prelude))
            .map_err(|e| FarcallError::JavaScriptExecution(format!("Prelude evaluation error: {}", e)))?;
    }

    Ok(())
}
