//! Bridge Integration Tests
//!
//! End-to-end tests driving real remote contexts over both transports:
//! 1. Results and marshaled exceptions
//! 2. Script loading order
//! 3. Correlation of concurrent and out-of-order calls
//! 4. Lifecycle errors and the terminate asymmetry
//! 5. Uncaught error events (dedicated only)
//! 6. Frame channel filtering

use farcall::transport::FrameTransport;
use farcall::{
    BootstrapBuilder, Bridge, BridgeOptions, CapabilityProbe, DefinitionRegistry, ErrorEvent, InboundHandler,
    LifecycleState, TransportKind,
};
use farcall_common::protocol::{
    ErrorTypeRegistry, FarcallError, Outcome, RemoteError, RemoteErrorKind, RequestEnvelope, ResponseEnvelope,
};
use serde_json::{json, Value};
use std::future::Future;
use std::io::Write;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

const DOMAIN: &str = "http://localhost";
const BOTH: [TransportKind; 2] = [TransportKind::Dedicated, TransportKind::SandboxedFrame];

fn bridge_on(kind: TransportKind, options: BridgeOptions) -> Bridge {
    let probe = CapabilityProbe::fixed(kind == TransportKind::Dedicated);
    Bridge::new(options.with_domain(DOMAIN).with_capability_probe(probe))
}

fn started(kind: TransportKind, options: BridgeOptions) -> Bridge {
    let bridge = bridge_on(kind, options);
    assert_eq!(bridge.start().unwrap(), kind);
    bridge
}

fn create_test_script(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn location(file: &NamedTempFile) -> String {
    file.path().display().to_string()
}

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("timed out waiting for the remote context")
}

fn remote_error(result: farcall::Result<Value>) -> RemoteError {
    match result {
        Err(FarcallError::Remote(err)) => err,
        other => panic!("expected a remote error, got {:?}", other),
    }
}

// ============================================================================
// Results and Exceptions
// ============================================================================

#[tokio::test]
async fn test_add_resolves_on_both_transports() {
    for kind in BOTH {
        let bridge = started(kind, BridgeOptions::new().with_definition("add", "(a, b) => a + b"));

        let result = within(bridge.run("add", vec![json!(2), json!(3)])).await.unwrap();
        assert_eq!(result, json!(5), "transport {}", kind);

        bridge.terminate().unwrap();
    }
}

#[tokio::test]
async fn test_structured_values_round_trip() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new().with_definition(
                "summarize",
                "function (user, tags) { return { name: user.name.toUpperCase(), tags: tags.length, ok: true }; }",
            ),
        );

        let result = within(bridge.run("summarize", vec![json!({"name": "ada"}), json!(["a", "b"])]))
            .await
            .unwrap();
        assert_eq!(result, json!({"name": "ADA", "tags": 2, "ok": true}));
    }
}

#[tokio::test]
async fn test_undefined_result_is_null() {
    for kind in BOTH {
        let bridge = started(kind, BridgeOptions::new().with_definition("noop", "() => {}"));
        assert_eq!(within(bridge.run("noop", vec![])).await.unwrap(), Value::Null);
    }
}

#[tokio::test]
async fn test_async_definition_is_awaited() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new().with_definition("double", "async (x) => { await null; return x * 2; }"),
        );
        assert_eq!(within(bridge.run("double", vec![json!(21)])).await.unwrap(), json!(42));
    }
}

#[tokio::test]
async fn test_range_error_is_reconstructed() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new().with_definition("fail", "() => { throw new RangeError('bad'); }"),
        );

        let err = remote_error(within(bridge.run("fail", vec![])).await);
        assert_eq!(err.kind, RemoteErrorKind::RangeError);
        assert_eq!(err.message, "bad");
        assert_eq!(bridge.state(), LifecycleState::Running);
    }
}

#[tokio::test]
async fn test_unregistered_error_type_falls_back() {
    let source = "() => { class QuotaError extends Error {} throw new QuotaError('full'); }";

    for kind in BOTH {
        let bridge = started(kind, BridgeOptions::new().with_definition("quota", source));
        let err = remote_error(within(bridge.run("quota", vec![])).await);
        assert_eq!(err.kind, RemoteErrorKind::Error);
        assert_eq!(err.message, "full");
    }
}

#[tokio::test]
async fn test_registered_error_type_is_kept() {
    let source = "() => { class QuotaError extends Error {} throw new QuotaError('full'); }";
    let bridge = started(
        TransportKind::Dedicated,
        BridgeOptions::new()
            .with_definition("quota", source)
            .with_error_types(ErrorTypeRegistry::standard().with_type("QuotaError")),
    );

    let err = remote_error(within(bridge.run("quota", vec![])).await);
    assert_eq!(err.kind, RemoteErrorKind::Custom("QuotaError".into()));
    assert_eq!(err.to_string(), "QuotaError: full");
}

#[tokio::test]
async fn test_unknown_command_is_reference_error() {
    for kind in BOTH {
        let bridge = started(kind, BridgeOptions::new());
        let err = remote_error(within(bridge.run("missing", vec![])).await);
        assert_eq!(err.kind, RemoteErrorKind::ReferenceError);
        assert_eq!(err.message, "missing is not defined");
        assert_eq!(bridge.pending_calls(), 0);
    }
}

#[tokio::test]
async fn test_duplicate_definition_last_wins() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new()
                .with_definition("version", "() => 1")
                .with_definition("version", "() => 2"),
        );
        assert_eq!(within(bridge.run("version", vec![])).await.unwrap(), json!(2));
    }
}

#[tokio::test]
async fn test_result_without_json_form_is_type_error() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new()
                .with_definition("makeFn", "() => function () {}")
                .with_definition("makeSymbol", "() => Symbol('s')")
                .with_definition("makeBigInt", "() => 10n"),
        );

        for command in ["makeFn", "makeSymbol", "makeBigInt"] {
            let err = remote_error(within(bridge.run(command, vec![])).await);
            assert_eq!(err.kind, RemoteErrorKind::TypeError, "{} on {}", command, kind);
        }
        assert_eq!(bridge.pending_calls(), 0);
    }
}

#[tokio::test]
async fn test_unserializable_post_does_not_lose_the_response() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new().with_definition(
                "noisy",
                "() => { \
                   if (typeof parent === 'object') { parent.postMessage(NaN, '*'); } else { postMessage(NaN); } \
                   return 1; \
                 }",
            ),
        );

        assert_eq!(within(bridge.run("noisy", vec![])).await.unwrap(), json!(1), "transport {}", kind);
        assert_eq!(bridge.pending_calls(), 0);
    }
}

// ============================================================================
// Script Loading
// ============================================================================

#[tokio::test]
async fn test_import_scripts_load_in_order_before_first_command() {
    let first = create_test_script("var loadOrder = []; loadOrder.push('first');");
    let second = create_test_script("loadOrder.push('second'); function shout(s) { return s + '!'; }");

    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new()
                .with_import_scripts([location(&first), location(&second)])
                .with_definition("order", "() => loadOrder.slice()")
                .with_definition("shout", "(s) => shout(s)"),
        );

        let order = within(bridge.run("order", vec![])).await.unwrap();
        assert_eq!(order, json!(["first", "second"]), "transport {}", kind);

        // Loading happens once.
        let order = within(bridge.run("order", vec![])).await.unwrap();
        assert_eq!(order, json!(["first", "second"]));

        assert_eq!(within(bridge.run("shout", vec![json!("hi")])).await.unwrap(), json!("hi!"));
    }
}

#[tokio::test]
async fn test_file_url_script_location() {
    let script = create_test_script("var fromUrl = 'yes';");
    let bridge = started(
        TransportKind::Dedicated,
        BridgeOptions::new()
            .with_import_script(format!("file://{}", location(&script)))
            .with_definition("check", "() => fromUrl"),
    );

    assert_eq!(within(bridge.run("check", vec![])).await.unwrap(), json!("yes"));
}

#[tokio::test]
async fn test_frame_missing_script_fails_the_command() {
    let bridge = started(
        TransportKind::SandboxedFrame,
        BridgeOptions::new()
            .with_import_script("/nonexistent/farcall/missing.js")
            .with_definition("ping", "() => 'pong'"),
    );

    let err = remote_error(within(bridge.run("ping", vec![])).await);
    assert_eq!(err.kind, RemoteErrorKind::Error);
    assert!(err.message.contains("Failed to load script"), "{}", err.message);
}

#[tokio::test]
async fn test_frame_script_error_does_not_block_dispatch() {
    let broken = create_test_script("throw new TypeError('broken at load');");
    let bridge = bridge_on(
        TransportKind::SandboxedFrame,
        BridgeOptions::new()
            .with_import_script(location(&broken))
            .with_definition("ping", "() => 'pong'"),
    );
    let mut exceptions = bridge.subscribe_exceptions();
    bridge.start().unwrap();

    assert_eq!(within(bridge.run("ping", vec![])).await.unwrap(), json!("pong"));
    assert!(exceptions.try_recv().is_err());
}

// ============================================================================
// Correlation
// ============================================================================

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new()
                .with_definition("hold", "() => new Promise(function (resolve) { globalThis.releaseHold = resolve; })")
                .with_definition("release", "(v) => { globalThis.releaseHold(v); return 'released'; }"),
        );

        let held = bridge.run("hold", vec![]);
        let release = bridge.run("release", vec![json!(42)]);
        assert!(release.message_id() > held.message_id());

        let (held, release) = within(async { tokio::join!(held, release) }).await;
        assert_eq!(held.unwrap(), json!(42), "transport {}", kind);
        assert_eq!(release.unwrap(), json!("released"));
        assert_eq!(bridge.pending_calls(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_from_many_tasks() {
    for kind in BOTH {
        let bridge = Arc::new(started(kind, BridgeOptions::new().with_definition("square", "(n) => n * n")));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move { (i, bridge.run("square", vec![json!(i)]).await) })
            })
            .collect();

        for task in tasks {
            let (i, result) = within(task).await.unwrap();
            assert_eq!(result.unwrap(), json!(i * i));
        }
    }
}

#[tokio::test]
async fn test_terminate_fails_pending_calls() {
    for kind in BOTH {
        let bridge = started(
            kind,
            BridgeOptions::new().with_definition("forever", "() => new Promise(function () {})"),
        );

        let call = bridge.run("forever", vec![]);
        assert_eq!(bridge.pending_calls(), 1);

        bridge.terminate().unwrap();
        assert_eq!(bridge.pending_calls(), 0);
        assert!(matches!(within(call).await, Err(FarcallError::Terminated)));
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_double_start_fails_on_both_transports() {
    for kind in BOTH {
        let bridge = started(kind, BridgeOptions::new());
        assert!(matches!(bridge.start(), Err(FarcallError::AlreadyStarted)));
        assert_eq!(bridge.transport_kind(), Some(kind));
        bridge.terminate().unwrap();
    }
}

#[test]
fn test_terminate_asymmetry() {
    // Dedicated: terminating without an active worker is an error.
    let dedicated = started(TransportKind::Dedicated, BridgeOptions::new());
    dedicated.terminate().unwrap();
    assert!(matches!(dedicated.terminate(), Err(FarcallError::NoActiveWorker)));
    assert_eq!(dedicated.state(), LifecycleState::Terminated);

    // Sandboxed frame: the same call is a silent no-op.
    let frame = started(TransportKind::SandboxedFrame, BridgeOptions::new());
    frame.terminate().unwrap();
    assert!(frame.terminate().is_ok());
    assert_eq!(frame.state(), LifecycleState::Terminated);
}

#[test]
fn test_invalid_definition_fails_start() {
    let bridge = bridge_on(TransportKind::Dedicated, BridgeOptions::new().with_definition("", "() => 1"));
    assert!(matches!(bridge.start(), Err(FarcallError::InvalidDefinition(_))));
    assert_eq!(bridge.state(), LifecycleState::Created);
}

// ============================================================================
// Uncaught Error Events
// ============================================================================

#[tokio::test]
async fn test_import_script_error_raises_exception_event() {
    let broken = create_test_script("throw new TypeError('broken at load');");
    let bridge = bridge_on(
        TransportKind::Dedicated,
        BridgeOptions::new().with_import_script(location(&broken)),
    );
    let mut exceptions = bridge.subscribe_exceptions();
    bridge.start().unwrap();

    let event = within(exceptions.recv()).await.unwrap();
    assert_eq!(event.kind, RemoteErrorKind::TypeError);
    assert_eq!(event.message, "broken at load");
    assert_eq!(bridge.state(), LifecycleState::Running);
}

#[tokio::test]
async fn test_syntax_error_in_definition_raises_exception_event() {
    let bridge = bridge_on(
        TransportKind::Dedicated,
        BridgeOptions::new().with_definition("broken", "(a, b) => {"),
    );
    let mut exceptions = bridge.subscribe_exceptions();
    bridge.start().unwrap();

    let event = within(exceptions.recv()).await.unwrap();
    assert_eq!(event.kind, RemoteErrorKind::SyntaxError);
}

#[tokio::test]
async fn test_handler_error_raises_event_and_leaves_call_pending() {
    let bridge = bridge_on(
        TransportKind::Dedicated,
        BridgeOptions::new().with_definition(
            "sabotage",
            "() => { self.onmessage = function () { throw new RangeError('handler broke'); }; return true; }",
        ),
    );
    let mut exceptions = bridge.subscribe_exceptions();
    bridge.start().unwrap();

    assert_eq!(within(bridge.run("sabotage", vec![])).await.unwrap(), json!(true));

    let lost = bridge.run("sabotage", vec![]);
    let event = within(exceptions.recv()).await.unwrap();
    assert_eq!(event.kind, RemoteErrorKind::RangeError);
    assert_eq!(event.message, "handler broke");

    // The event settles nothing; the call stays in the table.
    assert_eq!(bridge.pending_calls(), 1);
    bridge.terminate().unwrap();
    assert!(matches!(within(lost).await, Err(FarcallError::Terminated)));
}

#[tokio::test]
async fn test_call_failure_is_not_an_exception_event() {
    let bridge = bridge_on(
        TransportKind::Dedicated,
        BridgeOptions::new().with_definition("fail", "() => { throw new Error('expected'); }"),
    );
    let mut exceptions = bridge.subscribe_exceptions();
    bridge.start().unwrap();

    assert!(within(bridge.run("fail", vec![])).await.is_err());
    assert!(exceptions.try_recv().is_err());
}

// ============================================================================
// Frame Channel Filtering
// ============================================================================

struct RecordingHandler(Mutex<mpsc::Sender<ResponseEnvelope>>);

impl InboundHandler for RecordingHandler {
    fn on_response(&self, response: ResponseEnvelope) {
        let _ = self.0.lock().unwrap().send(response);
    }

    fn on_error(&self, _event: ErrorEvent) {}
}

#[test]
fn test_frame_ignores_foreign_origin_and_control_messages() {
    let mut registry = DefinitionRegistry::new();
    registry.register("count", "(function () { var n = 0; return function () { return ++n; }; })()");
    let program = BootstrapBuilder::new(DOMAIN)
        .with_definitions(&registry)
        .build(TransportKind::SandboxedFrame)
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let mut transport = FrameTransport::new(DOMAIN);
    transport.start(program, Arc::new(RecordingHandler(Mutex::new(tx)))).unwrap();
    let window = transport.window().unwrap().clone();

    // A well-formed request from another origin is not dispatched.
    let foreign = serde_json::to_string(&RequestEnvelope::new(1, "count", vec![])).unwrap();
    window.post_message(&foreign, DOMAIN, "http://evil.test");

    // A message without a command is control traffic, never a call.
    window.post_message(r#"{"messageId":7,"result":1}"#, DOMAIN, DOMAIN);

    transport.send(&RequestEnvelope::new(2, "count", vec![])).unwrap();

    let mut seen = Vec::new();
    loop {
        let response = rx.recv_timeout(Duration::from_secs(10)).expect("no reply to the real request");
        let done = response.message_id == 2;
        seen.push(response);
        if done {
            break;
        }
    }

    // The counter ran once, so only the real request was dispatched.
    assert_eq!(seen.last().unwrap().outcome, Outcome::Result(json!(1)));
    assert!(seen.iter().all(|r| r.message_id != 1));
    assert!(seen.iter().filter(|r| r.message_id == 7).all(|r| !r.is_exception()));

    transport.terminate().unwrap();
}
