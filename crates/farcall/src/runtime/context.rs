use boa_engine::{
    js_string,
    object::{builtins::JsArray, JsObject},
    value::JsValue,
    Context, Source,
};
use farcall_common::protocol::error::{FarcallError, Result};
use serde::Deserialize;
use std::rc::Rc;

use crate::runtime::{bindings, conversions::js_value_to_json, job_executor::EventLoopJobs};
use crate::transport::TransportKind;

/// A message posted by remote code during one turn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPost {
    /// The posted payload. The bootstrap program always posts envelope text.
    pub data: serde_json::Value,
    /// `None` for worker posts; the frame's `targetOrigin` otherwise.
    pub target_origin: Option<String>,
}

impl OutboundPost {
    /// The payload as envelope text.
    pub fn text(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Everything a turn produced once its job queue ran dry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    pub posts: Vec<OutboundPost>,
    /// Errors thrown outside any promise, as `Type: message` text.
    pub uncaught: Vec<String>,
}

/// Boa context hosting one remote execution context.
///
/// Not `Send`: a `RemoteContext` lives and dies on the thread that created
/// it. Transports own it from their dedicated thread and talk to it through
/// channels.
pub struct RemoteContext {
    ctx: Context,
    jobs: Rc<EventLoopJobs>,
    kind: TransportKind,
}

impl RemoteContext {
    /// Create a blank context with the host scope for `kind` installed.
    pub fn new(kind: TransportKind) -> Result<Self> {
        let jobs = Rc::new(EventLoopJobs::new());
        let mut ctx = Context::builder()
            .job_executor(jobs.clone())
            .build()
            .map_err(|e| FarcallError::JavaScriptExecution(format!("Context creation error: {}", e)))?;

        bindings::install_host_bindings(&mut ctx, kind)?;

        Ok(Self { ctx, jobs, kind })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Evaluate `program` in the global scope, then run the turn to completion.
    ///
    /// A thrown error is not an `Err`: it is reported in `Turn::uncaught`,
    /// the way a worker reports errors from its initial script.
    pub fn evaluate(&mut self, program: &str) -> Result<Turn> {
        if let Err(err) = self.ctx.eval(Source::from_bytes(program)) {
            let thrown = err.to_opaque(&mut self.ctx);
            self.call_global("__farcallReport", &[thrown])?;
        }
        self.finish_turn()
    }

    /// Deliver one message event to the remote scope and run the turn.
    pub fn deliver(&mut self, data: &str, origin: &str) -> Result<Turn> {
        let args = [
            JsValue::from(js_string!(data)),
            JsValue::from(js_string!(origin)),
        ];
        self.call_global("__farcallDeliver", &args)?;
        self.finish_turn()
    }

    pub fn has_pending_jobs(&self) -> bool {
        self.jobs.has_pending_jobs()
    }

    fn call_global(&mut self, name: &str, args: &[JsValue]) -> Result<JsValue> {
        let func = self
            .ctx
            .global_object()
            .get(js_string!(name), &mut self.ctx)
            .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

        let func = func
            .as_callable()
            .ok_or_else(|| FarcallError::JavaScriptExecution(format!("'{}' is not installed", name)))?;

        func.call(&JsValue::undefined(), args, &mut self.ctx)
            .map_err(|e| FarcallError::JavaScriptExecution(format!("'{}' failed: {}", name, e)))
    }

    /// Runs queued jobs, then collects the turn's posts and errors.
    ///
    /// Posts are converted one at a time. A post with no JSON form is dropped
    /// with a warning so the rest of the turn still gets through.
    fn finish_turn(&mut self) -> Result<Turn> {
        self.ctx
            .run_jobs()
            .map_err(|e| FarcallError::JavaScriptExecution(format!("Job execution error: {}", e)))?;

        let drained = self.call_global("__farcallDrain", &[])?;
        let Some(drained) = drained.as_object() else {
            return Err(FarcallError::JavaScriptExecution(
                "'__farcallDrain' did not return an object".to_string(),
            ));
        };
        let drained = drained.clone();

        let mut turn = Turn::default();
        for (index, post) in self.drained_list(&drained, "posts")?.into_iter().enumerate() {
            match self.convert_post(post) {
                Ok(post) => turn.posts.push(post),
                Err(e) => tracing::warn!(kind = ?self.kind, index, error = %e, "dropping unserializable post"),
            }
        }
        for entry in self.drained_list(&drained, "uncaught")? {
            turn.uncaught.push(serde_json::from_value(js_value_to_json(entry, &mut self.ctx)?)?);
        }

        tracing::debug!(
            kind = ?self.kind,
            posts = turn.posts.len(),
            uncaught = turn.uncaught.len(),
            "turn finished"
        );
        Ok(turn)
    }

    fn convert_post(&mut self, post: JsValue) -> Result<OutboundPost> {
        Ok(serde_json::from_value(js_value_to_json(post, &mut self.ctx)?)?)
    }

    fn drained_list(&mut self, drained: &JsObject, field: &str) -> Result<Vec<JsValue>> {
        let value = drained
            .get(js_string!(field), &mut self.ctx)
            .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Ok(Vec::new());
        };

        let array = JsArray::from_object(obj.clone())
            .map_err(|e| FarcallError::JavaScriptExecution(format!("'{}' is not an array: {}", field, e)))?;
        let length = array
            .length(&mut self.ctx)
            .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))?;

        (0..length)
            .map(|i| {
                array
                    .get(i, &mut self.ctx)
                    .map_err(|e| FarcallError::JavaScriptExecution(e.to_string()))
            })
            .collect()
    }
}
