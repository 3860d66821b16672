// SPDX-License-Identifier: GPL-3.0-only

//! Method-call command channel
//!
//! The host talks to the recorder with one JSON object per message:
//!
//! ```text
//! → {"method": "startRecording"}
//! ← {"status": "success"}
//! → {"method": "unknownThing"}
//! ← {"status": "notImplemented", "method": "unknownThing"}
//! ← {"method": "onRecordingFinished", "arguments": [{"path": "...", "rotation": 90}]}
//! ```
//!
//! Recording commands are acknowledged once queued; their outcome is never a
//! reply. The only outbound event is `onRecordingFinished`, whose arguments
//! are `null` when nothing was recorded.

use crate::errors::CaptureError;
use crate::recorder::{Command, RecorderEvent, RecorderHandle, Segment};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Method name of the finished-segment event
pub const RECORDING_FINISHED_METHOD: &str = "onRecordingFinished";

/// Method name of the status query
pub const GET_STATUS_METHOD: &str = "getStatus";

/// An incoming call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Value::Null,
        }
    }
}

/// Reply to a call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    NotImplemented {
        method: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl MethodResponse {
    pub fn ack() -> Self {
        MethodResponse::Success { result: None }
    }

    fn error(code: &str, message: impl ToString) -> Self {
        MethodResponse::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Outbound event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    pub method: &'static str,
    pub arguments: Option<Vec<Arc<Segment>>>,
}

impl From<RecorderEvent> for EventMessage {
    fn from(event: RecorderEvent) -> Self {
        match event {
            RecorderEvent::RecordingFinished(segments) => EventMessage {
                method: RECORDING_FINISHED_METHOD,
                arguments: segments,
            },
        }
    }
}

/// Encode an outbound event as one JSON line
///
/// Recorded segments are never reported as `null`, even if encoding fails.
pub fn encode_event(event: RecorderEvent) -> String {
    let message = EventMessage::from(event);
    serde_json::to_string(&message).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to encode event, writing segments field by field");
        let arguments = message.arguments.as_ref().map(|segments| {
            segments
                .iter()
                .map(|s| json!({"path": s.path.to_string_lossy(), "rotation": s.rotation}))
                .collect::<Vec<_>>()
        });
        json!({"method": message.method, "arguments": arguments}).to_string()
    })
}

/// Dispatches method calls to a recorder
#[derive(Clone)]
pub struct CommandChannel {
    recorder: RecorderHandle,
}

impl CommandChannel {
    pub fn new(recorder: RecorderHandle) -> Self {
        Self { recorder }
    }

    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        if call.method == GET_STATUS_METHOD {
            return match self.recorder.status() {
                Ok(status) => match serde_json::to_value(status) {
                    Ok(value) => MethodResponse::Success {
                        result: Some(value),
                    },
                    Err(e) => MethodResponse::error("internal", e),
                },
                Err(e) => unavailable(e),
            };
        }

        let Some(command) = Command::from_method_name(&call.method) else {
            debug!(method = %call.method, "Unknown method");
            return MethodResponse::NotImplemented {
                method: call.method.clone(),
            };
        };

        match self.recorder.command(command) {
            Ok(()) => MethodResponse::ack(),
            Err(e) => unavailable(e),
        }
    }

    /// Handle one raw JSON line and return the JSON reply
    pub fn dispatch_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<MethodCall>(line) {
            Ok(call) => self.handle(&call),
            Err(e) => {
                warn!(error = %e, "Malformed method call");
                MethodResponse::error("invalidRequest", e)
            }
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|_| r#"{"status":"error","code":"internal","message":"encode"}"#.to_string())
    }
}

fn unavailable(err: CaptureError) -> MethodResponse {
    MethodResponse::error("unavailable", err)
}
