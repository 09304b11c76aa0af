//! Action dispatcher
//!
//! One invocation runs Decoding → Executing → Encoding and ends in either
//! [`ActionResult::Success`] or [`ActionResult::Failure`]. Nothing is written
//! to stdout unless the action succeeded.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::capability::NetworkCapability;
use crate::config::NetactionConfig;
use crate::error::{ActionError, NetResult};
use crate::registry::{Action, Invocation};
use crate::validation;

/// Exit status of a successful invocation
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status of any failed invocation
pub const EXIT_FAILURE: i32 = 1;

/// A decoded request: action name plus argument map
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action: String,
    pub args: Map<String, Value>,
}

impl ActionRequest {
    /// Decode the argument payload. Blank payloads mean `{}`.
    pub fn decode(action: &str, payload: &str) -> NetResult<Self> {
        let args = if payload.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(payload) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(ActionError::PayloadParse(format!(
                        "expected a JSON object, got {}",
                        json_type(&other)
                    )))
                }
                Err(e) => return Err(ActionError::PayloadParse(e.to_string())),
            }
        };

        Ok(Self {
            action: action.to_string(),
            args,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Terminal state of an invocation
#[derive(Debug)]
pub enum ActionResult {
    Success(Value),
    Failure(ActionError),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ActionResult::Success(_) => EXIT_SUCCESS,
            ActionResult::Failure(_) => EXIT_FAILURE,
        }
    }

    /// Render for the output channels
    pub fn encode(&self, pretty: bool) -> Encoded {
        match self {
            ActionResult::Success(value) => {
                let text = if pretty {
                    serde_json::to_string_pretty(value)
                } else {
                    serde_json::to_string(value)
                };
                match text {
                    Ok(stdout) => Encoded {
                        stdout: Some(stdout),
                        stderr: None,
                        exit_code: EXIT_SUCCESS,
                    },
                    Err(e) => Encoded::failure(&ActionError::PayloadParse(format!(
                        "could not encode result: {}",
                        e
                    ))),
                }
            }
            ActionResult::Failure(err) => Encoded::failure(err),
        }
    }
}

/// Text destined for stdout/stderr plus the process exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: i32,
}

impl Encoded {
    pub fn failure(err: &ActionError) -> Self {
        Self {
            stdout: None,
            stderr: Some(format_error(err)),
            exit_code: EXIT_FAILURE,
        }
    }
}

/// One-line error message: `Error: <Kind>: <message>`
pub fn format_error(err: &ActionError) -> String {
    validation::single_line_message(&format!("Error: {}: {}", err.kind(), err))
}

/// Routes action requests to registry handlers
pub struct Dispatcher {
    capability: Box<dyn NetworkCapability>,
    config: NetactionConfig,
}

impl Dispatcher {
    pub fn new(capability: Box<dyn NetworkCapability>, config: NetactionConfig) -> Self {
        Self { capability, config }
    }

    /// Run one invocation to its terminal state
    pub async fn dispatch(&self, action: &str, payload: &str) -> ActionResult {
        let request = match ActionRequest::decode(action, payload) {
            Ok(request) => request,
            Err(e) => {
                info!("Rejected payload for {}: {}", action, e);
                return ActionResult::Failure(e);
            }
        };

        match self.execute(request).await {
            Ok(value) => {
                info!("{} succeeded", action);
                ActionResult::Success(value)
            }
            Err(e) => {
                info!("{} failed: {}", action, e);
                ActionResult::Failure(e)
            }
        }
    }

    async fn execute(&self, request: ActionRequest) -> NetResult<Value> {
        let action = Action::from_name(&request.action)
            .ok_or_else(|| ActionError::UnknownAction(request.action.clone()))?;
        let invocation = Invocation::decode(action, &request.args, &self.config)?;

        debug!("Executing {:?} via {}", invocation, self.capability.name());
        invocation.run(self.capability.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_blank_payload_is_empty_object() {
        let request = ActionRequest::decode("GetRoutes", "  \n").unwrap();
        assert!(request.args.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        for payload in ["[1,2]", "\"IPv4\"", "42", "null", "{\"Version\":"] {
            let err = ActionRequest::decode("GetRoutes", payload).unwrap_err();
            assert_eq!(err.kind(), "PayloadParseError", "{}", payload);
        }
    }

    #[test]
    fn test_encode_success() {
        let encoded = ActionResult::Success(json!("OK")).encode(false);
        assert_eq!(encoded.stdout.as_deref(), Some("\"OK\""));
        assert_eq!(encoded.stderr, None);
        assert_eq!(encoded.exit_code, 0);
    }

    #[test]
    fn test_encode_failure_writes_nothing_to_stdout() {
        let encoded = ActionResult::Failure(ActionError::UnknownAction("Reboot".into())).encode(false);
        assert_eq!(encoded.stdout, None);
        assert_eq!(
            encoded.stderr.as_deref(),
            Some("Error: UnknownAction: unknown action 'Reboot'")
        );
        assert_eq!(encoded.exit_code, 1);
    }

    #[test]
    fn test_error_message_is_single_line() {
        let err = ActionError::from(crate::error::CapabilityError::CommandFailed {
            cmd: "ip -4 route add 10.0.0.0/8 via 10.0.0.1".into(),
            code: Some(2),
            stderr: "Error: Nexthop has invalid gateway.\nsecond\n".into(),
        });
        let line = format_error(&err);
        assert!(!line.contains('\n'));
        assert!(line.starts_with("Error: CapabilityError: command 'ip -4 route add"));
    }
}
