//! Decoding of toolchain replies collected from the subprocess error stream.

use serde_json::Value;

/// Reason attached when the reply bytes do not parse as JSON, keeping "tool
/// ran but gave garbage" distinct from "tool could not run".
pub const MALFORMED_REPLY_REASON: &str =
    "could not understand the JSON reply from the provisioning toolchain";

const RESULT_FIELD: &str = "result";
const FAILURE_RESULT: &str = "failure";
const REASON_FIELD: &str = "reason";
const RAW_DUMP_FIELD: &str = "rawDump";

/// A decoded toolchain reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Valid JSON whose `result` field is absent or anything but `failure`.
    Success(Value),
    /// The toolchain reported failure, or its output was not JSON at all.
    /// `raw_dump` always carries the raw text for diagnosis.
    Failure { reason: String, raw_dump: String },
}

impl Reply {
    /// Decode the raw error-stream text into a tagged reply.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Self::Failure {
                reason: MALFORMED_REPLY_REASON.to_string(),
                raw_dump: raw.to_string(),
            };
        };

        if value.get(RESULT_FIELD).and_then(Value::as_str) == Some(FAILURE_RESULT) {
            let reason = value
                .get(REASON_FIELD)
                .and_then(Value::as_str)
                .unwrap_or("toolchain reported failure without a reason")
                .to_string();
            let raw_dump = value
                .get(RAW_DUMP_FIELD)
                .and_then(Value::as_str)
                .map_or_else(|| raw.to_string(), ToString::to_string);
            return Self::Failure { reason, raw_dump };
        }

        Self::Success(value)
    }

    /// Unwrap into the success payload, converting a failure into the
    /// structured error.
    pub fn into_success(self) -> crate::error::Result<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { reason, raw_dump } => {
                Err(crate::error::ProvisionError::ReplyFailure { reason, raw_dump })
            }
        }
    }
}
