use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status envelope returned to publishers and health probes.
///
/// Serialized in camelCase with absent fields written as `null`:
///
/// ```json
/// {"success":true,"message":"Message sent successfully","statusCode":200,"data":null,"errors":null}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub data: Option<Value>,
    pub errors: Option<Vec<String>>,
}

impl ApiResponse {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;

    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            status_code: Self::OK,
            data,
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status_code: Self::BAD_REQUEST,
            data: None,
            errors: Some(errors),
        }
    }
}
