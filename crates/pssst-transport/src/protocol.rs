//! Wire protocol for client-proxy calls.

use pssst_core::{ChannelError, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Call from client to proxy.
///
/// `params` is always a list; the proxy spreads it into the method's
/// positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Correlates the response.
    pub id: Uuid,
    /// Method to invoke.
    pub method: Method,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl CallRequest {
    /// Create a request with a fresh id.
    #[must_use]
    pub fn new(method: Method, params: Option<Value>) -> Self {
        let params = match params {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
        };
        Self {
            id: Uuid::new_v4(),
            method,
            params,
        }
    }
}

/// Answer from proxy to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Id of the request being answered.
    pub id: Uuid,
    /// Result value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallResponse {
    /// Successful response.
    #[must_use]
    pub const fn ok(id: Uuid, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn err(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Convert into the call's outcome. A missing result is `null`.
    ///
    /// # Errors
    /// Returns `ChannelError::Remote` if the proxy reported an error.
    pub fn into_result(self) -> Result<Value, ChannelError> {
        match self.error {
            Some(message) => Err(ChannelError::Remote(message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parameterless_request_has_empty_params() {
        let req = CallRequest::new(Method::Pull, None);
        let json: Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["method"], "pull");
        assert_eq!(json["params"], json!([]));
        assert_eq!(json["id"], req.id.to_string());
    }

    #[test]
    fn test_push_request_params() {
        let req = CallRequest::new(Method::Push, Some(json!(["bob", "hi"])));
        assert_eq!(req.params, vec![json!("bob"), json!("hi")]);
    }

    #[test]
    fn test_fresh_ids() {
        let a = CallRequest::new(Method::Pull, None);
        let b = CallRequest::new(Method::Pull, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_response_outcomes() {
        let id = Uuid::new_v4();

        let ok: CallResponse =
            serde_json::from_str(&format!(r#"{{"id":"{id}","result":["hi"]}}"#)).unwrap();
        assert_eq!(ok.into_result(), Ok(json!(["hi"])));

        let null: CallResponse =
            serde_json::from_str(&format!(r#"{{"id":"{id}","result":null}}"#)).unwrap();
        assert_eq!(null.into_result(), Ok(Value::Null));

        let err: CallResponse =
            serde_json::from_str(&format!(r#"{{"id":"{id}","error":"Unknown user"}}"#)).unwrap();
        assert_eq!(
            err.into_result(),
            Err(ChannelError::Remote("Unknown user".into()))
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(&CallResponse::err(id, "boom")).unwrap();
        assert!(json.contains(r#""error":"boom""#));
        assert!(!json.contains("result"));
    }
}
