use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::ParseError;

pub type Result<T, E = ZbError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ZbError {
    #[error("Arguments Required Error: {param}")]
    ArgumentsRequired { param: String },

    #[error("Parameter Value Error: Invalid value '{value}' for parameter '{param}'")]
    ParameterValueError { param: String, value: String },

    #[error("API Error: code={code}, message={message}")]
    ApiError { code: i64, message: String },

    #[error("HTTP Error: status={status}, body={body}")]
    HttpError { status: StatusCode, body: String },

    #[error("Invalid Sign: {0}")]
    InvalidSign(String),

    #[error("Not Supported: {0}")]
    NotSupported(String),

    #[error("Authentication Error: {0}")]
    AuthenticationError(String),

    #[error("Subscribe Error: code={code}, message={message}, channel={channel:?}")]
    SubscribeError {
        code: Value,
        message: String,
        channel: Option<String>,
        payload: Value,
    },

    #[error("Decode Error: {0}")]
    DecodeError(String),

    #[error("Callback Error: {0}")]
    CallbackError(String),

    #[error("WebSocket Error: {0}")]
    WebsocketError(String),

    #[error("Channel '{channel}': {source}")]
    ChannelError {
        channel: String,
        #[source]
        source: Box<ZbError>,
    },

    #[error("HTTP Request Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON Serialization/Deserialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),

    #[error("Invalid HTTP Header Value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ZbError {
    pub(crate) fn arguments_required(param: impl Into<String>) -> Self {
        ZbError::ArgumentsRequired {
            param: param.into(),
        }
    }

    /// Builds a protocol error from a server frame carrying an `errorCode` field.
    pub(crate) fn from_error_frame(payload: Value) -> Self {
        let code = payload.get("errorCode").cloned().unwrap_or(Value::Null);
        let message = payload
            .get("errorMsg")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error message")
            .to_string();
        let channel = payload
            .get("channel")
            .and_then(Value::as_str)
            .map(str::to_string);
        ZbError::SubscribeError {
            code,
            message,
            channel,
            payload,
        }
    }

    /// The stream channel this error belongs to, when the server named one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            ZbError::SubscribeError { channel, .. } => channel.as_deref(),
            ZbError::ChannelError { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_frame_extracts_code_and_channel() {
        let err = ZbError::from_error_frame(json!({
            "channel": "Fund.balance",
            "errorCode": 10004,
            "errorMsg": "invalid signature"
        }));
        assert_eq!(err.channel(), Some("Fund.balance"));
        match err {
            ZbError::SubscribeError { code, message, .. } => {
                assert_eq!(code, json!(10004));
                assert_eq!(message, "invalid signature");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_frame_without_channel() {
        let err = ZbError::from_error_frame(json!({"errorCode": 123, "message": "x"}));
        assert_eq!(err.channel(), None);
        assert!(err.to_string().contains("message=x"));
    }

    #[test]
    fn test_channel_error_keeps_source() {
        let err = ZbError::ChannelError {
            channel: "Trade.getOrder".to_string(),
            source: Box::new(ZbError::DecodeError("bad".to_string())),
        };
        assert_eq!(err.channel(), Some("Trade.getOrder"));
        assert!(err.to_string().contains("bad"));
    }
}
