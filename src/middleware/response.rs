use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug)]
enum Body<T> {
    /// `{ "data": ... }`
    Data(T),
    /// `{ "message": ..., "data"?: ... }`
    Message { message: String, data: Option<T> },
    /// Serialized as is (paginated listings carry their own counters)
    Bare(T),
}

/// Wrapper for API responses that applies the response envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    body: Body<T>,
    status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with `{ "data": ... }`
    pub fn success(data: T) -> Self {
        Self {
            body: Body::Data(data),
            status_code: StatusCode::OK,
        }
    }

    /// 201 with a message and the created record
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            body: Body::Message {
                message: message.into(),
                data: Some(data),
            },
            status_code: StatusCode::CREATED,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            body: Body::Message {
                message: message.into(),
                data: Some(data),
            },
            status_code: StatusCode::OK,
        }
    }

    pub fn bare(data: T) -> Self {
        Self {
            body: Body::Bare(data),
            status_code: StatusCode::OK,
        }
    }
}

impl ApiResponse<()> {
    /// 200 with only `{ "message": ... }`
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            body: Body::Message {
                message: message.into(),
                data: None,
            },
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let envelope = match self.body {
            Body::Data(data) => serde_json::to_value(data).map(|data| json!({ "data": data })),
            Body::Bare(data) => serde_json::to_value(data),
            Body::Message { message, data: None } => Ok(json!({ "message": message })),
            Body::Message {
                message,
                data: Some(data),
            } => serde_json::to_value(data).map(|data| json!({ "message": message, "data": data })),
        };

        match envelope {
            Ok(body) => (self.status_code, Json(body)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": true,
                        "message": "Failed to serialize response data",
                        "code": "INTERNAL_SERVER_ERROR"
                    })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

/// Shorthand for handlers that build ad-hoc JSON bodies
pub type JsonResult = ApiResult<Value>;
