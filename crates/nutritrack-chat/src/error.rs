/*
 * Copyright 2026 sukawasatoru
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::fmt::Display;

pub const CONFIGURATION_MESSAGE: &str =
    "Missing OpenAI API key. Add OPENAI_API_KEY to your environment.";
pub const INVALID_PAYLOAD_MESSAGE: &str = "Invalid JSON payload.";
pub const EMPTY_REPLY_MESSAGE: &str = "The assistant returned an empty response.";
pub const UPSTREAM_FALLBACK_MESSAGE: &str =
    "Unable to generate a response. Please try again later.";

/// Every failure a chat request can surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("missing OpenAI API key")]
    Configuration,

    #[error("invalid payload")]
    Payload(#[from] serde_json::Error),

    #[error("completion service returned an empty reply")]
    EmptyReply,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ChatError {
    /// Collapses the error into the `(status, message)` pair returned to the client. Upstream
    /// statuses outside 4xx and 5xx become 502.
    pub fn into_failure(self) -> FailureResult {
        match self {
            ChatError::Configuration => FailureResult {
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                message: CONFIGURATION_MESSAGE.into(),
            },
            ChatError::Payload(_) => FailureResult {
                status_code: StatusCode::BAD_REQUEST.as_u16(),
                message: INVALID_PAYLOAD_MESSAGE.into(),
            },
            ChatError::EmptyReply => FailureResult {
                status_code: StatusCode::BAD_GATEWAY.as_u16(),
                message: EMPTY_REPLY_MESSAGE.into(),
            },
            ChatError::Upstream(UpstreamError { status, message }) => FailureResult {
                status_code: status
                    .filter(|data| (400..=599).contains(data))
                    .unwrap_or(StatusCode::BAD_GATEWAY.as_u16()),
                message: message.unwrap_or_else(|| UPSTREAM_FALLBACK_MESSAGE.into()),
            },
        }
    }
}

/// Failure reported by the completion service or by the transport in front of it.
#[derive(Clone, Debug, Default, Eq, PartialEq, thiserror::Error)]
#[error("upstream failure status={status:?} message={message:?}")]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl UpstreamError {
    /// Reads an error object of the shape `{status, error: {message}, message}`.
    pub fn from_error_object(value: &Value) -> Self {
        Self {
            status: value
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|data| u16::try_from(data).ok()),
            message: extract_message(value),
        }
    }

    /// Non-2xx HTTP response. The body may or may not be JSON.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            status: Some(status),
            message: serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|data| extract_message(&data)),
        }
    }

    pub fn from_transport(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|data| data.as_u16()),
            message: Some(e.to_string()),
        }
    }

    pub fn from_exception(e: impl Display) -> Self {
        Self {
            status: None,
            message: Some(e.to_string()),
        }
    }
}

/// `error.message` first, then a top-level `message`.
fn extract_message(value: &Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_owned)
}

/// Failure while loading the reference dataset. Never reaches the client.
#[derive(Debug, thiserror::Error)]
pub enum DatasetFetchError {
    #[error("failed to prepare dataset request")]
    Prepare(#[source] anyhow::Error),

    #[error("failed to request dataset")]
    Transport(#[source] reqwest::Error),

    #[error("dataset request failed: status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("dataset is not valid utf-8")]
    Decode(#[from] std::string::FromUtf8Error),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureResult {
    pub status_code: u16,
    pub message: String,
}

impl IntoResponse for FailureResult {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(json!({ "error": self.message }))).into_response()
    }
}
