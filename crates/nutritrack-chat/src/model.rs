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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Character cap shared by the reference dataset and the inline dataset.
pub const DATASET_CHAR_LIMIT: usize = 15_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Maps an untrusted sender value. Only the literal `"assistant"` is an assistant, everything
    /// else (absent, non-string or any other string) is treated as the user.
    pub fn from_sender(sender: Option<&Value>) -> Self {
        match sender {
            Some(Value::String(data)) if data == "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

pub type Conversation = Vec<ConversationTurn>;

/// Message as received from the client. Both fields are kept as raw JSON.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncomingMessage {
    pub sender: Option<Value>,
    pub text: Option<Value>,
}

impl IncomingMessage {
    pub fn from_value(value: &Value) -> Self {
        Self {
            sender: value.get("sender").cloned(),
            text: value.get("text").cloned(),
        }
    }

    /// Untrimmed text if it is a string with visible content.
    pub fn text_content(&self) -> Option<&str> {
        match &self.text {
            Some(Value::String(data)) if !data.trim().is_empty() => Some(data),
            _ => None,
        }
    }
}

/// Parsed `POST /api/chat` body.
#[derive(Debug, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
    pub dataset: Option<String>,
}

impl ChatRequest {
    /// Fails only when the body is not JSON. Unexpected shapes degrade to "no messages" and
    /// "no dataset".
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_slice::<Value>(body)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let messages = match value.get("messages") {
            Some(Value::Array(list)) => list.iter().map(IncomingMessage::from_value).collect(),
            _ => vec![],
        };

        let dataset = match value.get("dataset") {
            Some(Value::String(data)) if !data.trim().is_empty() => {
                Some(truncate_chars(data, DATASET_CHAR_LIMIT).to_owned())
            }
            _ => None,
        };

        Self { messages, dataset }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CompletionResult {
    pub reply: String,
}

/// Prefix of `text` holding at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
