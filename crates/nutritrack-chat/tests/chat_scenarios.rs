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

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use mockall::predicate::*;
use nutritrack_chat::config::{ChatConfig, DEFAULT_OPENAI_BASE_URL};
use nutritrack_chat::data::dataset_cache::{DatasetCache, GetDatasetCache};
use nutritrack_chat::data::openai::{
    ChatCompletionResponse, GetChatCompletionDataSource, GetFileDataSource,
    MockChatCompletionDataSource, MockFileDataSource,
};
use nutritrack_chat::error::{
    CONFIGURATION_MESSAGE, EMPTY_REPLY_MESSAGE, INVALID_PAYLOAD_MESSAGE, UpstreamError,
};
use nutritrack_chat::feature::chat::{GetChatConfig, chat_handler};
use nutritrack_chat::feature::context::{
    INLINE_DATASET_INSTRUCTION, PERSONA_FRAMING, REFERENCE_DATASET_INSTRUCTION,
};
use nutritrack_chat::model::{ConversationTurn, DATASET_CHAR_LIMIT, MessageRole};
use serde_json::{Value, json};
use std::sync::Arc;

struct MockContext {
    config: ChatConfig,
    dataset_cache: DatasetCache,
    file_data_source: MockFileDataSource,
    chat_completion_data_source: MockChatCompletionDataSource,
}

impl MockContext {
    fn new(api_key: Option<&str>, data_file_id: Option<&str>) -> Self {
        Self {
            config: ChatConfig::new(
                api_key.map(str::to_owned),
                None,
                data_file_id.map(str::to_owned),
                DEFAULT_OPENAI_BASE_URL.parse().unwrap(),
            ),
            dataset_cache: DatasetCache::new(),
            file_data_source: MockFileDataSource::new(),
            chat_completion_data_source: MockChatCompletionDataSource::new(),
        }
    }
}

impl GetChatConfig for MockContext {
    fn get_chat_config(&self) -> &ChatConfig {
        &self.config
    }
}

impl GetDatasetCache for MockContext {
    fn get_dataset_cache(&self) -> &DatasetCache {
        &self.dataset_cache
    }
}

impl GetFileDataSource for MockContext {
    type DataSource = MockFileDataSource;

    fn get_file_data_source(&self) -> &Self::DataSource {
        &self.file_data_source
    }
}

impl GetChatCompletionDataSource for MockContext {
    type DataSource = MockChatCompletionDataSource;

    fn get_chat_completion_data_source(&self) -> &Self::DataSource {
        &self.chat_completion_data_source
    }
}

async fn post_chat(context: MockContext, body: &'static str) -> (StatusCode, Value) {
    let response: Response =
        chat_handler(State(Arc::new(context)), Bytes::from_static(body.as_bytes())).await;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn missing_credential() {
    // no expectations: any external call panics.
    let context = MockContext::new(None, Some("file-nutrition"));

    let (status, body) = post_chat(
        context,
        r#"{"messages":[{"sender":"user","text":"What should I eat for breakfast?"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": CONFIGURATION_MESSAGE}));
}

#[tokio::test]
async fn missing_credential_with_invalid_payload() {
    let context = MockContext::new(None, None);

    let (status, body) = post_chat(context, "{{{").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": CONFIGURATION_MESSAGE}));
}

#[tokio::test]
async fn invalid_payload() {
    let context = MockContext::new(Some("sk-test"), Some("file-nutrition"));

    let (status, body) = post_chat(context, "messages=hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": INVALID_PAYLOAD_MESSAGE}));
}

#[tokio::test]
async fn single_user_message() {
    let mut context = MockContext::new(Some("sk-test"), None);
    context
        .chat_completion_data_source
        .expect_create_chat_completion()
        .withf(|api_key, request| {
            api_key == "sk-test"
                && request.messages
                    == vec![
                        ConversationTurn::system(PERSONA_FRAMING),
                        ConversationTurn {
                            role: MessageRole::User,
                            content: "What should I eat for breakfast?".into(),
                        },
                    ]
        })
        .times(1)
        .returning(|_, _| {
            Ok(ChatCompletionResponse::with_content(
                "\nTry Greek yogurt with berries and oats.\n",
            ))
        });

    let (status, body) = post_chat(
        context,
        r#"{"messages":[{"sender":"user","text":"What should I eat for breakfast?"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"reply": "Try Greek yogurt with berries and oats."})
    );
}

#[tokio::test]
async fn inline_dataset_is_truncated() {
    let mut context = MockContext::new(Some("sk-test"), None);
    context
        .chat_completion_data_source
        .expect_create_chat_completion()
        .withf(|_, request| {
            let Some(dataset) = request.messages[1]
                .content
                .strip_prefix(INLINE_DATASET_INSTRUCTION)
                .and_then(|data| data.strip_prefix("\n\n"))
            else {
                return false;
            };
            request.messages.len() == 2
                && request.messages[1].role == MessageRole::System
                && dataset.len() == DATASET_CHAR_LIMIT
                && dataset.chars().all(|data| data == 'A')
        })
        .times(1)
        .returning(|_, _| Ok(ChatCompletionResponse::with_content("ok")));

    let body = json!({"messages": [], "dataset": "A".repeat(20_000)}).to_string();
    let response = chat_handler(State(Arc::new(context)), Bytes::from(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn upstream_rate_limited() {
    let mut context = MockContext::new(Some("sk-test"), None);
    context
        .chat_completion_data_source
        .expect_create_chat_completion()
        .times(1)
        .returning(|_, _| {
            Err(UpstreamError::from_error_object(&json!({
                "status": 429,
                "error": {"message": "rate limited"},
            })))
        });

    let (status, body) = post_chat(
        context,
        r#"{"messages":[{"sender":"user","text":"hello"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"error": "rate limited"}));
}

#[tokio::test]
async fn empty_reply() {
    let mut context = MockContext::new(Some("sk-test"), None);
    context
        .chat_completion_data_source
        .expect_create_chat_completion()
        .times(1)
        .returning(|_, _| Ok(ChatCompletionResponse::with_content("  \n ")));

    let (status, body) = post_chat(
        context,
        r#"{"messages":[{"sender":"user","text":"hello"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"error": EMPTY_REPLY_MESSAGE}));
}

#[tokio::test]
async fn both_datasets_and_history() {
    let mut context = MockContext::new(Some("sk-test"), Some("file-nutrition"));
    context
        .file_data_source
        .expect_retrieve_file_content()
        .with(eq("sk-test"), eq("file-nutrition"))
        .times(1)
        .returning(|_, _| Ok(b"food,kcal\nrice,130".to_vec()));
    context
        .chat_completion_data_source
        .expect_create_chat_completion()
        .withf(|_, request| {
            request.messages
                == vec![
                    ConversationTurn::system(PERSONA_FRAMING),
                    ConversationTurn::system(format!(
                        "{REFERENCE_DATASET_INSTRUCTION}\n\nfood,kcal\nrice,130"
                    )),
                    ConversationTurn::system(format!(
                        "{INLINE_DATASET_INSTRUCTION}\n\ndate,kcal\n2024-05-01,1800"
                    )),
                    ConversationTurn {
                        role: MessageRole::User,
                        content: "How am I doing?".into(),
                    },
                    ConversationTurn {
                        role: MessageRole::Assistant,
                        content: "Share your log.".into(),
                    },
                    ConversationTurn {
                        role: MessageRole::User,
                        content: "See the data.".into(),
                    },
                ]
        })
        .times(1)
        .returning(|_, _| Ok(ChatCompletionResponse::with_content("You are on track.")));

    let (status, body) = post_chat(
        context,
        r#"{
            "messages": [
                {"sender": "user", "text": "How am I doing?"},
                {"sender": "assistant", "text": "Share your log."},
                {"sender": "user", "text": ""},
                {"sender": "assistant", "text": null},
                {"sender": 7, "text": "See the data."}
            ],
            "dataset": "date,kcal\n2024-05-01,1800"
        }"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "You are on track."}));
}
