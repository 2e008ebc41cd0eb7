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

use crate::error::{DatasetFetchError, UpstreamError};
use crate::model::ConversationTurn;
use async_trait::async_trait;
use nutritrack::prelude::*;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

#[cfg_attr(any(test, feature = "test-helpers"), mockall::automock)]
#[async_trait]
pub trait FileDataSource {
    /// Raw content of a stored file.
    async fn retrieve_file_content(
        &self,
        api_key: &str,
        file_id: &str,
    ) -> Result<Vec<u8>, DatasetFetchError>;
}

pub trait GetFileDataSource {
    type DataSource: FileDataSource + Send + Sync;

    fn get_file_data_source(&self) -> &Self::DataSource;
}

#[cfg_attr(any(test, feature = "test-helpers"), mockall::automock)]
#[async_trait]
pub trait ChatCompletionDataSource {
    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, UpstreamError>;
}

pub trait GetChatCompletionDataSource {
    type DataSource: ChatCompletionDataSource + Send + Sync;

    fn get_chat_completion_data_source(&self) -> &Self::DataSource;
}

/// Data structure for https://platform.openai.com/docs/api-reference/chat/create
/// ref. [ChatCompletionResponse]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: ChatCompletionModel,
    pub temperature: f32,
    pub messages: Vec<ConversationTurn>,
}

/// ref. [ChatCompletionRequest]
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub enum ChatCompletionModel {
    #[serde(rename = "gpt-4o-mini")]
    #[default]
    GPT4oMini,
}

/// ref. [ChatCompletionRequest]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ChatCompletionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ChatCompletionChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ChatCompletionChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ChatCompletionChoiceMessage {
    pub content: Option<String>,
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatCompletionResponse {
    /// Shorthand for a response carrying one candidate.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionChoiceMessage {
                    content: Some(content.into()),
                },
                finish_reason: Some("stop".into()),
            }],
        }
    }
}

/// HTTP client for the OpenAI REST API.
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    organization_id: Option<String>,
}

impl OpenAiClient {
    /// `base_url` must end with `/`, e.g. `https://api.openai.com/v1/`.
    pub fn new(client: Client, base_url: Url, organization_id: Option<String>) -> Self {
        Self {
            client,
            base_url,
            organization_id,
        }
    }

    fn prepare_headers(&self, api_key: &str) -> Fallible<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut api_key = format!("Bearer {api_key}").parse::<HeaderValue>()?;
        api_key.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, api_key);

        if let Some(organization_id) = &self.organization_id {
            headers.insert("OpenAI-Organization", organization_id.parse()?);
        }

        Ok(headers)
    }

    fn endpoint(&self, segments: &[&str]) -> Fallible<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl FileDataSource for OpenAiClient {
    #[tracing::instrument(skip(self, api_key))]
    async fn retrieve_file_content(
        &self,
        api_key: &str,
        file_id: &str,
    ) -> Result<Vec<u8>, DatasetFetchError> {
        let url = self
            .endpoint(&["files", file_id, "content"])
            .map_err(DatasetFetchError::Prepare)?;
        let headers = self
            .prepare_headers(api_key)
            .map_err(DatasetFetchError::Prepare)?;

        let res = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(DatasetFetchError::Transport)?;
        debug!(status = %res.status());

        let status = res.status();
        if !status.is_success() {
            return Err(DatasetFetchError::Status {
                status: status.as_u16(),
                body: read_text_lossy(res).await,
            });
        }

        let bytes = res.bytes().await.map_err(DatasetFetchError::Transport)?;
        debug!(len = bytes.len(), "retrieved");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ChatCompletionDataSource for OpenAiClient {
    #[tracing::instrument(skip_all)]
    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, UpstreamError> {
        let url = self
            .endpoint(&["chat", "completions"])
            .map_err(UpstreamError::from_exception)?;
        let headers = self
            .prepare_headers(api_key)
            .map_err(UpstreamError::from_exception)?;

        let res = self
            .client
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = res.status();
        let text = res.text().await.map_err(UpstreamError::from_transport)?;
        trace!(%text);

        if !status.is_success() {
            return Err(UpstreamError::from_response(status.as_u16(), &text));
        }

        serde_json::from_str::<ChatCompletionResponse>(&text).map_err(UpstreamError::from_exception)
    }
}

async fn read_text_lossy(res: Response) -> String {
    res.text().await.unwrap_or_else(|e| format!("{:?}", e))
}
