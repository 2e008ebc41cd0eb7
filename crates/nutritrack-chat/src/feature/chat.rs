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

use crate::config::ChatConfig;
use crate::data::dataset_cache::GetDatasetCache;
use crate::data::openai::{GetChatCompletionDataSource, GetFileDataSource};
use crate::error::ChatError;
use crate::feature::completion::invoke;
use crate::feature::context::{PERSONA_FRAMING, assemble};
use crate::model::{ChatRequest, CompletionResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use nutritrack::prelude::*;
use std::sync::Arc;

pub trait GetChatConfig {
    fn get_chat_config(&self) -> &ChatConfig;
}

/// Everything a chat request needs from the process.
pub trait ChatContext:
    GetChatConfig
    + GetDatasetCache
    + GetFileDataSource
    + GetChatCompletionDataSource
    + Send
    + Sync
    + 'static
{
}

impl<T> ChatContext for T where
    T: GetChatConfig
        + GetDatasetCache
        + GetFileDataSource
        + GetChatCompletionDataSource
        + Send
        + Sync
        + 'static
{
}

pub fn create_router<Ctx: ChatContext>(context: Arc<Ctx>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler::<Ctx>))
        .with_state(context)
}

pub async fn chat_handler<Ctx: ChatContext>(
    State(context): State<Arc<Ctx>>,
    body: Bytes,
) -> Response {
    match handle_chat(&*context, &body).await {
        Ok(data) => Json(data).into_response(),
        Err(e) => {
            let failure = e.into_failure();
            info!(
                status = failure.status_code,
                message = %failure.message,
                "chat request failed",
            );
            failure.into_response()
        }
    }
}

/// Configuration check, body parsing, dataset lookup, assembly and the completion call, in this
/// order. The first failure wins.
#[tracing::instrument(skip_all, fields(body_len = body.len()))]
pub async fn handle_chat<Ctx: ChatContext>(
    context: &Ctx,
    body: &[u8],
) -> Result<CompletionResult, ChatError> {
    let config = context.get_chat_config();
    let api_key = config.api_key.as_deref().ok_or(ChatError::Configuration)?;

    let request = ChatRequest::from_slice(body)?;
    debug!(
        messages = request.messages.len(),
        inline_dataset = request.dataset.is_some(),
    );

    let cached_snippet = context
        .get_dataset_cache()
        .resolve(
            context.get_file_data_source(),
            api_key,
            config.data_file_id.as_deref(),
        )
        .await;

    let conversation = assemble(
        PERSONA_FRAMING,
        cached_snippet.as_deref(),
        request.dataset.as_deref(),
        &request.messages,
    );

    invoke(
        context.get_chat_completion_data_source(),
        api_key,
        conversation,
    )
    .await
}
