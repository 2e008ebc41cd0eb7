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

use crate::data::openai::{ChatCompletionDataSource, ChatCompletionModel, ChatCompletionRequest};
use crate::error::ChatError;
use crate::model::{CompletionResult, Conversation};
use nutritrack::prelude::*;

pub const COMPLETION_TEMPERATURE: f32 = 0.7;

/// Sends `conversation` as-is and returns the trimmed first candidate.
#[tracing::instrument(skip_all, fields(turns = conversation.len()))]
pub async fn invoke<S>(
    data_source: &S,
    api_key: &str,
    conversation: Conversation,
) -> Result<CompletionResult, ChatError>
where
    S: ChatCompletionDataSource + ?Sized,
{
    let request = ChatCompletionRequest {
        model: ChatCompletionModel::default(),
        temperature: COMPLETION_TEMPERATURE,
        messages: conversation,
    };

    let response = match data_source.create_chat_completion(api_key, &request).await {
        Ok(data) => data,
        Err(e) => {
            error!(?e, "completion failed");
            return Err(e.into());
        }
    };

    let mut choices = response.choices.into_iter();
    let reply = choices
        .next()
        .and_then(|data| {
            if data.finish_reason.as_deref() != Some("stop") {
                info!(finish_reason = ?data.finish_reason, "finish_reason != stop");
            }
            data.message.content
        })
        .map(|data| data.trim().to_owned())
        .unwrap_or_default();

    for entry in choices {
        debug!(index = entry.index, "ignore other candidate");
    }

    if reply.is_empty() {
        warn!("empty reply");
        return Err(ChatError::EmptyReply);
    }

    Ok(CompletionResult { reply })
}
