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

use crate::model::{Conversation, ConversationTurn, IncomingMessage, MessageRole};

pub const PERSONA_FRAMING: &str = concat!(
    "You are NutriTrack, a friendly nutrition assistant focused strictly on food, fitness, and wellbeing. ",
    "Decline any requests unrelated to nutrition, health, or fitness, and politely redirect the user to ask a health-related question instead. ",
    "Offer concise, actionable guidance about meal planning, calorie tracking, macro balance, mindful eating, hydration, and general wellness. ",
    "If additional nutrition data is provided, prefer those values when answering, but keep the response within the nutrition and health domain.",
);

pub const REFERENCE_DATASET_INSTRUCTION: &str = concat!(
    "Here is an excerpt from the stored nutrition reference dataset. Use it when answering questions and cite concrete numbers from it when they are relevant.\n",
    "If the excerpt does not contain relevant information, answer from general guidance.",
);

pub const INLINE_DATASET_INSTRUCTION: &str = "Here is a dataset the user provided in this session. Prefer these values if they conflict with any other source.";

/// Builds the conversation sent to the completion service.
///
/// Order: persona, reference dataset, inline dataset, then the surviving client messages in their
/// original order. An empty reference dataset adds no turn.
pub fn assemble(
    persona_framing: &str,
    cached_snippet: Option<&str>,
    inline_snippet: Option<&str>,
    raw_messages: &[IncomingMessage],
) -> Conversation {
    let mut conversation = Vec::with_capacity(raw_messages.len() + 3);

    conversation.push(ConversationTurn::system(persona_framing));

    if let Some(snippet) = cached_snippet.filter(|data| !data.is_empty()) {
        conversation.push(ConversationTurn::system(format!(
            "{REFERENCE_DATASET_INSTRUCTION}\n\n{snippet}"
        )));
    }

    if let Some(snippet) = inline_snippet {
        conversation.push(ConversationTurn::system(format!(
            "{INLINE_DATASET_INSTRUCTION}\n\n{snippet}"
        )));
    }

    conversation.extend(raw_messages.iter().filter_map(|message| {
        Some(ConversationTurn {
            role: MessageRole::from_sender(message.sender.as_ref()),
            content: message.text_content()?.to_owned(),
        })
    }));

    conversation
}
