//! Chat request shaping: persona placement and sampling overrides.

use qianfan_client::{ChatMessage, ChatRequest, SamplingParams};
use qianfan_common::Config;

/// Assemble the upstream request for a resolved message window.
///
/// ERNIE-Bot models on their standard routes accept a dedicated `system`
/// field; every other model, and any custom endpoint, gets the persona
/// prepended to the first user message instead. Each branch builds the
/// request in one piece.
pub fn shape_chat_request(
    config: &Config,
    messages: Vec<ChatMessage>,
    user_id: &str,
) -> ChatRequest {
    let endpoint = config.custom_endpoint().map(str::to_string);
    let sampling = SamplingParams::resolve(config.temperature, config.top_p);

    if config.model.is_ernie() && endpoint.is_none() {
        ChatRequest {
            model: config.model,
            endpoint,
            messages,
            sampling,
            penalty_score: Some(config.penalty_score),
            system: (!config.system.is_empty()).then(|| config.system.clone()),
            user_id: Some(user_id.to_string()),
        }
    } else {
        ChatRequest {
            model: config.model,
            endpoint,
            messages: prepend_persona(messages, &config.system),
            sampling,
            penalty_score: Some(config.penalty_score),
            system: None,
            user_id: Some(user_id.to_string()),
        }
    }
}

/// Fold the persona text into the first message of the window.
fn prepend_persona(mut messages: Vec<ChatMessage>, persona: &str) -> Vec<ChatMessage> {
    if persona.is_empty() {
        return messages;
    }
    if let Some(first) = messages.first_mut() {
        first.content = format!("{persona}\n\n{}", first.content);
    }
    messages
}
