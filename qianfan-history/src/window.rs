//! Session windowing over the turn log.
//!
//! Decides, from the flat append-only log, which turns constitute the
//! current conversation: scan back to the most recent session-start marker,
//! cap the window at `max_round` messages, and fail when the session has
//! gone stale. The resulting list is what gets submitted upstream.

use crate::store::TurnStore;
use crate::types::NewTurn;
use qianfan_client::{ChatMessage, Role, Usage};
use qianfan_common::config::HistoryConfig;
use qianfan_common::{Error, Result};
use std::sync::Arc;

/// Prompt text recorded for a bootstrap turn, sent when the user opens a
/// session without saying anything.
pub const BOOTSTRAP_PROMPT: &str = "开始";

/// Reconstructs conversation windows and records completed exchanges.
pub struct SessionWindow {
    store: Arc<TurnStore>,
    config: HistoryConfig,
}

impl SessionWindow {
    pub fn new(store: Arc<TurnStore>, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    /// Resolve the effective message list for a new prompt.
    pub fn resolve(
        &self,
        user_id: &str,
        command: &str,
        prompt: Option<&str>,
    ) -> Result<Vec<ChatMessage>> {
        self.resolve_at(user_id, command, prompt, chrono::Utc::now().timestamp())
    }

    /// Resolve against an explicit notion of "now".
    ///
    /// Read-only: calling this twice with no intervening [`record`] returns
    /// identical results.
    ///
    /// [`record`]: Self::record
    pub fn resolve_at(
        &self,
        user_id: &str,
        command: &str,
        prompt: Option<&str>,
        now: i64,
    ) -> Result<Vec<ChatMessage>> {
        let prompt = match prompt {
            Some(p) => p,
            // Opening a session without a prompt sends the bootstrap turn.
            None if self.config.enabled => {
                return Ok(vec![ChatMessage::user(BOOTSTRAP_PROMPT)]);
            }
            None => return Err(Error::EmptyPrompt),
        };

        if !self.config.enabled {
            return Ok(vec![ChatMessage::user(prompt)]);
        }

        // A session cannot be silently resumed after it has gone stale.
        let min_create_time = now - self.config.round_duration;
        if self
            .store
            .latest_since(user_id, command, min_create_time)?
            .is_none()
        {
            return Err(Error::NoActiveSession {
                command: command.to_string(),
            });
        }

        let Some(start) = self.store.latest_session_start(user_id, command)? else {
            // Active turns but no start marker on record; treat the prompt
            // as a fresh single-turn request.
            return Ok(vec![ChatMessage::user(prompt)]);
        };

        // At most max_round messages total, history plus the new prompt.
        let tail_limit = self.config.max_round.saturating_sub(1) as usize;
        let tail = self
            .store
            .tail_from(user_id, command, start.id, tail_limit)?;

        let mut messages: Vec<ChatMessage> = tail
            .into_iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content,
            })
            .collect();
        messages.push(ChatMessage::user(prompt));

        // Truncation can land on an assistant turn; the message list must
        // open with a user turn.
        if messages.first().is_some_and(|m| m.role != Role::User) {
            messages.remove(0);
        }

        tracing::debug!(
            user_id,
            command,
            window = messages.len(),
            "history resolved"
        );
        Ok(messages)
    }

    /// Record a completed exchange as a user/assistant turn pair.
    ///
    /// Call only after the upstream reported success without requesting
    /// history clearing.
    pub fn record(
        &self,
        user_id: &str,
        command: &str,
        prompt: Option<&str>,
        reply: &str,
        usage: Usage,
    ) -> Result<()> {
        self.record_at(
            user_id,
            command,
            prompt,
            reply,
            usage,
            chrono::Utc::now().timestamp(),
        )
    }

    /// Record with an explicit timestamp.
    ///
    /// The two inserts are not transactional: if the assistant write fails,
    /// the user turn stays in the log and the error surfaces.
    pub fn record_at(
        &self,
        user_id: &str,
        command: &str,
        prompt: Option<&str>,
        reply: &str,
        usage: Usage,
        now: i64,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        // A bootstrap exchange (no prompt) opens a new session.
        let user_turn_id = self.store.insert(&NewTurn {
            user_id: user_id.into(),
            command: command.into(),
            is_session_start: prompt.is_none(),
            role: Role::User,
            content: prompt.unwrap_or(BOOTSTRAP_PROMPT).into(),
            tokens: usage.prompt_tokens,
            created_at: now,
        })?;

        let assistant_turn_id = self.store.insert(&NewTurn {
            user_id: user_id.into(),
            command: command.into(),
            is_session_start: false,
            role: Role::Assistant,
            content: reply.into(),
            tokens: usage.completion_tokens,
            created_at: now,
        })?;

        tracing::debug!(user_turn_id, assistant_turn_id, "exchange recorded");
        Ok(())
    }
}
