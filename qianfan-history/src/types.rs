//! Turn log row types.

use qianfan_client::Role;

/// One recorded message (user prompt or assistant reply) with metadata.
///
/// Turns for a `(user_id, command)` pair form a strictly increasing
/// sequence by `id`, interpretable as chronological order. Once written, a
/// turn is never mutated or deleted.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Monotonic sequence number assigned by the store
    pub id: i64,
    pub user_id: String,
    pub command: String,
    /// Marks the first user turn of a session
    pub is_session_start: bool,
    pub role: Role,
    pub content: String,
    /// Token count reported by the upstream usage accounting
    pub tokens: i64,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// A turn awaiting insertion; the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub user_id: String,
    pub command: String,
    pub is_session_start: bool,
    pub role: Role,
    pub content: String,
    pub tokens: i64,
    pub created_at: i64,
}
