use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// The identity a recommendation request is personalized for
///
/// Exactly one identifier partitions events and cached results. An
/// authenticated user always takes precedence over the session that
/// carried the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    User(String),
    Session(String),
}

impl Actor {
    /// Picks the partition key from the request's identifiers
    pub fn resolve(user_id: Option<String>, session_id: Option<String>) -> AppResult<Self> {
        let non_blank = |id: Option<String>| id.filter(|s| !s.trim().is_empty());

        match (non_blank(user_id), non_blank(session_id)) {
            (Some(user), _) => Ok(Actor::User(user)),
            (None, Some(session)) => Ok(Actor::Session(session)),
            (None, None) => Err(AppError::InvalidRequest(
                "User ID or Session ID required".to_string(),
            )),
        }
    }

    /// Key used to partition the event window and the result cache
    pub fn key(&self) -> &str {
        match self {
            Actor::User(id) | Actor::Session(id) => id,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::User(id) => Some(id),
            Actor::Session(_) => None,
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
