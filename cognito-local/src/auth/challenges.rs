//! Pending-challenge bookkeeping: a server-issued `Session` UUID keyed
//! to the username and challenge kind awaiting the client's
//! `RespondToAuthChallenge` follow-up.
//!
//! Sessions are not persisted — they are process-local state, consistent
//! with the emulator's "no distributed operation" non-goal — and are
//! single-use: completing (or mismatching) a challenge removes it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeName {
    NewPasswordRequired,
    SmsMfa,
    SoftwareTokenMfa,
    PasswordVerifier,
}

impl ChallengeName {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NewPasswordRequired => "NEW_PASSWORD_REQUIRED",
            Self::SmsMfa => "SMS_MFA",
            Self::SoftwareTokenMfa => "SOFTWARE_TOKEN_MFA",
            Self::PasswordVerifier => "PASSWORD_VERIFIER",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "NEW_PASSWORD_REQUIRED" => Some(Self::NewPasswordRequired),
            "SMS_MFA" => Some(Self::SmsMfa),
            "SOFTWARE_TOKEN_MFA" => Some(Self::SoftwareTokenMfa),
            "PASSWORD_VERIFIER" => Some(Self::PasswordVerifier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub user_pool_id: String,
    pub client_id: String,
    pub username: Option<String>,
    pub challenge_name: ChallengeName,
    pub created_at: DateTime<Utc>,
}

/// In-memory registry of pending challenges, indexed by `Session`.
#[derive(Default)]
pub struct ChallengeStore {
    sessions: Mutex<HashMap<Uuid, PendingChallenge>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Uuid, challenge: PendingChallenge) {
        self.sessions.lock().unwrap().insert(session, challenge);
    }

    /// Removes and returns the session, making the challenge single-use.
    pub fn take(&self, session: Uuid) -> Option<PendingChallenge> {
        self.sessions.lock().unwrap().remove(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_round_trips() {
        for name in [
            ChallengeName::NewPasswordRequired,
            ChallengeName::SmsMfa,
            ChallengeName::SoftwareTokenMfa,
            ChallengeName::PasswordVerifier,
        ] {
            assert_eq!(ChallengeName::from_wire_name(name.wire_name()), Some(name));
        }
    }

    #[test]
    fn taking_a_session_removes_it() {
        let store = ChallengeStore::new();
        let id = Uuid::new_v4();
        store.insert(
            id,
            PendingChallenge {
                user_pool_id: "us-east-1_abc".to_string(),
                client_id: "c1".to_string(),
                username: Some("alice".to_string()),
                challenge_name: ChallengeName::SoftwareTokenMfa,
                created_at: Utc::now(),
            },
        );
        assert!(store.take(id).is_some());
        assert!(store.take(id).is_none());
    }
}
