use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer + refresh token pair with its UTC expiry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessToken {
    pub bearer: String,
    pub refresh: String,
    pub expires_utc: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(bearer: &str, refresh: &str, expires_utc: Option<DateTime<Utc>>) -> Self {
        Self {
            bearer: bearer.to_string(),
            refresh: refresh.to_string(),
            expires_utc,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bearer.trim().is_empty()
    }

    /// True when both halves are present, so a refresh can be attempted.
    pub fn can_refresh(&self) -> bool {
        !self.bearer.trim().is_empty() && !self.refresh.trim().is_empty()
    }

    /// True when the token expires before `now + lookahead`.
    ///
    /// A token without a known expiry never counts as expiring.
    pub fn expires_within(&self, now: DateTime<Utc>, lookahead: chrono::Duration) -> bool {
        match self.expires_utc {
            Some(exp) => exp - (now + lookahead) < chrono::Duration::zero(),
            None => false,
        }
    }
}

/// The authenticated account behind a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    NoToken,
    Validating,
    Valid,
    Invalid,
}

impl CredentialState {
    pub fn is_valid(&self) -> bool {
        matches!(self, CredentialState::Valid)
    }
}
