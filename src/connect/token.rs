use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::TokenError;

/// A security token issued for one relying party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    value: String,
    relying_party: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        value: impl Into<String>,
        relying_party: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            value: value.into(),
            relying_party: relying_party.into(),
            issued_at,
            expires_at: issued_at + lifetime,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// URI of the service the token is issued for.
    pub fn relying_party(&self) -> &str {
        &self.relying_party
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// What a token is requested with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Password { username: String, password: String },
    /// Delegation from an existing token.
    ParentToken(Token),
}

impl Credentials {
    /// Identity part of a request fingerprint. Never includes the secret.
    pub(crate) fn identity(&self) -> &str {
        match self {
            Self::Password { username, .. } => username,
            Self::ParentToken(token) => token.relying_party(),
        }
    }
}

/// Performs token requests against an identity service.
#[async_trait]
pub trait TokenClient: Send + Sync {
    async fn request_token(
        &self,
        credentials: &Credentials,
        relying_party: &str,
        lifetime_minutes: u32,
    ) -> Result<Token, TokenError>;
}

/// Persists the current token.
pub trait TokenStore: Send + Sync {
    /// Replace the stored token; `None` clears it.
    fn set_token(&self, token: Option<Token>);

    fn get_token(&self) -> Option<Token>;

    /// When the stored token was set, or `None` when nothing is stored.
    fn token_set_time(&self) -> Option<DateTime<Utc>>;
}

/// In-memory [`TokenStore`].
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<(Token, DateTime<Utc>)>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set_token(&self, token: Option<Token>) {
        *self.slot.lock() = token.map(|t| (t, Utc::now()));
    }

    fn get_token(&self) -> Option<Token> {
        self.slot.lock().as_ref().map(|(t, _)| t.clone())
    }

    fn token_set_time(&self) -> Option<DateTime<Utc>> {
        self.slot.lock().as_ref().map(|(_, at)| *at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let issued = Utc::now();
        let token = Token::new("abc", "https://rp.example", issued, Duration::minutes(30));
        assert_eq!(token.expires_at(), issued + Duration::minutes(30));
        assert!(!token.is_expired_at(issued + Duration::minutes(29)));
        assert!(token.is_expired_at(issued + Duration::minutes(30)));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.get_token().is_none());
        assert!(store.token_set_time().is_none());

        let token = Token::new("abc", "rp", Utc::now(), Duration::minutes(5));
        store.set_token(Some(token.clone()));
        assert_eq!(store.get_token(), Some(token));
        assert!(store.token_set_time().is_some());

        store.set_token(None);
        assert!(store.get_token().is_none());
    }

    #[test]
    fn test_token_serializes() {
        let token = Token::new("abc", "rp", Utc::now(), Duration::minutes(5));
        let json = serde_json::to_string(&token).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
