use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::{Credentials, Token, TokenClient, TokenError, TokenStore};

type InFlight = Shared<BoxFuture<'static, Result<Token, TokenError>>>;

/// Default token lifetime requested, in minutes.
pub const DEFAULT_LIFETIME_MINUTES: u32 = 60;

/// Hands out tokens for one relying party.
///
/// [`update_token`](Self::update_token) coalesces concurrent callers: while a
/// request for the same fingerprint is running, later callers await that
/// request instead of starting another, and all of them get its result.
/// [`get_token`](Self::get_token) never waits.
pub struct TokenProvider {
    client: Arc<dyn TokenClient>,
    store: Arc<dyn TokenStore>,
    credentials: Option<Credentials>,
    relying_party: String,
    lifetime_minutes: u32,
    in_flight: Mutex<FxHashMap<String, InFlight>>,
}

impl TokenProvider {
    pub fn new(
        client: Arc<dyn TokenClient>,
        store: Arc<dyn TokenStore>,
        credentials: Option<Credentials>,
        relying_party: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            credentials,
            relying_party: relying_party.into(),
            lifetime_minutes: DEFAULT_LIFETIME_MINUTES,
            in_flight: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_lifetime_minutes(mut self, minutes: u32) -> Self {
        self.lifetime_minutes = minutes;
        self
    }

    pub fn relying_party(&self) -> &str {
        &self.relying_party
    }

    /// The stored token, or `None` when there is none or it has expired.
    pub fn get_token(&self) -> Option<Token> {
        self.store.get_token().filter(|t| !t.is_expired())
    }

    /// Request a fresh token and store it.
    pub async fn update_token(&self) -> Result<Token, TokenError> {
        let credentials = self.credentials.clone().ok_or(TokenError::NoCredentials)?;
        let fingerprint = format!(
            "{}|{}|{}",
            credentials.identity(),
            self.relying_party,
            self.lifetime_minutes
        );

        let request = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&fingerprint) {
                Some(running) => {
                    trace!(relying_party = %self.relying_party, "joining token request in flight");
                    running.clone()
                }
                None => {
                    debug!(relying_party = %self.relying_party, "starting token request");
                    let request = self.start_request(credentials).shared();
                    in_flight.insert(fingerprint.clone(), request.clone());
                    request
                }
            }
        };

        let result = request.clone().await;

        // Only the request that finished is removed; a newer one may already be running.
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&fingerprint).is_some_and(|r| r.ptr_eq(&request)) {
            in_flight.remove(&fingerprint);
        }
        result
    }

    fn start_request(&self, credentials: Credentials) -> BoxFuture<'static, Result<Token, TokenError>> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let relying_party = self.relying_party.clone();
        let lifetime = self.lifetime_minutes;
        async move {
            match client.request_token(&credentials, &relying_party, lifetime).await {
                Ok(token) => {
                    store.set_token(Some(token.clone()));
                    Ok(token)
                }
                Err(e) => {
                    warn!(relying_party = %relying_party, error = %e, "token request failed");
                    Err(e)
                }
            }
        }
        .boxed()
    }
}
