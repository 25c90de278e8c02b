use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

/// Tokens live for two minutes server-side; ours expire ten seconds earlier.
pub const TOKEN_LIFETIME: Duration = Duration::seconds(110);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl SessionToken {
    pub fn issued_at(token: String, issued_at: OffsetDateTime) -> Self {
        Self {
            token,
            expires_at: issued_at + TOKEN_LIFETIME,
        }
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Single-slot holder for the current access token.
///
/// The token and its expiry live in one value behind one lock, so a reader never pairs a
/// token with another session's expiry.
#[derive(Debug, Default)]
pub struct TokenManager {
    slot: Mutex<Option<SessionToken>>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.set_token_at(token, OffsetDateTime::now_utc());
    }

    pub fn set_token_at(&self, token: impl Into<String>, issued_at: OffsetDateTime) {
        let entry = SessionToken::issued_at(token.into(), issued_at);
        let mut slot = self.slot.lock();
        tracing::info!(
            target: "luma::auth",
            expires_at = %entry.expires_at,
            "access token stored"
        );
        *slot = Some(entry);
    }

    /// Returns the token if still valid. An expired token is dropped on the way out.
    pub fn valid_token(&self) -> Option<String> {
        self.valid_token_at(OffsetDateTime::now_utc())
    }

    pub fn valid_token_at(&self, now: OffsetDateTime) -> Option<String> {
        let mut slot = self.slot.lock();
        let Some(entry) = slot.as_ref() else {
            tracing::warn!(target: "luma::auth", "no access token available");
            return None;
        };

        if !entry.is_valid_at(now) {
            tracing::warn!(
                target: "luma::auth",
                expired_at = %entry.expires_at,
                now = %now,
                "access token expired"
            );
            *slot = None;
            return None;
        }

        Some(entry.token.clone())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(OffsetDateTime::now_utc())
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|entry| entry.is_valid_at(now))
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        if slot.take().is_some() {
            tracing::info!(target: "luma::auth", "access token invalidated");
        }
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.slot.lock().as_ref().map(|entry| entry.expires_at)
    }
}
