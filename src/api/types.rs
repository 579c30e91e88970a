//! Shared API types: request context, identity context, rate limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::store::{GuardedStore, StoreError};

// ═══════════════════════════════════════════════════════════
// ApiContext: shared across all handlers and middleware
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific state.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        let per_minute = core.config().rate_limit_per_minute;
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(per_minute))),
        }
    }

    /// Run `f` against the guarded store while holding the connection lock.
    ///
    /// The guard lives only inside this call, so handlers never hold it
    /// across an `.await`.
    pub fn with_store<T>(
        &self,
        f: impl FnOnce(&GuardedStore<'_>) -> Result<T, StoreError>,
    ) -> Result<T, ApiError> {
        let conn = self.core.lock_db()?;
        let store = GuardedStore::new(&conn, self.core.events());
        Ok(f(&store)?)
    }
}

// ═══════════════════════════════════════════════════════════
// Identity context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolves to a session.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    pub identity_id: Uuid,
    /// The presented bearer token, kept for sign-out.
    pub token: String,
}

/// Pull `<token>` out of an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: Option<&axum::http::HeaderValue>) -> Option<&str> {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

const HOUR: Duration = Duration::from_secs(3600);
const MINUTE: Duration = Duration::from_secs(60);

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        let per_minute = per_minute.max(1);
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour: per_minute.saturating_mul(10),
            last_sweep: Instant::now(),
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        // Clients that went quiet for an hour are dropped, at most once a minute.
        if now.duration_since(self.last_sweep) >= MINUTE {
            self.windows.retain(|_, entries| {
                entries.retain(|ts| now.duration_since(*ts) < HOUR);
                !entries.is_empty()
            });
            self.last_sweep = now;
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RATE_LIMIT_PER_MINUTE)
    }
}
