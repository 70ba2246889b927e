use std::{convert::Infallible, sync::Arc, time::Duration as StdDuration};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::github::AccessGrant;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";
pub const ACCESS_GRANT_KEY: &str = "AccessGrant";
pub const OAUTH_STATE_KEY: &str = "OAuthState";

#[derive(Clone, Debug)]
pub struct SessionData {
    pub values: Map<String, Value>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionData {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(key, %error, "Discarding undecodable session value");
                None
            }
        }
    }

    pub fn access_grant(&self) -> Option<AccessGrant> {
        self.get(ACCESS_GRANT_KEY)
    }
}

/// In-process session storage keyed by the `session_id` cookie. Entries live
/// for `ttl` after their last write and vanish with the process.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, SessionData>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Duration::try_from(ttl).unwrap_or(Duration::HOUR),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self) -> (Uuid, SessionData) {
        let now = OffsetDateTime::now_utc();
        let session_id = Uuid::new_v4();
        let session = SessionData {
            values: Map::new(),
            created_at: now,
            expires_at: now.saturating_add(self.ttl),
        };
        self.sessions.insert(session_id, session.clone());
        debug!(%session_id, "Created session");
        (session_id, session)
    }

    pub fn get(&self, session_id: Uuid) -> Option<SessionData> {
        let entry = self.sessions.get(&session_id)?;
        if entry.expires_at > OffsetDateTime::now_utc() {
            return Some(entry.clone());
        }

        drop(entry);
        debug!(%session_id, "Session expired, evicting");
        self.sessions.remove(&session_id);
        None
    }

    /// Stores `value` under `key` and extends the session's lifetime.
    /// Returns `Ok(false)` when the session does not exist (or has expired).
    pub fn insert<T: Serialize>(
        &self,
        session_id: Uuid,
        key: &str,
        value: &T,
    ) -> Result<bool, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let now = OffsetDateTime::now_utc();
        match self.sessions.get_mut(&session_id) {
            Some(mut session) if session.expires_at > now => {
                session.values.insert(key.to_string(), value);
                session.expires_at = now.saturating_add(self.ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn remove(&self, session_id: Uuid, key: &str) -> Option<Value> {
        self.sessions
            .get_mut(&session_id)
            .and_then(|mut session| session.values.remove(key))
    }

    pub fn access_grant(&self, session_id: Uuid) -> Option<AccessGrant> {
        self.get(session_id)?.access_grant()
    }

    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

pub fn spawn_session_reaper(store: SessionStore, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                info!(purged, remaining = store.len(), "Purged expired sessions");
            }
        }
    })
}

pub fn build_session_cookie(session_id: Uuid, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Session resolved from the request's cookie. `grant` is `None` when there
/// is no session, no grant, or the grant has expired; expired grants are
/// dropped from the store so the next visit starts a fresh authorization.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession {
    pub id: Option<Uuid>,
    pub grant: Option<AccessGrant>,
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(session_id) = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
        else {
            return Ok(CurrentSession::default());
        };

        let Some(session) = state.sessions.get(session_id) else {
            return Ok(CurrentSession::default());
        };

        let grant = match session.access_grant() {
            Some(grant) if grant.is_expired(OffsetDateTime::now_utc()) => {
                info!(%session_id, "Access grant expired, clearing it");
                state.sessions.remove(session_id, ACCESS_GRANT_KEY);
                None
            }
            other => other,
        };

        Ok(CurrentSession {
            id: Some(session_id),
            grant,
        })
    }
}
