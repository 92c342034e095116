use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use lawontip_core::Session;
use uuid::Uuid;

use crate::server::AppState;

pub const SESSION_COOKIE: &str = "lawontip_session";
const MAX_SESSIONS: usize = 10_000;

type Entry = Arc<tokio::sync::Mutex<Session>>;

/// Browser sessions keyed by cookie id. Each session has its own lock so a
/// session's turns run one at a time while different sessions proceed
/// concurrently. Idle sessions are swept whenever a session is looked up;
/// when the store is full the least recently seen idle session is evicted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Entry>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_sessions: MAX_SESSIONS,
        }
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// Return the live session for `id`, or create a fresh one. The flag is
    /// true when a new session was created.
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Entry, bool) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        // A session that is locked is in use and therefore not idle.
        sessions.retain(|_, s| s.try_lock().map_or(true, |s| !s.is_expired(self.ttl)));
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "expired sessions removed");
        }

        if let Some(id) = id
            && let Some(existing) = sessions.get(&id)
        {
            return (id, Arc::clone(existing), false);
        }

        if sessions.len() >= self.max_sessions {
            evict_stalest(&mut sessions);
        }
        let id = Uuid::new_v4();
        let entry = Arc::new(tokio::sync::Mutex::new(Session::new()));
        sessions.insert(id, Arc::clone(&entry));
        tracing::debug!(session = %id, active = sessions.len(), "session created");
        (id, entry, true)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_stalest(sessions: &mut HashMap<Uuid, Entry>) {
    let stalest = sessions
        .iter()
        .filter_map(|(id, s)| s.try_lock().ok().map(|s| (*id, s.idle_for())))
        .max_by_key(|(_, idle)| *idle)
        .map(|(id, _)| id);
    match stalest {
        Some(id) => {
            sessions.remove(&id);
            tracing::debug!(session = %id, "session evicted, store full");
        }
        None => tracing::warn!(active = sessions.len(), "session store full and every session busy"),
    }
}

/// The caller's session, resolved from the `lawontip_session` cookie.
pub(crate) struct SessionHandle {
    pub id: Uuid,
    pub session: Entry,
    pub created: bool,
}

impl SessionHandle {
    /// Attach the session cookie to `response` if the session is new.
    pub fn attach(&self, mut response: Response) -> Response {
        if self.created
            && let Ok(value) = HeaderValue::from_str(&format!(
                "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
                self.id
            ))
        {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }
}

impl FromRequestParts<AppState> for SessionHandle {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (id, session, created) = state.sessions.get_or_create(session_id(&parts.headers));
        Ok(Self {
            id,
            session,
            created,
        })
    }
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use lawontip_core::{Mode, Page};

    use super::*;

    #[test]
    fn unknown_id_creates_new_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, _, created) = store.get_or_create(Some(Uuid::new_v4()));
        assert!(created);
        let (again, _, created) = store.get_or_create(Some(id));
        assert_eq!(again, id);
        assert!(!created);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (a, sa, _) = store.get_or_create(None);
        let (b, sb, _) = store.get_or_create(None);
        assert_ne!(a, b);
        sa.lock().await.mode = Mode::Scenario;
        assert_eq!(sb.lock().await.mode, Mode::Question);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(20));
        let (id, session, _) = store.get_or_create(None);
        session.lock().await.page = Page::Chat;
        drop(session);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (new_id, fresh, created) = store.get_or_create(Some(id));
        assert!(created);
        assert_ne!(new_id, id);
        assert_eq!(fresh.lock().await.page, Page::Landing);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn full_store_evicts_least_recently_seen() {
        let store = SessionStore::new(Duration::from_secs(60)).with_max_sessions(2);
        let (a, sa, _) = store.get_or_create(None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (b, _, _) = store.get_or_create(None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        sa.lock().await.touch();

        let (c, _, created) = store.get_or_create(None);
        assert!(created);
        assert_eq!(store.len(), 2);
        assert!(!store.get_or_create(Some(a)).2);
        assert!(!store.get_or_create(Some(c)).2);
        assert!(store.get_or_create(Some(b)).2);
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let store = SessionStore::new(Duration::from_secs(60)).with_max_sessions(1);
        let (a, sa, _) = store.get_or_create(None);
        let guard = sa.lock().await;
        store.get_or_create(None);
        assert_eq!(store.len(), 2);
        drop(guard);
        assert!(!store.get_or_create(Some(a)).2);
    }

    #[test]
    fn cookie_is_parsed_among_others() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; other=1")).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));

        let mut bad = HeaderMap::new();
        bad.insert(COOKIE, HeaderValue::from_static("lawontip_session=not-a-uuid"));
        assert_eq!(session_id(&bad), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }
}
