//! Per-user conversation state.

use std::time::{Duration, Instant};

use lawontip_memory::ChunkPayload;
use serde::{Deserialize, Serialize};

use crate::prompt::Mode;

/// Which page the browser session is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    #[default]
    Landing,
    Chat,
}

/// A document page an answer drew on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source: String,
    pub page: u32,
    /// Best similarity score among the chunks of this page.
    pub score: f32,
}

impl Source {
    #[must_use]
    pub fn citation(&self) -> String {
        format!("{}, page {}", self.source, self.page)
    }

    /// One entry per (file, page), in ranking order.
    #[must_use]
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = (&'a ChunkPayload, f32)>) -> Vec<Self> {
        let mut out: Vec<Self> = Vec::new();
        for (payload, score) in chunks {
            if let Some(existing) = out
                .iter_mut()
                .find(|s| s.source == payload.source && s.page == payload.page)
            {
                existing.score = existing.score.max(score);
            } else {
                out.push(Self {
                    source: payload.source.clone(),
                    page: payload.page,
                    score,
                });
            }
        }
        out
    }
}

/// One user message and the reply shown for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub mode: Mode,
    #[serde(default)]
    pub sources: Vec<Source>,
    /// The reply is an error notice rather than a model answer.
    #[serde(default)]
    pub is_error: bool,
}

/// Ordered buffer of completed turns.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `window` answered turns, oldest first. Error turns are shown in
    /// the transcript but never fed back to the model.
    #[must_use]
    pub fn recent(&self, window: usize) -> Vec<Turn> {
        let answered: Vec<&Turn> = self.turns.iter().filter(|t| !t.is_error).collect();
        let skip = answered.len().saturating_sub(window);
        answered.into_iter().skip(skip).cloned().collect()
    }
}

/// Everything the web interface remembers about one browser session.
#[derive(Debug, Clone)]
pub struct Session {
    pub page: Page,
    pub mode: Mode,
    pub conversation: Conversation,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: Page::default(),
            mode: Mode::default(),
            conversation: Conversation::new(),
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.idle_for() > ttl
    }

    /// Reset the conversation buffer, keeping page and mode.
    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, is_error: bool) -> Turn {
        Turn {
            user: user.into(),
            assistant: format!("re: {user}"),
            mode: Mode::Question,
            sources: Vec::new(),
            is_error,
        }
    }

    #[test]
    fn recent_returns_last_window_oldest_first() {
        let mut c = Conversation::new();
        for u in ["a", "b", "c"] {
            c.push(turn(u, false));
        }
        let recent: Vec<_> = c.recent(2).into_iter().map(|t| t.user).collect();
        assert_eq!(recent, ["b", "c"]);
        assert_eq!(c.recent(10).len(), 3);
        assert!(c.recent(0).is_empty());
    }

    #[test]
    fn recent_skips_error_turns() {
        let mut c = Conversation::new();
        c.push(turn("a", false));
        c.push(turn("b", true));
        let recent: Vec<_> = c.recent(2).into_iter().map(|t| t.user).collect();
        assert_eq!(recent, ["a"]);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn clear_history_empties_buffer() {
        let mut s = Session::new();
        s.page = Page::Chat;
        s.mode = Mode::Scenario;
        s.conversation.push(turn("a", false));
        s.clear_history();
        assert!(s.conversation.is_empty());
        assert!(s.conversation.recent(2).is_empty());
        assert_eq!(s.page, Page::Chat);
        assert_eq!(s.mode, Mode::Scenario);
    }

    #[test]
    fn new_session_starts_on_landing() {
        let s = Session::default();
        assert_eq!(s.page, Page::Landing);
        assert_eq!(s.mode, Mode::Question);
        assert!(!s.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn sources_are_deduplicated_by_page() {
        let p = |source: &str, page, chunk_index| ChunkPayload {
            text: String::new(),
            source: source.into(),
            page,
            chunk_index,
        };
        let a = p("ipc.pdf", 2, 0);
        let b = p("ipc.pdf", 2, 1);
        let c = p("ipc.pdf", 3, 0);
        let sources = Source::from_chunks([(&a, 0.9), (&c, 0.8), (&b, 0.7)]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].citation(), "ipc.pdf, page 2");
        assert!((sources[0].score - 0.9).abs() < f32::EPSILON);
        assert_eq!(sources[1].page, 3);
    }
}
