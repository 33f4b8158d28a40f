use std::{collections::VecDeque, fmt, str::FromStr, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

pub const RECENT_CAPACITY: usize = 50;
pub const MAX_COOLDOWN_SECS: u32 = 3600;

pub type ConversationId = u64;

/// Tone used when picking fallback content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Standard,
    Spicy,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Standard => "pg",
            Mode::Spicy => "spicy",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown mode '{0}'")]
pub struct UnknownMode(String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pg" => Ok(Mode::Standard),
            "spicy" => Ok(Mode::Spicy),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Settings a fresh conversation starts with.
#[derive(Clone, Copy, Debug)]
pub struct Defaults {
    pub mode: Mode,
    pub cooldown_secs: u32,
    pub admin_locked: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            mode: Mode::Standard,
            cooldown_secs: 2,
            admin_locked: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    recent: VecDeque<String>,
    pub mode: Mode,
    cooldown_secs: u32,
    pub admin_locked: bool,
    last_sent_at: Option<Instant>,
}

impl ConversationState {
    fn new(defaults: Defaults) -> Self {
        Self {
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
            mode: defaults.mode,
            cooldown_secs: defaults.cooldown_secs.min(MAX_COOLDOWN_SECS),
            admin_locked: defaults.admin_locked,
            last_sent_at: None,
        }
    }

    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    pub fn cooldown_secs(&self) -> u32 {
        self.cooldown_secs
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    /// Clamps into `0..=MAX_COOLDOWN_SECS` and returns the stored value.
    pub fn set_cooldown_secs(&mut self, secs: i64) -> u32 {
        self.cooldown_secs = secs.clamp(0, MAX_COOLDOWN_SECS as i64) as u32;
        self.cooldown_secs
    }

    fn append_to_recent(&mut self, text: &str) {
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }

        self.recent.push_back(normalize(text));
    }

    fn contains(&self, text: &str) -> bool {
        let normalized = normalize(text);

        self.recent.iter().any(|seen| *seen == normalized)
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        let Some(last) = self.last_sent_at else {
            return Duration::ZERO;
        };

        Duration::from_secs(self.cooldown_secs as u64)
            .saturating_sub(now.saturating_duration_since(last))
    }
}

/// Lowercases, collapses whitespace runs and trims.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Owns every conversation's state. Each operation locks only the entry of
/// the conversation it touches, so a single call is atomic per conversation.
#[derive(Debug, Default)]
pub struct StateStore {
    defaults: Defaults,
    conversations: DashMap<ConversationId, ConversationState>,
}

impl StateStore {
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults,
            conversations: DashMap::new(),
        }
    }

    /// Snapshot of the conversation, created with defaults if absent.
    pub fn get(&self, conversation: ConversationId) -> ConversationState {
        self.update(conversation, |state| state.clone())
    }

    /// Runs `f` with exclusive access to the conversation's state.
    pub fn update<R>(
        &self,
        conversation: ConversationId,
        f: impl FnOnce(&mut ConversationState) -> R,
    ) -> R {
        let mut entry = self
            .conversations
            .entry(conversation)
            .or_insert_with(|| ConversationState::new(self.defaults));

        f(entry.value_mut())
    }

    pub fn remember(&self, conversation: ConversationId, text: &str) {
        self.update(conversation, |state| state.append_to_recent(text));
    }

    /// `false` means `text` was sent recently in this conversation.
    pub fn is_new(&self, conversation: ConversationId, text: &str) -> bool {
        self.update(conversation, |state| !state.contains(text))
    }

    pub fn cooldown_remaining(&self, conversation: ConversationId) -> Duration {
        let now = Instant::now();

        self.update(conversation, |state| state.remaining_at(now))
    }

    pub fn stamp(&self, conversation: ConversationId) {
        let now = Instant::now();

        self.update(conversation, |state| state.last_sent_at = Some(now));
    }

    /// Checks the cooldown and stamps in one step. On refusal returns the
    /// time left and leaves the timestamp untouched.
    pub fn begin_send(&self, conversation: ConversationId) -> Result<(), Duration> {
        let now = Instant::now();

        self.update(conversation, |state| {
            let left = state.remaining_at(now);
            if !left.is_zero() {
                return Err(left);
            }

            state.last_sent_at = Some(now);

            Ok(())
        })
    }
}
