use crate::{
    source::{Category, TextSource},
    state::{ConversationId, Mode, StateStore},
};

pub const DEFAULT_MAX_ATTEMPTS: usize = 6;
pub const NOTHING_NEW: &str = "I’ve got nothing new… yet!";

/// Picks texts that were not sent recently in a conversation.
pub struct Selector {
    store: StateStore,
    compliments: Box<dyn TextSource>,
    roasts: Box<dyn TextSource>,
    max_attempts: usize,
}

impl Selector {
    pub fn new(
        store: StateStore,
        compliments: Box<dyn TextSource>,
        roasts: Box<dyn TextSource>,
    ) -> Self {
        Self {
            store,
            compliments,
            roasts,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn source(&self, category: Category) -> &dyn TextSource {
        match category {
            Category::Compliment => self.compliments.as_ref(),
            Category::Roast => self.roasts.as_ref(),
        }
    }

    /// Never fails and never returns an empty string. Whatever is returned
    /// is also remembered, including forced repeats and the placeholder.
    pub async fn select_unique(&self, conversation: ConversationId, category: Category) -> String {
        let source = self.source(category);
        let mode = self.store.update(conversation, |state| state.mode);

        let mut accepted = None;
        for _ in 0..self.max_attempts {
            let Some(candidate) = fetch(source, mode).await else {
                continue;
            };

            if self.store.is_new(conversation, &candidate) {
                accepted = Some(candidate);
                break;
            }
        }

        let text = match accepted {
            Some(text) => text,
            None => fetch(source, mode).await.unwrap_or_else(|| {
                log::info!("no {category} available for conversation {conversation}");
                NOTHING_NEW.to_string()
            }),
        };

        self.store.remember(conversation, &text);

        text
    }
}

async fn fetch(source: &dyn TextSource, mode: Mode) -> Option<String> {
    source
        .candidate(mode)
        .await
        .filter(|text| !text.trim().is_empty())
}
