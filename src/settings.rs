//! Admin-gated mutation of per-conversation settings.
//!
//! `mode` and `cooldown` may be changed by anyone while the admin lock is
//! off. The lock itself can only ever be flipped by an admin.

use crate::state::{ConversationId, Mode, StateStore};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("only admins can change {0} right now")]
    PermissionDenied(&'static str),
    #[error("usage: {0}")]
    InvalidArgument(&'static str),
}

pub const MODE_USAGE: &str = "/mode pg|spicy";
pub const COOLDOWN_USAGE: &str = "/cooldown <seconds>";
pub const ADMIN_LOCK_USAGE: &str = "/admin_lock on|off";

pub fn can_mutate(store: &StateStore, conversation: ConversationId, actor_is_admin: bool) -> bool {
    !store.update(conversation, |state| state.admin_locked) || actor_is_admin
}

pub fn can_toggle_lock(actor_is_admin: bool) -> bool {
    actor_is_admin
}

pub fn parse_mode(arg: &str) -> Result<Mode, SettingsError> {
    arg.trim()
        .parse()
        .map_err(|_| SettingsError::InvalidArgument(MODE_USAGE))
}

/// Integers too large for `i64` saturate, they get clamped later anyway.
pub fn parse_cooldown(arg: &str) -> Result<i64, SettingsError> {
    let arg = arg.trim();
    if let Ok(secs) = arg.parse() {
        return Ok(secs);
    }

    let (negative, digits) = match arg.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, arg.strip_prefix('+').unwrap_or(arg)),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SettingsError::InvalidArgument(COOLDOWN_USAGE));
    }

    Ok(if negative { i64::MIN } else { i64::MAX })
}

pub fn parse_toggle(arg: &str) -> Result<bool, SettingsError> {
    match arg.trim().to_lowercase().as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(SettingsError::InvalidArgument(ADMIN_LOCK_USAGE)),
    }
}

pub fn set_mode(
    store: &StateStore,
    conversation: ConversationId,
    arg: &str,
    actor_is_admin: bool,
) -> Result<Mode, SettingsError> {
    if !can_mutate(store, conversation, actor_is_admin) {
        return Err(SettingsError::PermissionDenied("the mode"));
    }

    let mode = parse_mode(arg)?;
    store.update(conversation, |state| state.mode = mode);

    Ok(mode)
}

/// Reading is gated like writing: a locked-out member sees a refusal.
pub fn current_cooldown(
    store: &StateStore,
    conversation: ConversationId,
    actor_is_admin: bool,
) -> Result<u32, SettingsError> {
    if !can_mutate(store, conversation, actor_is_admin) {
        return Err(SettingsError::PermissionDenied("the cooldown"));
    }

    Ok(store.update(conversation, |state| state.cooldown_secs()))
}

/// Returns the stored value after clamping to `0..=3600`.
pub fn set_cooldown(
    store: &StateStore,
    conversation: ConversationId,
    arg: &str,
    actor_is_admin: bool,
) -> Result<u32, SettingsError> {
    if !can_mutate(store, conversation, actor_is_admin) {
        return Err(SettingsError::PermissionDenied("the cooldown"));
    }

    let secs = parse_cooldown(arg)?;

    Ok(store.update(conversation, |state| state.set_cooldown_secs(secs)))
}

pub fn set_admin_lock(
    store: &StateStore,
    conversation: ConversationId,
    arg: &str,
    actor_is_admin: bool,
) -> Result<bool, SettingsError> {
    if !can_toggle_lock(actor_is_admin) {
        return Err(SettingsError::PermissionDenied("admin_lock"));
    }

    let locked = parse_toggle(arg)?;
    store.update(conversation, |state| state.admin_locked = locked);

    Ok(locked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Defaults;

    const CHAT: ConversationId = 1;

    fn store(admin_locked: bool) -> StateStore {
        StateStore::new(Defaults {
            admin_locked,
            ..Defaults::default()
        })
    }

    #[test]
    fn can_mutate_truth_table() {
        assert!(can_mutate(&store(false), CHAT, false));
        assert!(can_mutate(&store(false), CHAT, true));
        assert!(!can_mutate(&store(true), CHAT, false));
        assert!(can_mutate(&store(true), CHAT, true));
    }

    #[test]
    fn lock_toggle_is_admin_only_even_when_unlocked() {
        let store = store(false);

        assert_eq!(
            set_admin_lock(&store, CHAT, "on", false),
            Err(SettingsError::PermissionDenied("admin_lock"))
        );
        assert!(!store.get(CHAT).admin_locked);

        assert_eq!(set_admin_lock(&store, CHAT, "ON", true), Ok(true));
        assert!(store.get(CHAT).admin_locked);
    }

    #[test]
    fn locked_mode_change_is_refused_before_parsing() {
        let store = store(true);

        assert_eq!(
            set_mode(&store, CHAT, "garbage", false),
            Err(SettingsError::PermissionDenied("the mode"))
        );
        assert_eq!(
            set_mode(&store, CHAT, "garbage", true),
            Err(SettingsError::InvalidArgument(MODE_USAGE))
        );
    }

    #[test]
    fn unlocked_members_can_change_mode() {
        let store = store(false);

        assert_eq!(set_mode(&store, CHAT, "spicy", false), Ok(Mode::Spicy));
        assert_eq!(store.get(CHAT).mode, Mode::Spicy);
    }

    #[test]
    fn cooldown_is_parsed_and_clamped() {
        let store = store(true);

        assert_eq!(set_cooldown(&store, CHAT, "10", true), Ok(10));
        assert_eq!(set_cooldown(&store, CHAT, "-3", true), Ok(0));
        assert_eq!(set_cooldown(&store, CHAT, "7200", true), Ok(3600));
        assert_eq!(
            set_cooldown(&store, CHAT, "soon", true),
            Err(SettingsError::InvalidArgument(COOLDOWN_USAGE))
        );
        assert_eq!(store.get(CHAT).cooldown_secs(), 3600);
    }

    #[test]
    fn cooldown_read_follows_the_lock() {
        let locked = store(true);
        assert_eq!(
            current_cooldown(&locked, CHAT, false),
            Err(SettingsError::PermissionDenied("the cooldown"))
        );
        assert_eq!(current_cooldown(&locked, CHAT, true), Ok(2));

        let unlocked = store(false);
        assert_eq!(current_cooldown(&unlocked, CHAT, false), Ok(2));
    }

    #[test]
    fn oversized_cooldown_saturates() {
        assert_eq!(parse_cooldown("99999999999999999999999"), Ok(i64::MAX));
        assert_eq!(parse_cooldown("-99999999999999999999999"), Ok(i64::MIN));
        assert!(parse_cooldown("-").is_err());
        assert!(parse_cooldown("").is_err());
    }

    #[test]
    fn toggle_rejects_unknown_words() {
        assert_eq!(
            parse_toggle("maybe"),
            Err(SettingsError::InvalidArgument(ADMIN_LOCK_USAGE))
        );
    }
}
