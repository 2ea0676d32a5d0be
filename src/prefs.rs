//! Typed load/save accessors over the settings store.
//!
//! Stateless pass-through: every `load_*` returns a documented default when
//! the key is absent, every `save_*` writes a single key. Cross-key
//! consistency is the caller's problem, not this module's.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::debug;

use crate::db::{Episode, episode_for_media_id};
use crate::player::{PanelState, PlaybackState, PlayerState, SleepTimerState};
use crate::store::{ChangeListener, ListenerId, SettingsStore};

const PREF_CURRENT_MEDIA_ID: &str = "current-media-id";
const PREF_UP_NEXT_MEDIA_ID: &str = "up-next-media-id";
const PREF_CURRENT_PLAYBACK_STATE: &str = "current-playback-state";
const PREF_PLAYER_PLAYBACK_SPEED: &str = "player-playback-speed";
const PREF_PLAYER_EPISODE_MEDIA_ID: &str = "player-episode-media-id";
const PREF_PLAYER_PLAYBACK_STATE: &str = "player-playback-state";
const PREF_PLAYER_PLAYBACK_POSITION: &str = "player-playback-position";
const PREF_PLAYER_EPISODE_DURATION: &str = "player-episode-duration";
const PREF_PLAYER_PANEL_STATE: &str = "player-panel-state";
const PREF_PLAYER_SLEEP_TIMER_STATE: &str = "player-sleep-timer-state";
const PREF_LAST_UPDATE_COLLECTION: &str = "last-update-collection";
const PREF_COLLECTION_MODIFICATION_DATE: &str = "collection-modification-date";
const PREF_ACTIVE_DOWNLOADS: &str = "active-downloads";
const PREF_KEEP_DEBUG_LOG: &str = "keep-debug-log";
const PREF_HOUSEKEEPING_NECESSARY: &str = "one-time-housekeeping-necessary";

pub fn load_current_media_id(store: &SettingsStore) -> Result<String> {
    store.get_string(PREF_CURRENT_MEDIA_ID, "")
}

pub fn save_current_media_id(store: &SettingsStore, media_id: &str) -> Result<()> {
    store.set_string(PREF_CURRENT_MEDIA_ID, media_id)
}

pub fn load_up_next_media_id(store: &SettingsStore) -> Result<String> {
    store.get_string(PREF_UP_NEXT_MEDIA_ID, "")
}

pub fn save_up_next_media_id(store: &SettingsStore, media_id: &str) -> Result<()> {
    store.set_string(PREF_UP_NEXT_MEDIA_ID, media_id)
}

pub fn load_player_playback_state(store: &SettingsStore) -> Result<PlaybackState> {
    let code = store.get_i32(PREF_CURRENT_PLAYBACK_STATE, PlaybackState::Stopped.code())?;
    Ok(PlaybackState::from_code(code))
}

pub fn save_player_playback_state(store: &SettingsStore, state: PlaybackState) -> Result<()> {
    store.set_i32(PREF_CURRENT_PLAYBACK_STATE, state.code())
}

pub fn load_player_playback_speed(store: &SettingsStore) -> Result<f32> {
    store.get_f32(PREF_PLAYER_PLAYBACK_SPEED, 1.0)
}

pub fn save_player_playback_speed(store: &SettingsStore, speed: f32) -> Result<()> {
    store.set_f32(PREF_PLAYER_PLAYBACK_SPEED, speed)
}

pub fn load_last_update_collection(store: &SettingsStore) -> Result<DateTime<Utc>> {
    let raw = store.get_string(PREF_LAST_UPDATE_COLLECTION, "")?;
    Ok(parse_rfc2822_or_epoch(&raw))
}

pub fn save_last_update_collection(store: &SettingsStore, date: DateTime<Utc>) -> Result<()> {
    store.set_string(PREF_LAST_UPDATE_COLLECTION, &date.to_rfc2822())
}

pub fn load_collection_modification_date(store: &SettingsStore) -> Result<DateTime<Utc>> {
    let raw = store.get_string(PREF_COLLECTION_MODIFICATION_DATE, "")?;
    Ok(parse_rfc2822_or_epoch(&raw))
}

pub fn save_collection_modification_date(store: &SettingsStore, date: DateTime<Utc>) -> Result<()> {
    store.set_string(PREF_COLLECTION_MODIFICATION_DATE, &date.to_rfc2822())
}

/// Ids of episodes the background download worker is currently fetching,
/// stored as a JSON array. Garbage or absence loads as the empty set.
pub fn load_active_downloads(store: &SettingsStore) -> Result<Vec<i64>> {
    let raw = store.get_string(PREF_ACTIVE_DOWNLOADS, "[]")?;
    let ids: Vec<i64> = serde_json::from_str(&raw).unwrap_or_default();
    debug!("ids of active downloads: {ids:?}");
    Ok(ids)
}

pub fn save_active_downloads(store: &SettingsStore, ids: &[i64]) -> Result<()> {
    store.set_string(PREF_ACTIVE_DOWNLOADS, &serde_json::to_string(ids)?)
}

pub fn load_keep_debug_log(store: &SettingsStore) -> Result<bool> {
    store.get_bool(PREF_KEEP_DEBUG_LOG, false)
}

pub fn save_keep_debug_log(store: &SettingsStore, keep: bool) -> Result<()> {
    store.set_bool(PREF_KEEP_DEBUG_LOG, keep)
}

/// One-time housekeeping runs until a worker clears the flag.
pub fn is_housekeeping_necessary(store: &SettingsStore) -> Result<bool> {
    store.get_bool(PREF_HOUSEKEEPING_NECESSARY, true)
}

pub fn save_housekeeping_necessary_state(store: &SettingsStore, state: bool) -> Result<()> {
    store.set_bool(PREF_HOUSEKEEPING_NECESSARY, state)
}

pub fn load_player_state(store: &SettingsStore) -> Result<PlayerState> {
    let defaults = PlayerState::default();
    Ok(PlayerState {
        episode_media_id: store.get_string(PREF_PLAYER_EPISODE_MEDIA_ID, "")?,
        playback_state: PlaybackState::from_code(
            store.get_i32(PREF_PLAYER_PLAYBACK_STATE, defaults.playback_state.code())?,
        ),
        playback_position: store.get_i64(PREF_PLAYER_PLAYBACK_POSITION, 0)?,
        episode_duration: store.get_i64(PREF_PLAYER_EPISODE_DURATION, 0)?,
        playback_speed: store.get_f32(PREF_PLAYER_PLAYBACK_SPEED, 1.0)?,
        up_next_media_id: store.get_string(PREF_UP_NEXT_MEDIA_ID, "")?,
        panel_state: PanelState::from_code(
            store.get_i32(PREF_PLAYER_PANEL_STATE, defaults.panel_state.code())?,
        ),
        sleep_timer_state: SleepTimerState::from_code(
            store.get_i32(PREF_PLAYER_SLEEP_TIMER_STATE, defaults.sleep_timer_state.code())?,
        ),
    })
}

pub fn save_player_state(store: &SettingsStore, state: &PlayerState) -> Result<()> {
    store.set_string(PREF_PLAYER_EPISODE_MEDIA_ID, &state.episode_media_id)?;
    store.set_i32(PREF_PLAYER_PLAYBACK_STATE, state.playback_state.code())?;
    store.set_i64(PREF_PLAYER_PLAYBACK_POSITION, state.playback_position)?;
    store.set_i64(PREF_PLAYER_EPISODE_DURATION, state.episode_duration)?;
    store.set_f32(PREF_PLAYER_PLAYBACK_SPEED, state.playback_speed)?;
    store.set_string(PREF_UP_NEXT_MEDIA_ID, &state.up_next_media_id)?;
    store.set_i32(PREF_PLAYER_PANEL_STATE, state.panel_state.code())?;
    store.set_i32(PREF_PLAYER_SLEEP_TIMER_STATE, state.sleep_timer_state.code())?;
    Ok(())
}

/// Resets the persisted snapshot to defaults when the episode it references
/// no longer has a playable audio location.
///
/// A media id missing from the collection resolves to an empty record whose
/// `audio` is also empty, so no separate existence check is made; the
/// empty-audio rule covers both cases. Silent self-heal, never an error.
pub fn update_player_state(
    store: &SettingsStore,
    episodes: &[Episode],
    player_state: Option<PlayerState>,
) -> Result<()> {
    let state = match player_state {
        Some(state) => state,
        None => load_player_state(store)?,
    };
    if episode_for_media_id(episodes, &state.episode_media_id).audio.is_empty() {
        debug!(
            "resetting player state, media id `{}` has no playable audio",
            state.episode_media_id
        );
        save_player_state(store, &PlayerState::default())?;
    }
    Ok(())
}

pub fn register_change_listener(store: &SettingsStore, listener: ChangeListener) -> ListenerId {
    store.register_change_listener(listener)
}

pub fn unregister_change_listener(store: &SettingsStore, id: ListenerId) {
    store.unregister_change_listener(id);
}

fn parse_rfc2822_or_epoch(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(raw)
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
