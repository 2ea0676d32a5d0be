mod format;


use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use log::{LevelFilter, debug};

use crate::cli::{Cli, Command};
use crate::db::{Database, Episode, episode_for_media_id};
use crate::paths::{database_file_path, settings_file_path};
use crate::player::{PlaybackState, PlayerState};
use crate::prefs;
use crate::store::SettingsStore;

use self::format::{format_position, format_progress, format_publication_date, truncate};

pub fn run(cli: Cli) -> Result<()> {
    let store = open_settings()?;
    init_logger(prefs::load_keep_debug_log(&store)?);
    let db = open_db()?;

    let listener = prefs::register_change_listener(
        &store,
        Box::new(|key| debug!("setting `{key}` changed")),
    );

    run_housekeeping(&db, &store)?;

    let outcome = match cli.command {
        Some(Command::List) => run_list(&db),
        Some(Command::Add {
            guid,
            title,
            podcast_id,
            description,
            audio,
            cover,
            small_cover,
            publication_date,
            remote_audio,
            remote_cover,
        }) => run_add(
            &db,
            &store,
            Episode {
                podcast_id,
                guid,
                title,
                description,
                audio,
                cover,
                small_cover,
                publication_date,
                remote_audio_file_location: remote_audio,
                remote_cover_file_location: remote_cover,
                ..Episode::default()
            },
        ),
        Some(Command::Mark {
            guid,
            position,
            state,
            duration,
        }) => run_mark(&db, &store, &guid, position, &state, duration),
        Some(Command::Queue { guid }) => run_queue(&db, &store, &guid),
        Some(Command::Speed { value }) => run_speed(&store, value),
        Some(Command::Download { guid }) => run_download(&db, &store, &guid),
        Some(Command::Downloaded { guid }) => run_downloaded(&db, &store, &guid),
        Some(Command::Delete { guid }) => run_delete(&db, &store, &guid),
        Some(Command::DebugLog { enabled }) => run_debug_log(&store, enabled),
        Some(Command::Status) | None => run_status(&db, &store),
    };

    prefs::unregister_change_listener(&store, listener);
    outcome
}

/// One-time repair pass, flagged until it has run once.
fn run_housekeeping(db: &Database, store: &SettingsStore) -> Result<()> {
    if !prefs::is_housekeeping_necessary(store)? {
        return Ok(());
    }
    debug!("running one-time housekeeping");
    let episodes = db.list_episodes()?;
    prefs::update_player_state(store, &episodes, None)?;
    prefs::save_housekeeping_necessary_state(store, false)?;
    Ok(())
}

fn run_status(db: &Database, store: &SettingsStore) -> Result<()> {
    let episodes = db.list_episodes()?;
    prefs::update_player_state(store, &episodes, None)?;

    let state = prefs::load_player_state(store)?;
    if state.has_active_episode() {
        let episode = episode_for_media_id(&episodes, &state.episode_media_id);
        println!("Now playing:");
        println!("  Title: {}", episode.title);
        println!("  State: {}", state.playback_state.label());
        println!(
            "  Progress: {}",
            format_progress(state.playback_position, state.episode_duration)
        );
        println!("  Speed: {}x", state.playback_speed);
        let up_next_id = prefs::load_up_next_media_id(store)?;
        if !up_next_id.is_empty() {
            let up_next = episode_for_media_id(&episodes, &up_next_id);
            println!("  Up next: {}", up_next.title);
        }
    } else {
        let last_media_id = prefs::load_current_media_id(store)?;
        let last = episode_for_media_id(&episodes, &last_media_id);
        if last.guid.is_empty() {
            println!("Nothing playing yet. Run `podtrack mark <guid> --position <ms>` first.");
        } else {
            println!("Nothing playing. Last played:");
            println!("  Title: {}", last.title);
            println!("  State: {}", prefs::load_player_playback_state(store)?.label());
            println!(
                "  Progress: {}",
                format_progress(last.playback_position, last.duration)
            );
        }
    }

    let active = prefs::load_active_downloads(store)?;
    if !active.is_empty() {
        println!("Active downloads: {}", active.len());
    }
    print_date_line("Collection updated", prefs::load_last_update_collection(store)?);
    print_date_line(
        "Collection modified",
        prefs::load_collection_modification_date(store)?,
    );
    Ok(())
}

fn print_date_line(label: &str, date: DateTime<Utc>) {
    if date != DateTime::UNIX_EPOCH {
        println!("{label}: {}", date.format("%Y-%m-%d %H:%M %Z"));
    }
}

fn run_list(db: &Database) -> Result<()> {
    let episodes = db.list_episodes()?;
    if episodes.is_empty() {
        println!("No episodes yet. Run `podtrack add` first.");
        return Ok(());
    }

    println!(
        "{:<28} {:<40} {:<12} {:<12} {:<10}",
        "GUID", "TITLE", "PUBLISHED", "STATE", "POSITION"
    );
    for episode in episodes {
        println!(
            "{:<28} {:<40} {:<12} {:<12} {:<10}",
            truncate(&episode.guid, 28),
            truncate(&episode.title, 40),
            format_publication_date(episode.publication_date),
            episode.playback_state.label(),
            format_position(episode.playback_position)
        );
    }
    Ok(())
}

fn run_add(db: &Database, store: &SettingsStore, episode: Episode) -> Result<()> {
    let id = db.insert_episode(&episode)?;
    let now = Utc::now();
    prefs::save_last_update_collection(store, now)?;
    prefs::save_collection_modification_date(store, now)?;
    println!("Added episode {} (id {id})", episode.guid);
    Ok(())
}

fn run_mark(
    db: &Database,
    store: &SettingsStore,
    guid: &str,
    position: i64,
    state_label: &str,
    duration: Option<i64>,
) -> Result<()> {
    let Some(state) = PlaybackState::from_label(state_label) else {
        bail!("unknown playback state `{state_label}`");
    };
    let Some(episode) = db.episode_by_guid(guid)? else {
        println!("No episode with guid `{guid}`. Run `podtrack list` to see the collection.");
        return Ok(());
    };

    let duration = duration.unwrap_or(episode.duration);
    db.update_playback_progress(guid, state, position, duration)?;
    prefs::save_current_media_id(store, guid)?;
    prefs::save_player_playback_state(store, state)?;

    let snapshot = prefs::load_player_state(store)?;
    if let Some(updated) = progress_snapshot(&snapshot, guid, state, position, duration) {
        prefs::save_player_state(store, &updated)?;
    }

    println!(
        "Marked {}: {} at {}",
        episode.title,
        state.label(),
        format_progress(position, duration)
    );
    Ok(())
}

fn run_queue(db: &Database, store: &SettingsStore, guid: &str) -> Result<()> {
    let Some(episode) = db.episode_by_guid(guid)? else {
        println!("No episode with guid `{guid}`. Run `podtrack list` to see the collection.");
        return Ok(());
    };
    if episode.audio.is_empty() {
        println!("{} has no audio yet and cannot be queued.", episode.title);
        return Ok(());
    }

    prefs::save_up_next_media_id(store, guid)?;
    println!("Up next: {}", episode.title);
    Ok(())
}

fn run_speed(store: &SettingsStore, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("playback speed must be a positive number, got {value}");
    }
    prefs::save_player_playback_speed(store, value)?;
    println!("Playback speed set to {value}x");
    Ok(())
}

fn run_download(db: &Database, store: &SettingsStore, guid: &str) -> Result<()> {
    let Some(episode) = db.episode_by_guid(guid)? else {
        println!("No episode with guid `{guid}`. Run `podtrack list` to see the collection.");
        return Ok(());
    };

    let mut active = prefs::load_active_downloads(store)?;
    if !active.contains(&episode.id) {
        active.push(episode.id);
        prefs::save_active_downloads(store, &active)?;
    }
    println!("Download started for {}", episode.title);
    Ok(())
}

fn run_downloaded(db: &Database, store: &SettingsStore, guid: &str) -> Result<()> {
    let Some(episode) = db.episode_by_guid(guid)? else {
        println!("No episode with guid `{guid}`. Run `podtrack list` to see the collection.");
        return Ok(());
    };

    db.set_manually_downloaded(guid, true)?;
    let mut active = prefs::load_active_downloads(store)?;
    active.retain(|id| *id != episode.id);
    prefs::save_active_downloads(store, &active)?;
    println!("Download finished for {}", episode.title);
    Ok(())
}

fn run_delete(db: &Database, store: &SettingsStore, guid: &str) -> Result<()> {
    if !db.set_manually_deleted(guid, true)? {
        println!("No episode with guid `{guid}`. Run `podtrack list` to see the collection.");
        return Ok(());
    }

    // deletion may orphan the player snapshot
    let episodes = db.list_episodes()?;
    prefs::update_player_state(store, &episodes, None)?;
    println!("Deleted audio for `{guid}`; it will not be re-downloaded.");
    Ok(())
}

fn run_debug_log(store: &SettingsStore, enabled: bool) -> Result<()> {
    prefs::save_keep_debug_log(store, enabled)?;
    println!(
        "Debug logging {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// The snapshot tracks a marked episode when it is already the current one or
/// when nothing is currently playing.
pub(crate) fn progress_snapshot(
    snapshot: &PlayerState,
    guid: &str,
    state: PlaybackState,
    position: i64,
    duration: i64,
) -> Option<PlayerState> {
    if snapshot.has_active_episode() && snapshot.episode_media_id != guid {
        return None;
    }
    Some(PlayerState {
        episode_media_id: guid.to_string(),
        playback_state: state,
        playback_position: position,
        episode_duration: duration,
        ..snapshot.clone()
    })
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn open_settings() -> Result<SettingsStore> {
    let settings_path = settings_file_path()?;
    SettingsStore::open(&settings_path)
}

fn init_logger(verbose: bool) {
    let mut builder = colog::default_builder();
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    builder.filter(None, level);
    let _ = builder.try_init();
}
