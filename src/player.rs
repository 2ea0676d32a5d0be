/// Playback state of the active media session, persisted as an integer code.
///
/// Codes mirror the usual media-session state set. An out-of-range stored
/// code decodes as `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
    FastForwarding,
    Rewinding,
    Buffering,
    Error,
}

impl PlaybackState {
    pub fn code(self) -> i32 {
        match self {
            PlaybackState::Stopped => 1,
            PlaybackState::Paused => 2,
            PlaybackState::Playing => 3,
            PlaybackState::FastForwarding => 4,
            PlaybackState::Rewinding => 5,
            PlaybackState::Buffering => 6,
            PlaybackState::Error => 7,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PlaybackState::Stopped,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Playing,
            4 => PlaybackState::FastForwarding,
            5 => PlaybackState::Rewinding,
            6 => PlaybackState::Buffering,
            7 => PlaybackState::Error,
            _ => PlaybackState::Stopped,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
            PlaybackState::FastForwarding => "fast-forwarding",
            PlaybackState::Rewinding => "rewinding",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Error => "error",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "stopped" => Some(PlaybackState::Stopped),
            "paused" => Some(PlaybackState::Paused),
            "playing" => Some(PlaybackState::Playing),
            "fast-forwarding" => Some(PlaybackState::FastForwarding),
            "rewinding" => Some(PlaybackState::Rewinding),
            "buffering" => Some(PlaybackState::Buffering),
            "error" => Some(PlaybackState::Error),
            _ => None,
        }
    }
}

/// Expansion state of the now-playing panel. Decodes to `Hidden` on an
/// unknown code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    Expanded,
    Collapsed,
    #[default]
    Hidden,
}

impl PanelState {
    pub fn code(self) -> i32 {
        match self {
            PanelState::Expanded => 3,
            PanelState::Collapsed => 4,
            PanelState::Hidden => 5,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            3 => PanelState::Expanded,
            4 => PanelState::Collapsed,
            5 => PanelState::Hidden,
            _ => PanelState::Hidden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepTimerState {
    #[default]
    Stopped,
    Running,
}

impl SleepTimerState {
    pub fn code(self) -> i32 {
        match self {
            SleepTimerState::Stopped => 0,
            SleepTimerState::Running => 1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => SleepTimerState::Running,
            _ => SleepTimerState::Stopped,
        }
    }
}

/// Snapshot of the current playback session, persisted key-by-key through the
/// preferences facade. The playback controller owns the in-memory copy; this
/// struct only describes what gets stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub episode_media_id: String,
    pub playback_state: PlaybackState,
    pub playback_position: i64,
    pub episode_duration: i64,
    pub playback_speed: f32,
    pub up_next_media_id: String,
    pub panel_state: PanelState,
    pub sleep_timer_state: SleepTimerState,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            episode_media_id: String::new(),
            playback_state: PlaybackState::Stopped,
            playback_position: 0,
            episode_duration: 0,
            playback_speed: 1.0,
            up_next_media_id: String::new(),
            panel_state: PanelState::Hidden,
            sleep_timer_state: SleepTimerState::Stopped,
        }
    }
}

impl PlayerState {
    pub fn has_active_episode(&self) -> bool {
        !self.episode_media_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_state_codes_round_trip() {
        let all = [
            PlaybackState::Stopped,
            PlaybackState::Paused,
            PlaybackState::Playing,
            PlaybackState::FastForwarding,
            PlaybackState::Rewinding,
            PlaybackState::Buffering,
            PlaybackState::Error,
        ];
        for state in all {
            assert_eq!(PlaybackState::from_code(state.code()), state);
        }
    }

    #[test]
    fn playback_state_unknown_code_falls_back_to_stopped() {
        assert_eq!(PlaybackState::from_code(0), PlaybackState::Stopped);
        assert_eq!(PlaybackState::from_code(42), PlaybackState::Stopped);
        assert_eq!(PlaybackState::from_code(-1), PlaybackState::Stopped);
    }

    #[test]
    fn playback_state_labels_round_trip() {
        for label in [
            "stopped",
            "paused",
            "playing",
            "fast-forwarding",
            "rewinding",
            "buffering",
            "error",
        ] {
            let state = PlaybackState::from_label(label).expect("label should parse");
            assert_eq!(state.label(), label);
        }
        assert!(PlaybackState::from_label("loitering").is_none());
    }

    #[test]
    fn panel_state_codes_round_trip() {
        for state in [PanelState::Expanded, PanelState::Collapsed, PanelState::Hidden] {
            assert_eq!(PanelState::from_code(state.code()), state);
        }
        assert_eq!(PanelState::from_code(0), PanelState::Hidden);
        assert_eq!(PanelState::from_code(6), PanelState::Hidden);
    }

    #[test]
    fn sleep_timer_codes_round_trip() {
        assert_eq!(SleepTimerState::from_code(0), SleepTimerState::Stopped);
        assert_eq!(SleepTimerState::from_code(1), SleepTimerState::Running);
        assert_eq!(SleepTimerState::from_code(99), SleepTimerState::Stopped);
    }

    #[test]
    fn default_player_state_is_empty() {
        let state = PlayerState::default();
        assert!(state.episode_media_id.is_empty());
        assert_eq!(state.playback_state, PlaybackState::Stopped);
        assert_eq!(state.playback_position, 0);
        assert_eq!(state.episode_duration, 0);
        assert!((state.playback_speed - 1.0).abs() < f32::EPSILON);
        assert!(state.up_next_media_id.is_empty());
        assert_eq!(state.panel_state, PanelState::Hidden);
        assert_eq!(state.sleep_timer_state, SleepTimerState::Stopped);
        assert!(!state.has_active_episode());
    }
}
