use std::fmt;

use serde::Serialize;

/// A decoded frame ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self { data, width, height }
    }

    /// Single-colour frame, mostly useful for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self { data, width, height }
    }
}

/// Authoritative playback state of a media item.
///
/// `Prepping` remembers a `start_animator` call made before resources were
/// ready; `Stopped` remembers whether the media ever reached `Ready`, which
/// decides whether it may be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Allocated,
    Loaded,
    Prepping { start_when_ready: bool },
    Ready,
    Animating,
    Stopped { ever_ready: bool, done: bool },
    Paused,
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Allocated => "allocated",
            PlaybackState::Loaded => "loaded",
            PlaybackState::Prepping { .. } => "prepping",
            PlaybackState::Ready => "ready",
            PlaybackState::Animating => "animating",
            PlaybackState::Stopped { .. } => "stopped",
            PlaybackState::Paused => "paused",
        }
    }

    /// True once the state has been `Ready` at least once.
    pub fn is_ready_to_animate(&self) -> bool {
        match self {
            PlaybackState::Ready | PlaybackState::Animating | PlaybackState::Paused => true,
            PlaybackState::Stopped { ever_ready, .. } => *ever_ready,
            _ => false,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle notifications, one per state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "detail", rename_all = "snake_case")]
pub enum LifecycleEvent {
    PreparedToAnimate,
    DidStart,
    DidStop,
    DidPause,
    DidUnpause,
    /// All requested loops played, or `done_animator` was called.
    Done,
    /// Resources could not be loaded; the media stays in `Prepping`.
    LoadFailed(String),
}

/// Read-only diagnostics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MediaStatus {
    pub state: PlaybackState,
    pub current_frame: usize,
    pub num_frames: usize,
    pub frame_duration_secs: f64,
    pub elapsed_secs: f64,
    pub loops_completed: u32,
    pub repeated_frame_count: usize,
    pub decode_failures: usize,
    pub reporting_from_fallback_clock: bool,
    pub has_audio: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_fills_every_pixel() {
        let frame = DecodedFrame::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(frame.data.len(), 2 * 3 * 4);
        assert!(frame.data.chunks(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn ready_flag_is_sticky_through_stopped() {
        assert!(!PlaybackState::Loaded.is_ready_to_animate());
        assert!(!PlaybackState::Prepping { start_when_ready: true }.is_ready_to_animate());
        assert!(PlaybackState::Paused.is_ready_to_animate());
        assert!(PlaybackState::Stopped { ever_ready: true, done: false }.is_ready_to_animate());
        assert!(!PlaybackState::Stopped { ever_ready: false, done: true }.is_ready_to_animate());
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_string(&PlaybackState::Stopped { ever_ready: true, done: false })
            .unwrap();
        assert_eq!(json, r#"{"state":"stopped","ever_ready":true,"done":false}"#);
    }

    #[test]
    fn display_uses_short_name() {
        assert_eq!(PlaybackState::Prepping { start_when_ready: false }.to_string(), "prepping");
    }
}
