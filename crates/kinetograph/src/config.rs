use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Seconds-per-frame, either one of the common presets or an explicit value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps30,
    Fps24,
    Fps15,
    Fps10,
    Fps5,
    Custom { seconds: f64 },
}

const PRESETS: [(FrameRate, f64); 5] = [
    (FrameRate::Fps30, 30.0),
    (FrameRate::Fps24, 24.0),
    (FrameRate::Fps15, 15.0),
    (FrameRate::Fps10, 10.0),
    (FrameRate::Fps5, 5.0),
];

impl FrameRate {
    /// Picks a preset when `fps` matches one, otherwise a custom duration.
    pub fn from_fps(fps: f64) -> Self {
        for (preset, preset_fps) in PRESETS {
            if (fps - preset_fps).abs() < 1e-6 {
                return preset;
            }
        }
        FrameRate::Custom { seconds: 1.0 / fps }
    }

    pub fn frame_duration_secs(&self) -> f64 {
        match self {
            FrameRate::Fps30 => 1.0 / 30.0,
            FrameRate::Fps24 => 1.0 / 24.0,
            FrameRate::Fps15 => 1.0 / 15.0,
            FrameRate::Fps10 => 1.0 / 10.0,
            FrameRate::Fps5 => 1.0 / 5.0,
            FrameRate::Custom { seconds } => *seconds,
        }
    }

    /// Frame duration, or `None` when it is not a finite positive value.
    pub fn frame_duration(&self) -> Option<Duration> {
        let secs = self.frame_duration_secs();
        if !secs.is_finite() || secs <= 0.0 {
            return None;
        }
        let duration = Duration::try_from_secs_f64(secs).ok()?;
        (!duration.is_zero()).then_some(duration)
    }
}

/// Per-media playback configuration, fixed once `prepare_to_animate` runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// `None` takes the frame duration reported by the decoder.
    #[serde(default)]
    pub frame_rate: Option<FrameRate>,
    /// `0` takes the frame count reported by the decoder.
    #[serde(default)]
    pub num_frames: usize,
    /// Total loops to play; `0` loops forever.
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
}

fn default_repeat_count() -> u32 { 1 }

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            num_frames: 0,
            repeat_count: 1,
        }
    }
}

impl MediaConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(rate) = self.frame_rate {
            if rate.frame_duration().is_none() {
                return Err(EngineError::InvalidConfig(format!(
                    "frame duration must be positive, got {}s",
                    rate.frame_duration_secs()
                )));
            }
        }
        Ok(())
    }

    /// Resolves the frame duration, preferring the configured rate over the decoder's hint.
    pub fn resolve_frame_duration(&self, hint: Option<Duration>) -> Result<Duration, EngineError> {
        match self.frame_rate {
            Some(rate) => rate.frame_duration().ok_or_else(|| {
                EngineError::InvalidConfig("frame duration must be positive".to_string())
            }),
            None => hint.filter(|d| !d.is_zero()).ok_or_else(|| {
                EngineError::InvalidConfig(
                    "no frame rate configured and the decoder reports none".to_string(),
                )
            }),
        }
    }

    /// Resolves the frame count against what the decoder actually holds.
    pub fn resolve_num_frames(&self, available: usize) -> Result<usize, EngineError> {
        let wanted = if self.num_frames == 0 {
            available
        } else if self.num_frames > available {
            log::warn!(
                "Configured {} frames but decoder has {}; clamping",
                self.num_frames,
                available
            );
            available
        } else {
            self.num_frames
        };
        if wanted == 0 {
            return Err(EngineError::InvalidConfig("media has no frames".to_string()));
        }
        Ok(wanted)
    }
}
