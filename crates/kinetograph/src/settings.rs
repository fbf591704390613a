use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine tuning, persisted at `<config_dir>/kinetograph/settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    /// How often the prep timer polls the resource loader.
    #[serde(default = "default_prep_poll_ms")]
    pub prep_poll_ms: u64,
    /// Delay between `start_animator` and the first decode.
    #[serde(default)]
    pub ready_delay_ms: u64,
    /// Decode-ahead cadence is `frame_duration / decode_ahead_divisor`.
    #[serde(default = "default_decode_ahead_divisor")]
    pub decode_ahead_divisor: u32,
    /// Consecutive decode failures tolerated before playback stops.
    #[serde(default = "default_max_decode_retries")]
    pub max_decode_retries: u32,
    /// A loop ends `frame_duration / end_tolerance_divisor` before the nominal end.
    #[serde(default = "default_end_tolerance_divisor")]
    pub end_tolerance_divisor: u32,
}

fn default_version() -> u32 { 1 }
fn default_prep_poll_ms() -> u64 { 50 }
fn default_decode_ahead_divisor() -> u32 { 2 }
fn default_max_decode_retries() -> u32 { 3 }
fn default_end_tolerance_divisor() -> u32 { 10 }

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: 1,
            prep_poll_ms: default_prep_poll_ms(),
            ready_delay_ms: 0,
            decode_ahead_divisor: default_decode_ahead_divisor(),
            max_decode_retries: default_max_decode_retries(),
            end_tolerance_divisor: default_end_tolerance_divisor(),
        }
    }
}

impl EngineSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kinetograph").join("settings.json"))
    }

    /// Load from the user config dir, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("No config directory on this platform"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn prep_poll_interval(&self) -> Duration {
        Duration::from_millis(self.prep_poll_ms.max(1))
    }

    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }

    pub fn decode_interval(&self, frame_duration: Duration) -> Duration {
        (frame_duration / self.decode_ahead_divisor.max(1)).max(Duration::from_millis(1))
    }

    pub fn end_tolerance(&self, frame_duration: Duration) -> Duration {
        frame_duration / self.end_tolerance_divisor.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = EngineSettings::default();
        assert_eq!(s.prep_poll_ms, 50);
        assert_eq!(s.decode_ahead_divisor, 2);
        assert_eq!(s.max_decode_retries, 3);
        assert_eq!(s.ready_delay(), Duration::ZERO);
    }

    #[test]
    fn decode_interval_runs_faster_than_display() {
        let s = EngineSettings::default();
        let frame = Duration::from_millis(100);
        assert_eq!(s.decode_interval(frame), Duration::from_millis(50));
        assert_eq!(s.end_tolerance(frame), Duration::from_millis(10));
    }

    #[test]
    fn zero_divisors_do_not_divide_by_zero() {
        let s = EngineSettings {
            decode_ahead_divisor: 0,
            end_tolerance_divisor: 0,
            ..EngineSettings::default()
        };
        let frame = Duration::from_millis(40);
        assert_eq!(s.decode_interval(frame), frame);
        assert_eq!(s.end_tolerance(frame), frame);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: EngineSettings = serde_json::from_str(r#"{"max_decode_retries": 7}"#).unwrap();
        assert_eq!(s.max_decode_retries, 7);
        assert_eq!(s.prep_poll_ms, 50);
        assert_eq!(s.version, 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = EngineSettings {
            ready_delay_ms: 120,
            ..EngineSettings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EngineSettings::load_from(&path), s);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(EngineSettings::load_from(&path), EngineSettings::default());
    }
}
