use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioTrack;

/// Elapsed playback time since start, net of paused intervals.
pub trait ClockSource {
    fn elapsed(&self) -> Duration;
}

/// Wall-clock driven clock. Timestamps are sampled at tick boundaries;
/// between samples the reading does not move.
#[derive(Debug, Clone, Default)]
pub struct FallbackClock {
    simulated_start: Option<Duration>,
    simulated_now: Duration,
    /// Position the clock was (re)started from.
    base: Duration,
    /// Accumulated paused time.
    pause_offset: Duration,
    paused_at: Option<Duration>,
}

impl FallbackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: Duration) {
        *self = Self {
            simulated_start: Some(now),
            simulated_now: now,
            ..Self::default()
        };
    }

    pub fn sample(&mut self, now: Duration) {
        if self.paused_at.is_none() {
            self.simulated_now = self.simulated_now.max(now);
        }
    }

    pub fn pause(&mut self, now: Duration) {
        if self.paused_at.is_some() {
            return;
        }
        self.sample(now);
        self.paused_at = Some(self.simulated_now);
    }

    pub fn unpause(&mut self, now: Duration) {
        if let Some(at) = self.paused_at.take() {
            self.pause_offset += now.saturating_sub(at);
            self.simulated_now = self.simulated_now.max(now);
        }
    }

    /// Moves the reading to `position`, keeping the paused flag.
    pub fn seek(&mut self, position: Duration, now: Duration) {
        let paused = self.paused_at.is_some();
        self.start(now);
        self.base = position;
        if paused {
            self.paused_at = Some(now);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_started(&self) -> bool {
        self.simulated_start.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause_offset(&self) -> Duration {
        self.pause_offset
    }
}

impl ClockSource for FallbackClock {
    fn elapsed(&self) -> Duration {
        let Some(start) = self.simulated_start else {
            return self.base;
        };
        let wall = self.simulated_now.saturating_sub(start);
        self.base + wall.saturating_sub(self.pause_offset)
    }
}

/// Clock that reads the position of the playing audio track.
///
/// The pause offset here is whatever the track drifted while the engine was
/// paused, which is zero for a player that honours `pause`.
pub struct AudioClock {
    track: Arc<dyn AudioTrack>,
    pause_offset: Duration,
    position_at_pause: Option<Duration>,
    player_fallback_start: Option<Duration>,
    player_fallback_now: Duration,
}

impl AudioClock {
    pub fn new(track: Arc<dyn AudioTrack>) -> Self {
        Self {
            track,
            pause_offset: Duration::ZERO,
            position_at_pause: None,
            player_fallback_start: None,
            player_fallback_now: Duration::ZERO,
        }
    }

    pub fn start(&mut self, now: Duration) {
        self.pause_offset = Duration::ZERO;
        self.position_at_pause = None;
        self.player_fallback_start = Some(now);
        self.player_fallback_now = now;
    }

    pub fn sample(&mut self, now: Duration) {
        if self.position_at_pause.is_none() {
            self.player_fallback_now = self.player_fallback_now.max(now);
        }
    }

    pub fn pause(&mut self) {
        if self.position_at_pause.is_none() {
            self.position_at_pause = Some(self.track.position());
        }
    }

    pub fn unpause(&mut self) {
        if let Some(at) = self.position_at_pause.take() {
            self.pause_offset += self.track.position().saturating_sub(at);
        }
    }

    /// Call after seeking the track itself.
    pub fn seek(&mut self, position: Duration) {
        self.pause_offset = Duration::ZERO;
        if self.position_at_pause.is_some() {
            self.position_at_pause = Some(position);
        }
    }

    pub fn reset(&mut self) {
        self.pause_offset = Duration::ZERO;
        self.position_at_pause = None;
        self.player_fallback_start = None;
        self.player_fallback_now = Duration::ZERO;
    }

    pub fn raw_position(&self) -> Duration {
        self.track.position()
    }

    /// Wall time the track has been playing for, excluding nothing.
    pub fn wall_time_playing(&self) -> Duration {
        self.player_fallback_start
            .map(|start| self.player_fallback_now.saturating_sub(start))
            .unwrap_or(Duration::ZERO)
    }
}

impl ClockSource for AudioClock {
    fn elapsed(&self) -> Duration {
        self.track.position().saturating_sub(self.pause_offset)
    }
}

/// The authoritative clock used by the scheduler.
///
/// Runs the fallback clock alongside the audio clock so switching between
/// them is seamless. Readings are taken in `sample` and held until the next
/// sample, and never decrease between restarts.
pub struct PlaybackClock {
    fallback: FallbackClock,
    audio: Option<AudioClock>,
    report_from_fallback: bool,
    pause_time_interval: Option<Duration>,
    frames_decoded: usize,
    current: Duration,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            fallback: FallbackClock::new(),
            audio: None,
            report_from_fallback: false,
            pause_time_interval: None,
            frames_decoded: 0,
            current: Duration::ZERO,
        }
    }

    pub fn set_audio(&mut self, track: Option<Arc<dyn AudioTrack>>) {
        self.audio = track.map(AudioClock::new);
        self.report_from_fallback = false;
    }

    pub fn start(&mut self, now: Duration) {
        self.fallback.start(now);
        if let Some(audio) = &mut self.audio {
            audio.start(now);
        }
        self.report_from_fallback = false;
        self.pause_time_interval = None;
        self.frames_decoded = 0;
        self.current = Duration::ZERO;
    }

    pub fn is_started(&self) -> bool {
        self.fallback.is_started()
    }

    pub fn is_paused(&self) -> bool {
        self.fallback.is_paused()
    }

    /// Counts a successful decode in the current loop.
    pub fn note_decoded(&mut self) {
        self.frames_decoded += 1;
    }

    pub fn sample(&mut self, now: Duration) {
        self.fallback.sample(now);
        if let Some(audio) = &mut self.audio {
            audio.sample(now);
        }
        let reading = self.read();
        self.current = self.current.max(reading);
    }

    fn read(&mut self) -> Duration {
        let Some(audio) = &self.audio else {
            return self.fallback.elapsed();
        };
        if self.report_from_fallback {
            return self.fallback.elapsed();
        }
        // A zero position after decoding has begun means the track is not
        // really advancing (e.g. it is no longer than the decode latency).
        if audio.raw_position().is_zero()
            && self.frames_decoded >= 2
            && !audio.wall_time_playing().is_zero()
            && !self.fallback.is_paused()
        {
            log::warn!(
                "Audio clock reported zero after {} decoded frames; timing from fallback clock",
                self.frames_decoded
            );
            self.report_from_fallback = true;
            return self.fallback.elapsed();
        }
        audio.elapsed()
    }

    /// Hands timing to the fallback clock, continuing from the last audio
    /// reading so the picture neither jumps nor stalls.
    pub fn switch_to_fallback(&mut self, reason: &str, now: Duration) {
        if self.audio.is_none() || self.report_from_fallback {
            return;
        }
        self.sample(now);
        log::info!(
            "Timing from fallback clock at {:.3}s: {reason}",
            self.current.as_secs_f64()
        );
        self.report_from_fallback = true;
        self.fallback.seek(self.current, now);
    }

    /// Lets the audio track drive timing again, e.g. after seeking back
    /// into a finished track.
    pub fn resume_audio_timing(&mut self) {
        if self.audio.is_some() && self.report_from_fallback {
            log::debug!("Timing from audio clock again");
            self.report_from_fallback = false;
        }
    }

    pub fn reports_from_fallback(&self) -> bool {
        self.report_from_fallback
    }

    pub fn pause(&mut self, now: Duration) {
        if self.fallback.is_paused() {
            return;
        }
        self.sample(now);
        self.pause_time_interval = Some(self.current);
        self.fallback.pause(now);
        if let Some(audio) = &mut self.audio {
            audio.pause();
        }
    }

    pub fn unpause(&mut self, now: Duration) {
        self.fallback.unpause(now);
        if let Some(audio) = &mut self.audio {
            audio.unpause();
        }
        self.pause_time_interval = None;
    }

    /// Elapsed time captured when the clock was paused.
    pub fn pause_time_interval(&self) -> Option<Duration> {
        self.pause_time_interval
    }

    /// Jumps to `position`. The audio track must be seeked by the caller.
    pub fn seek(&mut self, position: Duration, now: Duration) {
        self.fallback.seek(position, now);
        if let Some(audio) = &mut self.audio {
            audio.seek(position);
        }
        if self.pause_time_interval.is_some() {
            self.pause_time_interval = Some(position);
        }
        self.current = position;
    }

    /// Back to zero, not running.
    pub fn reset(&mut self) {
        self.fallback.reset();
        if let Some(audio) = &mut self.audio {
            audio.reset();
        }
        self.report_from_fallback = false;
        self.pause_time_interval = None;
        self.frames_decoded = 0;
        self.current = Duration::ZERO;
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for PlaybackClock {
    fn elapsed(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTrack;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fallback_measures_wall_time_since_start() {
        let mut clock = FallbackClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        clock.start(ms(1000));
        clock.sample(ms(1350));
        assert_eq!(clock.elapsed(), ms(350));
    }

    #[test]
    fn fallback_excludes_paused_interval() {
        let mut clock = FallbackClock::new();
        clock.start(ms(0));
        clock.pause(ms(300));
        clock.sample(ms(900));
        assert_eq!(clock.elapsed(), ms(300));
        clock.unpause(ms(1000));
        assert_eq!(clock.elapsed(), ms(300));
        assert_eq!(clock.pause_offset(), ms(700));
        clock.sample(ms(1100));
        assert_eq!(clock.elapsed(), ms(400));
    }

    #[test]
    fn fallback_seek_while_paused_stays_paused() {
        let mut clock = FallbackClock::new();
        clock.start(ms(0));
        clock.pause(ms(500));
        clock.seek(ms(200), ms(600));
        clock.sample(ms(800));
        assert_eq!(clock.elapsed(), ms(200));
        clock.unpause(ms(900));
        clock.sample(ms(1000));
        assert_eq!(clock.elapsed(), ms(300));
    }

    #[test]
    fn audio_clock_follows_track_position() {
        let track = Arc::new(ScriptedTrack::new(ms(2000)));
        let mut clock = AudioClock::new(track.clone());
        clock.start(ms(0));
        track.set_position(ms(420));
        assert_eq!(clock.elapsed(), ms(420));
    }

    #[test]
    fn audio_drift_during_pause_is_excluded() {
        let track = Arc::new(ScriptedTrack::new(ms(2000)));
        let mut clock = AudioClock::new(track.clone());
        clock.start(ms(0));
        track.set_position(ms(300));
        clock.pause();
        // A player that keeps running while paused.
        track.set_position(ms(450));
        clock.unpause();
        assert_eq!(clock.elapsed(), ms(300));
    }

    #[test]
    fn playback_clock_uses_audio_when_available() {
        let track = Arc::new(ScriptedTrack::new(ms(2000)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track.clone()));
        clock.start(ms(0));
        track.set_position(ms(180));
        clock.sample(ms(200));
        assert_eq!(clock.elapsed(), ms(180));
        assert!(!clock.reports_from_fallback());
    }

    #[test]
    fn playback_clock_never_goes_backwards_under_jitter() {
        let track = Arc::new(ScriptedTrack::new(ms(2000)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track.clone()));
        clock.start(ms(0));
        track.set_position(ms(250));
        clock.sample(ms(250));
        track.set_position(ms(240));
        clock.sample(ms(260));
        assert_eq!(clock.elapsed(), ms(250));
    }

    #[test]
    fn zero_audio_reading_after_decoding_switches_to_fallback() {
        let track = Arc::new(ScriptedTrack::new(Duration::ZERO));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track));
        clock.start(ms(0));
        clock.note_decoded();
        clock.sample(ms(50));
        assert!(!clock.reports_from_fallback());

        clock.note_decoded();
        clock.sample(ms(100));
        assert!(clock.reports_from_fallback());
        assert_eq!(clock.elapsed(), ms(100));
    }

    #[test]
    fn zero_reading_at_start_instant_is_trusted() {
        let track = Arc::new(ScriptedTrack::new(ms(1000)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track));
        clock.start(ms(500));
        clock.note_decoded();
        clock.note_decoded();
        clock.sample(ms(500));
        assert!(!clock.reports_from_fallback());
    }

    #[test]
    fn pause_records_interval_and_resumes_without_jump() {
        let mut clock = PlaybackClock::new();
        clock.start(ms(0));
        clock.pause(ms(330));
        assert_eq!(clock.pause_time_interval(), Some(ms(330)));
        clock.unpause(ms(5000));
        clock.sample(ms(5000));
        assert_eq!(clock.elapsed(), ms(330));
        assert_eq!(clock.pause_time_interval(), None);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = PlaybackClock::new();
        clock.start(ms(0));
        clock.sample(ms(700));
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert!(!clock.is_started());
    }

    #[test]
    fn restart_clears_fallback_switch() {
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(Arc::new(ScriptedTrack::new(ms(1000)))));
        clock.start(ms(0));
        clock.switch_to_fallback("test", ms(10));
        assert!(clock.reports_from_fallback());
        clock.start(ms(1000));
        assert!(!clock.reports_from_fallback());
    }

    #[test]
    fn fallback_continues_from_lagging_audio() {
        let track = Arc::new(ScriptedTrack::new(ms(500)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track.clone()));
        clock.start(ms(0));
        track.set_position(ms(440));
        clock.sample(ms(600));
        assert_eq!(clock.elapsed(), ms(440));

        clock.switch_to_fallback("audio finished", ms(640));
        assert_eq!(clock.elapsed(), ms(440));
        clock.sample(ms(700));
        assert_eq!(clock.elapsed(), ms(500));
    }

    #[test]
    fn switch_while_paused_holds_until_unpause() {
        let track = Arc::new(ScriptedTrack::new(ms(500)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track.clone()));
        clock.start(ms(0));
        track.set_position(ms(300));
        clock.pause(ms(320));
        clock.switch_to_fallback("audio finished", ms(400));
        clock.sample(ms(900));
        assert_eq!(clock.elapsed(), ms(300));
        clock.unpause(ms(1000));
        clock.sample(ms(1050));
        assert_eq!(clock.elapsed(), ms(350));
    }

    #[test]
    fn audio_timing_can_resume_after_switch() {
        let track = Arc::new(ScriptedTrack::new(ms(500)));
        let mut clock = PlaybackClock::new();
        clock.set_audio(Some(track.clone()));
        clock.start(ms(0));
        clock.switch_to_fallback("audio finished", ms(100));
        clock.seek(Duration::ZERO, ms(100));
        clock.resume_audio_timing();
        assert!(!clock.reports_from_fallback());
        track.set_position(ms(60));
        clock.sample(ms(200));
        assert_eq!(clock.elapsed(), ms(60));
    }
}
