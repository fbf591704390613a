pub mod buffer;
pub mod decoder;
pub mod loader;
pub mod renderer;
pub mod types;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::audio::{AudioBridge, AudioTrack};
use crate::config::{FrameRate, MediaConfig};
use crate::error::{DecodeError, EngineError};
use crate::events::EventBus;
use crate::playback::{
    ClockSource, DisplayDecision, FrameScheduler, PlaybackClock, TimerKind, TimerQueue,
};
use crate::settings::EngineSettings;
use crate::time::{MonotonicTime, TimeSource};
use buffer::FrameBuffer;
use decoder::FrameDecoder;
use loader::{LoadStatus, ResourceLoader};
use renderer::Renderer;
use types::{DecodedFrame, LifecycleEvent, MediaStatus, PlaybackState};

/// One animated media item: an image sequence, optionally timed by an audio
/// track, presented to a weakly held renderer.
///
/// Nothing runs in the background. The host calls [`Media::tick`] from its
/// event loop (sleeping until [`Media::next_deadline`] in between) and every
/// timer fires from inside that call.
pub struct Media {
    config: MediaConfig,
    settings: EngineSettings,
    state: PlaybackState,

    loader: Option<Box<dyn ResourceLoader>>,
    decoder: Option<Box<dyn FrameDecoder>>,
    decoder_open: bool,
    audio_track: Option<Arc<dyn AudioTrack>>,
    audio: Option<AudioBridge>,
    has_audio: bool,
    audio_finished: bool,
    renderer: Option<Weak<RefCell<dyn Renderer>>>,

    buffer: FrameBuffer,
    clock: PlaybackClock,
    scheduler: FrameScheduler,
    timers: TimerQueue,
    time: Box<dyn TimeSource>,
    events: EventBus,

    loops_completed: u32,
    last_error: Option<String>,
}

impl Media {
    pub fn new() -> Self {
        Self::with_time_source(Box::new(MonotonicTime::new()))
    }

    pub fn with_time_source(time: Box<dyn TimeSource>) -> Self {
        Self {
            config: MediaConfig::default(),
            settings: EngineSettings::default(),
            state: PlaybackState::Allocated,
            loader: None,
            decoder: None,
            decoder_open: false,
            audio_track: None,
            audio: None,
            has_audio: false,
            audio_finished: false,
            renderer: None,
            buffer: FrameBuffer::new(),
            clock: PlaybackClock::new(),
            scheduler: FrameScheduler::new(Duration::ZERO, 0),
            timers: TimerQueue::new(),
            time,
            events: EventBus::new(),
            loops_completed: 0,
            last_error: None,
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn subscribe(&mut self) -> Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    // --- Collaborators ---

    pub fn set_resource_loader(
        &mut self,
        loader: Box<dyn ResourceLoader>,
    ) -> Result<(), EngineError> {
        self.require_unprepared("set_resource_loader")?;
        self.loader = Some(loader);
        self.note_collaborators();
        Ok(())
    }

    pub fn set_frame_decoder(&mut self, decoder: Box<dyn FrameDecoder>) -> Result<(), EngineError> {
        self.require_unprepared("set_frame_decoder")?;
        self.decoder = Some(decoder);
        self.note_collaborators();
        Ok(())
    }

    /// Audio must be supplied before the media becomes ready; `has_audio` is
    /// fixed at that point.
    pub fn set_audio_track(&mut self, track: Option<Arc<dyn AudioTrack>>) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Allocated | PlaybackState::Loaded | PlaybackState::Prepping { .. } => {
                self.audio_track = track;
                Ok(())
            }
            state => Err(EngineError::invalid("set_audio_track", state)),
        }
    }

    fn note_collaborators(&mut self) {
        if self.state == PlaybackState::Allocated && self.loader.is_some() && self.decoder.is_some()
        {
            self.state = PlaybackState::Loaded;
            log::debug!("Loader and decoder attached");
        }
    }

    fn require_unprepared(&self, op: &'static str) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Allocated | PlaybackState::Loaded => Ok(()),
            state => Err(EngineError::invalid(op, state)),
        }
    }

    // --- Configuration ---

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn set_config(&mut self, config: MediaConfig) -> Result<(), EngineError> {
        self.require_unprepared("set_config")?;
        self.config = config;
        Ok(())
    }

    pub fn set_frame_rate(&mut self, rate: FrameRate) -> Result<(), EngineError> {
        self.require_unprepared("set_frame_rate")?;
        self.config.frame_rate = Some(rate);
        Ok(())
    }

    pub fn set_num_frames(&mut self, num_frames: usize) -> Result<(), EngineError> {
        self.require_unprepared("set_num_frames")?;
        self.config.num_frames = num_frames;
        Ok(())
    }

    pub fn set_repeat_count(&mut self, repeat_count: u32) -> Result<(), EngineError> {
        self.require_unprepared("set_repeat_count")?;
        self.config.repeat_count = repeat_count;
        Ok(())
    }

    // --- Renderer ---

    /// Starts presenting to `renderer`. Only a weak reference is kept.
    pub fn attach_to_renderer<R: Renderer + 'static>(&mut self, renderer: &Rc<RefCell<R>>) {
        let renderer: Rc<RefCell<dyn Renderer>> = renderer.clone();
        let same = self
            .renderer
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|current| std::ptr::addr_eq(Rc::as_ptr(&current), Rc::as_ptr(&renderer)));
        if same {
            return;
        }

        self.detach_from_renderer();
        if let Ok(mut r) = renderer.try_borrow_mut() {
            r.media_attached();
        }
        self.renderer = Some(Rc::downgrade(&renderer));
        log::debug!("Attached to renderer");

        if let (Some(index), Some(frame)) = (self.buffer.previous_index(), self.buffer.previous().cloned()) {
            self.render(&frame, index);
        }
    }

    pub fn detach_from_renderer(&mut self) {
        let Some(weak) = self.renderer.take() else {
            return;
        };
        if let Some(renderer) = weak.upgrade() {
            if let Ok(mut r) = renderer.try_borrow_mut() {
                r.media_detached();
            }
        }
        log::debug!("Detached from renderer");
    }

    pub fn is_attached_to_renderer(&self) -> bool {
        self.renderer.as_ref().is_some_and(|w| w.strong_count() > 0)
    }

    // --- Lifecycle ---

    /// Starts loading resources. The media becomes ready on a later tick.
    ///
    /// Calling this again while prepping after a load failure retries the load.
    pub fn prepare_to_animate(&mut self) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Allocated => {
                let missing = if self.loader.is_none() {
                    "resource loader"
                } else {
                    "frame decoder"
                };
                return Err(EngineError::MissingCollaborator(missing));
            }
            PlaybackState::Loaded => {}
            PlaybackState::Prepping { .. } if self.timers.has_kind(TimerKind::Prep) => return Ok(()),
            PlaybackState::Prepping { .. } => log::info!("Retrying resource load"),
            state => return Err(EngineError::invalid("prepare_to_animate", state)),
        }
        self.config.validate()?;

        let Some(loader) = self.loader.as_mut() else {
            return Err(EngineError::MissingCollaborator("resource loader"));
        };
        loader.start();

        let start_when_ready = matches!(
            self.state,
            PlaybackState::Prepping {
                start_when_ready: true
            }
        );
        self.state = PlaybackState::Prepping { start_when_ready };
        self.last_error = None;

        let now = self.time.now();
        self.timers
            .schedule_repeating(TimerKind::Prep, now, self.settings.prep_poll_interval());
        log::info!("Preparing to animate");
        Ok(())
    }

    /// Starts playback from frame 0. While prepping the start is deferred
    /// until the media is ready.
    pub fn start_animator(&mut self) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Prepping { .. } => {
                log::debug!("Start requested while prepping; deferring");
                self.state = PlaybackState::Prepping {
                    start_when_ready: true,
                };
                Ok(())
            }
            PlaybackState::Ready
            | PlaybackState::Stopped {
                ever_ready: true, ..
            } => {
                let now = self.time.now();
                self.begin_animating(now);
                Ok(())
            }
            PlaybackState::Animating => Ok(()),
            state => {
                log::warn!("start_animator ignored while {state}");
                Err(EngineError::invalid("start_animator", state))
            }
        }
    }

    /// Stops playback. Idempotent; while prepping it cancels a deferred start.
    pub fn stop_animator(&mut self) {
        match self.state {
            PlaybackState::Animating | PlaybackState::Paused => {
                self.halt(false);
                log::info!("Stopped at frame {}", self.scheduler.current_frame());
                self.events.emit(LifecycleEvent::DidStop);
            }
            PlaybackState::Prepping { .. } => {
                self.state = PlaybackState::Prepping {
                    start_when_ready: false,
                };
            }
            _ => {}
        }
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Animating => {}
            PlaybackState::Paused => return Ok(()),
            state => return Err(EngineError::invalid("pause", state)),
        }
        let now = self.time.now();
        self.clock.pause(now);
        if let Some(audio) = &self.audio {
            audio.pause();
        }
        self.cancel_playback_timers();
        self.state = PlaybackState::Paused;
        log::info!(
            "Paused at {:.3}s (frame {})",
            self.clock.elapsed().as_secs_f64(),
            self.scheduler.current_frame()
        );
        self.events.emit(LifecycleEvent::DidPause);
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Paused => {}
            PlaybackState::Animating => return Ok(()),
            state => return Err(EngineError::invalid("unpause", state)),
        }
        let now = self.time.now();
        self.clock.unpause(now);
        self.state = PlaybackState::Animating;

        if self.clock.is_started() {
            if let Some(audio) = &self.audio {
                if !self.audio_finished {
                    audio.play();
                }
            }
            self.schedule_playback_timers(now, self.clock.elapsed());
        } else {
            // Paused before the first frame was due
            self.timers
                .schedule_once(TimerKind::Ready, now + self.settings.ready_delay());
        }
        log::info!("Unpaused at {:.3}s", self.clock.elapsed().as_secs_f64());
        self.events.emit(LifecycleEvent::DidUnpause);
        Ok(())
    }

    /// Back to frame 0 and clock zero. A paused media stays paused.
    pub fn rewind(&mut self) -> Result<(), EngineError> {
        let now = self.time.now();
        match self.state {
            PlaybackState::Animating => {
                return Err(EngineError::invalid("rewind", self.state));
            }
            PlaybackState::Paused => self.seek_paused(Duration::ZERO, now),
            _ => self.clock.reset(),
        }
        self.scheduler.begin_loop();
        self.buffer.discard_staged();
        if self.decoder_open {
            self.present(0)?;
        }
        log::info!("Rewound to frame 0");
        Ok(())
    }

    /// Decodes and presents `frame`, numbered from 1 to `num_frames()`.
    /// Not allowed while animating; while paused the clock moves with it.
    pub fn show_frame(&mut self, frame: usize) -> Result<(), EngineError> {
        match self.state {
            PlaybackState::Ready
            | PlaybackState::Paused
            | PlaybackState::Stopped {
                ever_ready: true, ..
            } => {}
            state => return Err(EngineError::invalid("show_frame", state)),
        }
        let num_frames = self.scheduler.num_frames();
        if frame == 0 || frame > num_frames {
            return Err(EngineError::FrameOutOfRange { frame, num_frames });
        }
        let index = frame - 1;

        self.present(index)?;

        if self.state == PlaybackState::Paused {
            let position = self.scheduler.frame_duration() * u32::try_from(index).unwrap_or(u32::MAX);
            let now = self.time.now();
            self.seek_paused(position, now);
        }
        log::debug!("Showing frame {frame}/{num_frames}");
        Ok(())
    }

    /// Ends this run: cancels every timer, stops audio and restores its
    /// original completion listener, and drops the frame buffer. Idempotent.
    pub fn done_animator(&mut self) {
        let already_done = matches!(self.state, PlaybackState::Stopped { done: true, .. });
        let ever_ready = self.state.is_ready_to_animate();

        self.timers.cancel_all();
        if let Some(mut audio) = self.audio.take() {
            audio.stop();
            audio.detach();
        }
        self.buffer.clear();
        self.clock.reset();
        self.state = PlaybackState::Stopped {
            ever_ready,
            done: true,
        };

        if !already_done {
            log::info!("Done");
            self.events.emit(LifecycleEvent::Done);
        }
    }

    // --- Queries ---

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_animator_running(&self) -> bool {
        self.state == PlaybackState::Animating
    }

    pub fn is_initializing(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Allocated | PlaybackState::Loaded | PlaybackState::Prepping { .. }
        )
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    pub fn current_frame(&self) -> usize {
        self.scheduler.current_frame()
    }

    pub fn num_frames(&self) -> usize {
        self.scheduler.num_frames()
    }

    pub fn frame_duration(&self) -> Duration {
        self.scheduler.frame_duration()
    }

    /// The image last handed to the renderer.
    pub fn current_image(&self) -> Option<Arc<DecodedFrame>> {
        self.buffer.previous().cloned()
    }

    pub fn status(&self) -> MediaStatus {
        MediaStatus {
            state: self.state,
            current_frame: self.scheduler.current_frame(),
            num_frames: self.scheduler.num_frames(),
            frame_duration_secs: self.scheduler.frame_duration().as_secs_f64(),
            elapsed_secs: self.clock.elapsed().as_secs_f64(),
            loops_completed: self.loops_completed,
            repeated_frame_count: self.scheduler.repeated_frame_count(),
            decode_failures: self.scheduler.decode_failures(),
            reporting_from_fallback_clock: self.clock.reports_from_fallback(),
            has_audio: self.has_audio,
            last_error: self.last_error.clone(),
        }
    }

    // --- Event loop ---

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Handles queued audio signals and fires every timer that is due.
    pub fn tick(&mut self) {
        let now = self.time.now();
        if self.state == PlaybackState::Animating && self.clock.is_started() {
            self.drain_audio(now);
        }
        while let Some(handle) = self.timers.pop_due(now) {
            match handle.kind() {
                TimerKind::Prep => self.on_prep_timer(now),
                TimerKind::Ready => self.on_ready_timer(now),
                TimerKind::Display => self.on_display_timer(now),
                TimerKind::Decode => self.on_decode_timer(now),
            }
        }
    }

    fn on_prep_timer(&mut self, now: Duration) {
        if !matches!(self.state, PlaybackState::Prepping { .. }) {
            self.timers.cancel_kind(TimerKind::Prep);
            return;
        }
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        match loader.poll() {
            LoadStatus::Pending => {}
            LoadStatus::Failed(e) => {
                self.timers.cancel_kind(TimerKind::Prep);
                self.fail_load(e.to_string());
            }
            LoadStatus::Ready(resources) => {
                self.timers.cancel_kind(TimerKind::Prep);
                if let Err(e) = self.become_ready(&resources, now) {
                    self.fail_load(e.to_string());
                }
            }
        }
    }

    fn fail_load(&mut self, reason: String) {
        log::warn!("Resources failed to load: {reason}");
        self.last_error = Some(reason.clone());
        self.events.emit(LifecycleEvent::LoadFailed(reason));
    }

    fn become_ready(&mut self, resources: &[PathBuf], now: Duration) -> Result<(), EngineError> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or(EngineError::MissingCollaborator("frame decoder"))?;
        decoder.open(resources)?;
        self.decoder_open = true;
        let frame_duration = self.config.resolve_frame_duration(decoder.frame_duration_hint())?;
        let num_frames = self.config.resolve_num_frames(decoder.num_frames())?;
        self.scheduler = FrameScheduler::new(frame_duration, num_frames);

        self.has_audio = self.audio_track.is_some();
        self.clock.set_audio(self.audio_track.clone());
        self.attach_audio();

        self.buffer.clear();
        self.present(0)?;

        let start_when_ready = matches!(
            self.state,
            PlaybackState::Prepping {
                start_when_ready: true
            }
        );
        self.state = PlaybackState::Ready;
        log::info!(
            "Ready: {} frames at {:.4}s/frame, {} loop(s){}",
            num_frames,
            frame_duration.as_secs_f64(),
            self.config.repeat_count,
            if self.has_audio { ", with audio" } else { "" }
        );
        self.events.emit(LifecycleEvent::PreparedToAnimate);

        if start_when_ready {
            self.begin_animating(now);
        }
        Ok(())
    }

    fn attach_audio(&mut self) {
        if self.audio.is_none() {
            if let Some(track) = &self.audio_track {
                self.audio = Some(AudioBridge::attach(track.clone()));
            }
        }
    }

    fn begin_animating(&mut self, now: Duration) {
        self.state = PlaybackState::Animating;
        self.loops_completed = 0;
        self.attach_audio();
        log::info!("Animating");
        self.events.emit(LifecycleEvent::DidStart);
        self.timers.cancel_kind(TimerKind::Ready);
        self.timers
            .schedule_once(TimerKind::Ready, now + self.settings.ready_delay());
    }

    fn on_ready_timer(&mut self, now: Duration) {
        if self.state == PlaybackState::Animating {
            self.start_loop(now);
        }
    }

    fn start_loop(&mut self, now: Duration) {
        self.scheduler.begin_loop();
        self.audio_finished = false;
        self.clock.start(now);
        if let Some(audio) = &self.audio {
            audio.seek(Duration::ZERO);
            audio.play();
            audio.discard_pending();
        }

        self.buffer.discard_staged();
        if let Err(e) = self.present(0) {
            self.on_decode_failure(0, e);
        }
        if self.state == PlaybackState::Animating {
            self.decode_ahead(now);
        }
        if self.state == PlaybackState::Animating {
            self.schedule_playback_timers(now, Duration::ZERO);
            log::debug!("Loop {} started", self.loops_completed.saturating_add(1));
        }
    }

    /// Display and decode timers, phase-aligned so display ticks land on
    /// frame boundaries of the clock reading `elapsed`.
    fn schedule_playback_timers(&mut self, now: Duration, elapsed: Duration) {
        let frame_duration = self.scheduler.frame_duration();
        let decode_interval = self.settings.decode_interval(frame_duration);
        self.timers.cancel_kind(TimerKind::Display);
        self.timers.cancel_kind(TimerKind::Decode);
        self.timers.schedule_repeating(
            TimerKind::Display,
            now + (frame_duration - phase(elapsed, frame_duration)),
            frame_duration,
        );
        self.timers.schedule_repeating(
            TimerKind::Decode,
            now + (decode_interval - phase(elapsed, decode_interval)),
            decode_interval,
        );
    }

    fn cancel_playback_timers(&mut self) {
        self.timers.cancel_kind(TimerKind::Ready);
        self.timers.cancel_kind(TimerKind::Display);
        self.timers.cancel_kind(TimerKind::Decode);
    }

    /// Moves a paused clock and its audio track to `position`. A track that
    /// had finished drives timing again once seeked back inside it.
    fn seek_paused(&mut self, position: Duration, now: Duration) {
        self.clock.seek(position, now);
        if let Some(audio) = &self.audio {
            audio.seek(position);
            if position < audio.duration() {
                audio.discard_pending();
                self.audio_finished = false;
                self.clock.resume_audio_timing();
            }
        }
    }

    fn on_decode_timer(&mut self, now: Duration) {
        if self.state == PlaybackState::Animating && self.clock.is_started() {
            self.decode_ahead(now);
        }
    }

    fn decode_ahead(&mut self, now: Duration) {
        self.clock.sample(now);
        let Some(index) = self.scheduler.decode_ahead_index(self.clock.elapsed()) else {
            return;
        };
        if self.buffer.staged_index() == Some(index) {
            return;
        }
        match self.decode_frame(index) {
            Ok(frame) => self.buffer.stage(index, frame),
            Err(e) => self.on_decode_failure(index, e),
        }
    }

    fn on_display_timer(&mut self, now: Duration) {
        if self.state == PlaybackState::Animating && self.clock.is_started() {
            self.clock.sample(now);
            self.display_step(now);
        }
    }

    fn display_step(&mut self, now: Duration) {
        let elapsed = self.clock.elapsed();
        if self.loop_should_end(elapsed) {
            self.finish_loop(now);
            return;
        }

        let target = if self.audio_ends_loop() {
            self.scheduler.last_frame()
        } else {
            self.scheduler.target(elapsed)
        };
        match self.scheduler.on_display_tick(target) {
            DisplayDecision::Hold => {
                log::debug!("Holding frame {target} at {:.3}s", elapsed.as_secs_f64());
            }
            DisplayDecision::Advance { from, to } => {
                if let Err(e) = self.present(to) {
                    self.on_decode_failure(to, e);
                    return;
                }
                if to > from + 1 {
                    log::debug!("Skipped {} frame(s) catching up to {to}", to - from - 1);
                }
            }
        }

        if self.loop_should_end(elapsed) {
            self.finish_loop(now);
        }
    }

    /// Audio completion counts as reaching the end when the track covers
    /// the whole loop (within one frame).
    fn audio_ends_loop(&self) -> bool {
        self.audio_finished
            && self.audio.as_ref().is_some_and(|audio| {
                audio.duration() + self.scheduler.frame_duration() >= self.scheduler.loop_duration()
            })
    }

    fn loop_should_end(&self, elapsed: Duration) -> bool {
        let tolerance = self.settings.end_tolerance(self.scheduler.frame_duration());
        self.scheduler.loop_finished(elapsed, tolerance)
            || (self.audio_ends_loop()
                && self.scheduler.current_frame() == self.scheduler.last_frame())
    }

    fn finish_loop(&mut self, now: Duration) {
        self.loops_completed = self.loops_completed.saturating_add(1);
        let repeat_count = self.config.repeat_count;
        if repeat_count == 0 || self.loops_completed < repeat_count {
            log::debug!("Loop {} complete; repeating", self.loops_completed);
            self.events.emit(LifecycleEvent::DidStop);
            self.events.emit(LifecycleEvent::DidStart);
            self.start_loop(now);
        } else {
            log::info!("Played {} loop(s)", self.loops_completed);
            self.halt(true);
            self.events.emit(LifecycleEvent::Done);
        }
    }

    fn drain_audio(&mut self, now: Duration) {
        let Some(successfully) = self.audio.as_ref().and_then(|a| a.poll_finished()) else {
            return;
        };
        log::info!("Audio track finished (successfully: {successfully})");
        self.audio_finished = true;
        self.clock.switch_to_fallback("audio track finished", now);
        if self.audio_ends_loop() {
            self.clock.sample(now);
            self.display_step(now);
        }
    }

    /// Leaves the running states. The caller emits the matching event.
    fn halt(&mut self, done: bool) {
        self.cancel_playback_timers();
        if let Some(audio) = &self.audio {
            audio.stop();
        }
        self.buffer.discard_staged();
        self.state = PlaybackState::Stopped {
            ever_ready: true,
            done,
        };
    }

    fn on_decode_failure(&mut self, index: usize, err: DecodeError) {
        let failures = self.scheduler.note_decode_failure();
        let limit = self.settings.max_decode_retries.max(1);
        self.last_error = Some(err.to_string());
        if failures >= limit {
            log::error!("Frame {index} failed to decode {failures} times in a row; stopping: {err}");
            self.halt(false);
            self.events.emit(LifecycleEvent::DidStop);
        } else {
            log::warn!("Frame {index} failed to decode ({failures}/{limit}), retrying: {err}");
        }
    }

    // --- Frames ---

    fn decode_frame(&mut self, index: usize) -> Result<DecodedFrame, DecodeError> {
        let decoder = self.decoder.as_mut().ok_or(DecodeError::NotOpen)?;
        let frame = decoder.decode(index)?;
        self.scheduler.note_decoded(index);
        self.clock.note_decoded();
        Ok(frame)
    }

    /// Puts frame `index` on screen, using the staged frame when it matches.
    /// On failure the previous frame stays up.
    fn present(&mut self, index: usize) -> Result<(), DecodeError> {
        if self.buffer.staged_index() != Some(index) {
            let frame = self.decode_frame(index)?;
            self.buffer.stage(index, frame);
        }
        if let Some((index, frame)) = self.buffer.swap() {
            self.scheduler.commit(index);
            self.render(&frame, index);
        }
        Ok(())
    }

    fn render(&mut self, frame: &Arc<DecodedFrame>, index: usize) {
        let upgraded = match &self.renderer {
            Some(weak) => weak.upgrade(),
            None => return,
        };
        let Some(renderer) = upgraded else {
            log::debug!("Renderer dropped; detaching");
            self.renderer = None;
            return;
        };
        match renderer.try_borrow_mut() {
            Ok(mut r) => r.render(frame, index),
            Err(_) => log::warn!("Renderer busy; skipped frame {index}"),
        };
    }
}

impl Default for Media {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Media {
    fn drop(&mut self) {
        self.detach_from_renderer();
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.close();
        }
    }
}

fn phase(elapsed: Duration, period: Duration) -> Duration {
    if period.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_nanos((elapsed.as_nanos() % period.as_nanos()) as u64)
}
