//! Scripted collaborators for unit tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::audio::{AudioTrack, CompletionListener};
use crate::error::{DecodeError, LoadError};
use crate::media::decoder::FrameDecoder;
use crate::media::loader::{LoadStatus, ResourceLoader};
use crate::media::renderer::Renderer;
use crate::media::types::{DecodedFrame, LifecycleEvent};
use crate::time::{ManualTime, TimeSource};

pub fn drain(rx: &Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    rx.try_iter().collect()
}

#[derive(Debug, Default)]
pub struct CountingListener {
    calls: AtomicUsize,
}

impl CountingListener {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionListener for CountingListener {
    fn audio_did_finish(&self, _successfully: bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackCall {
    Play,
    Pause,
    Stop,
    Seek(Duration),
}

#[derive(Default)]
struct TrackState {
    offset: Duration,
    playing_since: Option<Duration>,
    listener: Option<Arc<dyn CompletionListener>>,
    calls: Vec<TrackCall>,
}

/// Audio track whose position is either set by hand or follows a `ManualTime`
/// while playing. Completion only happens when the test calls `finish`.
pub struct ScriptedTrack {
    duration: Duration,
    time: ManualTime,
    state: Mutex<TrackState>,
}

impl ScriptedTrack {
    pub fn new(duration: Duration) -> Self {
        Self::following(duration, ManualTime::new())
    }

    pub fn following(duration: Duration, time: ManualTime) -> Self {
        Self {
            duration,
            time,
            state: Mutex::new(TrackState::default()),
        }
    }

    pub fn set_position(&self, position: Duration) {
        let now = self.time.now();
        let mut state = self.state.lock().unwrap();
        state.offset = position;
        if state.playing_since.is_some() {
            state.playing_since = Some(now);
        }
    }

    pub fn finish(&self, successfully: bool) {
        let listener = self.state.lock().unwrap().listener.clone();
        if let Some(listener) = listener {
            listener.audio_did_finish(successfully);
        }
    }

    pub fn calls(&self) -> Vec<TrackCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing_since.is_some()
    }
}

impl AudioTrack for ScriptedTrack {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        let state = self.state.lock().unwrap();
        let played = state
            .playing_since
            .map(|since| self.time.now().saturating_sub(since))
            .unwrap_or(Duration::ZERO);
        (state.offset + played).min(self.duration)
    }

    fn play(&self) {
        let now = self.time.now();
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackCall::Play);
        if state.playing_since.is_none() {
            state.playing_since = Some(now);
        }
    }

    fn pause(&self) {
        let now = self.time.now();
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackCall::Pause);
        if let Some(since) = state.playing_since.take() {
            state.offset += now.saturating_sub(since);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackCall::Stop);
        state.offset = Duration::ZERO;
        state.playing_since = None;
    }

    fn seek(&self, position: Duration) {
        let now = self.time.now();
        let mut state = self.state.lock().unwrap();
        state.calls.push(TrackCall::Seek(position));
        state.offset = position;
        if state.playing_since.is_some() {
            state.playing_since = Some(now);
        }
    }

    fn replace_completion_listener(
        &self,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> Option<Arc<dyn CompletionListener>> {
        std::mem::replace(&mut self.state.lock().unwrap().listener, listener)
    }
}

#[derive(Debug, Default)]
struct DecoderScript {
    failing: HashSet<usize>,
    fail_all: bool,
    fail_open: bool,
    decoded: Vec<usize>,
}

/// Decoder producing 1x1 frames whose red channel is the frame index.
/// Clones share the script, so a test can keep a handle after boxing one.
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    num_frames: usize,
    hint: Option<Duration>,
    script: Arc<Mutex<DecoderScript>>,
}

impl ScriptedDecoder {
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            hint: None,
            script: Arc::default(),
        }
    }

    pub fn with_hint(mut self, hint: Duration) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn fail_frame(&self, index: usize) {
        self.script.lock().unwrap().failing.insert(index);
    }

    pub fn fail_all(&self, fail: bool) {
        self.script.lock().unwrap().fail_all = fail;
    }

    pub fn fail_open(&self) {
        self.script.lock().unwrap().fail_open = true;
    }

    pub fn decoded(&self) -> Vec<usize> {
        self.script.lock().unwrap().decoded.clone()
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn open(&mut self, _resources: &[PathBuf]) -> Result<(), DecodeError> {
        if self.script.lock().unwrap().fail_open {
            return Err(DecodeError::Format("scripted open failure".to_string()));
        }
        Ok(())
    }

    fn num_frames(&self) -> usize {
        self.num_frames
    }

    fn decode(&mut self, index: usize) -> Result<DecodedFrame, DecodeError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_all || script.failing.contains(&index) {
            return Err(DecodeError::Frame {
                index,
                reason: "scripted failure".to_string(),
            });
        }
        script.decoded.push(index);
        Ok(DecodedFrame::solid(1, 1, [index as u8, 0, 0, 255]))
    }

    fn frame_duration_hint(&self) -> Option<Duration> {
        self.hint
    }
}

/// Loader whose outcome the test decides. Clones share state.
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    status: Arc<Mutex<LoadStatus>>,
    starts: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn pending() -> Self {
        Self {
            status: Arc::new(Mutex::new(LoadStatus::Pending)),
            starts: Arc::default(),
        }
    }

    pub fn ready() -> Self {
        let loader = Self::pending();
        loader.resolve(LoadStatus::Ready(vec![PathBuf::from("scripted.gif")]));
        loader
    }

    pub fn resolve(&self, status: LoadStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn fail(&self, reason: &str) {
        self.resolve(LoadStatus::Failed(LoadError::Other(reason.to_string())));
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl ResourceLoader for ScriptedLoader {
    fn start(&mut self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn poll(&mut self) -> LoadStatus {
        self.status.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub attached: usize,
    pub detached: usize,
    pub frames: Vec<usize>,
    pub last_pixel: Option<u8>,
}

impl Renderer for RecordingRenderer {
    fn media_attached(&mut self) {
        self.attached += 1;
    }

    fn media_detached(&mut self) {
        self.detached += 1;
    }

    fn render(&mut self, frame: &Arc<DecodedFrame>, index: usize) {
        self.frames.push(index);
        self.last_pixel = frame.data.first().copied();
    }
}
