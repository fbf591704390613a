pub mod silent;

pub use silent::SilentTrack;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

/// Notified when an audio track reaches its end.
///
/// Called from whatever context the audio subsystem runs in.
pub trait CompletionListener: Send + Sync {
    fn audio_did_finish(&self, successfully: bool);
}

/// Host-provided audio player. The engine only reads its position and
/// issues transport commands; it never waits on the hardware.
pub trait AudioTrack: Send + Sync {
    fn duration(&self) -> Duration;
    /// Current playback position as reported by the audio subsystem.
    fn position(&self) -> Duration;
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn seek(&self, position: Duration);
    /// Installs `listener` and returns the one it displaced.
    fn replace_completion_listener(
        &self,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> Option<Arc<dyn CompletionListener>>;
}

/// Signals carried from the audio context to the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSignal {
    Finished { successfully: bool },
}

/// Listener the bridge installs on the track. Forwards to the listener it
/// displaced, then queues a signal for the engine.
struct ChainedCompletion {
    inner: Option<Arc<dyn CompletionListener>>,
    tx: Sender<AudioSignal>,
}

impl CompletionListener for ChainedCompletion {
    fn audio_did_finish(&self, successfully: bool) {
        if let Some(inner) = &self.inner {
            inner.audio_did_finish(successfully);
        }
        // Engine may already be gone; nothing to do then.
        let _ = self.tx.try_send(AudioSignal::Finished { successfully });
    }
}

/// Wraps an audio track so the engine learns of natural completion without
/// displacing a listener the host already registered.
pub struct AudioBridge {
    track: Arc<dyn AudioTrack>,
    original: Option<Arc<dyn CompletionListener>>,
    rx: Receiver<AudioSignal>,
    attached: bool,
}

impl AudioBridge {
    pub fn attach(track: Arc<dyn AudioTrack>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let original = track.replace_completion_listener(None);
        let chained = ChainedCompletion {
            inner: original.clone(),
            tx,
        };
        track.replace_completion_listener(Some(Arc::new(chained)));
        log::debug!(
            "Audio bridge attached ({:.3}s track, chained listener: {})",
            track.duration().as_secs_f64(),
            original.is_some()
        );
        Self {
            track,
            original,
            rx,
            attached: true,
        }
    }

    /// Puts the original listener back. Idempotent.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.track.replace_completion_listener(self.original.take());
        log::debug!("Audio bridge detached");
    }

    pub fn duration(&self) -> Duration {
        self.track.duration()
    }

    pub fn play(&self) {
        self.track.play();
    }

    pub fn pause(&self) {
        self.track.pause();
    }

    pub fn stop(&self) {
        self.track.stop();
    }

    pub fn seek(&self, position: Duration) {
        self.track.seek(position);
    }

    /// Drains pending completion signals. Returns the last one seen, if any.
    pub fn poll_finished(&self) -> Option<bool> {
        let mut finished = None;
        while let Ok(AudioSignal::Finished { successfully }) = self.rx.try_recv() {
            finished = Some(successfully);
        }
        finished
    }

    /// Drops any signal still queued, e.g. from a loop that has already ended.
    pub fn discard_pending(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.detach();
    }
}
