//! A soundless track of fixed length.
//!
//! Useful when an animation should be timed as if it had a soundtrack (for
//! example to exercise the audio clock path headless). Position follows the
//! wall clock while playing; a watcher thread fires the completion listener
//! when the end is reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::{AudioTrack, CompletionListener};

#[derive(Debug, Default)]
struct Transport {
    offset: Duration,
    playing_since: Option<Instant>,
}

struct Shared {
    duration: Duration,
    transport: Mutex<Transport>,
    listener: Mutex<Option<Arc<dyn CompletionListener>>>,
    /// Bumped on every transport change; watchers from older generations exit quietly.
    generation: AtomicU64,
}

impl Shared {
    fn position(&self) -> Duration {
        let Ok(transport) = self.transport.lock() else {
            return Duration::ZERO;
        };
        let played = transport
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or(Duration::ZERO);
        (transport.offset + played).min(self.duration)
    }

    fn finish(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Ok(mut transport) = self.transport.lock() {
            transport.offset = self.duration;
            transport.playing_since = None;
        }
        let listener = self.listener.lock().ok().and_then(|l| l.clone());
        if let Some(listener) = listener {
            listener.audio_did_finish(true);
        }
    }
}

pub struct SilentTrack {
    shared: Arc<Shared>,
}

impl SilentTrack {
    pub fn new(duration: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                duration,
                transport: Mutex::new(Transport::default()),
                listener: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn invalidate_watchers(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn spawn_watcher(&self, remaining: Duration) {
        let generation = self.invalidate_watchers();
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("kinetograph-silent-audio".into())
            .spawn(move || {
                thread::sleep(remaining);
                shared.finish(generation);
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn silent audio watcher: {e}");
        }
    }
}

impl AudioTrack for SilentTrack {
    fn duration(&self) -> Duration {
        self.shared.duration
    }

    fn position(&self) -> Duration {
        self.shared.position()
    }

    fn play(&self) {
        let remaining = {
            let Ok(mut transport) = self.shared.transport.lock() else {
                return;
            };
            if transport.playing_since.is_some() {
                return;
            }
            transport.playing_since = Some(Instant::now());
            self.shared.duration.saturating_sub(transport.offset)
        };
        self.spawn_watcher(remaining);
    }

    fn pause(&self) {
        self.invalidate_watchers();
        if let Ok(mut transport) = self.shared.transport.lock() {
            if let Some(since) = transport.playing_since.take() {
                transport.offset = (transport.offset + since.elapsed()).min(self.shared.duration);
            }
        }
    }

    fn stop(&self) {
        self.invalidate_watchers();
        if let Ok(mut transport) = self.shared.transport.lock() {
            transport.playing_since = None;
            transport.offset = Duration::ZERO;
        }
    }

    fn seek(&self, position: Duration) {
        let resume = {
            let Ok(mut transport) = self.shared.transport.lock() else {
                return;
            };
            transport.offset = position.min(self.shared.duration);
            transport
                .playing_since
                .take()
                .map(|_| self.shared.duration.saturating_sub(transport.offset))
        };
        self.invalidate_watchers();
        if let Some(remaining) = resume {
            if let Ok(mut transport) = self.shared.transport.lock() {
                transport.playing_since = Some(Instant::now());
            }
            self.spawn_watcher(remaining);
        }
    }

    fn replace_completion_listener(
        &self,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> Option<Arc<dyn CompletionListener>> {
        match self.shared.listener.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, listener),
            Err(_) => None,
        }
    }
}

impl Drop for SilentTrack {
    fn drop(&mut self) {
        self.invalidate_watchers();
    }
}
