//! Frame-accurate playback of image sequences, optionally kept in step with
//! an audio track.
//!
//! [`Media`] owns the playback state machine. Hosts supply a
//! [`ResourceLoader`], a [`FrameDecoder`], optionally an [`AudioTrack`] and a
//! [`Renderer`], then drive the engine by calling [`Media::tick`].

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod playback;
pub mod settings;
pub mod time;

#[cfg(test)]
mod test_support;

pub use audio::{AudioBridge, AudioTrack, CompletionListener, SilentTrack};
pub use config::{FrameRate, MediaConfig};
pub use error::{DecodeError, EngineError, LoadError};
pub use events::EventBus;
pub use media::Media;
pub use media::decoder::{FrameDecoder, GifFrameDecoder, MemoryFrameDecoder};
pub use media::loader::{FileResourceLoader, LoadStatus, ResourceLoader, StaticResourceLoader};
pub use media::renderer::Renderer;
pub use media::types::{DecodedFrame, LifecycleEvent, MediaStatus, PlaybackState};
pub use settings::EngineSettings;
pub use time::{ManualTime, MonotonicTime, TimeSource};
