pub mod clock;
pub mod scheduler;
pub mod timer;

pub use clock::{AudioClock, ClockSource, FallbackClock, PlaybackClock};
pub use scheduler::{DisplayDecision, FrameScheduler, target_frame};
pub use timer::{TimerHandle, TimerKind, TimerQueue};
