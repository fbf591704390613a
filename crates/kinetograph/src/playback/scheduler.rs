use std::time::Duration;

/// Frame that should be visible at `elapsed`, clamped to the last frame.
pub fn target_frame(elapsed: Duration, frame_duration: Duration, num_frames: usize) -> usize {
    if num_frames == 0 || frame_duration.is_zero() {
        return 0;
    }
    let index = elapsed.as_nanos() / frame_duration.as_nanos();
    let last = (num_frames - 1) as u128;
    index.min(last) as usize
}

/// Outcome of a display tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayDecision {
    /// Target is already on screen; no redraw.
    Hold,
    /// Present `to` in place of `from`.
    Advance { from: usize, to: usize },
}

/// Per-loop frame bookkeeping: which frame is on screen, which one to
/// decode ahead, and when a loop has played out.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    frame_duration: Duration,
    num_frames: usize,
    current_frame: usize,
    repeated_frame_count: usize,
    decoded_second_frame: bool,
    ignore_repeated_first_frame_report: bool,
    decoded_last_frame: bool,
    consecutive_decode_failures: u32,
    decode_failures: usize,
}

impl FrameScheduler {
    pub fn new(frame_duration: Duration, num_frames: usize) -> Self {
        Self {
            frame_duration,
            num_frames,
            current_frame: 0,
            repeated_frame_count: 0,
            decoded_second_frame: false,
            ignore_repeated_first_frame_report: false,
            decoded_last_frame: false,
            consecutive_decode_failures: 0,
            decode_failures: 0,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn last_frame(&self) -> usize {
        self.num_frames.saturating_sub(1)
    }

    pub fn repeated_frame_count(&self) -> usize {
        self.repeated_frame_count
    }

    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    pub fn decoded_last_frame(&self) -> bool {
        self.decoded_last_frame
    }

    /// Total running time of one loop.
    pub fn loop_duration(&self) -> Duration {
        self.frame_duration * u32::try_from(self.num_frames).unwrap_or(u32::MAX)
    }

    /// Resets per-loop state; the repeated-frame tally survives across loops.
    pub fn begin_loop(&mut self) {
        self.current_frame = 0;
        self.decoded_second_frame = false;
        self.ignore_repeated_first_frame_report = false;
        self.decoded_last_frame = false;
        self.consecutive_decode_failures = 0;
    }

    pub fn target(&self, elapsed: Duration) -> usize {
        target_frame(elapsed, self.frame_duration, self.num_frames)
    }

    /// Frame worth decoding now so it is ready at the next display boundary.
    pub fn decode_ahead_index(&self, elapsed: Duration) -> Option<usize> {
        let ahead = self.target(elapsed).max(self.current_frame) + 1;
        (ahead < self.num_frames).then_some(ahead)
    }

    pub fn on_display_tick(&mut self, target: usize) -> DisplayDecision {
        if target == self.current_frame {
            if self.current_frame == 0 && self.ignore_repeated_first_frame_report {
                // A slow start is not a stutter; forgiven once per loop.
                self.ignore_repeated_first_frame_report = false;
            } else {
                self.repeated_frame_count += 1;
            }
            return DisplayDecision::Hold;
        }
        DisplayDecision::Advance {
            from: self.current_frame,
            to: target,
        }
    }

    /// Records that `index` is now on screen.
    pub fn commit(&mut self, index: usize) {
        self.current_frame = index.min(self.last_frame());
        if self.current_frame > 0 {
            self.ignore_repeated_first_frame_report = false;
        }
        if self.current_frame == self.last_frame() {
            self.decoded_last_frame = true;
        }
    }

    pub fn note_decoded(&mut self, index: usize) {
        if index > 0 && !self.decoded_second_frame {
            self.decoded_second_frame = true;
            // Armed once frame 1 is ready; cleared by the first advance.
            self.ignore_repeated_first_frame_report = self.current_frame == 0;
        }
        self.consecutive_decode_failures = 0;
    }

    /// Returns the number of consecutive failures so far.
    pub fn note_decode_failure(&mut self) -> u32 {
        self.decode_failures += 1;
        self.consecutive_decode_failures += 1;
        self.consecutive_decode_failures
    }

    /// Point after which the last frame has been shown long enough.
    pub fn max_clock_time(&self, tolerance: Duration) -> Duration {
        self.loop_duration().saturating_sub(tolerance)
    }

    pub fn loop_finished(&self, elapsed: Duration, tolerance: Duration) -> bool {
        self.decoded_last_frame
            && self.current_frame == self.last_frame()
            && elapsed >= self.max_clock_time(tolerance)
    }
}
