use std::sync::Arc;

use super::types::DecodedFrame;

/// Previous/next image pair.
///
/// `previous` is always the last image handed to the renderer, `next` the
/// most recently decoded image not yet shown. Staging always wraps a freshly
/// decoded frame, so the two slots never share an allocation.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    previous: Option<(usize, Arc<DecodedFrame>)>,
    next: Option<(usize, Arc<DecodedFrame>)>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a decoded frame as `next`, replacing any frame still waiting.
    pub fn stage(&mut self, index: usize, frame: DecodedFrame) {
        self.next = Some((index, Arc::new(frame)));
    }

    pub fn staged_index(&self) -> Option<usize> {
        self.next.as_ref().map(|(i, _)| *i)
    }

    pub fn previous(&self) -> Option<&Arc<DecodedFrame>> {
        self.previous.as_ref().map(|(_, f)| f)
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.previous.as_ref().map(|(i, _)| *i)
    }

    /// Promotes `next` to `previous` and returns it for presentation.
    pub fn swap(&mut self) -> Option<(usize, Arc<DecodedFrame>)> {
        let (index, frame) = self.next.take()?;
        self.previous = Some((index, frame.clone()));
        Some((index, frame))
    }

    pub fn discard_staged(&mut self) {
        self.next = None;
    }

    pub fn clear(&mut self) {
        self.previous = None;
        self.next = None;
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_none() && self.next.is_none()
    }
}
