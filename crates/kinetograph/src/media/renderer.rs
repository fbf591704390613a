use std::sync::Arc;

use super::types::DecodedFrame;

/// Presentation target. `Media` holds only a weak reference, so a renderer
/// can be dropped at any time; the media then stops drawing to it.
pub trait Renderer {
    fn media_attached(&mut self) {}
    fn media_detached(&mut self) {}
    /// Redraw with `frame`, which is frame `index` of the media.
    fn render(&mut self, frame: &Arc<DecodedFrame>, index: usize);
}
