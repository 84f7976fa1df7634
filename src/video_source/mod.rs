// THEORY:
// A `VideoSource` is where every tick starts. It hands the pipeline one packed RGB8
// frame together with a logical timestamp in milliseconds. Two variants exist, chosen
// once at startup:
//
// - `LiveCapture` reads a camera through a `FrameGrabber` and stamps each frame with
//   the midpoint of the wall-clock reads taken around the acquisition call.
// - `FilePlayback` reads a recording through a `FrameDecoder` and stamps each frame
//   from its index and the recording's total duration.
//
// The device and decoder live behind small backend traits so the rest of the crate can
// be driven without hardware. Backends always deliver RGB8; other layouts are
// converted before the frame reaches this layer.

pub mod live;
pub mod playback;

use crate::config_store::ConfigStore;
use crate::error::SourceError;
use image::RgbImage;
use std::time::Instant;

pub use live::{FrameGrabber, LiveCapture};
pub use playback::{FilePlayback, FrameDecoder, StreamInfo};

/// One acquired frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Packed RGB8 pixels.
    pub image: RgbImage,
    /// Logical acquisition time in milliseconds.
    pub timestamp: u64,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: u64) -> Self {
        Self { image, timestamp }
    }

    /// A zero-sized frame, held by a source before its first acquisition.
    pub fn empty() -> Self {
        Self {
            image: RgbImage::new(0, 0),
            timestamp: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Milliseconds from an arbitrary fixed origin.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Monotonic clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A stream of timestamped frames.
pub trait VideoSource {
    /// Opens the underlying device or file using the settings in `config`.
    fn setup(&mut self, config: &mut ConfigStore) -> Result<(), SourceError>;

    /// Resumes acquisition.
    fn start(&mut self);

    /// Suspends acquisition. The last frame stays available.
    fn stop(&mut self);

    fn is_paused(&self) -> bool;

    /// Acquires the next frame if not paused. Returns `true` when a new frame arrived.
    fn update(&mut self) -> bool;

    /// Whether the last `update` produced a new frame.
    fn is_frame_new(&self) -> bool;

    fn frame(&self) -> &Frame;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn close(&mut self);

    fn pixels(&self) -> &RgbImage {
        &self.frame().image
    }

    fn current_frame_timestamp(&self) -> u64 {
        self.frame().timestamp
    }

    /// True when the source will never produce another frame.
    fn is_finished(&self) -> bool {
        false
    }

    fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.start();
        } else {
            self.stop();
        }
    }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn setup(&mut self, config: &mut ConfigStore) -> Result<(), SourceError> {
        (**self).setup(config)
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn update(&mut self) -> bool {
        (**self).update()
    }

    fn is_frame_new(&self) -> bool {
        (**self).is_frame_new()
    }

    fn frame(&self) -> &Frame {
        (**self).frame()
    }

    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert_eq!((frame.width(), frame.height()), (0, 0));
        assert!(!Frame::new(RgbImage::new(2, 1), 7).is_empty());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::default();
        let first = clock.now_millis();
        assert!(clock.now_millis() >= first);
    }
}
