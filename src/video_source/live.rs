//! Live camera capture.

use super::{Clock, Frame, SystemClock, VideoSource};
use crate::config_store::ConfigStore;
use crate::error::SourceError;
use crate::settings::{self, keys};
use image::RgbImage;
use tracing::{info, warn};

/// A camera device delivering packed RGB8 frames.
#[cfg_attr(test, mockall::automock)]
pub trait FrameGrabber {
    /// Opens `device_id` asking for `width`x`height`. Returns the size the device settled on.
    fn open(&mut self, device_id: i32, width: u32, height: u32) -> Result<(u32, u32), SourceError>;

    /// Blocks until the next frame is written into `frame`. `Ok(false)` means no frame
    /// was ready.
    fn grab(&mut self, frame: &mut RgbImage) -> Result<bool, SourceError>;

    fn close(&mut self);
}

pub struct LiveCapture<G, C = SystemClock> {
    grabber: G,
    clock: C,
    frame: Frame,
    scratch: RgbImage,
    width: u32,
    height: u32,
    paused: bool,
    frame_new: bool,
}

impl<G: FrameGrabber> LiveCapture<G> {
    pub fn new(grabber: G) -> Self {
        Self::with_clock(grabber, SystemClock::default())
    }
}

impl<G: FrameGrabber, C: Clock> LiveCapture<G, C> {
    pub fn with_clock(grabber: G, clock: C) -> Self {
        Self {
            grabber,
            clock,
            frame: Frame::empty(),
            scratch: RgbImage::new(0, 0),
            width: 0,
            height: 0,
            paused: false,
            frame_new: false,
        }
    }
}

fn dimension(config: &ConfigStore, key: &str, fallback: i64) -> u32 {
    config.get_or(key, fallback).clamp(1, i64::from(u32::MAX)) as u32
}

impl<G: FrameGrabber, C: Clock> VideoSource for LiveCapture<G, C> {
    fn setup(&mut self, config: &mut ConfigStore) -> Result<(), SourceError> {
        let device_id = config.get_or(keys::WEBCAM_ID, 0i32);
        let requested_width = dimension(config, keys::WEBCAM_WIDTH, settings::DEFAULT_WIDTH);
        let requested_height = dimension(config, keys::WEBCAM_HEIGHT, settings::DEFAULT_HEIGHT);

        let (width, height) = self.grabber.open(device_id, requested_width, requested_height)?;
        self.width = width;
        self.height = height;
        self.scratch = RgbImage::new(width, height);
        config.set(keys::WEBCAM_WIDTH, width, true);
        config.set(keys::WEBCAM_HEIGHT, height, true);

        info!(
            device_id,
            requested_width, requested_height, width, height, "Opened camera"
        );
        Ok(())
    }

    fn start(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn update(&mut self) -> bool {
        self.frame_new = false;
        if self.paused {
            return false;
        }

        let before = self.clock.now_millis();
        let grabbed = self.grabber.grab(&mut self.scratch);
        let after = self.clock.now_millis();

        match grabbed {
            Ok(true) => {
                std::mem::swap(&mut self.frame.image, &mut self.scratch);
                self.frame.timestamp = before + after.saturating_sub(before) / 2;
                self.frame_new = true;
            }
            Ok(false) => {}
            Err(err) => warn!(%err, "camera grab failed, skipping frame"),
        }
        self.frame_new
    }

    fn is_frame_new(&self) -> bool {
        self.frame_new
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn close(&mut self) {
        self.grabber.close();
        info!("Closed camera");
    }
}
