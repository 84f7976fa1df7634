//! OpenCV `VideoCapture` backends for the camera and file sources.

use blobwatch::error::SourceError;
use blobwatch::video_source::{FrameDecoder, FrameGrabber, StreamInfo};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;

/// Converts a BGR, BGRA or gray `Mat` into packed RGB8, reusing `out` when the size matches.
fn mat_to_rgb(source: &Mat, scratch: &mut Mat, out: &mut RgbImage) -> opencv::Result<()> {
    let code = match source.channels() {
        1 => imgproc::COLOR_GRAY2RGB,
        4 => imgproc::COLOR_BGRA2RGB,
        _ => imgproc::COLOR_BGR2RGB,
    };
    imgproc::cvt_color(source, scratch, code, 0)?;

    let width = scratch.cols() as u32;
    let height = scratch.rows() as u32;
    if out.dimensions() != (width, height) {
        *out = RgbImage::new(width, height);
    }
    out.copy_from_slice(scratch.data_bytes()?);
    Ok(())
}

/// An open `VideoCapture` plus the buffers a read goes through.
#[derive(Default)]
struct CaptureReader {
    capture: Option<VideoCapture>,
    raw: Mat,
    converted: Mat,
}

impl CaptureReader {
    fn read(&mut self, frame: &mut RgbImage) -> opencv::Result<bool> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(false);
        };
        if !capture.read(&mut self.raw)? || self.raw.empty() {
            return Ok(false);
        }
        mat_to_rgb(&self.raw, &mut self.converted, frame)?;
        Ok(true)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            let _ = capture.release();
        }
    }
}

#[derive(Default)]
pub struct OpenCvGrabber {
    reader: CaptureReader,
}

impl FrameGrabber for OpenCvGrabber {
    fn open(&mut self, device_id: i32, width: u32, height: u32) -> Result<(u32, u32), SourceError> {
        let camera = |e: opencv::Error| SourceError::Camera(format!("camera {device_id}: {e}"));

        let mut capture = VideoCapture::new(device_id, videoio::CAP_ANY).map_err(camera)?;
        if !capture.is_opened().map_err(camera)? {
            return Err(SourceError::Camera(format!("camera {device_id} failed to open")));
        }
        capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))
            .map_err(camera)?;
        capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))
            .map_err(camera)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(camera)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(camera)? as u32;
        self.reader.capture = Some(capture);
        Ok((actual_width, actual_height))
    }

    fn grab(&mut self, frame: &mut RgbImage) -> Result<bool, SourceError> {
        self.reader
            .read(frame)
            .map_err(|e| SourceError::Camera(e.to_string()))
    }

    fn close(&mut self) {
        self.reader.release();
    }
}

#[derive(Default)]
pub struct OpenCvDecoder {
    reader: CaptureReader,
}

impl FrameDecoder for OpenCvDecoder {
    fn open(&mut self, path: &Path) -> Result<StreamInfo, SourceError> {
        let decoder = |e: opencv::Error| SourceError::Decoder(format!("{}: {e}", path.display()));

        let name = path.to_string_lossy();
        let capture = VideoCapture::from_file(&name, videoio::CAP_ANY).map_err(decoder)?;
        if !capture.is_opened().map_err(decoder)? {
            return Err(SourceError::Decoder(format!("{} could not be decoded", path.display())));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(decoder)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(decoder)? as u32;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT).map_err(decoder)?.max(0.0);
        let fps = capture.get(videoio::CAP_PROP_FPS).map_err(decoder)?;
        let duration_ms = if fps > 0.0 {
            (frame_count / fps * 1000.0) as u64
        } else {
            0
        };

        self.reader.capture = Some(capture);
        Ok(StreamInfo {
            width,
            height,
            frame_count: frame_count as u64,
            duration_ms,
        })
    }

    fn read_frame(&mut self, frame: &mut RgbImage) -> Result<bool, SourceError> {
        self.reader
            .read(frame)
            .map_err(|e| SourceError::Decoder(e.to_string()))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        let capture = self
            .reader
            .capture
            .as_mut()
            .ok_or_else(|| SourceError::Decoder("capture is not open".into()))?;
        capture
            .set(videoio::CAP_PROP_POS_FRAMES, 0.0)
            .map_err(|e| SourceError::Decoder(e.to_string()))?;
        Ok(())
    }

    fn close(&mut self) {
        self.reader.release();
    }
}
