//! Recorded-file playback.

use super::{Frame, VideoSource};
use crate::config_store::ConfigStore;
use crate::error::SourceError;
use crate::settings::keys;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_FILENAME: &str = "input.mov";

/// What a decoder reports about a recording once it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub duration_ms: u64,
}

/// A recording decoder delivering packed RGB8 frames in order.
pub trait FrameDecoder {
    fn open(&mut self, path: &Path) -> Result<StreamInfo, SourceError>;

    /// Decodes the next frame into `frame`. `Ok(false)` at end of stream.
    fn read_frame(&mut self, frame: &mut RgbImage) -> Result<bool, SourceError>;

    /// Seeks back to the first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;

    fn close(&mut self);
}

/// Logical timestamp of frame `index`: `index * duration_ms / frame_count`, truncated.
pub fn playback_timestamp(index: u64, duration_ms: u64, frame_count: u64) -> u64 {
    if frame_count == 0 {
        return 0;
    }
    let scaled = u128::from(index) * u128::from(duration_ms) / u128::from(frame_count);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Names starting with `.` or `/` are taken relative to the working directory, all
/// others relative to `data_dir`.
pub fn resolve_media_path(name: &str, data_dir: &Path) -> PathBuf {
    if name.starts_with('.') || name.starts_with('/') {
        PathBuf::from(name)
    } else {
        data_dir.join(name)
    }
}

pub struct FilePlayback<D> {
    decoder: D,
    info: StreamInfo,
    path: Option<PathBuf>,
    frame: Frame,
    scratch: RgbImage,
    /// Index of the next frame the decoder will produce.
    next_index: u64,
    looping: bool,
    paused: bool,
    frame_new: bool,
}

impl<D: FrameDecoder> FilePlayback<D> {
    /// A player that loops and stays paused until `start`.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            info: StreamInfo::default(),
            path: None,
            frame: Frame::empty(),
            scratch: RgbImage::new(0, 0),
            next_index: 0,
            looping: true,
            paused: true,
            frame_new: false,
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn stream_info(&self) -> StreamInfo {
        self.info
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read_next(&mut self) -> Result<bool, SourceError> {
        if self.decoder.read_frame(&mut self.scratch)? {
            return Ok(true);
        }
        if !self.looping {
            self.next_index = self.next_index.max(self.info.frame_count);
            return Ok(false);
        }
        debug!("end of recording, looping");
        self.decoder.rewind()?;
        self.next_index = 0;
        self.decoder.read_frame(&mut self.scratch)
    }
}

impl<D: FrameDecoder> VideoSource for FilePlayback<D> {
    fn setup(&mut self, config: &mut ConfigStore) -> Result<(), SourceError> {
        let name = config.get_or(keys::PLAYER_FILENAME, DEFAULT_FILENAME.to_string());
        let path = resolve_media_path(&name, &config.base_dir());
        if !path.is_file() {
            return Err(SourceError::FileNotFound(path));
        }

        self.info = self.decoder.open(&path)?;
        self.scratch = RgbImage::new(self.info.width, self.info.height);
        self.next_index = 0;
        info!(
            path = %path.display(),
            width = self.info.width,
            height = self.info.height,
            frames = self.info.frame_count,
            duration_ms = self.info.duration_ms,
            "Opened recording"
        );
        self.path = Some(path);
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

        match self.read_next() {
            Ok(true) => {
                std::mem::swap(&mut self.frame.image, &mut self.scratch);
                self.frame.timestamp =
                    playback_timestamp(self.next_index, self.info.duration_ms, self.info.frame_count);
                self.next_index += 1;
                self.frame_new = true;
            }
            Ok(false) => {}
            Err(err) => warn!(%err, "decode failed, skipping frame"),
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
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn close(&mut self) {
        self.decoder.close();
        info!("Closed recording");
    }

    /// True once a non-looping player has run out of frames.
    fn is_finished(&self) -> bool {
        !self.looping && self.info.frame_count > 0 && self.next_index >= self.info.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::fs;

    /// Produces `frames` solid frames whose red channel is the frame index.
    struct CountingDecoder {
        frames: u64,
        position: u64,
        rewinds: usize,
    }

    impl CountingDecoder {
        fn new(frames: u64) -> Self {
            Self {
                frames,
                position: 0,
                rewinds: 0,
            }
        }
    }

    impl FrameDecoder for CountingDecoder {
        fn open(&mut self, _path: &Path) -> Result<StreamInfo, SourceError> {
            Ok(StreamInfo {
                width: 2,
                height: 2,
                frame_count: self.frames,
                duration_ms: self.frames * 100,
            })
        }

        fn read_frame(&mut self, frame: &mut RgbImage) -> Result<bool, SourceError> {
            if self.position >= self.frames {
                return Ok(false);
            }
            *frame = RgbImage::from_pixel(2, 2, Rgb([self.position as u8, 0, 0]));
            self.position += 1;
            Ok(true)
        }

        fn rewind(&mut self) -> Result<(), SourceError> {
            self.position = 0;
            self.rewinds += 1;
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn config_with_file(dir: &Path, name: &str) -> ConfigStore {
        fs::write(dir.join(name), b"not really a video").unwrap();
        let mut config = ConfigStore::with_path(dir.join("settings.json"));
        config.set(keys::PLAYER_FILENAME, name.to_string(), true);
        config
    }

    #[test]
    fn test_timestamp_formula() {
        assert_eq!(playback_timestamp(10, 10_000, 300), 333);
        assert_eq!(playback_timestamp(0, 10_000, 300), 0);
        assert_eq!(playback_timestamp(5, 10_000, 0), 0);
        assert_eq!(playback_timestamp(u64::MAX, u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_resolve_media_path() {
        let data = Path::new("/srv/data");
        assert_eq!(resolve_media_path("clip.mov", data), PathBuf::from("/srv/data/clip.mov"));
        assert_eq!(resolve_media_path("./clip.mov", data), PathBuf::from("./clip.mov"));
        assert_eq!(resolve_media_path("/tmp/clip.mov", data), PathBuf::from("/tmp/clip.mov"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigStore::with_path(dir.path().join("settings.json"));
        config.set(keys::PLAYER_FILENAME, "absent.mov".to_string(), true);

        let mut player = FilePlayback::new(CountingDecoder::new(3));
        match player.setup(&mut config) {
            Err(SourceError::FileNotFound(path)) => assert!(path.ends_with("absent.mov")),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_starts_paused_and_stamps_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_file(dir.path(), "clip.mov");
        let mut player = FilePlayback::new(CountingDecoder::new(3));
        player.setup(&mut config).unwrap();
        assert_eq!(player.path(), Some(dir.path().join("clip.mov").as_path()));

        assert!(player.is_paused());
        assert!(!player.update());

        player.start();
        let stamps: Vec<u64> = (0..3)
            .map(|_| {
                assert!(player.update());
                player.current_frame_timestamp()
            })
            .collect();
        assert_eq!(stamps, vec![0, 100, 200]);
        assert_eq!(player.pixels().get_pixel(0, 0), &Rgb([2, 0, 0]));
    }

    #[test]
    fn test_loops_back_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_file(dir.path(), "clip.mov");
        let mut player = FilePlayback::new(CountingDecoder::new(2));
        player.setup(&mut config).unwrap();
        player.start();

        for _ in 0..2 {
            assert!(player.update());
        }
        assert!(player.update());
        assert_eq!(player.current_frame_timestamp(), 0);
        assert_eq!(player.pixels().get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(player.decoder.rewinds, 1);
    }

    #[test]
    fn test_without_looping_stops_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_file(dir.path(), "clip.mov");
        let mut player = FilePlayback::new(CountingDecoder::new(1));
        player.set_looping(false);
        player.setup(&mut config).unwrap();
        player.start();

        assert!(player.update());
        assert!(!player.update());
        assert!(player.is_finished());
        assert_eq!(player.frame().width(), 2);
    }
}
