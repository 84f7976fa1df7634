// THEORY:
// A `Session` is one run of the detector: a video source, the detection pipeline, the
// runtime parameters and the record logger, driven one tick at a time. Each tick is
// strictly ordered: acquisition, then detection, then logging. Commands arrive between
// ticks, so a change made by a command is seen by the next tick and never half-way
// through one.

use crate::error::{BlobwatchError, Result};
use crate::logger::{DetectionLogger, LogSink};
use crate::parameters::{ColorChannel, DetectionMode, RuntimeParameterStore};
use crate::pipeline::{DetectionPipeline, DetectionResult};
use crate::settings::keys;
use crate::snapshot::snapshot;
use crate::video_source::VideoSource;
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a user can ask of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LearnBackground,
    ToggleMode,
    AdjustThreshold(i32),
    AdjustColorChannel(ColorChannel, i32),
    AdjustColorRadius(i64),
    AdjustLogInterval(i64),
    AdjustMinArea(i64),
    AdjustMaxArea(i64),
    SetLogSink(LogSink),
    ResetTimeOrigin,
    SaveConfig,
    DeleteConfig,
    ReloadConfig,
    CaptureStill,
    TogglePause,
    /// Takes the color target from the raw frame pixel at `(x, y)`. Ignored outside
    /// COLOR mode or outside the frame.
    PickColor { x: u32, y: u32 },
}

pub struct Session<S, C = Stdout, F = BufWriter<File>> {
    source: S,
    pipeline: DetectionPipeline,
    parameters: RuntimeParameterStore,
    logger: DetectionLogger<C, F>,
    sink: LogSink,
    start_time: u64,
}

/// Sets up and starts `source`. A source that cannot be set up is fatal.
fn start_source<S: VideoSource>(
    source: &mut S,
    parameters: &mut RuntimeParameterStore,
) -> Result<()> {
    source.setup(parameters.config_mut())?;
    source.start();
    info!(
        width = source.width(),
        height = source.height(),
        "Session started"
    );
    Ok(())
}

impl<S: VideoSource> Session<S> {
    /// Loads `settings_path` and starts `source`, then opens the log file next to the
    /// settings. Nothing is written to disk when the source fails to start.
    pub fn open(mut source: S, settings_path: impl AsRef<Path>) -> Result<Self> {
        let mut parameters = RuntimeParameterStore::open(settings_path);
        start_source(&mut source, &mut parameters)?;

        let config = parameters.config();
        let prefix = config.get_or(keys::LOG_FILE_PREFIX, "data".to_string());
        let logger = DetectionLogger::open(&config.base_dir(), &prefix, &Local::now())?;
        Ok(Self::assemble(source, parameters, logger))
    }
}

impl<S: VideoSource, C: Write, F: Write> Session<S, C, F> {
    /// Sets up and starts `source` and logs through `logger`.
    pub fn new(
        mut source: S,
        mut parameters: RuntimeParameterStore,
        logger: DetectionLogger<C, F>,
    ) -> Result<Self> {
        start_source(&mut source, &mut parameters)?;
        Ok(Self::assemble(source, parameters, logger))
    }

    fn assemble(
        source: S,
        parameters: RuntimeParameterStore,
        logger: DetectionLogger<C, F>,
    ) -> Self {
        Self {
            source,
            pipeline: DetectionPipeline::new(),
            parameters,
            logger,
            sink: LogSink::default(),
            start_time: 0,
        }
    }

    /// Runs one tick. Returns the fresh result, or `None` when there was no frame to
    /// process.
    pub fn tick(&mut self) -> Result<Option<&DetectionResult>> {
        // --- 1. Acquire ---
        let frame_new = self.source.update();
        let holding = self.source.is_paused() && !self.source.frame().is_empty();
        if !frame_new && !holding {
            return Ok(None);
        }

        // --- 2. Detect ---
        let params = self.parameters.params();
        let result = self.pipeline.process(self.source.frame(), params);

        // --- 3. Log ---
        self.logger
            .log(self.sink, result, self.start_time, params.log_interval_ms)?;
        Ok(Some(result))
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        debug!(?command, "applying command");
        match command {
            Command::LearnBackground => self.pipeline.request_background_learn(),
            Command::ToggleMode => {
                let mode = self.parameters.toggle_mode();
                info!(mode = mode.as_str(), "Detection mode changed");
            }
            Command::AdjustThreshold(delta) => self.parameters.adjust_threshold(delta),
            Command::AdjustColorChannel(channel, delta) => {
                self.parameters.adjust_color_channel(channel, delta)
            }
            Command::AdjustColorRadius(delta) => self.parameters.adjust_color_radius(delta),
            Command::AdjustLogInterval(delta) => self.parameters.adjust_log_interval(delta),
            Command::AdjustMinArea(delta) => self.parameters.adjust_min_area(delta),
            Command::AdjustMaxArea(delta) => self.parameters.adjust_max_area(delta),
            Command::SetLogSink(sink) => self.sink = sink,
            Command::ResetTimeOrigin => {
                self.start_time = self.source.current_frame_timestamp();
                info!(start_time = self.start_time, "Time origin reset");
            }
            Command::SaveConfig => {
                self.parameters.save()?;
                info!("Settings saved");
            }
            Command::DeleteConfig => {
                let deleted = self.parameters.delete()?;
                info!(deleted, "Settings file deleted");
            }
            Command::ReloadConfig => {
                self.parameters.reload();
            }
            Command::CaptureStill => {
                self.capture_still()?;
            }
            Command::TogglePause => self.source.toggle_pause(),
            Command::PickColor { x, y } => self.pick_color(x, y),
        }
        Ok(())
    }

    /// Saves the current raw frame as `<prefix>-<YYYYMMDDHHMMSS>.png` next to the
    /// settings file.
    pub fn capture_still(&self) -> Result<PathBuf> {
        let frame = self.source.frame();
        if frame.is_empty() {
            return Err(BlobwatchError::Config("no frame to capture yet".into()));
        }
        let config = self.parameters.config();
        let prefix = config.get_or(keys::LOG_FILE_PREFIX, "data".to_string());
        let path = config
            .base_dir()
            .join(snapshot::still_file_name(&prefix, &Local::now()));
        snapshot::save_png(&path, frame)?;
        info!(path = %path.display(), "Saved still image");
        Ok(path)
    }

    fn pick_color(&mut self, x: u32, y: u32) {
        if self.parameters.params().mode != DetectionMode::Color {
            return;
        }
        match self.source.pixels().get_pixel_checked(x, y) {
            Some(pixel) => {
                let target = pixel.0;
                self.parameters.set_color_target(target);
                info!(?target, x, y, "Color target picked");
            }
            None => warn!(x, y, "color pick outside the frame"),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn parameters(&self) -> &RuntimeParameterStore {
        &self.parameters
    }

    pub fn logger(&self) -> &DetectionLogger<C, F> {
        &self.logger
    }

    pub fn sink(&self) -> LogSink {
        self.sink
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Closes the source and hands back the logger.
    pub fn close(mut self) -> DetectionLogger<C, F> {
        self.source.close();
        info!("Session closed");
        self.logger
    }
}
