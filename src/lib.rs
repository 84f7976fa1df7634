// THEORY:
// This file is the main entry point for the `blobwatch` library crate.
// It exports the `Session` and the pieces it is built from: the settings store, the
// video sources, the detection pipeline, the runtime parameters and the record logger.
//
// A front end (like `blobwatch_cam`) supplies a camera or decoder backend, builds a
// `Session` around it, calls `tick` once per frame and turns user input into
// `Command`s. Everything else, including the image processing in `core_modules`,
// happens inside the library.

pub mod config_store;
pub mod core_modules;
pub mod error;
pub mod logger;
pub mod parameters;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod video_source;

pub use config_store::ConfigStore;
pub use error::{BlobwatchError, Result, SourceError};
pub use logger::{DetectionLogger, LogSink};
pub use parameters::{ColorChannel, DetectionMode, RuntimeParameterStore, RuntimeParameters};
pub use pipeline::{Blob, BoundingBox, DetectionPipeline, DetectionResult};
pub use session::{Command, Session};
pub use video_source::{
    FilePlayback, Frame, FrameDecoder, FrameGrabber, LiveCapture, StreamInfo, VideoSource,
};
