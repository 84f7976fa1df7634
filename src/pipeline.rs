// THEORY:
// The `pipeline` module is the per-frame detection engine. It turns one RGB frame and
// the current `RuntimeParameters` into a `DetectionResult`, keeping the intermediate
// images around so a front end can show what the detector sees.
//
// The pipeline has two states. It starts in `AwaitingFirstFrame`; the first frame it
// processes becomes the background reference and moves it to `Steady`. From then on
// the reference only changes when a re-learn is requested (or the frame size changes).

use crate::core_modules::background::BackgroundModel;
use crate::core_modules::blob_detector::{BlobExtractor, ComponentExtractor};
use crate::core_modules::masks;
use crate::core_modules::pixel::pixel::Pixel;
use crate::parameters::{DetectionMode, RuntimeParameters};
use crate::video_source::Frame;
use image::GrayImage;
use tracing::debug;

// Re-export key data structures for the public API.
pub use crate::core_modules::blob::{Blob, BoundingBox, DetectionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    AwaitingFirstFrame,
    Steady,
}

pub struct DetectionPipeline<E = ComponentExtractor> {
    state: PipelineState,
    background: BackgroundModel,
    extractor: E,
    gray: GrayImage,
    detection_image: GrayImage,
    last_result: DetectionResult,
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self::with_extractor(ComponentExtractor)
    }
}

impl<E: BlobExtractor> DetectionPipeline<E> {
    pub fn with_extractor(extractor: E) -> Self {
        Self {
            state: PipelineState::AwaitingFirstFrame,
            background: BackgroundModel::new(),
            extractor,
            gray: GrayImage::new(0, 0),
            detection_image: GrayImage::new(0, 0),
            last_result: DetectionResult::default(),
        }
    }

    /// Runs detection on `frame`. An empty frame does no work and returns the previous
    /// result unchanged.
    pub fn process(&mut self, frame: &Frame, params: &RuntimeParameters) -> &DetectionResult {
        if frame.is_empty() {
            return &self.last_result;
        }

        // Stage 1: Grayscale and background
        self.gray = masks::grayscale(&frame.image);
        let background = self.background.observe(&self.gray);
        if self.state == PipelineState::AwaitingFirstFrame {
            debug!("first frame learned as background");
            self.state = PipelineState::Steady;
        }

        // Stage 2: Detection image
        self.detection_image = match params.mode {
            DetectionMode::Grayscale => {
                masks::difference_mask(background, &self.gray, params.threshold)
            }
            DetectionMode::Color => {
                let target = Pixel::from(params.color_target);
                let filtered =
                    masks::color_distance_filter(&frame.image, target, params.color_radius);
                masks::nonzero_mask(&filtered)
            }
        };

        // Stage 3: Blob extraction
        let blobs = self
            .extractor
            .extract(&self.detection_image, &params.extraction_request());

        // Stage 4: Aggregate
        self.last_result = DetectionResult::new(blobs, frame.timestamp);
        &self.last_result
    }

    /// The next processed frame replaces the background reference.
    pub fn request_background_learn(&mut self) {
        self.background.request_learn();
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn last_result(&self) -> &DetectionResult {
        &self.last_result
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn background(&self) -> Option<&GrayImage> {
        self.background.reference()
    }

    pub fn detection_image(&self) -> &GrayImage {
        &self.detection_image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob_detector::ExtractionRequest;
    use image::{Rgb, RgbImage};

    fn params(mode: DetectionMode) -> RuntimeParameters {
        RuntimeParameters {
            min_area: 1,
            max_area: 10_000,
            max_blobs: 10,
            mode,
            ..RuntimeParameters::default()
        }
    }

    fn with_square(base: &RgbImage, color: Rgb<u8>) -> RgbImage {
        let mut image = base.clone();
        for y in 10..20 {
            for x in 30..40 {
                image.put_pixel(x, y, color);
            }
        }
        image
    }

    #[test]
    fn test_first_frame_is_background() {
        let mut pipeline = DetectionPipeline::new();
        assert_eq!(pipeline.state(), PipelineState::AwaitingFirstFrame);

        let frame = Frame::new(RgbImage::from_pixel(64, 48, Rgb([80, 80, 80])), 5);
        let result = pipeline.process(&frame, &params(DetectionMode::Grayscale));
        assert!(result.is_empty());
        assert_eq!(result.timestamp, 5);
        assert_eq!(pipeline.state(), PipelineState::Steady);
        assert_eq!(pipeline.background().map(|b| b.dimensions()), Some((64, 48)));
    }

    #[test]
    fn test_moving_square_detected() {
        let mut pipeline = DetectionPipeline::new();
        let base = RgbImage::from_pixel(64, 48, Rgb([20, 20, 20]));
        pipeline.process(&Frame::new(base.clone(), 0), &params(DetectionMode::Grayscale));

        let moved = Frame::new(with_square(&base, Rgb([200, 200, 200])), 33);
        let result = pipeline.process(&moved, &params(DetectionMode::Grayscale));
        assert_eq!(result.len(), 1);
        assert_eq!(result.blobs[0].area, 100);
        assert_eq!(result.blobs[0].centroid(), (35.0, 15.0));
        assert_eq!(result.total_area, 100);
        assert_eq!(pipeline.detection_image().get_pixel(35, 15)[0], 255);
    }

    #[test]
    fn test_relearn_absorbs_change() {
        let mut pipeline = DetectionPipeline::new();
        let base = RgbImage::from_pixel(64, 48, Rgb([20, 20, 20]));
        let changed = Frame::new(with_square(&base, Rgb([200, 200, 200])), 1);
        pipeline.process(&Frame::new(base, 0), &params(DetectionMode::Grayscale));

        pipeline.request_background_learn();
        assert!(pipeline.process(&changed, &params(DetectionMode::Grayscale)).is_empty());
        assert!(pipeline.process(&changed, &params(DetectionMode::Grayscale)).is_empty());
    }

    #[test]
    fn test_color_mode_finds_target() {
        let mut pipeline = DetectionPipeline::new();
        let base = RgbImage::from_pixel(64, 48, Rgb([0, 0, 200]));
        let frame = Frame::new(with_square(&base, Rgb([250, 10, 10])), 0);

        let result = pipeline.process(&frame, &params(DetectionMode::Color));
        assert_eq!(result.len(), 1);
        assert_eq!(result.blobs[0].area, 100);
    }

    #[test]
    fn test_empty_frame_keeps_previous_result() {
        let mut pipeline = DetectionPipeline::new();
        let base = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
        let frame = Frame::new(with_square(&base, Rgb([255, 0, 0])), 9);
        pipeline.process(&frame, &params(DetectionMode::Color));

        let result = pipeline.process(&Frame::empty(), &params(DetectionMode::Color));
        assert_eq!(result.timestamp, 9);
        assert_eq!(result.len(), 1);
    }

    struct RecordingExtractor {
        requests: Vec<ExtractionRequest>,
    }

    impl BlobExtractor for RecordingExtractor {
        fn extract(&mut self, _image: &GrayImage, request: &ExtractionRequest) -> Vec<Blob> {
            self.requests.push(*request);
            Vec::new()
        }
    }

    #[test]
    fn test_extractor_receives_parameters() {
        let mut pipeline = DetectionPipeline::with_extractor(RecordingExtractor { requests: Vec::new() });
        let frame = Frame::new(RgbImage::new(8, 8), 0);
        let mut p = params(DetectionMode::Grayscale);
        p.min_area = 3;
        p.max_area = 7;
        p.max_blobs = 2;
        pipeline.process(&frame, &p);

        assert_eq!(
            pipeline.extractor.requests,
            vec![ExtractionRequest {
                min_area: 3,
                max_area: 7,
                max_blobs: 2,
                include_holes: true,
            }]
        );
    }
}
