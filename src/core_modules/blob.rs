// THEORY:
// A `Blob` is one connected region of the detection image that passed the area bounds
// for the current tick. Like the other containers in this layer it is stateless: it
// describes a region in a single frame and is dropped once the tick has been reported.
// A `DetectionResult` is the ordered set of blobs for one frame plus their summed area.

/// Axis-aligned box in pixel coordinates; `x`/`y` is the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Geometric center of the box.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

/// A single region reported by the blob extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// The box enclosing every pixel of the region.
    pub bounding_box: BoundingBox,
    /// The number of pixels in the region.
    pub area: u32,
    /// True for an enclosed background region rather than a foreground one.
    pub is_hole: bool,
}

impl Blob {
    /// The reported position of the blob: its bounding-box center.
    pub fn centroid(&self) -> (f32, f32) {
        self.bounding_box.center()
    }
}

/// The blobs found in one frame, largest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub blobs: Vec<Blob>,
    /// Sum of the areas of `blobs`.
    pub total_area: u64,
    /// Logical timestamp of the frame that produced this result.
    pub timestamp: u64,
}

impl DetectionResult {
    pub fn new(blobs: Vec<Blob>, timestamp: u64) -> Self {
        let total_area = blobs.iter().map(|blob| u64::from(blob.area)).sum();
        Self {
            blobs,
            total_area,
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}
