// THEORY:
// The `BlobDetector` is the spatial grouping stage. It takes the binary detection image
// built by the pipeline and turns it into a short list of `Blob`s.
//
// Algorithm steps:
// 1.  **Binarize**: any non-zero pixel is foreground. The detection image is usually
//     already 0/255, but the extractor does not rely on it.
// 2.  **Label**: foreground pixels are grouped into 8-connected components. When holes
//     are requested, background pixels are grouped into 4-connected components as well,
//     and every background component that does not touch the image border is an
//     enclosed hole.
// 3.  **Aggregate**: each component is reduced to its bounding box and pixel count.
// 4.  **Select**: components outside `[min_area, max_area]` are dropped, the rest are
//     ordered largest first (ties keep scan order) and capped at `max_blobs`.
//
// The detector is stateless. It has no memory of previous frames.

use crate::core_modules::blob::{Blob, BoundingBox};
use image::GrayImage;

/// Area bounds and count cap handed to an extractor each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub min_area: u32,
    pub max_area: u32,
    pub max_blobs: usize,
    pub include_holes: bool,
}

/// Finds blobs in a binary detection image.
pub trait BlobExtractor {
    fn extract(&mut self, detection_image: &GrayImage, request: &ExtractionRequest) -> Vec<Blob>;
}

/// The stock extractor, backed by `imageproc` connected-component labelling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentExtractor;

impl BlobExtractor for ComponentExtractor {
    fn extract(&mut self, detection_image: &GrayImage, request: &ExtractionRequest) -> Vec<Blob> {
        blob_detector::find_blobs(
            detection_image,
            request.min_area,
            request.max_area,
            request.max_blobs,
            request.include_holes,
        )
    }
}

pub mod blob_detector {
    use super::*; // Make structs from parent module available.
    use image::Luma;
    use imageproc::contrast::{ThresholdType, threshold};
    use imageproc::definitions::Image;
    use imageproc::region_labelling::{Connectivity, connected_components};

    const FOREGROUND: u8 = 255;
    const BACKGROUND: u8 = 0;

    /// Running extent of one labelled component.
    #[derive(Debug, Clone, Copy)]
    struct Region {
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        area: u32,
        touches_border: bool,
    }

    impl Region {
        fn new(x: u32, y: u32) -> Self {
            Self {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                area: 0,
                touches_border: false,
            }
        }

        fn bounding_box(&self) -> BoundingBox {
            BoundingBox {
                x: self.min_x,
                y: self.min_y,
                width: self.max_x - self.min_x + 1,
                height: self.max_y - self.min_y + 1,
            }
        }
    }

    /// The main function of the spatial layer.
    pub fn find_blobs(
        detection_image: &GrayImage,
        min_area: u32,
        max_area: u32,
        max_blobs: usize,
        include_holes: bool,
    ) -> Vec<Blob> {
        if max_blobs == 0 || detection_image.width() == 0 || detection_image.height() == 0 {
            return Vec::new();
        }

        // --- 1. Binarize ---
        let binary = threshold(detection_image, BACKGROUND, ThresholdType::Binary);

        // --- 2 & 3. Label and aggregate foreground ---
        let labels = connected_components(&binary, Connectivity::Eight, Luma([BACKGROUND]));
        let mut candidates: Vec<Blob> = collect_regions(&labels)
            .into_iter()
            .map(|region| Blob {
                bounding_box: region.bounding_box(),
                area: region.area,
                is_hole: false,
            })
            .collect();

        // Holes: background components, labelled with the roles swapped.
        if include_holes {
            let hole_labels = connected_components(&binary, Connectivity::Four, Luma([FOREGROUND]));
            candidates.extend(
                collect_regions(&hole_labels)
                    .into_iter()
                    .filter(|region| !region.touches_border)
                    .map(|region| Blob {
                        bounding_box: region.bounding_box(),
                        area: region.area,
                        is_hole: true,
                    }),
            );
        }

        // --- 4. Select ---
        candidates.retain(|blob| blob.area >= min_area && blob.area <= max_area);
        candidates.sort_by(|a, b| b.area.cmp(&a.area));
        candidates.truncate(max_blobs);
        candidates
    }

    /// Reduces a label image to one `Region` per label, in label order.
    fn collect_regions(labels: &Image<Luma<u32>>) -> Vec<Region> {
        let (width, height) = labels.dimensions();
        let mut regions: Vec<Option<Region>> = Vec::new();

        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if regions.len() < label {
                regions.resize(label, None);
            }
            let region = regions[label - 1].get_or_insert_with(|| Region::new(x, y));
            region.min_x = region.min_x.min(x);
            region.min_y = region.min_y.min(y);
            region.max_x = region.max_x.max(x);
            region.max_y = region.max_y.max(y);
            region.area += 1;
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                region.touches_border = true;
            }
        }

        regions.into_iter().flatten().collect()
    }
}
