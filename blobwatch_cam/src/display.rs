//! Preview rendering.
//!
//! The window is a 2x2 grid of half-size panels: the raw frame, the grayscale image, the
//! background reference and the detection image. Blob markers are drawn on the raw and
//! detection panels. Below the grid a text band carries the status line and the key help.

use blobwatch::{
    BoundingBox, DetectionMode, DetectionPipeline, DetectionResult, LogSink, RuntimeParameters,
};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

pub const WINDOW: &str = "blobwatch";

const RAW_PANEL: u32 = 0;
const DETECTION_PANEL: u32 = 3;
const LINE_HEIGHT: u32 = 18;

/// Everything the status line reports.
pub struct Status<'a> {
    pub params: &'a RuntimeParameters,
    pub sink: LogSink,
    pub paused: bool,
}

/// Size of one grid panel for a `width` x `height` frame.
fn panel_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Top-left corner of panel `index`, left to right then top to bottom.
fn panel_origin(index: u32, panel: (u32, u32)) -> (u32, u32) {
    ((index % 2) * panel.0, (index / 2) * panel.1)
}

/// Tiles `frame`, `gray`, `background` and `detection` into the grid and adds
/// `text_lines` rows of blank band underneath. Missing or empty images leave their panel
/// black.
fn mosaic(
    frame: &RgbImage,
    gray: &GrayImage,
    background: Option<&GrayImage>,
    detection: &GrayImage,
    text_lines: u32,
) -> RgbImage {
    let panel = panel_size(frame.width(), frame.height());
    let mut canvas = RgbImage::new(panel.0 * 2, panel.1 * 2 + text_lines * LINE_HEIGHT);

    let grays = [Some(gray), background, Some(detection)];
    let panels = std::iter::once(Some(frame.clone())).chain(
        grays
            .into_iter()
            .map(|image| image.map(|g| DynamicImage::ImageLuma8(g.clone()).into_rgb8())),
    );

    for (index, image) in (0u32..).zip(panels) {
        let Some(image) = image.filter(|i| i.width() > 0 && i.height() > 0) else {
            continue;
        };
        let scaled = imageops::resize(&image, panel.0, panel.1, FilterType::Triangle);
        let (x, y) = panel_origin(index, panel);
        imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
    }
    canvas
}

/// Copies `image` into a BGR `Mat` for OpenCV drawing and display.
fn to_bgr(image: &RgbImage) -> opencv::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

fn status_line(result: &DetectionResult, status: &Status) -> String {
    let params = status.params;
    let mode = match params.mode {
        DetectionMode::Grayscale => format!("gray t={}", params.threshold),
        DetectionMode::Color => {
            let [r, g, b] = params.color_target;
            format!("color ({r},{g},{b}) r={}", params.color_radius)
        }
    };
    let sink = match status.sink {
        LogSink::Console => "console",
        LogSink::File => "file",
    };
    format!(
        "{mode} | area {}..{} | blobs {}/{} total {} | log {}ms {sink}{}",
        params.min_area,
        params.max_area,
        result.len(),
        params.max_blobs,
        result.total_area,
        params.log_interval_ms,
        if status.paused { " | paused" } else { "" },
    )
}

/// `bbox` scaled by `scale` and moved into the panel at `origin`.
fn panel_rect(bbox: BoundingBox, origin: (u32, u32), scale: f64) -> Rect {
    Rect::new(
        origin.0 as i32 + (f64::from(bbox.x) * scale) as i32,
        origin.1 as i32 + (f64::from(bbox.y) * scale) as i32,
        ((f64::from(bbox.width) * scale) as i32).max(1),
        ((f64::from(bbox.height) * scale) as i32).max(1),
    )
}

/// Builds the preview image for one tick.
pub fn render(
    image: &RgbImage,
    pipeline: &DetectionPipeline,
    status: &Status,
    help: &[&str],
) -> opencv::Result<Mat> {
    let result = pipeline.last_result();
    let lines: Vec<String> = std::iter::once(status_line(result, status))
        .chain(help.iter().map(|line| line.to_string()))
        .collect();

    let tiles = mosaic(
        image,
        pipeline.gray(),
        pipeline.background(),
        pipeline.detection_image(),
        lines.len() as u32,
    );
    let mut canvas = to_bgr(&tiles)?;

    let panel = panel_size(image.width(), image.height());
    let scale = f64::from(panel.0) / f64::from(image.width().max(1));
    let box_color = Scalar::new(0.0, 255.0, 0.0, 0.0);
    let hole_color = Scalar::new(255.0, 128.0, 0.0, 0.0);

    for blob in &result.blobs {
        let color = if blob.is_hole { hole_color } else { box_color };
        for index in [RAW_PANEL, DETECTION_PANEL] {
            let origin = panel_origin(index, panel);
            let rect = panel_rect(blob.bounding_box, origin, scale);
            imgproc::rectangle(&mut canvas, rect, color, 1, imgproc::LINE_8, 0)?;
        }

        let (cx, cy) = blob.centroid();
        let center = Point::new((cx * scale) as i32, (cy * scale) as i32);
        imgproc::circle(&mut canvas, center, 2, color, -1, imgproc::LINE_8, 0)?;
    }

    let band_top = panel.1 * 2;
    for (row, line) in (1u32..).zip(&lines) {
        imgproc::put_text(
            &mut canvas,
            line,
            Point::new(6, (band_top + row * LINE_HEIGHT - 5) as i32),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            1,
            imgproc::LINE_AA,
            false,
        )?;
    }
    Ok(canvas)
}
