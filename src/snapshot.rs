pub mod snapshot {
    use crate::error::Result;
    use crate::video_source::Frame;
    use chrono::{DateTime, TimeZone};
    use image::ImageEncoder;
    use image::error::{ImageError, ParameterError, ParameterErrorKind};
    use std::io::BufWriter;
    use std::path::Path;

    /// Writes the raw RGB frame to `path` as a PNG. A frame with no pixels is rejected.
    pub fn save_png(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
        if frame.is_empty() {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
            .into());
        }
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            frame.image.as_raw(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(())
    }

    /// `<prefix>-<YYYYMMDDHHMMSS>.png`
    pub fn still_file_name<Tz: TimeZone>(prefix: &str, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!("{prefix}-{}.png", now.format("%Y%m%d%H%M%S"))
    }
}
