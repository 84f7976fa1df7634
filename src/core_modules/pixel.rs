// THEORY (single-pixel heuristics):
// The `Pixel` module is the smallest unit of the detector: one packed RGB pixel and the
// measures that can be computed from it alone. Luminance drives the grayscale
// difference path; squared channel distance drives the color-target path. Anything that
// needs neighbours or history lives in higher modules.
//
// Frames are packed 3-channel RGB. Backends that deliver BGR or carry an alpha channel
// convert before a frame reaches this layer.

pub mod pixel {
    use image::Rgb;

    pub type Channel = u8;
    pub type Luminance = f64;

    pub const CHANNELS: usize = 3;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Pixel {
        pub const BLACK: Pixel = Pixel::new(0, 0, 0);

        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// Rec. 601 luma, the weighting camera pipelines use for RGB to gray.
        pub fn luminance(&self) -> Luminance {
            0.299 * self.red as f64 + 0.587 * self.green as f64 + 0.114 * self.blue as f64
        }

        /// Luminance rounded to the nearest gray level.
        pub fn gray(&self) -> Channel {
            self.luminance().round().clamp(0.0, 255.0) as Channel
        }

        /// Squared Euclidean distance in channel space. Exact, so radius tests have no
        /// rounding at the boundary.
        pub fn distance_squared(&self, other: &Pixel) -> u32 {
            let dr = self.red.abs_diff(other.red) as u32;
            let dg = self.green.abs_diff(other.green) as u32;
            let db = self.blue.abs_diff(other.blue) as u32;
            dr * dr + dg * dg + db * db
        }

        pub fn distance(&self, other: &Pixel) -> f64 {
            (self.distance_squared(other) as f64).sqrt()
        }

        pub fn max_channel(&self) -> Channel {
            self.red.max(self.green).max(self.blue)
        }

        pub fn channels(&self) -> [Channel; CHANNELS] {
            [self.red, self.green, self.blue]
        }
    }

    impl From<[Channel; CHANNELS]> for Pixel {
        fn from(channels: [Channel; CHANNELS]) -> Self {
            Pixel::new(channels[0], channels[1], channels[2])
        }
    }

    impl From<Rgb<Channel>> for Pixel {
        fn from(rgb: Rgb<Channel>) -> Self {
            Pixel::from(rgb.0)
        }
    }

    impl From<&Rgb<Channel>> for Pixel {
        fn from(rgb: &Rgb<Channel>) -> Self {
            Pixel::from(rgb.0)
        }
    }

    impl From<Pixel> for Rgb<Channel> {
        fn from(pixel: Pixel) -> Self {
            Rgb(pixel.channels())
        }
    }
}
