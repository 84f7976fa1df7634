// THEORY:
// The `BackgroundModel` holds the single grayscale reference the difference path
// subtracts from every frame. It never adapts on its own: the reference is taken from
// the first frame it sees and is replaced only when someone asks for it.

use image::GrayImage;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BackgroundModel {
    reference: Option<GrayImage>,
    learn_requested: bool,
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundModel {
    /// A model with no reference yet; the next frame it observes becomes the reference.
    pub fn new() -> Self {
        Self {
            reference: None,
            learn_requested: true,
        }
    }

    /// Copies `gray` into the reference.
    pub fn learn(&mut self, gray: &GrayImage) {
        match &mut self.reference {
            Some(reference) => reference.clone_from(gray),
            None => self.reference = Some(gray.clone()),
        }
        self.learn_requested = false;
        debug!(width = gray.width(), height = gray.height(), "learned background");
    }

    /// Asks for the next observed frame to replace the reference.
    pub fn request_learn(&mut self) {
        self.learn_requested = true;
    }

    pub fn is_learn_pending(&self) -> bool {
        self.learn_requested
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    /// Learns from `gray` if a learn is pending or the reference no longer matches the
    /// frame size, then returns the reference to subtract.
    pub fn observe(&mut self, gray: &GrayImage) -> &GrayImage {
        let stale = self
            .reference
            .as_ref()
            .is_none_or(|reference| reference.dimensions() != gray.dimensions());
        if self.learn_requested || stale {
            self.learn(gray);
        }
        self.reference.get_or_insert_with(|| gray.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_first_observation_learns() {
        let mut model = BackgroundModel::new();
        assert!(model.is_learn_pending());
        let frame = GrayImage::from_pixel(4, 4, Luma([10]));
        assert_eq!(model.observe(&frame), &frame);
        assert!(!model.is_learn_pending());
    }

    #[test]
    fn test_reference_is_static_until_requested() {
        let mut model = BackgroundModel::new();
        let first = GrayImage::from_pixel(4, 4, Luma([10]));
        let second = GrayImage::from_pixel(4, 4, Luma([200]));
        model.observe(&first);
        assert_eq!(model.observe(&second), &first);

        model.request_learn();
        assert_eq!(model.observe(&second), &second);
    }

    #[test]
    fn test_size_change_relearns() {
        let mut model = BackgroundModel::new();
        model.observe(&GrayImage::new(4, 4));
        let larger = GrayImage::from_pixel(8, 6, Luma([3]));
        assert_eq!(model.observe(&larger).dimensions(), (8, 6));
    }
}
