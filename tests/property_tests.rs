use blobwatch::config_store::ConfigStore;
use blobwatch::core_modules::blob_detector::blob_detector::find_blobs;
use blobwatch::core_modules::masks::{color_distance_filter, difference_mask, nonzero_mask};
use blobwatch::core_modules::pixel::pixel::Pixel;
use blobwatch::{ColorChannel, RuntimeParameterStore};
use image::{GrayImage, Luma, Rgb, RgbImage};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Adjustment {
    MinArea(i64),
    MaxArea(i64),
    Threshold(i32),
    LogInterval(i64),
    Color(u8, i32),
    Radius(i64),
}

fn adjustment() -> impl Strategy<Value = Adjustment> {
    let step = prop_oneof![Just(1i64), Just(-1), Just(1000), Just(-1000)];
    prop_oneof![
        step.clone().prop_map(Adjustment::MinArea),
        step.clone().prop_map(Adjustment::MaxArea),
        prop_oneof![Just(1i32), Just(-1)].prop_map(Adjustment::Threshold),
        step.clone().prop_map(Adjustment::LogInterval),
        (0u8..3, prop_oneof![Just(1i32), Just(-1)]).prop_map(|(c, d)| Adjustment::Color(c, d)),
        step.prop_map(Adjustment::Radius),
    ]
}

fn channel(index: u8) -> ColorChannel {
    match index {
        0 => ColorChannel::Red,
        1 => ColorChannel::Green,
        _ => ColorChannel::Blue,
    }
}

proptest! {
    #[test]
    fn test_adjustments_keep_invariants(steps in prop::collection::vec(adjustment(), 0..200)) {
        let mut store = RuntimeParameterStore::from_config(ConfigStore::new());
        for step in steps {
            match step {
                Adjustment::MinArea(d) => store.adjust_min_area(d),
                Adjustment::MaxArea(d) => store.adjust_max_area(d),
                Adjustment::Threshold(d) => store.adjust_threshold(d),
                Adjustment::LogInterval(d) => store.adjust_log_interval(d),
                Adjustment::Color(c, d) => store.adjust_color_channel(channel(c), d),
                Adjustment::Radius(d) => store.adjust_color_radius(d),
            }
            let params = store.params();
            prop_assert!(params.min_area <= params.max_area);
            prop_assert!(params.log_interval_ms >= -1);
        }

        // Everything is written through to the tree.
        let reread = RuntimeParameterStore::from_config({
            let mut copy = ConfigStore::new();
            store.params().write_to(&mut copy);
            copy
        });
        prop_assert_eq!(reread.params(), store.params());
    }

    #[test]
    fn test_set_then_get(
        segments in prop::collection::vec("[a-z]{1,6}", 1..4),
        value in any::<i64>(),
    ) {
        let path = segments.join(".");
        let mut config = ConfigStore::new();
        prop_assert!(!config.has(&path));
        prop_assert!(config.set(&path, value, true));
        prop_assert!(config.has(&path));
        prop_assert_eq!(config.get::<i64>(&path), value);
    }

    #[test]
    fn test_migrate_is_idempotent(value in "[a-z0-9]{1,8}") {
        let mut config = ConfigStore::new();
        config.set("legacy", value.clone(), true);
        prop_assert!(config.migrate("legacy", "fresh.key"));
        prop_assert!(!config.migrate("legacy", "fresh.key"));
        prop_assert_eq!(config.get::<String>("fresh.key"), value);
        prop_assert_eq!(config.migrations(), 1);
    }

    #[test]
    fn test_identical_frames_have_no_blobs(seed in any::<u64>(), threshold in any::<u8>()) {
        let gray = GrayImage::from_fn(24, 16, |x, y| {
            Luma([(seed.wrapping_mul(u64::from(x * 31 + y * 17 + 1)) >> 7) as u8])
        });
        let mask = difference_mask(&gray, &gray, threshold);
        prop_assert!(find_blobs(&mask, 0, u32::MAX, 16, true).is_empty());
    }

    #[test]
    fn test_single_rectangle(x in 0u32..40, y in 0u32..30, w in 1u32..20, h in 1u32..15) {
        let mut image = GrayImage::new(64, 48);
        for py in y..y + h {
            for px in x..x + w {
                image.put_pixel(px, py, Luma([255]));
            }
        }
        let area = w * h;
        let blobs = find_blobs(&image, area, area, 5, false);
        prop_assert_eq!(blobs.len(), 1);
        prop_assert_eq!(blobs[0].area, area);
        prop_assert_eq!(
            blobs[0].centroid(),
            (x as f32 + w as f32 / 2.0, y as f32 + h as f32 / 2.0)
        );
    }

    #[test]
    fn test_color_filter_radius(
        target in any::<[u8; 3]>(),
        sample in any::<[u8; 3]>(),
        radius in 0u32..450,
    ) {
        let image = RgbImage::from_fn(2, 1, |x, _| Rgb(if x == 0 { target } else { sample }));
        let target_pixel = Pixel::from(target);
        let mask = nonzero_mask(&color_distance_filter(&image, target_pixel, radius));

        let within = target_pixel.distance_squared(&Pixel::from(sample)) <= radius * radius;
        let sample_kept = mask.get_pixel(1, 0)[0] == 255;
        if !within {
            prop_assert!(!sample_kept);
        } else if sample != [0, 0, 0] {
            prop_assert!(sample_kept);
        }
        prop_assert_eq!(mask.get_pixel(0, 0)[0] == 255, target != [0, 0, 0]);
    }
}
