//! Settings schema: key names, the legacy key table, and the defaults seeded on load.

use crate::config_store::ConfigStore;
use tracing::{debug, info};

pub mod keys {
    pub const WEBCAM_ID: &str = "webcam.id";
    pub const WEBCAM_WIDTH: &str = "webcam.width";
    pub const WEBCAM_HEIGHT: &str = "webcam.height";
    pub const PLAYER_FILENAME: &str = "player.filename";
    pub const LOG_FILE_PREFIX: &str = "logging.fileprefix";
    pub const LOG_INTERVAL: &str = "logging.interval";
    pub const MODE: &str = "detection.mode";
    pub const THRESHOLD: &str = "detection.threshold";
    pub const BLOBS_NUM: &str = "detection.blobs.num";
    pub const BLOBS_MIN_AREA: &str = "detection.blobs.minarea";
    pub const BLOBS_MAX_AREA: &str = "detection.blobs.maxarea";
    pub const COLOR_RED: &str = "detection.color.red";
    pub const COLOR_GREEN: &str = "detection.color.green";
    pub const COLOR_BLUE: &str = "detection.color.blue";
    pub const COLOR_RADIUS: &str = "detection.color.radius";
}

/// Flat key names from older settings files and the nested paths that replaced them.
pub const LEGACY_KEYS: &[(&str, &str)] = &[
    ("webcam_width", keys::WEBCAM_WIDTH),
    ("webcam_height", keys::WEBCAM_HEIGHT),
    ("logfileprefix", keys::LOG_FILE_PREFIX),
    ("loginterval", keys::LOG_INTERVAL),
    ("maxblobs", keys::BLOBS_NUM),
    ("minblobarea", keys::BLOBS_MIN_AREA),
    ("maxblobarea", keys::BLOBS_MAX_AREA),
    ("threshold", keys::THRESHOLD),
];

pub const DEFAULT_WIDTH: i64 = 1920;
pub const DEFAULT_HEIGHT: i64 = 1080;

pub const INTEGER_DEFAULTS: &[(&str, i64)] = &[
    (keys::WEBCAM_ID, 0),
    (keys::WEBCAM_WIDTH, DEFAULT_WIDTH),
    (keys::WEBCAM_HEIGHT, DEFAULT_HEIGHT),
    (keys::LOG_INTERVAL, -1),
    (keys::THRESHOLD, 50),
    (keys::BLOBS_NUM, 1),
    (keys::BLOBS_MIN_AREA, 9),
    (keys::BLOBS_MAX_AREA, DEFAULT_WIDTH * DEFAULT_HEIGHT / 100),
    (keys::COLOR_RED, 255),
    (keys::COLOR_GREEN, 0),
    (keys::COLOR_BLUE, 0),
    (keys::COLOR_RADIUS, 40),
];

pub const TEXT_DEFAULTS: &[(&str, &str)] = &[
    (keys::PLAYER_FILENAME, "input.mov"),
    (keys::LOG_FILE_PREFIX, "data"),
    (keys::MODE, "grayscale"),
];

/// Moves every legacy key that is present. Returns how many were moved by this call.
pub fn migrate_legacy_keys(config: &mut ConfigStore) -> usize {
    LEGACY_KEYS
        .iter()
        .filter(|(old, new)| config.migrate(old, new))
        .count()
}

/// Fills in every setting the document does not define.
pub fn seed_defaults(config: &mut ConfigStore) {
    for (path, value) in INTEGER_DEFAULTS {
        config.ensure(path, *value);
    }
    for (path, value) in TEXT_DEFAULTS {
        config.ensure(path, (*value).to_string());
    }
}

/// Brings a freshly loaded document up to the current schema.
pub fn prepare(config: &mut ConfigStore) -> usize {
    let migrated = migrate_legacy_keys(config);
    if migrated > 0 {
        info!(
            migrated,
            total = config.migrations(),
            "Migrated legacy settings to nested keys"
        );
    }
    seed_defaults(config);
    debug!(settings = %config.to_pretty_string(), "Settings");
    migrated
}
