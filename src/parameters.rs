// THEORY:
// `RuntimeParameters` is what the pipeline and logger read at the start of every tick.
// The `RuntimeParameterStore` is the only way to change them while running: every
// adjustment is clamped into range and then written through to the `ConfigStore`, so
// saving at any moment captures the live tuning. The settings file itself is only
// touched on an explicit save, delete or reload.
//
// Invariants held after every operation:
// - threshold in [0, 255]
// - 0 <= min_area <= max_area
// - log_interval_ms >= -1 (-1 disables logging)

use crate::config_store::ConfigStore;
use crate::core_modules::blob_detector::ExtractionRequest;
use crate::error::Result;
use crate::settings::{self, keys};
use std::path::Path;
use tracing::{debug, info};

pub const LOGGING_DISABLED: i64 = -1;

/// Which detection image the pipeline builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// Thresholded difference against the learned background.
    #[default]
    Grayscale,
    /// Pixels within `color_radius` of `color_target`.
    Color,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Grayscale => "grayscale",
            DetectionMode::Color => "color",
        }
    }

    /// Anything other than `color` reads as grayscale.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("color") {
            DetectionMode::Color
        } else {
            DetectionMode::Grayscale
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DetectionMode::Grayscale => DetectionMode::Color,
            DetectionMode::Color => DetectionMode::Grayscale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl ColorChannel {
    pub fn index(&self) -> usize {
        match self {
            ColorChannel::Red => 0,
            ColorChannel::Green => 1,
            ColorChannel::Blue => 2,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ColorChannel::Red => keys::COLOR_RED,
            ColorChannel::Green => keys::COLOR_GREEN,
            ColorChannel::Blue => keys::COLOR_BLUE,
        }
    }
}

/// Detection and logging parameters as read by the pipeline each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeParameters {
    pub threshold: u8,
    pub min_area: u32,
    pub max_area: u32,
    pub max_blobs: usize,
    pub color_target: [u8; 3],
    pub color_radius: u32,
    pub log_interval_ms: i64,
    pub mode: DetectionMode,
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self {
            threshold: 50,
            min_area: 9,
            max_area: (settings::DEFAULT_WIDTH * settings::DEFAULT_HEIGHT / 100) as u32,
            max_blobs: 1,
            color_target: [255, 0, 0],
            color_radius: 40,
            log_interval_ms: LOGGING_DISABLED,
            mode: DetectionMode::Grayscale,
        }
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn clamp_channel(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

impl RuntimeParameters {
    /// Reads every parameter from `config`, clamping out-of-range values.
    pub fn from_config(config: &ConfigStore) -> Self {
        let defaults = Self::default();
        let color = |channel: ColorChannel| {
            let fallback = i64::from(defaults.color_target[channel.index()]);
            clamp_channel(config.get_or(channel.key(), fallback))
        };

        let mut params = Self {
            threshold: clamp_channel(config.get_or(keys::THRESHOLD, i64::from(defaults.threshold))),
            min_area: 0,
            max_area: 0,
            max_blobs: config
                .get_or(keys::BLOBS_NUM, defaults.max_blobs as i64)
                .max(0) as usize,
            color_target: [
                color(ColorChannel::Red),
                color(ColorChannel::Green),
                color(ColorChannel::Blue),
            ],
            color_radius: clamp_u32(config.get_or(keys::COLOR_RADIUS, i64::from(defaults.color_radius))),
            log_interval_ms: config
                .get_or(keys::LOG_INTERVAL, defaults.log_interval_ms)
                .max(LOGGING_DISABLED),
            mode: DetectionMode::parse(&config.get_or(keys::MODE, defaults.mode.as_str().to_string())),
        };
        params.set_area_bounds(
            config.get_or(keys::BLOBS_MIN_AREA, i64::from(defaults.min_area)),
            config.get_or(keys::BLOBS_MAX_AREA, i64::from(defaults.max_area)),
        );
        params
    }

    /// Writes every parameter into `config`, replacing what was there.
    pub fn write_to(&self, config: &mut ConfigStore) {
        config.set(keys::THRESHOLD, i64::from(self.threshold), true);
        config.set(keys::BLOBS_MIN_AREA, self.min_area, true);
        config.set(keys::BLOBS_MAX_AREA, self.max_area, true);
        config.set(keys::BLOBS_NUM, self.max_blobs, true);
        for channel in [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue] {
            config.set(channel.key(), i64::from(self.color_target[channel.index()]), true);
        }
        config.set(keys::COLOR_RADIUS, self.color_radius, true);
        config.set(keys::LOG_INTERVAL, self.log_interval_ms, true);
        config.set(keys::MODE, self.mode.as_str().to_string(), true);
    }

    /// Applies new area bounds: `min` is floored at 0, then `max` is raised to `min`.
    fn set_area_bounds(&mut self, min: i64, max: i64) {
        let min = min.max(0);
        let max = max.max(min);
        self.min_area = clamp_u32(min);
        self.max_area = clamp_u32(max);
    }

    pub fn logging_enabled(&self) -> bool {
        self.log_interval_ms > LOGGING_DISABLED
    }

    pub fn extraction_request(&self) -> ExtractionRequest {
        ExtractionRequest {
            min_area: self.min_area,
            max_area: self.max_area,
            max_blobs: self.max_blobs,
            include_holes: true,
        }
    }
}

/// Owns the settings tree and the live parameters cached from it.
#[derive(Debug)]
pub struct RuntimeParameterStore {
    params: RuntimeParameters,
    config: ConfigStore,
}

impl RuntimeParameterStore {
    /// Loads `path` (a missing file is not an error), migrates legacy keys, seeds defaults
    /// and caches the parameters.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let mut config = ConfigStore::new();
        config.load(path);
        Self::from_config(config)
    }

    pub fn from_config(mut config: ConfigStore) -> Self {
        settings::prepare(&mut config);
        let params = RuntimeParameters::from_config(&config);
        params.write_to(&mut config);
        Self { params, config }
    }

    pub fn params(&self) -> &RuntimeParameters {
        &self.params
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    fn write_through(&mut self) {
        self.params.write_to(&mut self.config);
        debug!(params = ?self.params, "parameters updated");
    }

    pub fn adjust_threshold(&mut self, delta: i32) {
        let threshold = i64::from(self.params.threshold) + i64::from(delta);
        self.params.threshold = clamp_channel(threshold);
        self.write_through();
    }

    pub fn adjust_min_area(&mut self, delta: i64) {
        let min = i64::from(self.params.min_area).saturating_add(delta);
        let max = i64::from(self.params.max_area);
        self.params.set_area_bounds(min, max);
        self.write_through();
    }

    pub fn adjust_max_area(&mut self, delta: i64) {
        let min = i64::from(self.params.min_area);
        let max = i64::from(self.params.max_area).saturating_add(delta);
        self.params.set_area_bounds(min, max);
        self.write_through();
    }

    pub fn adjust_color_channel(&mut self, channel: ColorChannel, delta: i32) {
        let value = &mut self.params.color_target[channel.index()];
        *value = clamp_channel(i64::from(*value) + i64::from(delta));
        self.write_through();
    }

    pub fn set_color_target(&mut self, target: [u8; 3]) {
        self.params.color_target = target;
        self.write_through();
    }

    pub fn adjust_color_radius(&mut self, delta: i64) {
        self.params.color_radius = clamp_u32(i64::from(self.params.color_radius).saturating_add(delta));
        self.write_through();
    }

    pub fn adjust_log_interval(&mut self, delta: i64) {
        self.params.log_interval_ms = self
            .params
            .log_interval_ms
            .saturating_add(delta)
            .max(LOGGING_DISABLED);
        self.write_through();
    }

    pub fn toggle_mode(&mut self) -> DetectionMode {
        self.params.mode = self.params.mode.toggled();
        self.write_through();
        self.params.mode
    }

    /// Persists the tree, live parameters included.
    pub fn save(&self) -> Result<()> {
        self.config.save()
    }

    pub fn delete(&self) -> Result<bool> {
        self.config.delete()
    }

    /// Re-reads the backing file and re-caches the parameters. If the file cannot be read
    /// the current tree is kept, so live values survive.
    pub fn reload(&mut self) -> bool {
        let loaded = match self.config.path().map(Path::to_path_buf) {
            Some(path) => self.config.load(path),
            None => false,
        };
        settings::prepare(&mut self.config);
        self.params = RuntimeParameters::from_config(&self.config);
        self.params.write_to(&mut self.config);
        info!(loaded, "Reloaded settings");
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RuntimeParameterStore {
        RuntimeParameterStore::from_config(ConfigStore::new())
    }

    #[test]
    fn test_defaults() {
        let store = store();
        assert_eq!(store.params(), &RuntimeParameters::default());
        assert!(!store.params().logging_enabled());
    }

    #[test]
    fn test_threshold_clamps() {
        let mut store = store();
        store.adjust_threshold(-100);
        assert_eq!(store.params().threshold, 0);
        store.adjust_threshold(-1);
        assert_eq!(store.params().threshold, 0);
        store.adjust_threshold(300);
        assert_eq!(store.params().threshold, 255);
        store.adjust_threshold(1);
        assert_eq!(store.params().threshold, 255);
        assert_eq!(store.config().get::<i64>(keys::THRESHOLD), 255);
    }

    #[test]
    fn test_min_area_raises_max() {
        let mut store = store();
        store.adjust_min_area(30_000);
        assert_eq!(store.params().min_area, 30_009);
        assert_eq!(store.params().max_area, 30_009);
        assert_eq!(store.config().get::<u32>(keys::BLOBS_MAX_AREA), 30_009);
    }

    #[test]
    fn test_max_area_collapses_to_min() {
        let mut store = store();
        store.adjust_max_area(-1_000_000);
        assert_eq!(store.params().max_area, 9);
        assert_eq!(store.params().min_area, 9);
    }

    #[test]
    fn test_min_area_floors_at_zero() {
        let mut store = store();
        store.adjust_min_area(-1000);
        assert_eq!(store.params().min_area, 0);
        assert_eq!(store.params().max_area, 20736);
    }

    #[test]
    fn test_log_interval_floor() {
        let mut store = store();
        store.adjust_log_interval(1000);
        assert_eq!(store.params().log_interval_ms, 999);
        store.adjust_log_interval(-1000);
        store.adjust_log_interval(-1000);
        assert_eq!(store.params().log_interval_ms, -1);
        assert_eq!(store.config().get::<i64>(keys::LOG_INTERVAL), -1);
    }

    #[test]
    fn test_color_adjustments() {
        let mut store = store();
        store.adjust_color_channel(ColorChannel::Red, 1);
        store.adjust_color_channel(ColorChannel::Green, -1);
        store.adjust_color_channel(ColorChannel::Blue, 7);
        assert_eq!(store.params().color_target, [255, 0, 7]);
        store.adjust_color_radius(-100);
        assert_eq!(store.params().color_radius, 0);
        store.set_color_target([1, 2, 3]);
        assert_eq!(store.config().get::<u8>(keys::COLOR_GREEN), 2);
    }

    #[test]
    fn test_toggle_mode_writes_through() {
        let mut store = store();
        assert_eq!(store.toggle_mode(), DetectionMode::Color);
        assert_eq!(store.config().get::<String>(keys::MODE), "color");
        assert_eq!(store.toggle_mode(), DetectionMode::Grayscale);
    }

    #[test]
    fn test_from_config_repairs_inverted_bounds() {
        let mut config = ConfigStore::new();
        config.set(keys::BLOBS_MIN_AREA, 500i64, true);
        config.set(keys::BLOBS_MAX_AREA, 100i64, true);
        config.set(keys::THRESHOLD, 999i64, true);
        config.set(keys::LOG_INTERVAL, -40i64, true);
        let store = RuntimeParameterStore::from_config(config);
        assert_eq!(store.params().min_area, 500);
        assert_eq!(store.params().max_area, 500);
        assert_eq!(store.params().threshold, 255);
        assert_eq!(store.params().log_interval_ms, -1);
        assert_eq!(store.config().get::<i64>(keys::BLOBS_MAX_AREA), 500);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(DetectionMode::parse("COLOR"), DetectionMode::Color);
        assert_eq!(DetectionMode::parse("anything"), DetectionMode::Grayscale);
    }
}
