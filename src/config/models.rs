use crate::render::Quality;
use serde::Deserialize;
use std::time::Duration;

/// Top-level engine configuration; deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReaderConfig {
    /// Clamp every field into a usable range. Config files are user-edited, so
    /// a zero batch size or a negative scale must not reach the scheduler.
    pub fn sanitized(mut self) -> Self {
        let render = &mut self.render;
        render.preload_pages = render.preload_pages.clamp(1, 16);
        render.neighborhood_radius = render.neighborhood_radius.min(8);
        render.background_batch_size = render.background_batch_size.clamp(1, 32);
        render.preview_scale = render.preview_scale.clamp(0.1, 8.0);
        render.standard_scale = render.standard_scale.clamp(render.preview_scale, 8.0);
        render.high_scale = render.high_scale.clamp(render.standard_scale, 8.0);

        let layout = &mut self.layout;
        layout.breakpoint = layout.breakpoint.max(1);
        layout.min_surface_width = layout.min_surface_width.max(1);
        layout.min_surface_height = layout.min_surface_height.max(1);
        layout.double_page_width = layout.double_page_width.max(2);
        layout.double_page_height = layout.double_page_height.max(1);

        let narration = &mut self.narration;
        narration.rate = narration.rate.clamp(0.1, 10.0);
        narration.pitch = narration.pitch.clamp(0.0, 2.0);
        self
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct RenderConfig {
    /// Pages rendered at preview quality, one after another, right after open.
    #[serde(default = "crate::config::defaults::default_preload_pages")]
    pub preload_pages: usize,
    #[serde(default = "crate::config::defaults::default_neighborhood_radius")]
    pub neighborhood_radius: usize,
    #[serde(default = "crate::config::defaults::default_background_batch_size")]
    pub background_batch_size: usize,
    #[serde(default = "crate::config::defaults::default_background_batch_delay_ms")]
    pub background_batch_delay_ms: u64,
    #[serde(default = "crate::config::defaults::default_preview_scale")]
    pub preview_scale: f32,
    #[serde(default = "crate::config::defaults::default_standard_scale")]
    pub standard_scale: f32,
    #[serde(default = "crate::config::defaults::default_high_scale")]
    pub high_scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            preload_pages: crate::config::defaults::default_preload_pages(),
            neighborhood_radius: crate::config::defaults::default_neighborhood_radius(),
            background_batch_size: crate::config::defaults::default_background_batch_size(),
            background_batch_delay_ms:
                crate::config::defaults::default_background_batch_delay_ms(),
            preview_scale: crate::config::defaults::default_preview_scale(),
            standard_scale: crate::config::defaults::default_standard_scale(),
            high_scale: crate::config::defaults::default_high_scale(),
        }
    }
}

impl RenderConfig {
    pub fn scale_for(&self, quality: Quality) -> f32 {
        match quality {
            Quality::Preview => self.preview_scale,
            Quality::Standard => self.standard_scale,
            Quality::High => self.high_scale,
        }
    }

    pub fn background_delay(&self) -> Duration {
        Duration::from_millis(self.background_batch_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct LayoutConfig {
    /// Viewport widths at or below this value use single-page mode.
    #[serde(default = "crate::config::defaults::default_breakpoint")]
    pub breakpoint: u32,
    #[serde(default = "crate::config::defaults::default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "crate::config::defaults::default_chrome_width")]
    pub chrome_width: u32,
    #[serde(default = "crate::config::defaults::default_chrome_height")]
    pub chrome_height: u32,
    #[serde(default = "crate::config::defaults::default_min_surface_width")]
    pub min_surface_width: u32,
    #[serde(default = "crate::config::defaults::default_min_surface_height")]
    pub min_surface_height: u32,
    #[serde(default = "crate::config::defaults::default_double_page_width")]
    pub double_page_width: u32,
    #[serde(default = "crate::config::defaults::default_double_page_height")]
    pub double_page_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            breakpoint: crate::config::defaults::default_breakpoint(),
            resize_debounce_ms: crate::config::defaults::default_resize_debounce_ms(),
            chrome_width: crate::config::defaults::default_chrome_width(),
            chrome_height: crate::config::defaults::default_chrome_height(),
            min_surface_width: crate::config::defaults::default_min_surface_width(),
            min_surface_height: crate::config::defaults::default_min_surface_height(),
            double_page_width: crate::config::defaults::default_double_page_width(),
            double_page_height: crate::config::defaults::default_double_page_height(),
        }
    }
}

impl LayoutConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct NarrationConfig {
    #[serde(default = "crate::config::defaults::default_voice")]
    pub voice: Option<String>,
    #[serde(default = "crate::config::defaults::default_rate")]
    pub rate: f32,
    #[serde(default = "crate::config::defaults::default_pitch")]
    pub pitch: f32,
    /// Turn the page and keep reading when an utterance finishes.
    #[serde(default = "crate::config::defaults::default_auto_continue")]
    pub auto_continue: bool,
    #[serde(default = "crate::config::defaults::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            voice: crate::config::defaults::default_voice(),
            rate: crate::config::defaults::default_rate(),
            pitch: crate::config::defaults::default_pitch(),
            auto_continue: crate::config::defaults::default_auto_continue(),
            settle_delay_ms: crate::config::defaults::default_settle_delay_ms(),
        }
    }
}

impl NarrationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
