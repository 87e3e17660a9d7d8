pub(crate) fn default_preload_pages() -> usize {
    3
}

pub(crate) fn default_neighborhood_radius() -> usize {
    1
}

pub(crate) fn default_background_batch_size() -> usize {
    2
}

pub(crate) fn default_background_batch_delay_ms() -> u64 {
    150
}

pub(crate) fn default_preview_scale() -> f32 {
    0.5
}

pub(crate) fn default_standard_scale() -> f32 {
    1.5
}

pub(crate) fn default_high_scale() -> f32 {
    2.5
}

pub(crate) fn default_breakpoint() -> u32 {
    768
}

pub(crate) fn default_resize_debounce_ms() -> u64 {
    250
}

pub(crate) fn default_chrome_width() -> u32 {
    32
}

pub(crate) fn default_chrome_height() -> u32 {
    140
}

pub(crate) fn default_min_surface_width() -> u32 {
    200
}

pub(crate) fn default_min_surface_height() -> u32 {
    280
}

pub(crate) fn default_double_page_width() -> u32 {
    1000
}

pub(crate) fn default_double_page_height() -> u32 {
    700
}

pub(crate) fn default_voice() -> Option<String> {
    None
}

pub(crate) fn default_rate() -> f32 {
    1.0
}

pub(crate) fn default_pitch() -> f32 {
    1.0
}

pub(crate) fn default_auto_continue() -> bool {
    true
}

pub(crate) fn default_settle_delay_ms() -> u64 {
    600
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}
