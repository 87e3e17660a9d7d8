//! Configuration loading for the reader engine.
//!
//! All tunable constants (preload depth, batch pacing, breakpoint, narration
//! voice) are centralized here and loaded from `conf/config.toml` if present.
//! Any missing or invalid entries fall back to defaults so a session can still
//! open.

mod defaults;
mod io;
mod models;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{
    LayoutConfig, LogLevel, LoggingConfig, NarrationConfig, ReaderConfig, RenderConfig,
};
