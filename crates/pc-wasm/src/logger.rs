//! `log` → browser console via `console_log`, plus a panic hook.

use log::{Level, LevelFilter};
use std::str::FromStr;

/// Parse a `data-log-level` attribute; anything unrecognized means `Warn`.
pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(LevelFilter::Warn)
}

/// Install the console logger (first call wins) and set the level. Later
/// calls, e.g. from a second mounted canvas, only adjust the level.
pub fn init(level: LevelFilter) {
    if console_log::init_with_level(Level::Trace).is_ok() {
        install_panic_hook();
    }
    log::set_max_level(level);
}

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    {
        std::panic::set_hook(Box::new(|info| {
            let msg = format!("product canvas panic: {info}");
            web_sys::console::error_1(&msg.into());
        }));
    }
}
