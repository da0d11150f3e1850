use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct Config {
    pub log_frames: bool,
    pub serial_baud: u32,
    pub serial_settle_ms: u64,
    pub reader_poll_ms: u64,
}

impl Config {
    fn from_env() -> Self {
        let log_frames = std::env::var("STATEWIRE_LOG_FRAMES")
            .map(|v| v == "1")
            .unwrap_or(false);
        let serial_baud = std::env::var("STATEWIRE_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600u32);
        let serial_settle_ms = std::env::var("STATEWIRE_SETTLE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000u64);
        let reader_poll_ms = std::env::var("STATEWIRE_POLL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(100u64);
        Self {
            log_frames,
            serial_baud,
            serial_settle_ms,
            reader_poll_ms,
        }
    }
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}

pub(crate) fn hex_dump(b: &[u8]) -> String {
    b.iter()
        .map(|x| format!("{x:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Emit a hex dump of a frame at debug level when `STATEWIRE_LOG_FRAMES=1`.
pub(crate) fn maybe_log_frame(label: &str, frame: &[u8]) {
    if config().log_frames {
        log::debug!("[frame {}] {}", label, hex_dump(frame));
    }
}
