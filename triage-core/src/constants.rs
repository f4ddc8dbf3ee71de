//! Central Configuration Constants
//!
//! Single source of truth for the engine's defaults.
//! The server reads overrides from the environment and falls back to these.

use std::time::Duration;

/// Default reputation service base URL (VirusTotal v3)
pub const DEFAULT_REPUTATION_URL: &str = "https://www.virustotal.com/api/v3";

/// Delay between two analysis status queries (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Maximum number of analysis status queries (40 * 15s = 10 minutes)
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 40;

/// Per-request HTTP timeout towards the reputation service (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Status string reported by the service once an analysis is done
pub const ANALYSIS_COMPLETED: &str = "completed";

/// Prefix for staged upload files
pub const UPLOAD_PREFIX: &str = "triage-";

/// Section names produced by common toolchains
pub const KNOWN_SECTION_NAMES: &[&str] = &[
    ".text", ".rdata", ".data", ".pdata", ".rsrc", ".idata", ".bss", ".code", ".edata",
];

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default poll interval as a Duration
pub fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
}
