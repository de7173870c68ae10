//! Configuration for respkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a respkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Path of the append-only log. Replayed on startup, appended to afterwards.
    pub aof_path: PathBuf,

    /// How often the background flusher forces the log to stable storage
    pub fsync_interval: Duration,

    /// Retry behaviour when a background fsync fails
    pub fsync_policy: FsyncPolicy,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Ceilings applied while decoding untrusted input
    pub limits: ProtocolLimits,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections (0 = unbounded)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Retry policy for the background fsync
///
/// Failed syncs are retried up to `max_retries` times, doubling the delay from
/// `initial_backoff` and capping it at `max_backoff`. When every retry fails
/// the log is reported as degraded and the next tick tries again.
#[derive(Debug, Clone, Copy)]
pub struct FsyncPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl FsyncPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

impl Default for FsyncPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Decoder ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Maximum nesting depth of arrays
    pub max_depth: usize,

    /// Maximum declared element count of a single array
    pub max_array_len: usize,

    /// Maximum declared length of a bulk string
    pub max_bulk_len: usize,

    /// Maximum length of a CRLF-terminated line (simple strings, errors, lengths)
    pub max_line_len: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_array_len: 1024 * 1024,
            max_bulk_len: 512 * 1024 * 1024, // 512 MB
            max_line_len: 64 * 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aof_path: PathBuf::from("database.aof"),
            fsync_interval: Duration::from_secs(1),
            fsync_policy: FsyncPolicy::default(),
            limits: ProtocolLimits::default(),
            listen_addr: "127.0.0.1:6379".to_string(),
            max_connections: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the append-only log path
    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = path.into();
        self
    }

    /// Set the background fsync interval
    pub fn fsync_interval(mut self, interval: Duration) -> Self {
        self.config.fsync_interval = interval;
        self
    }

    /// Set the fsync retry policy
    pub fn fsync_policy(mut self, policy: FsyncPolicy) -> Self {
        self.config.fsync_policy = policy;
        self
    }

    /// Set the decoder ceilings
    pub fn limits(mut self, limits: ProtocolLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections (0 = unbounded)
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
