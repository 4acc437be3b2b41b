//! Runtime configuration.
//!
//! Two knobs, both overridable from the environment:
//!
//! - `MIZZEN_READ_TIMEOUT_MS` — per-request read deadline in milliseconds
//!   (default 5000). The deadline is re-armed before each request on a
//!   kept-alive connection; when it expires the read fails and the
//!   connection closes.
//! - `MIZZEN_STACK_SIZE` — coroutine stack size in bytes, decimal or
//!   `0x`-prefixed hex (default `0x10000`, 64 KiB).

use std::env;
use std::time::Duration;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STACK_SIZE: usize = 0x10000;

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Read deadline armed before each request on a connection.
    pub read_timeout: Duration,
    /// Stack size for per-connection coroutines in bytes.
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            read_timeout: DEFAULT_READ_TIMEOUT,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let read_timeout = env::var("MIZZEN_READ_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_READ_TIMEOUT);

        let stack_size = env::var("MIZZEN_STACK_SIZE")
            .ok()
            .and_then(|v| {
                if let Some(hex) = v.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).ok()
                } else {
                    v.parse().ok()
                }
            })
            .unwrap_or(DEFAULT_STACK_SIZE);

        ServerConfig {
            read_timeout,
            stack_size,
        }
    }
}
