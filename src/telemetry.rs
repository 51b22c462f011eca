//! Tracing subscriber setup for binaries and integration harnesses.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber honoring `RUST_LOG`.
///
/// Falls back to `info` when no filter is configured. Safe to call more
/// than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
