//! Server binary: the small startup harness spec.md §1 excludes from THE
//! CORE. Loads configuration from the environment, initializes structured
//! logging, and blocks in `hkv_server::run` until the process is killed.
//!
//! Process-level signal handling (translating SIGINT/SIGTERM into a flipped
//! shutdown flag) is deliberately left out here too - the shutdown flag
//! this binary hands to `run` is never flipped, matching the specification's
//! framing of graceful-shutdown wiring as an external harness concern.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hkv_common::config::Config;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let shutdown = Arc::new(AtomicBool::new(false));

    if let Err(err) = hkv_server::run(config, shutdown) {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}
