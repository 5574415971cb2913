//! Standalone isolated-context host: reads one request on stdin, writes
//! envelopes on stdout, exits.

use anyhow::Result;
use tracing::Level;

fn main() -> Result<()> {
    jsbox_core::telemetry::init_tracing(false, Level::WARN);
    jsbox_core::sandbox::worker::serve_stdio()?;
    Ok(())
}
