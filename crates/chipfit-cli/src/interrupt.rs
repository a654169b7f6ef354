//! Ctrl-C handling.
//!
//! The first interrupt cancels the process token, so running tasks stop
//! after their current units and the command exits with code 130. A second
//! interrupt exits immediately.

use std::thread;

use anyhow::{Context as _, Result};
use chipfit_task::CancellationToken;
use tracing::warn;

use crate::commands::EXIT_CANCELLED;

/// Listens for Ctrl-C on a background thread and cancels `token`.
pub fn install(token: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the interrupt listener")?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                eprintln!("\nCancelling...");
                warn!("interrupted, cancelling");
                token.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(i32::from(EXIT_CANCELLED));
                }
            })
        })
        .context("failed to spawn the interrupt listener")?;
    Ok(())
}
