use crate::directory::{Directory, SharedWriter};
use crate::error::SessionError;
use crate::halfopen;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;

/// JOIN → DISCOVERABLE (spec.md §4.3, cmd 0).
pub async fn run(
    directory: &Arc<Directory>,
    group: &str,
    address: String,
    writer: SharedWriter,
    read_half: OwnedReadHalf,
) -> Result<(), SessionError> {
    // Registration and the fan-out snapshot happen under one lock
    // acquisition (spec.md §4.3's ordering note, §4.4's "no socket I/O under
    // lock" rule) — splitting them into two calls would race a concurrent
    // DISCOVER's own registration+snapshot and could double-deliver this
    // address (spec.md §8).
    let targets = directory.join_and_snapshot_discovering(group, address.clone(), writer);
    tracing::debug!(%address, "joined as discoverable");

    let line = format!("{address}\n");
    for target in targets {
        let mut w = target.lock().await;
        if w.write_all(line.as_bytes()).await.is_ok() {
            let _ = w.flush().await;
        }
    }

    halfopen::wait_until_closed(&read_half).await;

    directory.leave_discoverable(group, &address);
    tracing::debug!(%address, "discoverable session ended");
    Ok(())
}
