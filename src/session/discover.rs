use crate::directory::{Directory, SharedWriter};
use crate::error::SessionError;
use crate::halfopen;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;

/// DISCOVER → DISCOVERING (spec.md §4.3, cmd 2).
///
/// Later JOINs push further lines directly to this session's writer — this
/// worker only writes the initial batch and then holds the session open, it
/// never re-reads the registry itself.
pub async fn run(
    directory: &Arc<Directory>,
    group: &str,
    address: String,
    writer: SharedWriter,
    read_half: OwnedReadHalf,
) -> Result<(), SessionError> {
    // The initial-batch snapshot and the registration happen under one lock
    // acquisition — see the matching note in session/join.rs; splitting them
    // is exactly the race spec.md §8's "exactly one delivery" law forbids.
    let batch = directory.discover_and_snapshot_discoverable(group, address.clone(), writer.clone());
    tracing::debug!(%address, "registered as discovering");
    {
        let mut w = writer.lock().await;
        for addr in &batch {
            w.write_all(format!("{addr}\n").as_bytes()).await?;
        }
        w.flush().await?;
    }

    halfopen::wait_until_closed(&read_half).await;

    directory.leave_discovering(group, &address);
    tracing::debug!(%address, "discovering session ended");
    Ok(())
}
