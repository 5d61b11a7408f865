use crate::directory::{Directory, SharedWriter};
use crate::error::SessionError;
use crate::splice;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;

/// LINK → LINKED (spec.md §4.3, cmd 5).
///
/// Claims the pending connection `conn_id` left behind by CONNECT and
/// splices it against this session's own socket. An unknown `conn_id`
/// (already linked, expired, or never existed) closes silently — the wire
/// protocol defines no reply for LINK.
pub async fn run(
    directory: &Arc<Directory>,
    group: &str,
    conn_id: u64,
    own_writer: SharedWriter,
    own_read_half: OwnedReadHalf,
) -> Result<(), SessionError> {
    let Some((client_reader, client_writer, closed_tx)) = directory.claim_connection(group, conn_id) else {
        tracing::debug!(conn_id, "LINK target missing, closing silently");
        return Err(SessionError::LinkTargetMissing(conn_id));
    };
    tracing::debug!(conn_id, "LINK established, splicing");

    let mut own_writer_guard = own_writer.lock().await;
    let own_side = tokio::io::join(own_read_half, &mut *own_writer_guard);

    let mut client_reader_guard = client_reader.lock().await;
    let mut client_writer_guard = client_writer.lock().await;
    let client_side = tokio::io::join(&mut *client_reader_guard, &mut *client_writer_guard);

    splice::run(own_side, client_side).await;

    drop(client_reader_guard);
    drop(client_writer_guard);
    drop(own_writer_guard);

    let _ = closed_tx.send(());
    tracing::debug!(conn_id, "LINK splice ended, both sockets closing");
    Ok(())
}
