use crate::directory::{Directory, SharedWriter};
use crate::error::SessionError;
use crate::halfopen;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;

/// LISTEN → LISTENING (spec.md §4.3, cmd 3).
pub async fn run(
    directory: &Arc<Directory>,
    group: &str,
    address: String,
    uuid: String,
    writer: SharedWriter,
    read_half: OwnedReadHalf,
) -> Result<(), SessionError> {
    if !directory.listen(group, &address, &uuid, writer) {
        tracing::debug!(%address, %uuid, "LISTEN refused: already registered");
        return Err(SessionError::ListenRefused { addr: address, uuid });
    }
    tracing::debug!(%address, %uuid, "listening for CONNECTs");

    halfopen::wait_until_closed(&read_half).await;

    directory.leave_serving(group, &address, &uuid);
    tracing::debug!(%address, %uuid, "listening session ended");
    Ok(())
}
