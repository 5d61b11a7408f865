use crate::config::{BrokerConfig, HALF_OPEN_POLL_INTERVAL};
use crate::directory::{Directory, SharedWriter};
use crate::error::SessionError;
use crate::halfopen::{self, PeekOutcome};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

/// CONNECT → PENDING (spec.md §4.3, cmd 4).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    directory: &Arc<Directory>,
    config: &Arc<BrokerConfig>,
    group: &str,
    my_address: String,
    addr: String,
    uuid: String,
    own_writer: SharedWriter,
    own_read_half: OwnedReadHalf,
) -> Result<(), SessionError> {
    let reader = Arc::new(AsyncMutex::new(own_read_half));
    let conn_id = directory.next_conn_id();
    let (closed_tx, mut closed_rx) = oneshot::channel();

    directory.insert_connection(group, conn_id, own_writer.clone(), reader.clone(), closed_tx);

    let Some(service_writer) = directory.claim_service(group, &addr, &uuid) else {
        let mut w = own_writer.lock().await;
        let _ = w.write_all(b"fail\n").await;
        let _ = w.flush().await;
        drop(w);
        directory.remove_connection(group, conn_id);
        return Err(SessionError::ConnectTargetUnavailable { addr, uuid });
    };

    {
        let mut w = service_writer.lock().await;
        w.write_all(format!("{my_address}\n{conn_id}\n").as_bytes())
            .await?;
        w.flush().await?;
    }
    {
        let mut w = own_writer.lock().await;
        w.write_all(b"ok\n").await?;
        w.flush().await?;
    }
    tracing::debug!(%addr, %uuid, conn_id, "CONNECT claimed service, awaiting LINK");

    let deadline = Instant::now() + config.connect_timeout();
    loop {
        tokio::select! {
            _ = &mut closed_rx => {
                tracing::debug!(conn_id, "LINK completed, CONNECT unwinding");
                break;
            }
            _ = tokio::time::sleep(HALF_OPEN_POLL_INTERVAL) => {
                if !directory.connection_available(group, conn_id) {
                    // LINK has claimed the entry; the reader now belongs to
                    // the splice and must not be peeked from here anymore.
                    // Just keep waiting for `closed_rx`.
                    continue;
                }
                let r = reader.lock().await;
                let outcome = halfopen::poll_once(&r).await;
                drop(r);
                if outcome == PeekOutcome::Closed {
                    tracing::debug!(conn_id, "CONNECT socket closed before LINK arrived");
                    break;
                }
                if Instant::now() >= deadline {
                    tracing::debug!(conn_id, "CONNECT timed out waiting for LINK");
                    break;
                }
            }
        }
    }

    directory.remove_connection(group, conn_id);
    directory.restore_service_available(group, &addr, &uuid);
    Ok(())
}
