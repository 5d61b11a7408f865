//! Per-connection session state machine (spec.md §4.3).
//!
//! Each accepted socket is driven by [`run`]: read the three-line prologue,
//! dispatch on `cmd`, then hand off to the command-specific worker in the
//! matching submodule. Every command's worker owns the session until the
//! socket is observed half-open (or, for CONNECT, until its bounded wait
//! expires) — there is no return to this dispatcher once a command runs.

mod connect;
mod discover;
mod join;
mod link;
mod listen;

use crate::config::BrokerConfig;
use crate::directory::Directory;
use crate::error::SessionError;
use crate::framer::LineFramer;
use std::sync::Arc;
use tokio::io::BufWriter;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::Instrument;

/// The six wire commands (spec.md §4.3, §6). `Leave` is kept as a variant
/// rather than folded into `Unknown` so it gets its own obsolete-command log
/// line, matching spec.md's distinct handling of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Join,
    Leave,
    Discover,
    Listen,
    Connect,
    Link,
}

impl Command {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Command::Join),
            "1" => Some(Command::Leave),
            "2" => Some(Command::Discover),
            "3" => Some(Command::Listen),
            "4" => Some(Command::Connect),
            "5" => Some(Command::Link),
            _ => None,
        }
    }
}

/// Drives one accepted socket from prologue to teardown.
///
/// `conn_seq` is the accept-order sequence number used purely for log
/// attribution — distinct from the CONNECT-specific monotonic `connId` the
/// directory allocates for pending connections (spec.md §3).
pub async fn run(directory: Arc<Directory>, config: Arc<BrokerConfig>, socket: TcpStream, conn_seq: u64) {
    let peer_addr = match socket.peer_addr() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::warn!(conn_seq, %err, "failed to read peer address, dropping connection");
            return;
        }
    };

    let span = tracing::info_span!("session", conn_seq, peer = %peer_addr);
    async move {
        directory.session_started();
        if let Err(err) = handle(&directory, &config, socket, peer_addr.ip()).await {
            tracing::warn!(%err, "session ended with error");
        }
        directory.session_ended();
    }
    .instrument(span)
    .await;
}

async fn handle(
    directory: &Arc<Directory>,
    config: &Arc<BrokerConfig>,
    socket: TcpStream,
    peer_ip: std::net::IpAddr,
) -> Result<(), SessionError> {
    let (read_half, write_half) = socket.into_split();
    let writer = Arc::new(AsyncMutex::new(BufWriter::new(write_half)));
    let mut framer = LineFramer::new(read_half);

    let group_field = framer.read_line().await?;
    let cmd_field = framer.read_line().await?;
    let address = framer.read_line().await?;
    if address.is_empty() {
        return Err(SessionError::EmptyField("address"));
    }
    let group = Directory::resolve_group_name(&group_field, peer_ip);

    let Some(cmd) = Command::from_code(&cmd_field) else {
        tracing::warn!(cmd = %cmd_field, "unrecognized command, draining and closing");
        framer.drain_one_line().await;
        return Err(SessionError::UnknownCommand(cmd_field));
    };

    tracing::debug!(%group, %address, ?cmd, "prologue parsed");

    match cmd {
        Command::Join => {
            let read_half = framer.into_read_half();
            join::run(directory, &group, address, writer, read_half).await
        }
        Command::Leave => {
            tracing::warn!("obsolete LEAVE command");
            Err(SessionError::ObsoleteCommand)
        }
        Command::Discover => {
            let read_half = framer.into_read_half();
            discover::run(directory, &group, address, writer, read_half).await
        }
        Command::Listen => {
            let uuid = framer.read_line().await?;
            if uuid.is_empty() {
                return Err(SessionError::EmptyField("uuid"));
            }
            let read_half = framer.into_read_half();
            listen::run(directory, &group, address, uuid, writer, read_half).await
        }
        Command::Connect => {
            let addr = framer.read_line().await?;
            if addr.is_empty() {
                return Err(SessionError::EmptyField("addr"));
            }
            let uuid = framer.read_line().await?;
            if uuid.is_empty() {
                return Err(SessionError::EmptyField("uuid"));
            }
            let read_half = framer.into_read_half();
            connect::run(directory, config, &group, address, addr, uuid, writer, read_half).await
        }
        Command::Link => {
            let conn_id_field = framer.read_line().await?;
            let conn_id: u64 = conn_id_field
                .parse()
                .map_err(|_| SessionError::EmptyField("connId"))?;
            let read_half = framer.into_read_half();
            link::run(directory, &group, conn_id, writer, read_half).await
        }
    }
}
