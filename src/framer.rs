use crate::error::SessionError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;

/// Reads newline-terminated UTF-8 fields from a buffered socket.
///
/// Used only for the control prologue (spec.md §4.2); relayed payload bytes
/// are never inspected. On I/O error the caller fails the whole session fast
/// (spec.md §7) — there is no partial-prologue recovery.
pub struct LineFramer {
    reader: BufReader<OwnedReadHalf>,
}

impl LineFramer {
    pub fn new(read_half: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(read_half),
        }
    }

    /// Reads one line, trimming the newline and surrounding whitespace.
    pub async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut buf = String::new();
        let n = self
            .reader
            .read_line(&mut buf)
            .await
            .map_err(SessionError::Prologue)?;
        if n == 0 {
            return Err(SessionError::Prologue(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during prologue",
            )));
        }
        Ok(buf.trim().to_string())
    }

    /// Reads one more line and discards it, tolerating EOF. Used only for
    /// the unrecognized-command path (spec.md §4.3's default branch,
    /// supplemented from the original implementation's drain loop, bounded
    /// here to a single line rather than an unbounded drain).
    pub async fn drain_one_line(&mut self) {
        let mut buf = String::new();
        let _ = self.reader.read_line(&mut buf).await;
    }

    /// Reclaims the raw socket half once prologue parsing is done, so the
    /// session's hold loop can peek it directly for half-open detection
    /// without going through the buffered reader.
    pub fn into_read_half(self) -> OwnedReadHalf {
        self.reader.into_inner()
    }
}
