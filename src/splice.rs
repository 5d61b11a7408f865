//! Bidirectional byte-pipe splicing (spec.md §4.5).
//!
//! Couples a service-side stream and a client-side stream: two copy
//! directions are polled concurrently and the first one to finish (EOF or
//! error) ends the whole splice, per spec.md's "Termination of either
//! direction ends the splice". This is deliberately *not*
//! `tokio::io::copy_bidirectional`, which waits for both directions to
//! reach EOF independently (half-close support) rather than racing them —
//! the wrong semantics for this spec.

use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the splice to completion. `a` and `b` are the two full-duplex
/// streams being coupled (spec.md calls them the service-side and
/// client-side sockets); neither is closed by this function — the caller
/// closes both once this returns.
pub async fn run<A, B>(mut a: A, mut b: B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(&mut a);
    let (mut b_read, mut b_write) = tokio::io::split(&mut b);

    let a_to_b = tokio::io::copy(&mut a_read, &mut b_write);
    let b_to_a = tokio::io::copy(&mut b_read, &mut a_write);

    tokio::select! {
        _ = a_to_b => {}
        _ = b_to_a => {}
    }
}
