//! Accept loop and the `Broker` lifecycle facade (spec.md §4.6).
//!
//! `Broker` mirrors `Discoverer`'s bind-then-spawn shape: build a
//! [`crate::config::BrokerConfig`], bind it to get a `Broker`, then drive
//! `run` to completion (or hand it to `tokio::spawn` and hold the
//! `JoinHandle` the way a `DropGuard` holds one).

use crate::config::BrokerConfig;
use crate::directory::Directory;
use crate::{session, stats};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// A bound broker, ready to accept connections.
pub struct Broker {
    listener: TcpListener,
    directory: Arc<Directory>,
    config: Arc<BrokerConfig>,
}

impl Broker {
    /// Binds the listening socket at `config.port()` on all interfaces.
    pub async fn bind(config: BrokerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port())).await?;
        tracing::info!(port = config.port(), "broker listening");
        Ok(Self {
            listener,
            directory: Arc::new(Directory::new()),
            config: Arc::new(config),
        })
    }

    /// The address actually bound (useful when `config.port()` was `0`, as
    /// integration tests do to get an ephemeral port).
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the statistics sampler until the listener
    /// errors or Ctrl-C is received. An accept error is fatal (spec.md §7):
    /// the loop exits and this future resolves, matching the spec's
    /// "listener loop exits and the process terminates". Ctrl-C is a clean
    /// shutdown: existing sessions are left to finish on their own (there is
    /// no cooperative cancellation channel, per spec.md §5) and `run`
    /// simply returns `Ok(())`.
    pub async fn run(self) -> io::Result<()> {
        let Broker {
            listener,
            directory,
            config,
        } = self;

        let stats_task = tokio::spawn(stats::run(directory.clone(), config.stats_interval()));

        let conn_seq = AtomicU64::new(0);
        let result = loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, _peer)) => {
                            let seq = conn_seq.fetch_add(1, Ordering::Relaxed);
                            let directory = directory.clone();
                            let config = config.clone();
                            tokio::spawn(async move {
                                session::run(directory, config, socket, seq).await;
                            });
                        }
                        Err(err) => {
                            tracing::error!(%err, "accept failed, shutting down");
                            break Err(err);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received ctrl-c, shutting down");
                    break Ok(());
                }
            }
        };

        stats_task.abort();
        result
    }
}
