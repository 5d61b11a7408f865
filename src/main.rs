use clap::Parser;
use rendezvous_broker::{Broker, BrokerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Rendezvous and relay broker for NAT-constrained peers.
#[derive(Parser, Debug)]
#[command(name = "broker", about)]
struct Args {
    /// Raise the log verbosity to debug (ignored if RUST_LOG is set).
    #[arg(long)]
    debug: bool,

    /// Listening port.
    #[arg(long, default_value_t = BrokerConfig::new().port())]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = BrokerConfig::new().with_port(args.port);
    let broker = Broker::bind(config).await?;
    broker.run().await?;
    Ok(())
}
