use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use scanlink::{ScanServer, ServerConfig, SimulatedScanner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "scanlinkd")]
#[command(about = "Scan session server backed by a simulated scanner", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scanlinkd.toml")]
    config: PathBuf,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for scanned pages
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Feeds faster than this many seconds are backsides
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds a front side takes in the simulator
    #[arg(long, default_value = "3.0", value_parser = parse_secs)]
    front_delay: Duration,

    /// Seconds a back side takes in the simulator
    #[arg(long, default_value = "0.5", value_parser = parse_secs)]
    back_delay: Duration,
}

/// Parse fractional seconds, rejecting values no `Duration` can hold
fn parse_secs(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{}': {}", value, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        tracing::debug!("No config file at {}, using defaults", args.config.display());
        ServerConfig::default()
    };

    // Override with CLI args
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(threshold) = args.threshold {
        config.backside_threshold_secs = threshold;
    }

    tracing::debug!("Starting with config: {:?}", config);

    let device = SimulatedScanner::new()
        .with_front_delay(args.front_delay)
        .with_back_delay(args.back_delay);

    let mut server = ScanServer::bind(config, device).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("0.5"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_secs("3"), Ok(Duration::from_secs(3)));

        for bad in ["inf", "-1", "nan", "soon"] {
            assert!(parse_secs(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_cli_rejects_infinite_delay() {
        assert!(Args::try_parse_from(["scanlinkd", "--front-delay", "inf"]).is_err());
        assert!(Args::try_parse_from(["scanlinkd", "--back-delay", "-0.5"]).is_err());

        let args = Args::try_parse_from(["scanlinkd"]).unwrap();
        assert_eq!(args.front_delay, Duration::from_secs(3));
        assert_eq!(args.back_delay, Duration::from_millis(500));
    }
}
