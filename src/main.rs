mod analysis;
mod coins;
mod config;
mod error;
mod fetcher;
mod indicators;
mod report;
mod series;
mod session;
mod tui;

use anyhow::anyhow;
use clap::Parser;
use config::{AppConfig, Currency, StorageManager, clamp_days};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coindash")]
#[command(about = "Terminal dashboard for historical cryptocurrency market data")]
struct Cli {
    /// Coin id as listed by the catalog (e.g. bitcoin, ethereum)
    #[arg(long)]
    coin: Option<String>,

    /// Quote currency: usd, eur, jpy, gbp or cad
    #[arg(long)]
    currency: Option<String>,

    /// Days of history to display (1-365)
    #[arg(long)]
    days: Option<u32>,

    /// Print a one-shot report instead of the interactive dashboard
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log lines would tear the alternate screen apart, so only the report
    // path gets a subscriber.
    if cli.report {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("coindash=info".parse()?),
            )
            .init();
    }

    let storage = StorageManager::new_relative("storage").await?;
    let mut config: AppConfig = config::load_or_init(&storage).await?;

    if let Some(coin) = cli.coin {
        config.coin_id = coin;
    }
    if let Some(currency) = &cli.currency {
        config.vs_currency = Currency::parse(currency)
            .ok_or_else(|| anyhow!("unsupported currency: {currency}"))?;
    }
    if let Some(days) = cli.days {
        config.days = clamp_days(days);
    }

    if cli.report {
        report::run(&config).await
    } else {
        tui::run_tui(config).await
    }
}
