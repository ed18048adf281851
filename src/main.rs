//! ml-label
//!
//! Refreshes an access token, resolves an order or pack id to its shipment
//! and downloads the shipping label. Status goes to stderr; stdout only
//! carries the label (or the token expiry with `--refresh-only`).

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ml_label::cli::{self, Cli};

fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "ml_label=debug" } else { "ml_label=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(args)
}
