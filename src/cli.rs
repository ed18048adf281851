//! Command-line surface and the linear token → lookup → label pipeline.

use anyhow::{Result, bail};
use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::client::{Client, LabelFormat};
use crate::config::DEFAULT_ENV_PATH;
use crate::lookup::{extract_shipment_id, write_attempts};
use crate::output::{downloads_dir, print_label, save_label};

#[derive(Debug, Parser)]
#[command(name = "ml-label", version, about = "Download MercadoLibre shipping labels.")]
pub struct Cli {
    /// Order id or pack id of the sale (e.g. 2000010048750545). Required unless --refresh-only.
    #[arg(long, required_unless_present = "refresh_only")]
    pub order_id: Option<String>,

    /// Where to save the label. Prints to stdout when omitted.
    #[arg(long, value_name = "PATH")]
    pub save_label: Option<PathBuf>,

    /// Label format.
    #[arg(long, value_enum, default_value_t = LabelFormat::Zpl2)]
    pub response_type: LabelFormat,

    /// Only refresh the token and show its lifetime; no order lookups.
    #[arg(long)]
    pub refresh_only: bool,

    /// Save the file into ~/Downloads instead of the given directory.
    #[arg(long)]
    pub save_to_downloads: bool,

    /// Dump every order/pack lookup attempt to debug_<source>_<id>.json.
    #[arg(long)]
    pub debug: bool,

    /// Directory for --debug dumps.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub debug_dir: PathBuf,

    /// Credentials file with ML_CLIENT_ID, ML_CLIENT_SECRET and ML_REFRESH_TOKEN.
    #[arg(long, value_name = "PATH", env = "ML_ENV_FILE", default_value = DEFAULT_ENV_PATH)]
    pub env_file: PathBuf,

    /// Hide the download spinner.
    #[arg(long)]
    pub no_progress: bool,

    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs the pipeline against the real stdout and `~/Downloads`.
pub fn run(cli: Cli) -> Result<()> {
    let downloads = if cli.save_to_downloads {
        Some(downloads_dir()?)
    } else {
        None
    };
    run_with(cli, &mut io::stdout().lock(), downloads.as_deref())
}

/// Runs the pipeline, writing the label (or the refresh-only summary) to `out`.
///
/// `downloads` is the folder saved labels are redirected into; it is only
/// honoured together with `--save-to-downloads`.
pub fn run_with<W: Write>(cli: Cli, out: &mut W, downloads: Option<&Path>) -> Result<()> {
    let client = Client::from_env_file(&cli.env_file)?.with_progress(!cli.no_progress);
    if let Some(seller) = client.seller_id() {
        tracing::debug!(seller_id = seller, "seller id configured");
    }

    let token = client.refresh_access_token()?;
    match token.expires_in {
        Some(secs) => tracing::info!("access token obtained, expires in ~{} seconds", secs),
        None => tracing::info!("access token obtained"),
    }

    if cli.refresh_only {
        match token.expires_in {
            Some(secs) => writeln!(out, "Access token obtained. Expires in ~{} seconds.", secs)?,
            None => writeln!(out, "Token ok.")?,
        }
        return Ok(());
    }

    // Guaranteed by clap unless --refresh-only.
    let Some(identifier) = cli.order_id.as_deref() else {
        bail!("--order-id is required unless --refresh-only is set");
    };

    let resolution = client.find_order_any(identifier, &token);
    if cli.debug {
        for path in write_attempts(&resolution.attempts, identifier, &cli.debug_dir)? {
            tracing::info!("lookup attempt written to {}", path.display());
        }
    }

    let found = resolution.into_match()?;
    let shipment_id = extract_shipment_id(&found.record)?;
    tracing::info!("{} {} -> shipping_id {}", found.source, identifier, shipment_id);

    let label = client.download_label(shipment_id, &token, cli.response_type)?;

    match &cli.save_label {
        Some(path) => {
            let downloads = if cli.save_to_downloads { downloads } else { None };
            let written = save_label(&label, path, downloads)?;
            tracing::info!("label saved to {}", written.display());
        }
        None => print_label(&label, out)?,
    }

    Ok(())
}
