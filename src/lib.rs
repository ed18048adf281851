//! A small command-line client for fetching MercadoLibre shipping labels.
//!
//! The flow is strictly sequential:
//! refresh an access token, resolve an order or pack id to its shipment id,
//! then download the label as ZPL or PDF.
//!
//! ## Quick start
//! - Put `ML_CLIENT_ID`, `ML_CLIENT_SECRET` and `ML_REFRESH_TOKEN` in a `.env` file.
//! - Build a [`Client`] from it and walk the steps below.
//!
//! ```no_run
//! use anyhow::Result;
//! use ml_label::{Client, LabelFormat, extract_shipment_id};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let client = Client::from_env_file(Path::new(".env"))?;
//!     let token = client.refresh_access_token()?;
//!
//!     let found = client.find_order_any("2000010048750545", &token).into_match()?;
//!     let shipment_id = extract_shipment_id(&found.record)?;
//!
//!     let label = client.download_label(shipment_id, &token, LabelFormat::Zpl2)?;
//!     ml_label::save_label(&label, Path::new("etiqueta.zpl"), None)?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod cli;
mod client;
mod config;
mod error;
mod lookup;
mod output;
mod util;

pub use client::{AccessToken, Client, ClientConfig, LabelFormat};
pub use config::{
    DEFAULT_API_URL, DEFAULT_ENV_PATH, REQUIRED_KEYS, ensure_keys, load_config, load_env,
};
pub use lookup::{
    Attempt, MatchedRecord, Outcome, Resolution, Source, extract_shipment_id, matches_identifier,
    write_attempts,
};
pub use output::{downloads_dir, print_label, resolve_save_path, save_label};
pub use util::{ZIP_MAGIC, is_zip};
