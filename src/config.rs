use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path;

use crate::client::ClientConfig;

/// Default location of the credentials file, relative to the working directory.
pub const DEFAULT_ENV_PATH: &str = ".env";
/// Production API base.
pub const DEFAULT_API_URL: &str = "https://api.mercadolibre.com";

pub const CLIENT_ID_KEY: &str = "ML_CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "ML_CLIENT_SECRET";
pub const REFRESH_TOKEN_KEY: &str = "ML_REFRESH_TOKEN";
pub const SELLER_ID_KEY: &str = "ML_SELLER_ID";
pub const API_URL_KEY: &str = "ML_API_URL";
pub const VERIFY_KEY: &str = "ML_VERIFY";

pub const REQUIRED_KEYS: [&str; 3] = [CLIENT_ID_KEY, CLIENT_SECRET_KEY, REFRESH_TOKEN_KEY];

/// Loads the credentials file and turns it into a [`ClientConfig`].
///
/// Fails when the file is absent or when any of [`REQUIRED_KEYS`] is missing or empty.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let env = load_env(path)?;
    ensure_keys(&env, &REQUIRED_KEYS)?;

    let value = |k: &str| env.get(k).cloned().unwrap_or_default();
    let optional = |k: &str| env.get(k).filter(|v| !v.is_empty()).cloned();

    Ok(ClientConfig {
        api_url: optional(API_URL_KEY).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        client_id: value(CLIENT_ID_KEY),
        client_secret: value(CLIENT_SECRET_KEY),
        refresh_token: value(REFRESH_TOKEN_KEY),
        seller_id: optional(SELLER_ID_KEY),
        verify: optional(VERIFY_KEY).map(|v| v != "0").unwrap_or(true),
    })
}

/// Parses a simple `KEY=VALUE` file.
///
/// Blank lines, `#` comments and lines without `=` are skipped.
pub fn load_env(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        bail!(
            "{} not found. Copy .env.example to {} and fill in your credentials",
            path.display(),
            path.display()
        );
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    Ok(parse_env(&text))
}

pub(crate) fn parse_env(text: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((k, v)) = line.split_once('=') {
            env.insert(k.trim().to_string(), strip_quotes(v).to_string());
        }
    }

    env
}

/// Fails naming every key in `keys` that is absent or empty.
pub fn ensure_keys(env: &HashMap<String, String>, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| env.get(*k).is_none_or(|v| v.is_empty()))
        .collect();

    if !missing.is_empty() {
        bail!("Missing configuration keys: {}", missing.join(", "));
    }
    Ok(())
}

/// Trims `raw` and removes one pair of matching `"` or `'` around it.
fn strip_quotes(raw: &str) -> &str {
    let value = raw.trim();
    ['"', '\'']
        .into_iter()
        .find_map(|q| value.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
        .unwrap_or(value)
}
