use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::load_config;
use crate::error::format_api_error;
use crate::lookup::{Attempt, Outcome, Resolution, Source};
use crate::util::{append_query, urljoin};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base, typically `https://api.mercadolibre.com`.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived credential exchanged for an access token on every run.
    pub refresh_token: String,
    /// Read from the config file; not used by the label flow.
    pub seller_id: Option<String>,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

/// Label formats accepted by the `shipment_labels` endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LabelFormat {
    /// Zebra ZPL II markup.
    #[default]
    Zpl2,
    Pdf,
}

impl LabelFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelFormat::Zpl2 => "zpl2",
            LabelFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-lived bearer token. Lives only for the current run.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    /// Lifetime reported by the platform, in seconds. Informational only.
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
}

impl AccessToken {
    /// Reads a token response. Only `access_token` is required; the other
    /// fields are dropped when they have an unexpected shape.
    pub fn from_response(v: &Value) -> Option<Self> {
        let token = v
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())?;

        let expires_in = v.get("expires_in").and_then(|e| match e {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        });

        Some(Self {
            token: token.to_string(),
            expires_in,
            token_type: v.get("token_type").and_then(Value::as_str).map(str::to_string),
        })
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[derive(Clone)]
pub struct Client {
    api_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    seller_id: Option<String>,

    progress: bool,

    http: HttpClient,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("seller_id", &self.seller_id)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client from the `KEY=VALUE` credentials file at `path`.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        Self::new(load_config(path)?)
    }

    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ml-label/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("ml-label")),
        );

        let mut builder = HttpClient::builder().default_headers(default_headers);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            api_url: cfg.api_url,
            client_id: cfg.client_id,
            client_secret: cfg.client_secret,
            refresh_token: cfg.refresh_token,
            seller_id: cfg.seller_id,
            progress: true,
            http,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn seller_id(&self) -> Option<&str> {
        self.seller_id.as_deref()
    }

    pub fn token_url(&self) -> String {
        urljoin(&self.api_url, "/oauth/token")
    }

    pub fn order_url(&self, order_id: &str) -> String {
        urljoin(&self.api_url, &format!("/orders/{}", order_id.trim()))
    }

    pub fn pack_url(&self, pack_id: &str) -> String {
        urljoin(&self.api_url, &format!("/packs/{}", pack_id.trim()))
    }

    pub fn label_url(&self, shipment_id: u64, format: LabelFormat) -> String {
        append_query(
            &urljoin(&self.api_url, "/shipment_labels"),
            &[
                ("shipment_ids", &shipment_id.to_string()),
                ("response_type", format.as_str()),
            ],
        )
    }

    /// Exchanges the refresh token for a fresh access token.
    pub fn refresh_access_token(&self) -> Result<AccessToken> {
        if self.client_id.is_empty()
            || self.client_secret.is_empty()
            || self.refresh_token.is_empty()
        {
            bail!("client id, client secret and refresh token are all required to refresh the token");
        }

        let url = self.token_url();
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ];

        tracing::debug!(url = %url, "refreshing access token");
        let resp = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .with_context(|| format!("could not connect to {}", url))?;
        let text = checked_text(resp, &url)?;

        let parsed = serde_json::from_str::<Value>(&text).ok();
        match parsed.as_ref().and_then(AccessToken::from_response) {
            Some(token) => Ok(token),
            None => bail!("unexpected token response, no access_token field: {}", text),
        }
    }

    /// GETs a JSON document with bearer auth. Non-success statuses become errors.
    pub fn api_json(&self, url: &str, token: &AccessToken) -> Result<Value> {
        let resp = self
            .apply_auth(self.http.get(url), token)
            .send()
            .with_context(|| format!("could not connect to {}", url))?;
        let text = checked_text(resp, url)?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse API JSON (url={})", url))
    }

    pub fn get_order(&self, order_id: &str, token: &AccessToken) -> Result<Value> {
        self.api_json(&self.order_url(order_id), token)
    }

    pub fn get_pack(&self, pack_id: &str, token: &AccessToken) -> Result<Value> {
        self.api_json(&self.pack_url(pack_id), token)
    }

    /// Looks `identifier` up as an order, then as a pack.
    ///
    /// Failures are recorded, not returned; the pack endpoint is only tried
    /// when the order lookup did not match. Call [`Resolution::into_match`]
    /// for the matched record.
    pub fn find_order_any(&self, identifier: &str, token: &AccessToken) -> Resolution {
        let mut resolution = Resolution::new(identifier);

        for source in [Source::Order, Source::Pack] {
            let url = match source {
                Source::Order => self.order_url(identifier),
                Source::Pack => self.pack_url(identifier),
            };
            let outcome = match self.api_json(&url, token) {
                Ok(payload) => Outcome::Payload(payload),
                Err(e) => Outcome::Error(format!("{:#}", e)),
            };
            tracing::debug!(source = %source, url = %url, ok = matches!(outcome, Outcome::Payload(_)), "lookup attempt");

            if resolution.record(Attempt { source, url, outcome }) {
                break;
            }
        }

        resolution
    }

    /// Downloads the label for `shipment_id`. The body is returned unmodified.
    pub fn download_label(
        &self,
        shipment_id: u64,
        token: &AccessToken,
        format: LabelFormat,
    ) -> Result<Vec<u8>> {
        let url = self.label_url(shipment_id, format);

        let pb = if self.progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("downloading {} label for shipment {}", format, shipment_id));
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let result = self.fetch_bytes(&url, token);

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        let bytes = result?;
        tracing::debug!(url = %url, len = bytes.len(), "label downloaded");
        Ok(bytes)
    }

    fn fetch_bytes(&self, url: &str, token: &AccessToken) -> Result<Vec<u8>> {
        let resp = self
            .apply_auth(self.http.get(url), token)
            .send()
            .with_context(|| format!("could not connect to {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(format_api_error(status, url, &text));
        }

        let bytes = resp
            .bytes()
            .with_context(|| format!("failed to read response body from {}", url))?;
        Ok(bytes.to_vec())
    }

    fn apply_auth(&self, req: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        req.bearer_auth(&token.token)
    }
}

/// Reads the body as text, turning non-success statuses into errors.
fn checked_text(resp: Response, url: &str) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().unwrap_or_default();
        return Err(format_api_error(status, url, &text));
    }
    resp.text()
        .with_context(|| format!("failed to read response body from {}", url))
}
