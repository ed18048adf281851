//! Order/pack lookup records and the helpers that read them.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::util::sanitize_filename;

/// Which endpoint a lookup attempt went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Order,
    Pack,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Order => "order",
            Source::Pack => "pack",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Decoded JSON body of a successful response.
    Payload(Value),
    /// Transport, HTTP or decoding failure, already formatted.
    Error(String),
}

/// One request made while resolving an identifier.
///
/// Serializes as `{"source": ..., "url": ..., "payload" | "error": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub source: Source,
    pub url: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Attempt {
    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Payload(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }
}

/// Record that matched the requested identifier.
#[derive(Debug, Clone)]
pub struct MatchedRecord {
    pub source: Source,
    pub record: Value,
}

/// Every attempt made for one identifier, in order, and which one matched.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identifier: String,
    pub attempts: Vec<Attempt>,
    matched: Option<usize>,
}

impl Resolution {
    pub(crate) fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            attempts: Vec::new(),
            matched: None,
        }
    }

    /// Records an attempt. Returns `true` when it matched and resolution can stop.
    pub(crate) fn record(&mut self, attempt: Attempt) -> bool {
        let hit = attempt
            .payload()
            .is_some_and(|p| matches_identifier(p, &self.identifier));
        self.attempts.push(attempt);
        if hit && self.matched.is_none() {
            self.matched = Some(self.attempts.len() - 1);
        }
        hit
    }

    pub fn matched(&self) -> Option<&Attempt> {
        self.matched.map(|i| &self.attempts[i])
    }

    pub fn into_match(self) -> Result<MatchedRecord> {
        let Some(i) = self.matched else {
            let tried = self
                .attempts
                .iter()
                .map(|a| match &a.outcome {
                    Outcome::Payload(_) => format!("{} ({}): identifier mismatch", a.source, a.url),
                    Outcome::Error(e) => format!("{} ({}): {}", a.source, a.url, first_line(e)),
                })
                .collect::<Vec<_>>()
                .join("\n- ");
            bail!(
                "No order or pack matches identifier {}. Verify that it is a valid order_id or pack_id for this seller.\n- {}",
                self.identifier,
                tried
            );
        };

        let attempt = self.attempts.into_iter().nth(i).ok_or_else(|| anyhow!("lost matched attempt"))?;
        match attempt.outcome {
            Outcome::Payload(record) => Ok(MatchedRecord {
                source: attempt.source,
                record,
            }),
            Outcome::Error(_) => bail!("matched attempt carries no payload"),
        }
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}

/// Renders an id field that may arrive as a JSON number or string.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Whether the record's own `id` or its `pack_id` equals `identifier`.
///
/// An identifier that exists both as an order id and as some other record's
/// `pack_id` produces a false match here. Matches through `pack_id` are logged.
pub fn matches_identifier(record: &Value, identifier: &str) -> bool {
    let wanted = identifier.trim();
    let by_id = record.get("id").and_then(id_string).is_some_and(|s| s == wanted);
    if by_id {
        return true;
    }
    let by_pack = record
        .get("pack_id")
        .and_then(id_string)
        .is_some_and(|s| s == wanted);
    if by_pack {
        tracing::debug!(identifier = wanted, "record matched through pack_id rather than id");
    }
    by_pack
}

/// Reads the shipment id from `shipping.id`, falling back to `shipment.id`.
///
/// Null, zero and empty values count as absent.
pub fn extract_shipment_id(record: &Value) -> Result<u64> {
    for key in ["shipping", "shipment"] {
        let Some(raw) = record.get(key).and_then(|s| s.get("id")) else {
            continue;
        };
        match raw {
            Value::Number(n) => match n.as_u64() {
                Some(0) | None => continue,
                Some(id) => return Ok(id),
            },
            Value::String(s) if s.trim().is_empty() => continue,
            Value::String(s) => {
                let id = s
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{}.id is not a numeric shipment id: {:?}", key, s))?;
                if id != 0 {
                    return Ok(id);
                }
            }
            _ => continue,
        }
    }
    bail!("the record has no shipment id available (neither shipping.id nor shipment.id)")
}

/// Writes each attempt to `debug_{source}_{identifier}.json` under `dir`.
pub fn write_attempts(attempts: &[Attempt], identifier: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let id = sanitize_filename(identifier);
    let mut written = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let path = dir.join(format!("debug_{}_{}.json", attempt.source, id));
        let json = serde_json::to_vec_pretty(attempt).context("failed to serialize attempt")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(source: Source, v: Value) -> Attempt {
        Attempt {
            source,
            url: format!("https://api.test/{}s/1", source),
            outcome: Outcome::Payload(v),
        }
    }

    #[test]
    fn matches_numeric_and_string_ids() {
        assert!(matches_identifier(&json!({"id": 2000010048750545u64}), "2000010048750545"));
        assert!(matches_identifier(&json!({"id": "2000010048750545"}), "2000010048750545"));
        assert!(matches_identifier(&json!({"id": 1, "pack_id": 2000000123}), "2000000123"));
        assert!(!matches_identifier(&json!({"id": 1, "pack_id": null}), "2"));
        assert!(!matches_identifier(&json!({"message": "not found"}), "2"));
    }

    #[test]
    fn shipping_id_wins_over_shipment_id() {
        assert_eq!(extract_shipment_id(&json!({"shipping": {"id": 123}})).unwrap(), 123);
        assert_eq!(
            extract_shipment_id(&json!({"shipping": {"id": 123}, "shipment": {"id": 456}})).unwrap(),
            123
        );
    }

    #[test]
    fn falls_back_to_shipment_id() {
        assert_eq!(extract_shipment_id(&json!({"shipment": {"id": 456}})).unwrap(), 456);
        assert_eq!(
            extract_shipment_id(&json!({"shipping": {"id": 0}, "shipment": {"id": "456"}})).unwrap(),
            456
        );
        assert_eq!(
            extract_shipment_id(&json!({"shipping": {"id": null}, "shipment": {"id": 456}})).unwrap(),
            456
        );
        assert_eq!(
            extract_shipment_id(&json!({"shipping": {"id": ""}, "shipment": {"id": 456}})).unwrap(),
            456
        );
    }

    #[test]
    fn missing_shipment_id_fails() {
        let err = extract_shipment_id(&json!({"id": 1, "shipping": {}})).unwrap_err();
        assert!(err.to_string().contains("no shipment id"));
        assert!(extract_shipment_id(&json!({"shipping": {"id": "abc"}})).is_err());
    }

    #[test]
    fn resolution_keeps_first_match() {
        let mut r = Resolution::new("7");
        assert!(!r.record(Attempt {
            source: Source::Order,
            url: "u".into(),
            outcome: Outcome::Error("HTTP 404".into()),
        }));
        assert!(r.record(payload(Source::Pack, json!({"id": 7}))));
        assert_eq!(r.attempts.len(), 2);
        let m = r.into_match().unwrap();
        assert_eq!(m.source, Source::Pack);
        assert_eq!(m.record["id"], 7);
    }

    #[test]
    fn unmatched_resolution_names_identifier() {
        let mut r = Resolution::new("999");
        r.record(payload(Source::Order, json!({"id": 1})));
        r.record(Attempt {
            source: Source::Pack,
            url: "https://api.test/packs/999".into(),
            outcome: Outcome::Error("HTTP 404 at x\nbody: {}".into()),
        });
        assert!(r.matched().is_none());
        let err = r.into_match().unwrap_err().to_string();
        assert!(err.contains("999"), "{err}");
        assert!(err.contains("identifier mismatch"), "{err}");
        assert!(err.contains("HTTP 404 at x"), "{err}");
    }

    #[test]
    fn attempts_serialize_with_payload_or_error_key() {
        let ok = serde_json::to_value(payload(Source::Order, json!({"id": 1}))).unwrap();
        assert_eq!(ok["source"], "order");
        assert_eq!(ok["payload"]["id"], 1);

        let failed = Attempt {
            source: Source::Pack,
            url: "u".into(),
            outcome: Outcome::Error("boom".into()),
        };
        let v = serde_json::to_value(failed).unwrap();
        assert_eq!(v["source"], "pack");
        assert_eq!(v["error"], "boom");
        assert!(v.get("payload").is_none());
    }

    #[test]
    fn debug_files_are_named_by_source_and_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let attempts = vec![
            payload(Source::Order, json!({"id": 1})),
            Attempt {
                source: Source::Pack,
                url: "u".into(),
                outcome: Outcome::Error("boom".into()),
            },
        ];
        let written = write_attempts(&attempts, "42", dir.path()).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("debug_order_42.json"), dir.path().join("debug_pack_42.json")]
        );
        let text = std::fs::read_to_string(&written[1]).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["error"], "boom");
    }
}
