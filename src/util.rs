/// Local file header signature that opens every ZIP archive.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Whether `data` is a ZIP archive, judged by its first four bytes only.
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Joins an endpoint path onto the API base. Absolute URLs pass through.
pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Appends `params` to `url`. Values are ids and enumerated formats, never escaped.
pub(crate) fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, sep, query)
}

/// Replaces anything outside `[A-Za-z0-9._-]` so the value is safe as a file name.
pub(crate) fn sanitize_filename(raw: &str) -> String {
    let s: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() { "_".to_string() } else { s }
}
