//! Payload parsing for Battle.net responses.
//!
//! Every sub-resource is optional: a body that fails to parse is logged with
//! the serde path and a snippet around the failure, then treated as absent.

use super::{ResourceFetcher, ResourceRequest};
use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Fetch a resource and parse it, or `None` if it is unavailable or malformed.
pub async fn fetch_json<T: DeserializeOwned>(
    fetcher: &dyn ResourceFetcher,
    request: &ResourceRequest,
) -> Option<T> {
    let body = fetcher.fetch(request).await?;
    parse_payload(&request.path, &body)
}

/// Parse a body, logging a warning on failure.
pub fn parse_payload<T: DeserializeOwned>(path: &str, body: &str) -> Option<T> {
    match parse_json_with_context(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path, error = %e, "Failed to parse payload");
            None
        }
    }
}

/// Parse JSON and, on failure, report the serde path, a simplified type
/// mismatch and a snippet of the offending line.
pub fn parse_json_with_context<T: DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        let mut out = String::new();
        if !path.is_empty() && path != "." {
            out.push_str(&format!("at path '{path}': "));
        }
        out.push_str(&format!(
            "{} (line {line} col {column})\n{}",
            describe_mismatch(msg),
            snippet(body, line, column, 20)
        ));
        anyhow::anyhow!(out)
    })
}

/// Turn "invalid type: null, expected i32" into "expected i32, got null".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {}, got {}", expected.trim(), actual);
    }
    msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    let error_idx = column.saturating_sub(1).min(target.len());
    let half = context_len / 2;
    let mut start = error_idx.saturating_sub(half);
    let mut end = (error_idx + half).min(target.len());
    while !target.is_char_boundary(start) {
        start -= 1;
    }
    while !target.is_char_boundary(end) {
        end += 1;
    }

    let indicator = " ".repeat(error_idx - start) + "^";
    format!("...{}...\n   {indicator}", &target[start..end])
}
