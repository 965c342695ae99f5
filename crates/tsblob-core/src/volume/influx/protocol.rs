//! Line-protocol points and InfluxQL statements for block storage.
//!
//! Each block is one point in the measurement named after the file path:
//!
//! ```text
//! <series key> z="<z85 payload>" <unix seconds>
//! ```
//!
//! The payload is the block zero-padded to a 4-byte boundary, so `z` is
//! `padded_len(exp_size) * 5 / 4` characters long.

use super::client::StatementResult;
use crate::error::BackendError;
use crate::meta::BlockMeta;
use crate::volume::series::SeriesKey;
use crate::z85;

/// Line-protocol point for one block, newline-terminated.
pub fn block_line(data: &[u8], block: &BlockMeta) -> Vec<u8> {
    let prefix = format!("{} z=\"", SeriesKey::from_block(block));
    let suffix = format!("\" {}\n", block.file().time);
    let mut line = Vec::with_capacity(
        prefix.len() + z85::encoded_len(z85::padded_len(data.len())) + suffix.len(),
    );
    line.extend_from_slice(prefix.as_bytes());
    line.extend_from_slice(z85::encode_padded(data).as_bytes());
    line.extend_from_slice(suffix.as_bytes());
    line
}

/// Fetch the payload of one block of one file version, stored at one block size.
pub fn select_block(block: &BlockMeta) -> String {
    format!(
        "SELECT z FROM \"{}\" WHERE bi = '{}' AND bs = '{}' AND sha256 = '{}'",
        block.path(),
        block.index,
        block.file().block_size,
        block.file().sha256_hex()
    )
}

/// Every series stored at exactly `path`.
pub fn show_series(path: &str) -> String {
    format!("SHOW SERIES FROM \"{path}\"")
}

/// Every series whose measurement starts with `prefix`.
pub fn show_series_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return "SHOW SERIES".to_string();
    }
    format!("SHOW SERIES FROM /^{}/", escape_regex(prefix))
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Series keys from a `SHOW SERIES` result (column `key`).
pub fn series_keys(result: StatementResult) -> Result<Vec<String>, BackendError> {
    let mut keys = Vec::new();
    for series in result.series {
        let col = series.column("key").unwrap_or(0);
        for row in series.values {
            match row.get(col).and_then(|v| v.as_str()) {
                Some(k) => keys.push(k.to_string()),
                None => {
                    return Err(BackendError::Query(format!(
                        "SHOW SERIES row without a string key: {row:?}"
                    )))
                }
            }
        }
    }
    Ok(keys)
}

/// The `z` payload from a `SELECT z` result.
pub fn block_text(result: StatementResult, block: &BlockMeta) -> Result<String, BackendError> {
    let missing = || BackendError::NotFound(format!("{} block {}", block.path(), block.index));
    let series = result.series.into_iter().next().ok_or_else(missing)?;
    let col = series.column("z").unwrap_or(1);
    let row = series.values.into_iter().next().ok_or_else(missing)?;
    match row.into_iter().nth(col) {
        Some(serde_json::Value::String(z)) => Ok(z),
        other => Err(BackendError::Query(format!(
            "field z of {} block {} is not a string: {other:?}",
            block.path(),
            block.index
        ))),
    }
}
