//! Series keys: the measurement plus tag set that identifies one stored block.
//!
//! ```text
//! /my/file,bi=0,bs=1024,bsha256=<hex>,sha256=<hex>,sz=5000
//! ```
//!
//! `bi`, `bsha256` vary per block; `bs`, `sha256`, `sz` are shared by every
//! block of one file version. Tags are written in the order above (the order
//! InfluxDB sorts them in) but parsed in any order. Values are never escaped,
//! which is why paths are restricted by [`validate_path`].

use std::fmt;
use std::str::FromStr;

use crate::checksum::{parse_sha256_hex, Sha256Digest};
use crate::error::BackendError;
use crate::meta::{BlockMeta, FileMeta};

/// Characters that would need line-protocol escaping in a measurement name.
const RESERVED: &[char] = &[',', ' ', '=', '"', '\\', '\n', '\r', '\t'];

/// Reject paths that cannot be stored verbatim as a measurement name.
pub fn validate_path(path: &str) -> Result<(), BackendError> {
    if path.is_empty() || path.contains(RESERVED) {
        return Err(BackendError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parsed form of one series key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    pub path: String,
    pub index: u64,
    pub block_size: u64,
    pub block_sha256: Sha256Digest,
    pub sha256: Sha256Digest,
    pub size: u64,
}

impl SeriesKey {
    pub fn from_block(block: &BlockMeta) -> Self {
        let file = block.file();
        SeriesKey {
            path: file.path.clone(),
            index: block.index,
            block_size: file.block_size,
            block_sha256: block.sha256,
            sha256: file.sha256,
            size: file.size,
        }
    }

    /// File-level part of the key. `time` is not part of a series key and is left at 0.
    pub fn file_meta(&self) -> FileMeta {
        FileMeta {
            path: self.path.clone(),
            sha256: self.sha256,
            block_size: self.block_size,
            size: self.size,
            time: 0,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},bi={},bs={},bsha256={},sha256={},sz={}",
            self.path,
            self.index,
            self.block_size,
            hex::encode(self.block_sha256),
            hex::encode(self.sha256),
            self.size
        )
    }
}

impl FromStr for SeriesKey {
    type Err = BackendError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let bad = |reason: String| BackendError::Parse {
            key: key.to_string(),
            reason,
        };

        let mut parts = key.split(',');
        let path = parts.next().unwrap_or_default();
        if path.is_empty() {
            return Err(bad("missing measurement".into()));
        }

        let mut index = None;
        let mut block_size = None;
        let mut block_sha256 = None;
        let mut sha256 = None;
        let mut size = None;
        for tag in parts {
            let (k, v) = tag
                .split_once('=')
                .ok_or_else(|| bad(format!("tag {tag:?} is not key=value")))?;
            let num = || v.parse::<u64>().map_err(|e| bad(format!("{k}={v}: {e}")));
            let digest = || parse_sha256_hex(v).map_err(|e| bad(format!("{k}={v}: {e}")));
            let slot_taken = match k {
                "bi" => index.replace(num()?).is_some(),
                "bs" => block_size.replace(num()?).is_some(),
                "sz" => size.replace(num()?).is_some(),
                "bsha256" => block_sha256.replace(digest()?).is_some(),
                "sha256" => sha256.replace(digest()?).is_some(),
                _ => return Err(bad(format!("unknown tag {k:?}"))),
            };
            if slot_taken {
                return Err(bad(format!("duplicate tag {k:?}")));
            }
        }

        let missing = |name: &str| bad(format!("missing tag {name:?}"));
        Ok(SeriesKey {
            path: path.to_string(),
            index: index.ok_or_else(|| missing("bi"))?,
            block_size: block_size.ok_or_else(|| missing("bs"))?,
            block_sha256: block_sha256.ok_or_else(|| missing("bsha256"))?,
            sha256: sha256.ok_or_else(|| missing("sha256"))?,
            size: size.ok_or_else(|| missing("sz"))?,
        })
    }
}
