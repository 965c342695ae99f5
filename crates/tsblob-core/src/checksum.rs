//! SHA-256 digests for blocks and whole files.
//!
//! Blocks are hashed in memory by the engine workers; whole files are streamed
//! through the hasher once when a `FileMeta` is built and again after a
//! download as the final integrity gate.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Length of a SHA-256 digest in bytes.
pub const SHA256_LEN: usize = 32;

/// Raw SHA-256 digest.
pub type Sha256Digest = [u8; SHA256_LEN];

fn finish(hasher: Sha256) -> Sha256Digest {
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// SHA-256 of an in-memory slice.
pub fn sha256_bytes(data: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finish(hasher)
}

/// Stream `r` through SHA-256 until EOF.
/// Returns the digest together with the number of bytes consumed.
pub fn sha256_reader<R: Read>(mut r: R) -> io::Result<(Sha256Digest, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((finish(hasher), total))
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let (digest, _) = sha256_reader(f).with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(digest))
}

/// Parse a hex-encoded SHA-256 digest (as stored in series keys).
pub fn parse_sha256_hex(s: &str) -> Result<Sha256Digest, hex::FromHexError> {
    let mut out = [0u8; SHA256_LEN];
    hex::decode_to_slice(s, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(digest, EMPTY_SHA256);
    }

    #[test]
    fn sha256_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn reader_counts_bytes_across_buffers() {
        let data = vec![7u8; BUF_SIZE * 2 + 13];
        let (digest, n) = sha256_reader(&data[..]).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(digest, sha256_bytes(&data));
    }

    #[test]
    fn parse_hex_roundtrip_and_rejects_bad_input() {
        let parsed = parse_sha256_hex(EMPTY_SHA256).unwrap();
        assert_eq!(hex::encode(parsed), EMPTY_SHA256);
        assert!(parse_sha256_hex("abcd").is_err());
        assert!(parse_sha256_hex(&"zz".repeat(32)).is_err());
    }
}
