//! Z85 binary-to-text codec (ZeroMQ RFC 32).
//!
//! Every 4-byte binary frame, read as a big-endian `u32`, becomes 5 ASCII
//! characters from an 85-symbol alphabet. The raw codec only accepts whole
//! frames; [`encode_padded`] and [`decode_exact`] implement the padding scheme
//! used for the final, possibly short, block of a file: zero-pad up to the
//! next 4-byte boundary before encoding, strip back to the block's expected
//! size after decoding.

const ENCODE: &[u8; 85] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

const INVALID: u8 = 0xFF;

const DECODE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ENCODE.len() {
        table[ENCODE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Errors from decoding (or encoding unaligned input).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Z85Error {
    #[error("input length {len} is not a multiple of {frame}")]
    UnalignedInput { len: usize, frame: usize },

    #[error("byte 0x{byte:02x} at position {position} is not in the Z85 alphabet")]
    InvalidByte { byte: u8, position: usize },

    #[error("frame at position {position} does not fit in 32 bits")]
    FrameOverflow { position: usize },

    #[error("decoded {decoded} bytes, expected {expected} plus at most 3 bytes of padding")]
    LengthMismatch { expected: usize, decoded: usize },

    #[error("padding after byte {expected} is not zero")]
    NonZeroPadding { expected: usize },
}

/// Length of the Z85 text for `n` binary bytes (`n` a multiple of 4).
pub fn encoded_len(n: usize) -> usize {
    n * 5 / 4
}

/// `n` rounded up to the next 4-byte frame boundary.
pub fn padded_len(n: usize) -> usize {
    n.div_ceil(4) * 4
}

fn encode_frames(dst: &mut Vec<u8>, src: &[u8]) {
    dst.reserve(encoded_len(src.len()));
    for frame in src.chunks_exact(4) {
        let mut v = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let mut buf = [0u8; 5];
        // Most significant digit first.
        for slot in buf.iter_mut().rev() {
            *slot = ENCODE[(v % 85) as usize];
            v /= 85;
        }
        dst.extend_from_slice(&buf);
    }
}

/// Encode `src` frame by frame, appending the text to `dst`.
pub fn encode_append(dst: &mut Vec<u8>, src: &[u8]) -> Result<(), Z85Error> {
    if src.len() % 4 != 0 {
        return Err(Z85Error::UnalignedInput {
            len: src.len(),
            frame: 4,
        });
    }
    encode_frames(dst, src);
    Ok(())
}

/// Encode `src` (length a multiple of 4) into a Z85 string.
pub fn encode(src: &[u8]) -> Result<String, Z85Error> {
    let mut out = Vec::with_capacity(encoded_len(src.len()));
    encode_append(&mut out, src)?;
    Ok(out.into_iter().map(char::from).collect())
}

/// Zero-pad `data` to a 4-byte boundary and encode it.
pub fn encode_padded(data: &[u8]) -> String {
    let mut framed = Vec::with_capacity(padded_len(data.len()));
    framed.extend_from_slice(data);
    framed.resize(padded_len(data.len()), 0);
    let mut out = Vec::with_capacity(encoded_len(framed.len()));
    encode_frames(&mut out, &framed);
    out.into_iter().map(char::from).collect()
}

/// Decode `src` frame by frame, appending the binary output to `dst`.
/// Fails on a byte outside the alphabet instead of producing a corrupt frame.
pub fn decode_append(dst: &mut Vec<u8>, src: &[u8]) -> Result<(), Z85Error> {
    if src.len() % 5 != 0 {
        return Err(Z85Error::UnalignedInput {
            len: src.len(),
            frame: 5,
        });
    }
    dst.reserve(src.len() / 5 * 4);
    for (i, frame) in src.chunks_exact(5).enumerate() {
        let mut v: u64 = 0;
        for (j, &byte) in frame.iter().enumerate() {
            let digit = DECODE[byte as usize];
            if digit == INVALID {
                return Err(Z85Error::InvalidByte {
                    byte,
                    position: i * 5 + j,
                });
            }
            v = v * 85 + u64::from(digit);
        }
        let v = u32::try_from(v).map_err(|_| Z85Error::FrameOverflow { position: i * 5 })?;
        dst.extend_from_slice(&v.to_be_bytes());
    }
    Ok(())
}

/// Decode Z85 text (length a multiple of 5).
pub fn decode(src: &[u8]) -> Result<Vec<u8>, Z85Error> {
    let mut out = Vec::with_capacity(src.len() / 5 * 4);
    decode_append(&mut out, src)?;
    Ok(out)
}

/// Decode text produced by [`encode_padded`] and strip the padding so exactly
/// `exp_size` bytes remain.
pub fn decode_exact(src: &[u8], exp_size: usize) -> Result<Vec<u8>, Z85Error> {
    let mut raw = decode(src)?;
    if raw.len() < exp_size || raw.len() - exp_size > 3 {
        return Err(Z85Error::LengthMismatch {
            expected: exp_size,
            decoded: raw.len(),
        });
    }
    if raw[exp_size..].iter().any(|&b| b != 0) {
        return Err(Z85Error::NonZeroPadding { expected: exp_size });
    }
    raw.truncate(exp_size);
    Ok(raw)
}
