// src/codec.rs

//! Stream compression and VCDIFF delta codecs.
//!
//! Provides a consistent interface over the two per-file compressors
//! (deflate in a zlib container, xz) and the RFC 3284 delta encoder
//! used for parent/child file storage. All operations work on whole
//! in-memory buffers; failure is reported through the return value so
//! callers can fall back to raw storage instead of aborting an import.

use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;
use xz2::read::{XzDecoder, XzEncoder};

/// Cap on the decompression buffer preallocated from the recorded
/// uncompressed size (1 GiB).
const MAX_SIZE_HINT: usize = 0x4000_0000;

/// Supported per-file compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// deflate stream in a zlib container (.zz style)
    Deflate,
    /// XZ/LZMA2 stream (.xz)
    Xz,
}

impl Compression {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
            Self::Xz => "xz",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Compression {
    type Err = UnknownCompression;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deflate" => Ok(Self::Deflate),
            "xz" => Ok(Self::Xz),
            _ => Err(UnknownCompression(s.to_string())),
        }
    }
}

/// Compression name not recognized; the caller stores bytes raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCompression(pub String);

impl fmt::Display for UnknownCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown compression algorithm: {}", self.0)
    }
}

impl std::error::Error for UnknownCompression {}

/// Compress `bytes` at maximum level. Returns `None` when the input is
/// empty or the codec fails; the caller then stores the input
/// uncompressed.
pub fn compress(bytes: &[u8], algorithm: Compression) -> Option<Vec<u8>> {
    if bytes.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(bytes.len());
    let ok = match algorithm {
        Compression::Deflate => {
            ZlibEncoder::new(bytes, flate2::Compression::best())
                .read_to_end(&mut out)
                .is_ok()
        }
        Compression::Xz => XzEncoder::new(bytes, 9).read_to_end(&mut out).is_ok(),
    };
    ok.then_some(out)
}

/// Decompress `bytes`, preallocating for `expected_size` output bytes
/// (clamped to [1, 1 GiB]; the stream decoders grow past the hint on
/// their own). Returns an empty buffer on unrecoverable failure.
pub fn decompress(bytes: &[u8], expected_size: usize, algorithm: Compression) -> Vec<u8> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(expected_size.clamp(1, MAX_SIZE_HINT));
    let ok = match algorithm {
        Compression::Deflate => ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok(),
        Compression::Xz => XzDecoder::new(bytes).read_to_end(&mut out).is_ok(),
    };
    if ok {
        out
    } else {
        Vec::new()
    }
}

/// VCDIFF-encode `target` against `source`. On success the patch bytes
/// come back with `true`; on failure the source bytes come back
/// unchanged with `false` and the caller stores the row non-delta.
pub fn make_patch(source: &[u8], target: &[u8]) -> (Vec<u8>, bool) {
    match xdelta3::encode(target, source) {
        Some(patch) => (patch, true),
        None => (source.to_vec(), false),
    }
}

/// Apply a VCDIFF `patch` against `source`, expecting `expected_size`
/// output bytes. Returns an empty buffer when decoding fails.
pub fn apply_patch(source: &[u8], patch: &[u8], expected_size: usize) -> Vec<u8> {
    let Some(out) = xdelta3::decode(patch, source) else {
        return Vec::new();
    };
    if expected_size != 0 && out.len() != expected_size {
        debug!(
            got = out.len(),
            expected = expected_size,
            "patch output length differs from recorded size"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trip() {
        let input = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress(&input, Compression::Deflate).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(decompress(&compressed, input.len(), Compression::Deflate), input);
    }

    #[test]
    fn xz_round_trip() {
        let input = b"aaaaabbbbbcccccdddddeeeee".repeat(50);
        let compressed = compress(&input, Compression::Xz).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(decompress(&compressed, input.len(), Compression::Xz), input);
    }

    #[test]
    fn decompress_tolerates_wrong_size_hint() {
        let input = b"payload that is longer than the hint suggests".to_vec();
        let compressed = compress(&input, Compression::Deflate).unwrap();
        assert_eq!(decompress(&compressed, 1, Compression::Deflate), input);
        assert_eq!(decompress(&compressed, 0, Compression::Deflate), input);
    }

    #[test]
    fn compress_empty_input_stays_raw() {
        assert!(compress(b"", Compression::Deflate).is_none());
        assert!(compress(b"", Compression::Xz).is_none());
    }

    #[test]
    fn decompress_garbage_returns_empty() {
        assert!(decompress(b"not a stream", 64, Compression::Deflate).is_empty());
        assert!(decompress(b"not a stream", 64, Compression::Xz).is_empty());
    }

    #[test]
    fn patch_round_trip() {
        let source = b"ABCDEF ABCDEF ABCDEF ABCDEF".to_vec();
        let target = b"ABCDEG ABCDEF ABCDEF ABCDEH".to_vec();
        let (patch, is_patch) = make_patch(&source, &target);
        assert!(is_patch);
        assert_eq!(apply_patch(&source, &patch, target.len()), target);
    }

    #[test]
    fn patch_against_empty_source() {
        let target = b"fresh content with no parent".to_vec();
        let (patch, is_patch) = make_patch(b"", &target);
        assert!(is_patch);
        assert_eq!(apply_patch(b"", &patch, target.len()), target);
    }

    #[test]
    fn apply_garbage_patch_returns_empty() {
        assert!(apply_patch(b"source", b"not a vcdiff stream", 6).is_empty());
    }

    #[test]
    fn parse_compression_names() {
        assert_eq!("xz".parse::<Compression>().unwrap(), Compression::Xz);
        assert_eq!("DEFLATE".parse::<Compression>().unwrap(), Compression::Deflate);
        assert!("zstd".parse::<Compression>().is_err());
    }
}
