//! Wire compression codec selection.
//!
//! Codecs are chosen by name from configuration and negotiated per call.
//! Only the encodings shipped by the transport are accepted; tonic has no
//! snappy codec, so `snappy` is rejected at config validation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tonic::codec::CompressionEncoding;

/// Supported compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
}

impl Codec {
    /// Names accepted by [`Codec::from_str`].
    pub const SUPPORTED: &'static [&'static str] = &["gzip", "zstd"];

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        }
    }

    /// Encoding used for both sending and accepting compressed messages.
    pub fn encoding(&self) -> CompressionEncoding {
        match self {
            Codec::Gzip => CompressionEncoding::Gzip,
            Codec::Zstd => CompressionEncoding::Zstd,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a codec name is not one of [`Codec::SUPPORTED`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported compression codec '{0}' (supported: gzip, zstd)")]
pub struct UnknownCodec(pub String);

impl FromStr for Codec {
    type Err = UnknownCodec;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Codec::Gzip),
            "zstd" => Ok(Codec::Zstd),
            _ => Err(UnknownCodec(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("gzip".parse::<Codec>(), Ok(Codec::Gzip));
        assert_eq!(" ZSTD ".parse::<Codec>(), Ok(Codec::Zstd));
    }

    #[test]
    fn rejects_unknown_codec() {
        let err = "snappy".parse::<Codec>().unwrap_err();
        assert_eq!(err, UnknownCodec("snappy".into()));
        assert_eq!(
            err.to_string(),
            "unsupported compression codec 'snappy' (supported: gzip, zstd)"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
