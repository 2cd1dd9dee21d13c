//! Attachment compression.

use crate::utils::{MonitorError, Result};
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::Write;

const ZSTD_LEVEL: i32 = 3;

/// Codec applied to report attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
    Zstd,
}

impl Compression {
    /// Suffix appended to the attachment file name, if any.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gz"),
            Self::Zstd => Some("zst"),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::None => "text/plain",
            Self::Gzip => "application/x-gzip",
            Self::Zstd => "application/zstd",
        }
    }

    /// `name` with this codec's extension appended.
    pub fn file_name(&self, name: &str) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{}", name, ext),
            None => name.to_string(),
        }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| MonitorError::Compression(format!("gzip: {}", e)))?;
                encoder
                    .finish()
                    .map_err(|e| MonitorError::Compression(format!("gzip: {}", e)))
            }
            Self::Zstd => zstd::encode_all(data, ZSTD_LEVEL)
                .map_err(|e| MonitorError::Compression(format!("zstd: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const SAMPLE: &[u8] = b"[\n  [\n    \"a.txt\",\n    \"c4ca4238a0b923820dcc509a6f75849b\"\n  ]\n]";

    #[test]
    fn test_gzip_is_readable_by_gunzip() {
        let compressed = Compression::Gzip.compress(SAMPLE).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, SAMPLE);
    }

    #[test]
    fn test_zstd_decodes() {
        let compressed = Compression::Zstd.compress(SAMPLE).unwrap();
        let decoded = zstd::decode_all(&compressed[..]).unwrap();
        assert_eq!(decoded, SAMPLE);
    }

    #[test]
    fn test_none_is_passthrough() {
        assert_eq!(Compression::None.compress(SAMPLE).unwrap(), SAMPLE);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Compression::Gzip.file_name("shop.txt"), "shop.txt.gz");
        assert_eq!(Compression::Zstd.file_name("shop.txt"), "shop.txt.zst");
        assert_eq!(Compression::None.file_name("shop.txt"), "shop.txt");
    }
}
