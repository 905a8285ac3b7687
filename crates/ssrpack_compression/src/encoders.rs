use std::io::Write;

use flate2::write::GzEncoder;
use ssrpack_core::types::Encoding;

const ZSTD_LEVEL: i32 = 19;
const BROTLI_QUALITY: i32 = 11;

/// Compress `source` with `encoding` at the highest practical level.
///
/// Assets are compressed once at build time and served many times, so ratio
/// wins over speed here.
pub fn encode(encoding: Encoding, source: &[u8]) -> std::io::Result<Vec<u8>> {
  match encoding {
    Encoding::Gzip => {
      let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::best());
      encoder.write_all(source)?;
      encoder.finish()
    }
    Encoding::Zstd => zstd::encode_all(source, ZSTD_LEVEL),
    Encoding::Brotli => {
      let params = brotli::enc::BrotliEncoderParams {
        quality: BROTLI_QUALITY,
        ..Default::default()
      };
      let mut output = Vec::new();
      brotli::BrotliCompress(&mut &source[..], &mut output, &params)?;
      Ok(output)
    }
  }
}
