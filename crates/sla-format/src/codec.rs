use std::borrow::Cow;
use std::io::Read;

use flate2::{bufread::ZlibDecoder, bufread::ZlibEncoder, Compression};

use crate::model::Specification;
use crate::{Error, Result};

/// Magic bytes opening a compressed specification.
pub const MAGIC: &[u8; 3] = b"sla";

/// Version of the specification document understood by this crate.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the `sla` header: the magic bytes followed by the version byte.
pub const HEADER_SIZE: usize = MAGIC.len() + 1;

/// Encode a specification into the standard compressed form: the `sla` header followed by a
/// zlib stream of the JSON document.
pub fn encode(spec: &Specification) -> Result<Vec<u8>> {
    let raw = encode_raw(spec)?;
    let mut encoder = ZlibEncoder::new(raw.as_slice(), Compression::default());
    let mut compressed = Vec::with_capacity(raw.len() / 2);
    encoder
        .read_to_end(&mut compressed)
        .map_err(Error::Compress)?;

    let mut blob = Vec::with_capacity(HEADER_SIZE + compressed.len());
    blob.extend_from_slice(MAGIC);
    blob.push(FORMAT_VERSION);
    blob.append(&mut compressed);
    Ok(blob)
}

/// Encode a specification as the uncompressed JSON document without a header.
pub fn encode_raw(spec: &Specification) -> Result<Vec<u8>> {
    serde_json::to_vec(spec).map_err(Error::Malformed)
}

/// Decode, normalize and validate a specification in the standard compressed form.
pub fn decode(blob: &[u8]) -> Result<Specification> {
    if blob.len() < HEADER_SIZE || &blob[..MAGIC.len()] != MAGIC {
        return Err(Error::InvalidHeader);
    }

    let version = blob[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let mut decoder = ZlibDecoder::new(&blob[HEADER_SIZE..]);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw).map_err(Error::Decompress)?;
    if raw.is_empty() {
        return Err(Error::Invalid {
            message: Cow::Borrowed("specification payload is empty"),
        });
    }

    decode_raw(&raw)
}

/// Decode, normalize and validate an uncompressed JSON specification document.
pub fn decode_raw(raw: &[u8]) -> Result<Specification> {
    let mut spec: Specification = serde_json::from_slice(raw).map_err(Error::Malformed)?;
    spec.normalize();
    spec.validate()?;
    Ok(spec)
}
