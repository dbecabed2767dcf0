//! Conversion of Chrome CRX containers into the zip payload they wrap.
//!
//! A CRX file is a small little-endian header in front of an ordinary zip.
//! Version 2 headers carry a public key and a signature, version 3 headers a
//! single protobuf blob; in both cases the payload offset follows from the
//! length fields. The payload is streamed to the destination in fixed-size
//! chunks while a SHA-256 digest is computed alongside.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::digest::Sha256Digest;

/// Magic bytes every CRX container starts with.
pub const CRX_MAGIC: [u8; 4] = *b"Cr24";

const CHUNK_SIZE: usize = 65_536;

/// Errors raised while converting a CRX container.
#[derive(Debug, Error)]
pub enum CrxError {
    /// The header is malformed: wrong magic or a short read.
    ///
    /// Such uploads are sometimes plain zips with the wrong extension, so
    /// callers may retry them as zip.
    #[error("CRX container is corrupt: {reason}")]
    CorruptCrx {
        /// Which part of the header was unreadable.
        reason: &'static str,
    },

    /// The header is well formed but declares a version other than 2 or 3.
    #[error("CRX version {version} is not supported")]
    UnsupportedCrxVersion {
        /// Version field from the header.
        version: u32,
    },

    /// Reading the payload or writing the destination failed.
    #[error("CRX conversion I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Header layout recognised by [`convert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CrxHeader {
    V2 { public_key_len: u32, signature_len: u32 },
    V3 { header_len: u32 },
}

impl CrxHeader {
    /// Absolute offset of the zip payload.
    fn payload_offset(self) -> u64 {
        match self {
            Self::V2 {
                public_key_len,
                signature_len,
            } => 16 + u64::from(public_key_len) + u64::from(signature_len),
            Self::V3 { header_len } => 12 + u64::from(header_len),
        }
    }

    /// Bytes that follow the fixed fields and precede the payload.
    const fn fixed_len(self) -> u64 {
        match self {
            Self::V2 { .. } => 16,
            Self::V3 { .. } => 12,
        }
    }

    const fn version(self) -> u32 {
        match self {
            Self::V2 { .. } => 2,
            Self::V3 { .. } => 3,
        }
    }
}

/// Strip the CRX header from `source` and stream the payload to
/// `destination`, returning the payload's SHA-256 digest.
///
/// ```
/// use addon_ingest::crx::convert;
/// use addon_ingest::digest::Sha256Digest;
///
/// let mut crx = b"Cr24".to_vec();
/// crx.extend_from_slice(&3_u32.to_le_bytes());
/// crx.extend_from_slice(&2_u32.to_le_bytes());
/// crx.extend_from_slice(b"hdPK-payload");
///
/// let mut zip = Vec::new();
/// let digest = convert(&crx[..], &mut zip).unwrap();
/// assert_eq!(zip, b"PK-payload");
/// assert_eq!(digest, Sha256Digest::of(b"PK-payload"));
/// ```
///
/// # Errors
///
/// Returns [`CrxError::CorruptCrx`] for a bad magic or truncated header,
/// [`CrxError::UnsupportedCrxVersion`] for versions other than 2 and 3, and
/// [`CrxError::Io`] when streaming the payload fails.
pub fn convert<R: Read, W: Write>(
    mut source: R,
    mut destination: W,
) -> Result<Sha256Digest, CrxError> {
    let header = read_header(&mut source)?;
    skip_to_payload(&mut source, header)?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut payload_len: u64 = 0;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        let Some(chunk) = buffer.get(..read) else {
            break;
        };
        if chunk.is_empty() {
            break;
        }
        hasher.update(chunk);
        destination.write_all(chunk)?;
        payload_len = payload_len.saturating_add(chunk.len() as u64);
    }
    destination.flush()?;

    let digest = Sha256Digest::from_hasher(hasher);
    info!(
        target: "crx",
        "converted CRX v{} ({payload_len} payload bytes at offset {}), sha256 {digest}",
        header.version(),
        header.payload_offset(),
    );
    Ok(digest)
}

/// Convert the CRX file at `source` into a zip file at `destination`.
///
/// # Errors
///
/// As [`convert`]; failing to open either path is [`CrxError::Io`].
pub fn convert_file(source: &Path, destination: &Path) -> Result<Sha256Digest, CrxError> {
    let reader = BufReader::new(File::open(source)?);
    let mut writer = BufWriter::new(File::create(destination)?);
    let digest = convert(reader, &mut writer)?;
    writer.flush()?;
    Ok(digest)
}

fn read_header<R: Read>(source: &mut R) -> Result<CrxHeader, CrxError> {
    let mut magic = [0_u8; 4];
    read_field(source, &mut magic, "missing magic bytes")?;
    if magic != CRX_MAGIC {
        return Err(CrxError::CorruptCrx {
            reason: "magic bytes are not Cr24",
        });
    }

    let version = read_u32(source, "missing version field")?;
    match version {
        2 => Ok(CrxHeader::V2 {
            public_key_len: read_u32(source, "missing public key length")?,
            signature_len: read_u32(source, "missing signature length")?,
        }),
        3 => Ok(CrxHeader::V3 {
            header_len: read_u32(source, "missing header length")?,
        }),
        other => Err(CrxError::UnsupportedCrxVersion { version: other }),
    }
}

fn skip_to_payload<R: Read>(source: &mut R, header: CrxHeader) -> Result<(), CrxError> {
    let to_skip = header.payload_offset() - header.fixed_len();
    let skipped = io::copy(&mut source.by_ref().take(to_skip), &mut io::sink())?;
    if skipped != to_skip {
        return Err(CrxError::CorruptCrx {
            reason: "header is shorter than its declared length",
        });
    }
    Ok(())
}

#[expect(
    clippy::little_endian_bytes,
    reason = "CRX length fields are little-endian on the wire"
)]
fn read_u32<R: Read>(source: &mut R, reason: &'static str) -> Result<u32, CrxError> {
    let mut field = [0_u8; 4];
    read_field(source, &mut field, reason)?;
    Ok(u32::from_le_bytes(field))
}

fn read_field<R: Read>(
    source: &mut R,
    field: &mut [u8],
    reason: &'static str,
) -> Result<(), CrxError> {
    source.read_exact(field).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            CrxError::CorruptCrx { reason }
        } else {
            CrxError::Io(error)
        }
    })
}
