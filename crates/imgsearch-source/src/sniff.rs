//! Content-based format detection.

use imgsearch_core::partition::RejectReason;
use imgsearch_core::types::ImageFormat;

const HEIC_BRANDS: [&[u8; 4]; 6] = [b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis"];
const HEIF_GENERIC_BRANDS: [&[u8; 4]; 2] = [b"mif1", b"msf1"];

/// Detect the encoding of `bytes` from their leading signature.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, RejectReason> {
    if is_heic(bytes) {
        return Ok(ImageFormat::Heic);
    }
    match image::guess_format(bytes) {
        Ok(codec) => ImageFormat::from_codec(codec)
            .ok_or_else(|| RejectReason::UnsupportedFormat(format!("{codec:?}"))),
        Err(_) => Err(RejectReason::NotAnImage),
    }
}

/// ISO-BMFF `ftyp` box with a HEVC-coded HEIF brand.
///
/// Generic HEIF brands (`mif1`/`msf1`) only count when a HEVC brand is also
/// listed as compatible, otherwise the file may be AVIF.
fn is_heic(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let major = &bytes[8..12];
    if HEIC_BRANDS.iter().any(|b| major == b.as_slice()) {
        return true;
    }
    if !HEIF_GENERIC_BRANDS.iter().any(|b| major == b.as_slice()) {
        return false;
    }
    let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = box_len.min(bytes.len());
    // compatible brands start after major brand + minor version
    bytes
        .get(16..end)
        .unwrap_or_default()
        .chunks_exact(4)
        .any(|brand| HEIC_BRANDS.iter().any(|b| brand == b.as_slice()))
}
