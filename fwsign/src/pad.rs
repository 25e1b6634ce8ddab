use {crate::Error, alloc::vec::Vec, consts::PAD_BYTE};

/// Pad `blob` with erased-flash bytes until it is exactly `size` bytes long.
pub fn pad(mut blob: Vec<u8>, size: usize) -> Result<Vec<u8>, Error> {
    if blob.len() > size {
        return Err(Error::BlobTooLong {
            len: blob.len(),
            size,
        });
    }
    blob.resize(size, PAD_BYTE);
    Ok(blob)
}
