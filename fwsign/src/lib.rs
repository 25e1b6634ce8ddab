#![no_std]

extern crate alloc;

use {
    alloc::vec::Vec,
    consts::{
        AES_BLOCK_SIZE, BOOTLOADER_SIZE, FWINFO_DEVICE_ID_OFFSET, FWINFO_LENGTH_OFFSET,
        FWINFO_OFFSET, FWINFO_SENTINEL, FWINFO_SENTINEL_OFFSET, FWINFO_VERSION_OFFSET,
    },
};

mod mac;
mod pad;

pub use {
    mac::{cbc_mac, Aes128, BackendError, SigningKey},
    pad::pad,
};


/// Cipher block size, which is also the size of the header and the signature.
pub const BLOCK_SIZE: usize = AES_BLOCK_SIZE;

/// Where the bootloader expects things to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    bootloader_size: usize,
    fwinfo_offset: usize,
}

impl Layout {
    /// The layout baked into the bootloader.
    pub const DEFAULT: Self = Self::new(BOOTLOADER_SIZE, FWINFO_OFFSET);

    pub const fn new(bootloader_size: usize, fwinfo_offset: usize) -> Self {
        Self {
            bootloader_size,
            fwinfo_offset,
        }
    }

    /// Size of the bootloader prefix that is carried through untouched.
    pub const fn bootloader_size(&self) -> usize {
        self.bootloader_size
    }

    /// Offset of the firmware info header, relative to the firmware region.
    pub const fn fwinfo_offset(&self) -> usize {
        self.fwinfo_offset
    }

    /// Offset of the signature, relative to the firmware region.
    pub const fn signature_offset(&self) -> usize {
        self.fwinfo_offset + BLOCK_SIZE
    }

    /// The shortest image that still holds both the header and the signature.
    pub const fn min_image_len(&self) -> usize {
        self.bootloader_size + self.signature_offset() + BLOCK_SIZE
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decoded firmware info header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub sentinel: u32,
    pub device_id: u32,
    pub version: u32,
    pub length: u32,
}

impl FirmwareInfo {
    fn from_bytes(b: &[u8; BLOCK_SIZE]) -> Self {
        let word = |offset: usize| {
            u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
        };
        Self {
            sentinel: word(FWINFO_SENTINEL_OFFSET),
            device_id: word(FWINFO_DEVICE_ID_OFFSET),
            version: word(FWINFO_VERSION_OFFSET),
            length: word(FWINFO_LENGTH_OFFSET),
        }
    }

    /// Whether the sentinel holds the value the application links in.
    pub fn has_sentinel(&self) -> bool {
        self.sentinel == FWINFO_SENTINEL
    }
}

/// Verification result.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum VerificationResult {
    // The values are arbitrary, but chosen to be different by more than one bit to make glitching
    // attacks more difficult.
    Valid = 0xcafebabe,
    Invalid = 0xdeadbeef,
}

/// A complete flash image: the padded bootloader followed by the firmware region.
///
/// The image owns its bytes for its whole lifetime. Every field access is
/// bounds checked once, in [`Image::new`].
#[derive(Debug, Clone)]
pub struct Image {
    data: Vec<u8>,
    layout: Layout,
}

impl Image {
    /// Take ownership of an image, making sure it is long enough to hold the
    /// header and the signature.
    pub fn new(data: Vec<u8>, layout: Layout) -> Result<Self, Error> {
        if data.len() < layout.min_image_len() {
            return Err(Error::MalformedImage {
                len: data.len(),
                min: layout.min_image_len(),
            });
        }
        Ok(Self { data, layout })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The bootloader prefix.
    pub fn bootloader(&self) -> &[u8] {
        &self.data[..self.layout.bootloader_size]
    }

    /// Everything after the bootloader.
    pub fn firmware(&self) -> &[u8] {
        &self.data[self.layout.bootloader_size..]
    }

    /// The firmware info header as it currently is in the image.
    pub fn info(&self) -> FirmwareInfo {
        FirmwareInfo::from_bytes(self.header())
    }

    /// The signature field as it currently is in the image.
    pub fn signature(&self) -> [u8; BLOCK_SIZE] {
        *self.block(self.layout.signature_offset())
    }

    /// Give back the image bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Write the firmware length and the given version into the header.
    pub fn patch_header(&mut self, version: u32) -> Result<(), Error> {
        let length = self.firmware_len()?;
        let header = self.layout.fwinfo_offset;
        self.write_word(header + FWINFO_LENGTH_OFFSET, length);
        self.write_word(header + FWINFO_VERSION_OFFSET, version);
        Ok(())
    }

    /// Build the buffer that is fed to the MAC.
    ///
    /// The header goes first, then everything before the header, then
    /// everything after the signature. The signature field is never part of it.
    pub fn signing_buffer(&self) -> Result<Vec<u8>, Error> {
        let firmware = self.firmware();
        let header = self.layout.fwinfo_offset;
        let after_signature = self.layout.signature_offset() + BLOCK_SIZE;

        let mut buf = Vec::with_capacity(firmware.len() - BLOCK_SIZE);
        buf.extend_from_slice(&firmware[header..header + BLOCK_SIZE]);
        buf.extend_from_slice(&firmware[..header]);
        buf.extend_from_slice(&firmware[after_signature..]);

        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::Alignment { len: buf.len() });
        }
        Ok(buf)
    }

    /// Patch the header, compute the signature and store it in the image.
    ///
    /// The image is left untouched if signing fails.
    pub fn sign(
        &mut self,
        version: u32,
        key: &SigningKey,
        aes: &impl Aes128,
    ) -> Result<[u8; BLOCK_SIZE], Error> {
        let mut patched = self.clone();
        patched.patch_header(version)?;
        let signature = cbc_mac(&patched.signing_buffer()?, key, aes)?;
        let offset = self.layout.bootloader_size + self.layout.signature_offset();
        patched.data[offset..offset + BLOCK_SIZE].copy_from_slice(&signature);
        *self = patched;
        Ok(signature)
    }

    /// Check the stored signature against the image contents, the way the
    /// bootloader does before jumping to the application.
    pub fn verify(&self, key: &SigningKey, aes: &impl Aes128) -> Result<VerificationResult, Error> {
        if self.info().length != self.firmware_len()? {
            return Ok(VerificationResult::Invalid);
        }
        let expected = cbc_mac(&self.signing_buffer()?, key, aes)?;
        let diff = expected
            .iter()
            .zip(self.signature().iter())
            .fold(0, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Ok(VerificationResult::Valid)
        } else {
            Ok(VerificationResult::Invalid)
        }
    }

    fn firmware_len(&self) -> Result<u32, Error> {
        let len = self.firmware().len();
        u32::try_from(len).map_err(|_| Error::FirmwareTooLong { len })
    }

    fn header(&self) -> &[u8; BLOCK_SIZE] {
        self.block(self.layout.fwinfo_offset)
    }

    /// A block at the given firmware-relative offset.
    fn block(&self, offset: usize) -> &[u8; BLOCK_SIZE] {
        let start = self.layout.bootloader_size + offset;
        self.data[start..start + BLOCK_SIZE]
            .try_into()
            .expect("bounds checked in Image::new")
    }

    /// Write a little-endian word at the given firmware-relative offset.
    fn write_word(&mut self, offset: usize, value: u32) {
        let start = self.layout.bootloader_size + offset;
        self.data[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Alignment { len: usize },
    Backend(BackendError),
    BlobTooLong { len: usize, size: usize },
    FirmwareTooLong { len: usize },
    MalformedImage { len: usize, min: usize },
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Alignment { len } => write!(
                f,
                "signing buffer of {len} bytes is not a multiple of the {BLOCK_SIZE} byte block size"
            ),
            Self::Backend(e) => write!(f, "signing backend failed: {e}"),
            Self::BlobTooLong { len, size } => {
                write!(f, "cannot pad {len} bytes down to {size} bytes")
            }
            Self::FirmwareTooLong { len } => {
                write!(f, "firmware of {len} bytes does not fit the length field")
            }
            Self::MalformedImage { len, min } => write!(
                f,
                "malformed image: {len} bytes is too short to hold the firmware info header and \
                 signature, need at least {min}"
            ),
        }
    }
}
