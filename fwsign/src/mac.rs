//! CBC-MAC over AES-128.

use {
    crate::{Error, BLOCK_SIZE},
    consts::{DEFAULT_IV, DEFAULT_SIGNING_KEY},
};

/// AES-128 block encryption.
pub trait Aes128 {
    /// Encrypt a single block in place under the given key.
    fn encrypt_block(
        &self,
        key: &[u8; BLOCK_SIZE],
        block: &mut [u8; BLOCK_SIZE],
    ) -> Result<(), BackendError>;
}

/// The cipher backend could not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendError(pub &'static str);

impl core::fmt::Display for BackendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

/// Key and initialization vector of the MAC.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub key: [u8; BLOCK_SIZE],
    pub iv: [u8; BLOCK_SIZE],
}

impl Default for SigningKey {
    /// The key the bootloader ships with, and an all-zero IV.
    fn default() -> Self {
        Self {
            key: DEFAULT_SIGNING_KEY,
            iv: DEFAULT_IV,
        }
    }
}

// Keep key material out of debug logs.
impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

/// Run `data` through AES-128-CBC and return the last ciphertext block.
///
/// No padding is applied: `data` must be a non-empty multiple of the block size.
pub fn cbc_mac(
    data: &[u8],
    key: &SigningKey,
    aes: &impl Aes128,
) -> Result<[u8; BLOCK_SIZE], Error> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(Error::Alignment { len: data.len() });
    }

    let mut chain = key.iv;
    for block in data.chunks_exact(BLOCK_SIZE) {
        chain.iter_mut().zip(block).for_each(|(c, p)| *c ^= p);
        aes.encrypt_block(&key.key, &mut chain)?;
    }
    Ok(chain)
}
