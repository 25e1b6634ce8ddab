#![no_std]

/// Size in bytes of the padded bootloader at the start of flash.
/// The application image starts right after it, at `FLASH_BASE + BOOTLOADER_SIZE`.
pub const BOOTLOADER_SIZE: usize = 0x8000;

/// Offset of the firmware info header inside the application image.
/// Sits right after the vector table, aligned to 16 bytes.
pub const FWINFO_OFFSET: usize = 0x01B0;

/// AES block size in bytes. Both the firmware info header and the signature
/// span exactly one block.
pub const AES_BLOCK_SIZE: usize = 16;

/// Offset of the signature inside the application image, directly after the
/// firmware info header.
pub const SIGNATURE_OFFSET: usize = FWINFO_OFFSET + AES_BLOCK_SIZE;

/// Offset of the little-endian sentinel word inside the firmware info header.
pub const FWINFO_SENTINEL_OFFSET: usize = 0;

/// Offset of the little-endian device id word inside the firmware info header.
pub const FWINFO_DEVICE_ID_OFFSET: usize = 4;

/// Offset of the little-endian version word inside the firmware info header.
pub const FWINFO_VERSION_OFFSET: usize = 8;

/// Offset of the little-endian length word inside the firmware info header.
pub const FWINFO_LENGTH_OFFSET: usize = 12;

/// Value the application places in the sentinel word of its header.
pub const FWINFO_SENTINEL: u32 = 0xDEADC0DE;

/// Device id the application places in its header.
pub const DEVICE_ID: u32 = 0x42;

/// Largest application image that fits in the 512 KiB of flash left after the bootloader.
pub const MAX_FW_LENGTH: usize = (1024 * 512) - BOOTLOADER_SIZE;

/// Fill byte used when padding the bootloader, matching erased flash.
pub const PAD_BYTE: u8 = 0xFF;

/// Signing key the bootloader ships with.
pub const DEFAULT_SIGNING_KEY: [u8; AES_BLOCK_SIZE] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

/// Initialization vector of the CBC-MAC chain.
pub const DEFAULT_IV: [u8; AES_BLOCK_SIZE] = [0; AES_BLOCK_SIZE];
