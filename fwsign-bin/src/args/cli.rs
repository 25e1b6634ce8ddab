//! Command line arguments.

use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(version, about = "Sign firmware images for the bootloader")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Patch the firmware info header and sign a firmware image.
    Sign {
        /// The image, starting with the padded bootloader.
        input: PathBuf,
        /// Firmware version in hex, e.g. "1f" or "0x0001001f".
        version: String,
        /// Path to write the signed image.
        #[clap(short, long, default_value = "signed.bin")]
        output: PathBuf,
        #[clap(flatten)]
        key: KeyArgs,
    },
    /// Check the signature of a signed image.
    Verify {
        /// The signed image.
        input: PathBuf,
        #[clap(flatten)]
        key: KeyArgs,
    },
    /// Dump the firmware info header and signature to stdout.
    Dump {
        /// The image, starting with the padded bootloader.
        input: PathBuf,
    },
    /// Pad a bootloader binary with 0xff up to the reserved size.
    Pad {
        /// The bootloader binary.
        input: PathBuf,
        /// Size to pad to, in hex. Defaults to the bootloader size.
        #[clap(long)]
        size: Option<String>,
        /// Path to write the padded binary. The input is padded in place if omitted.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// AES-128 signing key in hex.
    #[clap(long)]
    pub key: Option<String>,
    /// CBC initialization vector in hex.
    #[clap(long)]
    pub iv: Option<String>,
    /// Path to config file.
    #[clap(long, short)]
    pub config: Option<PathBuf>,
}
