use {
    clap::Parser,
    fwsign::{SigningKey, BLOCK_SIZE},
    std::path::PathBuf,
};

mod cli;
mod config;

pub use config::Error as ConfigError;

/// Program arguments loaded from the CLI and config file.
#[derive(Debug, Clone)]
pub enum Args {
    /// Patch the header and sign an image.
    Sign {
        input: PathBuf,
        version: u32,
        output: PathBuf,
        key: SigningKey,
    },
    /// Check the signature of an image.
    Verify { input: PathBuf, key: SigningKey },
    /// Dump the header contents to stdout.
    Dump { input: PathBuf },
    /// Pad a bootloader binary.
    Pad {
        input: PathBuf,
        size: usize,
        output: Output,
    },
}

#[derive(Debug, Clone)]
pub enum Output {
    InPlace,
    File(PathBuf),
}

pub fn args<I, T>(args: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Args::try_parse_from(args).map_err(Error::Cli)?;
    match cli.command {
        cli::Command::Sign {
            input,
            version,
            output,
            key,
        } => {
            let version =
                parse_hex(&version, u32::from_str_radix).ok_or(Error::InvalidVersion(version))?;
            Ok(Args::Sign {
                input,
                version,
                output,
                key: signing_key(key)?,
            })
        }
        cli::Command::Verify { input, key } => Ok(Args::Verify {
            input,
            key: signing_key(key)?,
        }),
        cli::Command::Dump { input } => Ok(Args::Dump { input }),
        cli::Command::Pad {
            input,
            size,
            output,
        } => {
            let size = size
                .map(|size| parse_hex(&size, usize::from_str_radix).ok_or(Error::InvalidSize(size)))
                .transpose()?
                .unwrap_or(consts::BOOTLOADER_SIZE);
            let output = match output {
                Some(path) => Output::File(path),
                None => Output::InPlace,
            };
            Ok(Args::Pad {
                input,
                size,
                output,
            })
        }
    }
}

/// Load the key and IV from the CLI and config file, falling back to the
/// bootloader defaults.
fn signing_key(args: cli::KeyArgs) -> Result<SigningKey, Error> {
    let config = args.config.map(|c| config::Config::load(&c)).transpose()?;
    let config_key = config.as_ref().and_then(|config| config.key.clone());
    let config_iv = config.as_ref().and_then(|config| config.iv.clone());

    // Reconcile the CLI and config arguments. Error if anything is specified both
    // on the CLI and in the config file.
    let key = match (args.key, config_key) {
        (None, None) => None,
        (None, Some(key)) => Some(key),
        (Some(key), None) => Some(key),
        (Some(_), Some(_)) => return Err(Error::KeyInConfigAndCli),
    };
    let iv = match (args.iv, config_iv) {
        (None, None) => None,
        (None, Some(iv)) => Some(iv),
        (Some(iv), None) => Some(iv),
        (Some(_), Some(_)) => return Err(Error::IvInConfigAndCli),
    };

    let mut signing_key = SigningKey::default();
    if let Some(key) = key {
        signing_key.key = parse_block(&key).map_err(|e| match e {
            BlockError::Hex => Error::InvalidKeyHex,
            BlockError::Length(len) => Error::InvalidKeyLength(len),
        })?;
    }
    if let Some(iv) = iv {
        signing_key.iv = parse_block(&iv).map_err(|e| match e {
            BlockError::Hex => Error::InvalidIvHex,
            BlockError::Length(len) => Error::InvalidIvLength(len),
        })?;
    }
    Ok(signing_key)
}

enum BlockError {
    Hex,
    Length(usize),
}

fn parse_block(s: &str) -> Result<[u8; BLOCK_SIZE], BlockError> {
    let bytes = hex::decode(s).map_err(|_| BlockError::Hex)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| BlockError::Length(len))
}

/// Parse a hex number with an optional `0x` prefix.
fn parse_hex<N>(
    s: &str,
    from_str_radix: fn(&str, u32) -> Result<N, std::num::ParseIntError>,
) -> Option<N> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    // from_str_radix also takes a leading sign.
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    from_str_radix(digits, 16).ok()
}

#[derive(Debug)]
pub enum Error {
    Cli(clap::Error),
    Config(ConfigError),
    InvalidIvHex,
    InvalidIvLength(usize),
    InvalidKeyHex,
    InvalidKeyLength(usize),
    InvalidSize(String),
    InvalidVersion(String),
    IvInConfigAndCli,
    KeyInConfigAndCli,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Cli(e) => write!(f, "{}", e.render().ansi()),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::InvalidIvHex => write!(f, "user specified invalid IV hex"),
            Error::InvalidIvLength(len) => {
                write!(f, "user specified IV of {len} bytes, expected {BLOCK_SIZE}")
            }
            Error::InvalidKeyHex => write!(f, "user specified invalid key hex"),
            Error::InvalidKeyLength(len) => {
                write!(f, "user specified key of {len} bytes, expected {BLOCK_SIZE}")
            }
            Error::InvalidSize(size) => {
                write!(f, r#"user specified invalid hex size: "{size}""#)
            }
            Error::InvalidVersion(version) => {
                write!(f, r#"user specified invalid hex version: "{version}""#)
            }
            Error::IvInConfigAndCli => write!(f, "IV specified in both config and cli"),
            Error::KeyInConfigAndCli => write!(f, "key specified in both config and cli"),
        }
    }
}

impl std::error::Error for Error {}
