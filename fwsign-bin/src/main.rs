use {
    aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    colored::Colorize,
    consts::MAX_FW_LENGTH,
    fwsign::{BackendError, Image, Layout, VerificationResult, BLOCK_SIZE},
    std::{
        ffi::OsString,
        io::{Read, Write},
        path::Path,
    },
    tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

mod args;


fn main() -> std::process::ExitCode {
    // Logs go to stderr so they never mix with the signing report.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    main_args(
        std::env::args_os(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .into()
}

fn main_args<I, T>(args: I, mut stdout: impl Write, mut stderr: impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match run(args, &mut stdout) {
        Ok(()) => ExitCode(0),
        // --help and --version.
        Err(Error::Args(args::Error::Cli(e))) if !e.use_stderr() => {
            write!(stdout, "{}", e.render()).expect("write help to stdout");
            ExitCode(0)
        }
        Err(Error::Args(e @ args::Error::Cli(_))) => {
            // Clap already does the "error: {}" formatting.
            writeln!(stderr, "{e}").expect("write error to stderr");
            ExitCode(1)
        }
        Err(e) => {
            writeln!(stderr, "{} {e}", "error:".bold().red()).expect("write error to stderr");
            ExitCode(1)
        }
    }
}

fn run<I, T>(args: I, mut stdout: impl Write) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match args::args(args)? {
        args::Args::Sign {
            input,
            version,
            output,
            key,
        } => {
            let mut image = read_image(&input)?;
            let layout = image.layout();
            tracing::info!(
                input = %input.display(),
                firmware_len = image.firmware().len(),
                "read image"
            );
            tracing::debug!(
                fwinfo = layout.bootloader_size() + layout.fwinfo_offset(),
                signature = layout.bootloader_size() + layout.signature_offset(),
                "header offsets"
            );
            if image.firmware().len() > MAX_FW_LENGTH {
                tracing::warn!(
                    firmware_len = image.firmware().len(),
                    max = MAX_FW_LENGTH,
                    "firmware does not fit in device flash"
                );
            }

            let signature = image.sign(version, &key, &Aes)?;
            tracing::info!("signed firmware version {version:08x}");

            write_output(&output, &image.into_bytes())?;
            tracing::info!(output = %output.display(), "wrote signed image");

            writeln!(&mut stdout, "Signed firmware version {version:x}").map_err(Error::Stdout)?;
            writeln!(&mut stdout, "key       = {}", hex::encode(key.key)).map_err(Error::Stdout)?;
            writeln!(&mut stdout, "signature = {}", hex::encode(signature))
                .map_err(Error::Stdout)?;
        }
        args::Args::Verify { input, key } => {
            let image = read_image(&input)?;
            match image.verify(&key, &Aes)? {
                VerificationResult::Valid => {
                    writeln!(&mut stdout, "{}", "signature valid".bold().green())
                        .map_err(Error::Stdout)?;
                }
                VerificationResult::Invalid => return Err(Error::InvalidSignature),
            }
        }
        args::Args::Dump { input } => {
            let image = read_image(&input)?;
            let info = image.info();
            let sentinel_note = if info.has_sentinel() {
                ""
            } else {
                " (unexpected)"
            };
            writeln!(
                &mut stdout,
                "{:10} {:08x}{sentinel_note}",
                "sentinel".bold(),
                info.sentinel
            )
            .map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{:10} {:x}", "device id".bold(), info.device_id)
                .map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{:10} {:08x}", "version".bold(), info.version)
                .map_err(Error::Stdout)?;
            let human_size = humansize::format_size(info.length, humansize::BINARY);
            writeln!(
                &mut stdout,
                "{:10} {human_size} ({})",
                "length".bold(),
                info.length,
            )
            .map_err(Error::Stdout)?;
            writeln!(
                &mut stdout,
                "{:10} {}",
                "signature".bold(),
                hex::encode(image.signature()),
            )
            .map_err(Error::Stdout)?;
        }
        args::Args::Pad {
            input,
            size,
            output,
        } => {
            let blob = read_file(&input)?;
            let len = blob.len();
            let padded = fwsign::pad(blob, size)?;
            let output = match output {
                args::Output::InPlace => input,
                args::Output::File(path) => path,
            };
            write_output(&output, &padded)?;
            tracing::info!(
                output = %output.display(),
                padding = size - len,
                "padded bootloader"
            );
        }
    }
    Ok(())
}

/// AES-128 from RustCrypto.
#[derive(Debug, Default)]
struct Aes;

impl fwsign::Aes128 for Aes {
    fn encrypt_block(
        &self,
        key: &[u8; BLOCK_SIZE],
        block: &mut [u8; BLOCK_SIZE],
    ) -> Result<(), BackendError> {
        aes::Aes128::new(GenericArray::from_slice(key))
            .encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    std::fs::File::open(path)
        .map_err(Error::OpenInputFile)?
        .read_to_end(&mut buf)
        .map_err(Error::ReadInputFile)?;
    Ok(buf)
}

fn read_image(path: &Path) -> Result<Image, Error> {
    Ok(Image::new(read_file(path)?, Layout::DEFAULT)?)
}

/// Write `data` to a temporary file next to `path`, then move it over `path`.
///
/// If anything fails, the temporary file is removed and `path` is left as it was.
fn write_output(path: &Path, data: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(Error::CreateTempFile)?;
    file.write_all(data).map_err(Error::WriteOutputFile)?;
    file.as_file().sync_all().map_err(Error::WriteOutputFile)?;
    file.persist(path).map_err(|e| Error::PersistOutputFile(e.error))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitCode(u8);

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        code.0.into()
    }
}

#[derive(Debug)]
enum Error {
    Args(args::Error),
    CreateTempFile(std::io::Error),
    Fwsign(fwsign::Error),
    InvalidSignature,
    OpenInputFile(std::io::Error),
    PersistOutputFile(std::io::Error),
    ReadInputFile(std::io::Error),
    Stdout(std::io::Error),
    WriteOutputFile(std::io::Error),
}

impl From<args::Error> for Error {
    fn from(e: args::Error) -> Self {
        Error::Args(e)
    }
}

impl From<fwsign::Error> for Error {
    fn from(e: fwsign::Error) -> Self {
        Error::Fwsign(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Args(e) => write!(f, "{e}"),
            Error::CreateTempFile(e) => write!(f, "failed to create temporary file: {e}"),
            Error::Fwsign(e) => write!(f, "{e}"),
            Error::InvalidSignature => write!(f, "signature does not match the image"),
            Error::OpenInputFile(e) => write!(f, "failed to open input file: {e}"),
            Error::PersistOutputFile(e) => {
                write!(f, "failed to move temporary file to output: {e}")
            }
            Error::ReadInputFile(e) => write!(f, "failed to read input file: {e}"),
            Error::Stdout(e) => write!(f, "failed to write to stdout: {e}"),
            Error::WriteOutputFile(e) => write!(f, "failed to write to output file: {e}"),
        }
    }
}

impl std::error::Error for Error {}
