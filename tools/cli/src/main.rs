//! SealBox CLI - Command line interface for sealed containers.
//!
//! This tool seals files into signed, encrypted containers and unseals
//! them again, using key material from a JSON key file.

mod config;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sealbox_common::{CancelSignal, CancellationToken, Deadline};
use sealbox_container::{Header, Sealer, StandardHeader, UnsealError, Unsealer, DEFAULT_SEED_LEN};

use crate::config::KeyFile;

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(about = "SealBox - Signed and encrypted file containers")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key file.
    Keygen {
        /// Key file to create (must not exist).
        #[arg(short, long)]
        out: PathBuf,

        /// Also write a copy without the signing key for recipients.
        #[arg(long)]
        public_out: Option<PathBuf>,
    },

    /// Seal a file into a container.
    Seal {
        /// Key file with a signing key.
        #[arg(short, long)]
        keys: PathBuf,

        /// Plaintext file.
        #[arg(short, long)]
        input: PathBuf,

        /// Container file to write.
        #[arg(short, long)]
        output: PathBuf,

        /// Seed length in bytes.
        #[arg(long, default_value_t = DEFAULT_SEED_LEN)]
        seed_len: u16,

        /// Abort after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Unseal and verify a container.
    Unseal {
        /// Key file with the verifying key.
        #[arg(short, long)]
        keys: PathBuf,

        /// Container file.
        #[arg(short, long)]
        input: PathBuf,

        /// Plaintext file to write, only created if verification succeeds.
        #[arg(short, long)]
        output: PathBuf,

        /// Seed length the container was sealed with.
        #[arg(long, default_value_t = DEFAULT_SEED_LEN)]
        seed_len: u16,

        /// Abort after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the header of a container.
    Inspect {
        /// Container file.
        #[arg(short, long)]
        input: PathBuf,

        /// Expected seed length (default: read from the container).
        #[arg(long)]
        seed_len: Option<u16>,
    },
}

type Signal = Box<dyn CancelSignal + Send + Sync>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Keygen { out, public_out } => cmd_keygen(&out, public_out.as_deref()),

        Commands::Seal {
            keys,
            input,
            output,
            seed_len,
            timeout,
        } => cmd_seal(&keys, &input, &output, seed_len, signal(token, timeout)).await,

        Commands::Unseal {
            keys,
            input,
            output,
            seed_len,
            timeout,
        } => cmd_unseal(&keys, &input, &output, seed_len, signal(token, timeout)).await,

        Commands::Inspect { input, seed_len } => cmd_inspect(&input, seed_len),
    }
}

/// Cancellation for one command: the interrupt token, bounded by an optional timeout.
fn signal(token: CancellationToken, timeout: Option<u64>) -> Signal {
    match timeout {
        Some(secs) => Box::new(Deadline::after(Duration::from_secs(secs)).with_token(token)),
        None => Box::new(token),
    }
}

/// Temporary file in the same directory as `dest`, so it can be renamed into place.
fn staging_file(dest: &Path) -> Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))
}

/// Generate a new key file.
fn cmd_keygen(out: &Path, public_out: Option<&Path>) -> Result<()> {
    info!("Generating key file: {}", out.display());

    let keys = KeyFile::generate().context("Failed to generate keys")?;
    keys.save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    if let Some(path) = public_out {
        keys.public()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Recipient key file: {}", path.display());
    }

    println!("Key file created successfully!");
    println!("  Location: {}", out.display());
    println!("  Verifying key: {}", keys.verifying_key);

    Ok(())
}

/// Seal a file.
async fn cmd_seal(keys: &Path, input: &Path, output: &Path, seed_len: u16, cancel: Signal) -> Result<()> {
    info!("Sealing {} into {}", input.display(), output.display());

    let options = KeyFile::load(keys)
        .context("Failed to load key file")?
        .seal_options()
        .context("Key file cannot be used for sealing")?;

    let source = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut staged = staging_file(output)?;
    let dest = output.to_path_buf();

    let (header, size) = tokio::task::spawn_blocking(move || -> Result<(StandardHeader, u64)> {
        let sealer = Sealer::new(options, move || StandardHeader::new(seed_len));
        let header = sealer
            .seal(&*cancel, BufReader::new(source), BufWriter::new(staged.as_file_mut()))
            .context("Failed to seal")?;

        staged.as_file().sync_all()?;
        let size = staged.as_file().metadata()?.len();
        staged
            .persist(&dest)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok((header, size))
    })
    .await
    .context("Seal task failed")??;

    println!("Container sealed successfully!");
    println!("  Location: {}", output.display());
    println!("  Size: {} bytes", size);
    println!("  Seed: {}", STANDARD.encode(header.seed()));

    Ok(())
}

/// Unseal and verify a container.
async fn cmd_unseal(keys: &Path, input: &Path, output: &Path, seed_len: u16, cancel: Signal) -> Result<()> {
    info!("Unsealing {} into {}", input.display(), output.display());

    let options = KeyFile::load(keys)
        .context("Failed to load key file")?
        .unseal_options()
        .context("Key file cannot be used for unsealing")?;

    let source = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut staged = staging_file(output)?;
    let dest = output.to_path_buf();

    let size = tokio::task::spawn_blocking(move || -> Result<u64> {
        let unsealer = Unsealer::new(options, move || StandardHeader::new(seed_len));
        unsealer
            .unseal(&*cancel, BufReader::new(source), BufWriter::new(staged.as_file_mut()))
            .map_err(|err: UnsealError<StandardHeader>| {
                debug!(seed = %STANDARD.encode(err.header.seed()), "Rejected container");
                err.into_error()
            })
            .context("Failed to unseal")?;

        staged.as_file().sync_all()?;
        let size = staged.as_file().metadata()?.len();
        staged
            .persist(&dest)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(size)
    })
    .await
    .context("Unseal task failed")??;

    println!("Container verified and unsealed!");
    println!("  Location: {}", output.display());
    println!("  Size: {} bytes", size);

    Ok(())
}

/// Print the header of a container.
fn cmd_inspect(input: &Path, seed_len: Option<u16>) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let total = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = match seed_len {
        Some(len) => {
            let mut header = StandardHeader::new(len);
            header.unmarshal_from(&mut reader).map(|()| header)
        }
        None => StandardHeader::read_any(&mut reader),
    }
    .context("Failed to read container header")?;

    let header_len = header.encoded_len() as u64;
    println!("Container: {}", input.display());
    println!("  Header: {} bytes", header_len);
    println!("  Seed: {} ({} bytes)", STANDARD.encode(header.seed()), header.seed().len());
    println!("  Signature: {}", STANDARD.encode(header.signature()));
    println!("  Payload: {} bytes", total.saturating_sub(header_len));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn never() -> Signal {
        Box::new(sealbox_common::Never)
    }

    fn setup(dir: &TempDir) -> (PathBuf, PathBuf) {
        let keys = dir.path().join("keys.json");
        let plain = dir.path().join("plain.txt");
        KeyFile::generate().unwrap().save(&keys).unwrap();
        std::fs::write(&plain, b"file contents to protect").unwrap();
        (keys, plain)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_seal_unseal_files() {
        let dir = TempDir::new().unwrap();
        let (keys, plain) = setup(&dir);
        let sealed = dir.path().join("plain.sbx");
        let restored = dir.path().join("restored.txt");

        cmd_seal(&keys, &plain, &sealed, DEFAULT_SEED_LEN, never()).await.unwrap();
        cmd_unseal(&keys, &sealed, &restored, DEFAULT_SEED_LEN, never()).await.unwrap();

        assert_eq!(std::fs::read(&restored).unwrap(), b"file contents to protect");
        assert!(cmd_inspect(&sealed, None).is_ok());
        assert!(cmd_inspect(&sealed, Some(DEFAULT_SEED_LEN)).is_ok());
    }

    #[tokio::test]
    async fn test_failed_unseal_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let (keys, plain) = setup(&dir);
        let sealed = dir.path().join("plain.sbx");
        let restored = dir.path().join("restored.txt");

        cmd_seal(&keys, &plain, &sealed, DEFAULT_SEED_LEN, never()).await.unwrap();
        let mut bytes = std::fs::read(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&sealed, bytes).unwrap();

        assert!(cmd_unseal(&keys, &sealed, &restored, DEFAULT_SEED_LEN, never()).await.is_err());
        assert!(!restored.exists());
    }

    #[tokio::test]
    async fn test_cancelled_seal_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let (keys, plain) = setup(&dir);
        let sealed = dir.path().join("plain.sbx");

        let token = CancellationToken::new();
        token.cancel();

        assert!(cmd_seal(&keys, &plain, &sealed, DEFAULT_SEED_LEN, signal(token, None)).await.is_err());
        assert!(!sealed.exists());
    }

    #[test]
    fn test_keygen_public_copy() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("keys.json");
        let public = dir.path().join("public.json");

        cmd_keygen(&out, Some(&public)).unwrap();

        let public_keys = KeyFile::load(&public).unwrap();
        assert!(public_keys.signing_key.is_none());
        assert!(public_keys.unseal_options().is_ok());
        assert!(cmd_keygen(&out, None).is_err());
    }
}
