//! SusDB CLI: `susdb` command.
//!
//! Each subcommand is a single identity-store operation. Results go to
//! stdout; errors go to stderr and the process exits with a code that
//! identifies the error kind.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use susdb::{BackendKind, ErrorKind, IdentityStore, StoreConfig, StoreError};

// ── Exit codes ────────────────────────────────────────────────────────────────

/// Exit code for an error kind. Clap owns 2 (usage errors); 1 is anything
/// that did not come from the store.
fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::ValidationError => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::MismatchError => 5,
        ErrorKind::MalformedRequest => 6,
        ErrorKind::StorageError => 7,
        ErrorKind::FieldNotFound => 8,
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// SusDB CLI: store hashed user strings, verify them, and manage the
/// secured tokens that authorize recovery and account closure.
#[derive(Parser, Debug)]
#[command(
    name = "susdb",
    about = "SusDB CLI",
    version,
    long_about = "susdb: SusDB Command Line Interface\n\nStore strings and client credentials as Argon2id hashes, one record per\nidentity, on the local filesystem or a mounted object bucket."
)]
struct Cli {
    /// Storage root (overrides SUSDB_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Append logs to this file (overrides SUSDB_LOG_PATH)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Record backend: local or object
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Object location for the object backend, e.g. s3://bucket/prefix
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a user string under a new identity
    Store {
        /// User string to store
        #[arg(long)]
        string: String,
    },

    /// Verify a user string against an identity
    Verify {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,

        /// User string
        #[arg(long)]
        string: String,
    },

    /// View every field of an identity record
    View {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,
    },

    /// Retrieve one field from an identity record
    Retrieve {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,

        /// Field name (id, hash_string, secured_token, created_on)
        #[arg(long)]
        key: String,
    },

    /// Replace the user string of an identity and rotate its secured token
    Recover {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,

        /// New user string
        #[arg(long)]
        string: String,
    },

    /// Check a secured user string without changing the record
    Check {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,

        /// Secured user string (the token issued by store/recover)
        #[arg(long)]
        sus: String,
    },

    /// Permanently delete an identity record
    Close {
        /// Unique id to locate the record
        #[arg(long)]
        uid: String,

        /// Secured user string (the token issued by store/recover)
        #[arg(long)]
        sus: String,
    },
}

// ── Setup helpers ─────────────────────────────────────────────────────────────

/// Rotate the log file once it reaches this size.
const LOG_MAX_BYTES: u64 = 10 * 1024;
/// Rotated files kept as `{log}.1` (newest) through `{log}.5`.
const LOG_BACKUPS: usize = 5;

fn build_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = StoreConfig::from_env().context("failed to read configuration")?;
    if let Some(root) = &cli.root {
        config.storage_root = root.clone();
    }
    if let Some(path) = &cli.log_file {
        config.log_path = Some(path.clone());
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.parse::<BackendKind>()?;
    }
    if let Some(bucket) = &cli.bucket {
        config.bucket = Some(bucket.clone());
    }
    Ok(config)
}

/// Install the process logger. Logs go to `log_path` when given (info and
/// above), stderr otherwise (warnings only unless verbose). `RUST_LOG`
/// overrides the level either way.
fn init_logging(log_path: Option<&Path>, verbose: bool) -> Result<()> {
    let default_level = match (log_path, verbose) {
        (_, true) => "debug",
        (Some(_), false) => "info",
        (None, false) => "warn",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = log_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        rotate_log(path, LOG_MAX_BYTES, LOG_BACKUPS)
            .with_context(|| format!("failed to rotate log file {}", path.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }

    builder.try_init().context("failed to install logger")?;
    Ok(())
}

/// Shift `{path}` to `{path}.1`, `{path}.1` to `{path}.2` and so on when
/// `path` has grown to `max_bytes`. The oldest backup is dropped.
fn rotate_log(path: &Path, max_bytes: u64, backups: usize) -> std::io::Result<()> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_bytes || backups == 0 {
        return Ok(());
    }

    let backup = |n: usize| {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    };
    for n in (1..backups).rev() {
        let from = backup(n);
        if from.exists() {
            std::fs::rename(&from, backup(n + 1))?;
        }
    }
    std::fs::rename(path, backup(1))
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        let code = e
            .downcast_ref::<StoreError>()
            .map(|err| exit_code(err.kind()))
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    init_logging(config.log_path.as_deref(), cli.verbose)?;
    let store = IdentityStore::open(&config)?;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Store { string } => cmd_store(&store, &string, verbose),
        Commands::Verify { uid, string } => cmd_verify(&store, &uid, &string),
        Commands::View { uid } => cmd_view(&store, &uid),
        Commands::Retrieve { uid, key } => cmd_retrieve(&store, &uid, &key),
        Commands::Recover { uid, string } => cmd_recover(&store, &uid, &string),
        Commands::Check { uid, sus } => cmd_check(&store, &uid, &sus),
        Commands::Close { uid, sus } => cmd_close(&store, &uid, &sus),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `susdb store --string STRING`
fn cmd_store(store: &IdentityStore, string: &str, verbose: bool) -> Result<()> {
    let issued = store.store_new(string)?;

    println!("Stored user string");
    println!("  UID:   {}", issued.id);
    println!("  SUS:   {}", issued.secured_token);
    if verbose {
        println!("  File:  {}", store.backend().location(&issued.id));
    }
    Ok(())
}

/// `susdb verify --uid UID --string STRING`
fn cmd_verify(store: &IdentityStore, uid: &str, string: &str) -> Result<()> {
    store.verify(uid, string)?;
    println!("Success");
    Ok(())
}

/// `susdb view --uid UID`
fn cmd_view(store: &IdentityStore, uid: &str) -> Result<()> {
    let view = store.display(uid)?;
    let json = serde_json::to_string_pretty(&view).context("failed to render record")?;
    println!("{json}");
    Ok(())
}

/// `susdb retrieve --uid UID --key KEY`
fn cmd_retrieve(store: &IdentityStore, uid: &str, key: &str) -> Result<()> {
    let value = store.fetch(uid, key)?;
    println!("{value}");
    Ok(())
}

/// `susdb recover --uid UID --string STRING`
fn cmd_recover(store: &IdentityStore, uid: &str, string: &str) -> Result<()> {
    let issued = store.recover(uid, string)?;
    println!("Recovered identity");
    println!("  UID:   {}", issued.id);
    println!("  SUS:   {}", issued.secured_token);
    Ok(())
}

/// `susdb check --uid UID --sus TOKEN`
fn cmd_check(store: &IdentityStore, uid: &str, sus: &str) -> Result<()> {
    store.check_token(uid, sus)?;
    println!("Success");
    Ok(())
}

/// `susdb close --uid UID --sus TOKEN`
fn cmd_close(store: &IdentityStore, uid: &str, sus: &str) -> Result<()> {
    store.close(uid, sus)?;
    println!("Success");
    Ok(())
}
