//! crlgate: Check certificate chains against a revocation list and trust stores.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crlgate_lib::{parse_pem_chain, GuardConfig, RevocationList, TrustDecisionEngine};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "crlgate",
    about = "Check certificate chains against a hot-reloaded CRL and trust stores",
    long_about = "crlgate runs certificate chains through the same trust engine a TLS\n\
                  server would use: the leaf is first checked against a local CRL\n\
                  (including serial-number matches under a different issuer), then\n\
                  each configured trust store is tried in order.",
    after_help = "EXAMPLES:\n\
                  \n  crlgate crl ca.crl\
                  \n  crlgate crl --json ca.crl\
                  \n  crlgate check --crl ca.crl --CAfile clients.pem client.pem\
                  \n  crlgate check --config crlgate.toml chains/\
                  \n  crlgate check --server --crl ca.crl server-chain.pem\
                  \n  cat client.pem | crlgate check --crl ca.crl --CAfile ca.pem"
)]
struct Cli {
    /// Log reloads and delegate decisions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the revoked entries of a CRL file (PEM or DER)
    Crl {
        /// CRL file. Reads from stdin if omitted.
        file: Option<PathBuf>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Run chains through the trust engine (exit 0 = all accepted, 2 = any rejected)
    #[command(
        after_help = "FILE is a PEM bundle with the leaf certificate first, followed by\n\
                      intermediates. A directory is checked file by file in parallel,\n\
                      sharing one engine.\n\
                      \nCONFIG FILE:\n\
                      \n  crl_path = \"/etc/crlgate/ca.crl\"\
                      \n  system_roots = true\
                      \n  trust_stores = [\"/etc/crlgate/clients.pem\"]\
                      \n\nCommand-line flags are added on top of the config file."
    )]
    Check {
        /// PEM chain file or directory. Reads from stdin if omitted.
        file: Option<PathBuf>,
        /// TOML configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// CRL file to consult (overrides crl_path from --config)
        #[arg(long = "crl", value_name = "FILE")]
        crl_file: Option<PathBuf>,
        /// PEM file of trusted CA certificates; repeat for several delegates
        #[arg(long = "CAfile", visible_alias = "ca-file", value_name = "FILE")]
        ca_files: Vec<PathBuf>,
        /// Do not consult the system trust store
        #[arg(long)]
        no_system_roots: bool,
        /// Check as a server chain (no revocation check)
        #[arg(long)]
        server: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Only print failures (directory mode)
        #[arg(long)]
        failures_only: bool,
        /// Recurse into subdirectories (directory mode)
        #[arg(short, long)]
        recurse: bool,
    },
}

/// Largest chain or CRL input accepted, from a file or stdin.
const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Extensions picked up when checking a directory of chains.
const CHAIN_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a whole chain or CRL from `file`, or from stdin when absent.
fn read_input(file: Option<&PathBuf>) -> Result<Vec<u8>> {
    let (source, label): (Box<dyn Read>, String) = match file {
        Some(path) => (
            Box::new(
                std::fs::File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?,
            ),
            path.display().to_string(),
        ),
        None => (Box::new(std::io::stdin()), "<stdin>".to_string()),
    };
    let mut buf = Vec::new();
    source
        .take(MAX_INPUT_BYTES + 1)
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {}", label))?;
    if buf.len() as u64 > MAX_INPUT_BYTES {
        anyhow::bail!("{} is larger than {} bytes", label, MAX_INPUT_BYTES);
    }
    Ok(buf)
}

fn is_cert_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CHAIN_EXTENSIONS.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

/// Chain files under `dir`, sorted by path. Subdirectories are only
/// searched when `recurse` is set.
fn find_cert_files(dir: &Path, recurse: bool) -> Vec<PathBuf> {
    let depth = if recurse { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(depth)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file() && is_cert_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Outcome of running one chain through the engine.
#[derive(Serialize)]
struct CheckResult {
    path: String,
    accepted: bool,
    serial: Option<String>,
    subject: Option<String>,
    detail: String,
}

fn check_chain(
    engine: &TrustDecisionEngine,
    label: String,
    data: &[u8],
    server: bool,
) -> CheckResult {
    let chain = match parse_pem_chain(data) {
        Ok(chain) => chain,
        Err(e) => {
            return CheckResult {
                path: label,
                accepted: false,
                serial: None,
                subject: None,
                detail: format!("FAIL (parse error: {})", e),
            }
        }
    };
    let result = if server {
        engine.check_server_trusted(&chain, "UNKNOWN")
    } else {
        engine.check_client_trusted(&chain, "UNKNOWN")
    };
    let leaf = chain.first();
    CheckResult {
        path: label,
        accepted: result.is_ok(),
        serial: leaf.map(|c| c.serial_hex()),
        subject: leaf.map(|c| c.subject().to_string()),
        detail: match result {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("FAIL ({})", e),
        },
    }
}

/// Process chain files in parallel against one shared engine.
///
/// Returns the results in file order.
fn run_batch(files: &[PathBuf], engine: &TrustDecisionEngine, server: bool) -> Vec<CheckResult> {
    files
        .par_iter()
        .map(|f| {
            let label = f.display().to_string();
            match std::fs::read(f) {
                Ok(data) => check_chain(engine, label, &data, server),
                Err(e) => CheckResult {
                    path: label,
                    accepted: false,
                    serial: None,
                    subject: None,
                    detail: format!("FAIL (read error: {})", e),
                },
            }
        })
        .collect()
}

fn print_results(results: &[CheckResult], json: bool, failures_only: bool) -> Result<()> {
    if json {
        let shown: Vec<&CheckResult> = results
            .iter()
            .filter(|r| !(failures_only && r.accepted))
            .collect();
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }
    for r in results {
        if r.accepted {
            if !failures_only {
                println!("{}: {}", r.path, r.detail);
            }
        } else {
            eprintln!("{}: {}", r.path, r.detail);
        }
    }
    Ok(())
}

/// Combine the config file (if any) with command-line flags. `--crl`
/// replaces `crl_path`; `--CAfile` stores come after the configured ones.
fn load_config(
    config: Option<&PathBuf>,
    crl_file: Option<&PathBuf>,
    ca_files: &[PathBuf],
    no_system_roots: bool,
) -> Result<GuardConfig> {
    let mut guard = match config {
        Some(path) => GuardConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => {
            let crl = crl_file.context("--crl is required without --config")?;
            GuardConfig::new(crl)
        }
    };
    if let Some(crl) = crl_file {
        guard.crl_path = crl.clone();
    }
    if no_system_roots {
        guard.system_roots = false;
    }
    guard.trust_stores.extend(ca_files.iter().cloned());
    Ok(guard)
}

fn build_engine(guard: &GuardConfig) -> Result<TrustDecisionEngine> {
    if !guard.crl_path.exists() {
        tracing::warn!(
            path = %guard.crl_path.display(),
            "CRL file does not exist, no certificate will be treated as revoked"
        );
    }
    Ok(guard.build_engine()?)
}

fn format_time(ts: i64) -> String {
    match u64::try_from(ts) {
        Ok(secs) => {
            humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(secs)).to_string()
        }
        Err(_) => ts.to_string(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Crl { file, json } => {
            let input = read_input(file.as_ref())?;
            let list = RevocationList::from_bytes(&input)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&list.entries())?);
            } else {
                for issuer in list.issuers() {
                    println!("Issuer: {}", issuer);
                }
                println!("Revoked: {}", list.len());
                for entry in list.entries() {
                    println!(
                        "  {}  {}  {}  ({})",
                        entry.serial,
                        format_time(entry.revoked_at),
                        entry.reason.unwrap_or("-"),
                        entry.issuer
                    );
                }
            }
        }
        Commands::Check {
            file,
            config,
            crl_file,
            ca_files,
            no_system_roots,
            server,
            json,
            failures_only,
            recurse,
        } => {
            let guard = load_config(
                config.as_ref(),
                crl_file.as_ref(),
                ca_files,
                *no_system_roots,
            )?;
            let engine = build_engine(&guard)?;

            let results = match file {
                Some(path) if path.is_dir() => {
                    let files = find_cert_files(path, *recurse);
                    if files.is_empty() {
                        anyhow::bail!(
                            "No certificate files (.pem, .crt, .cer) found in {}",
                            path.display()
                        );
                    }
                    run_batch(&files, &engine, *server)
                }
                _ => {
                    let input = read_input(file.as_ref())?;
                    let label = file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<stdin>".to_string());
                    vec![check_chain(&engine, label, &input, *server)]
                }
            };

            print_results(&results, *json, *failures_only)?;
            if results.iter().any(|r| !r.accepted) {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
