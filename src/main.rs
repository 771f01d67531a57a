use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use loginflow::{
    Diagnostic, Dialect, FlowSession, InputFile, SessionConfiguration, SessionReport,
};
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_BYTES: u64 = 16 * 1024 * 1024;

/// Extracts login flows from HAR traces and OpenBullet / SilverBullet configurations
#[derive(Parser)]
#[command(name = "loginflow")]
#[command(version)]
#[command(about = "Login-flow extraction, normalization and configuration synthesis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug events unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the inputs into one login flow and print it with its diagnostics as JSON
    Normalize {
        #[command(flatten)]
        inputs: InputArgs,

        /// Dialect of the configuration inputs, overriding their file extension
        #[arg(long)]
        dialect: Option<Dialect>,
    },
    /// Merge the inputs and write the flow as a configuration document
    Synthesize {
        #[command(flatten)]
        inputs: InputArgs,

        /// Dialect of the written document
        #[arg(long, default_value = "openbullet")]
        dialect: Dialect,

        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a configuration document and print the diagnostics as JSON
    Validate {
        file: PathBuf,

        /// Dialect of the document, detected from its sections when omitted
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Reject inputs larger than this many bytes
        #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
        max_bytes: u64,
    },
}

#[derive(Args)]
struct InputArgs {
    /// .har, .loli or .sb files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Login keyword, replaces the default list (repeatable)
    #[arg(long = "keyword")]
    keywords: Vec<String>,

    /// Header removed from captured requests and responses (repeatable)
    #[arg(long = "redact-header")]
    redact_headers: Vec<String>,

    /// Keep trace entries that do not look login related
    #[arg(long)]
    keep_irrelevant: bool,

    /// Reject inputs larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
    max_bytes: u64,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let diagnostics = match cli.command {
        Commands::Normalize { inputs, dialect } => {
            let report = run_session(&inputs, dialect)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report.diagnostics
        }
        Commands::Synthesize {
            inputs,
            dialect,
            output,
        } => {
            let report = run_session(&inputs, None)?;
            let synthesized = loginflow::synthesize(&report.flow, dialect);
            let text = synthesized.to_text();

            match output {
                Some(path) => {
                    fs::write(&path, &text)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    info!(path = %path.display(), %dialect, "wrote configuration document");
                }
                None => print!("{}", text),
            }

            let mut diagnostics = report.diagnostics;
            diagnostics.extend(synthesized.diagnostics);
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic);
            }
            diagnostics
        }
        Commands::Validate {
            file,
            dialect,
            max_bytes,
        } => {
            let contents = read_capped(&file, max_bytes)?;
            let text = String::from_utf8(contents)
                .with_context(|| format!("{} is not UTF-8 text", file.display()))?;
            let hint = dialect.or_else(|| {
                file.extension()
                    .and_then(|e| Dialect::from_extension(&e.to_string_lossy()))
            });

            let diagnostics = loginflow::validate_text(&text, hint)
                .with_context(|| format!("cannot parse {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            diagnostics
        }
    };

    Ok(exit_code(&diagnostics))
}

fn run_session(inputs: &InputArgs, dialect: Option<Dialect>) -> Result<SessionReport> {
    let mut configuration = SessionConfiguration::new();

    if !inputs.keywords.is_empty() {
        configuration
            .ingest_mut()
            .set_login_keywords(inputs.keywords.iter().cloned());
    }
    configuration
        .ingest_mut()
        .set_keep_irrelevant(inputs.keep_irrelevant);
    if !inputs.redact_headers.is_empty() {
        let redacted = inputs.redact_headers.clone();
        configuration.add_request_redactions(|r| r.remove_headers(redacted.iter().cloned()));
        configuration.add_response_redactions(|r| r.remove_headers(redacted.iter().cloned()));
    }
    if let Some(dialect) = dialect {
        configuration.set_dialect_hint(dialect);
    }

    let files = inputs
        .files
        .iter()
        .map(|path| {
            let contents = read_capped(path, inputs.max_bytes)?;
            Ok(InputFile::new(path.to_string_lossy(), contents))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(files = files.len(), "read inputs");

    Ok(FlowSession::run(&configuration, files)?)
}

fn read_capped(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut contents = Vec::new();
    file.take(max_bytes.saturating_add(1))
        .read_to_end(&mut contents)
        .with_context(|| format!("cannot read {}", path.display()))?;

    if contents.len() as u64 > max_bytes {
        bail!("{} exceeds the {} byte input limit", path.display(), max_bytes);
    }

    Ok(contents)
}

fn exit_code(diagnostics: &[Diagnostic]) -> ExitCode {
    ExitCode::from(exit_status(diagnostics))
}

/// 1 when any diagnostic is an error, warnings and infos alone still succeed.
fn exit_status(diagnostics: &[Diagnostic]) -> u8 {
    if loginflow::has_errors(diagnostics) {
        1
    } else {
        0
    }
}
