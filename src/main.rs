//! CLI entry point for `emldag`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use emldag::config::{self, Config};
use emldag::{ingest, ContentHash, Converter, Encoding, FsStore};

#[derive(Parser)]
#[command(
    name = "emldag",
    version,
    about = "Convert email messages into content-addressed records and measure their deduplicated size"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR", env = "EMLDAG_STORE")]
    store: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every message file in a directory and store it
    Convert {
        /// Directory of raw messages (not searched recursively)
        dir: PathBuf,
        /// Storage encoding: whole or chunked
        #[arg(short, long)]
        encoding: Option<Encoding>,
        /// File receiving the resulting hashes
        #[arg(short, long, value_name = "FILE")]
        save_file: Option<PathBuf>,
        /// Write bare hashes only, one per line
        #[arg(long)]
        only_hash: bool,
    },
    /// Calculate the deduplicated storage size of stored records
    Size {
        /// Encoding the roots were stored with
        #[arg(short, long, default_value_t = Encoding::Whole)]
        mode: Encoding,
        /// Read root hashes from a results file
        #[arg(short, long, value_name = "FILE", conflicts_with = "hashes")]
        input_file: Option<PathBuf>,
        /// Root hashes
        #[arg(value_name = "HASH")]
        hashes: Vec<ContentHash>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a stored record and print it as JSON
    Get {
        hash: ContentHash,
        /// Encoding the record was stored with
        #[arg(short, long, default_value_t = Encoding::Whole)]
        mode: Encoding,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file instead
        #[arg(long)]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(store) = cli.store {
        config.store.root = Some(store);
    }

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Convert {
            dir,
            encoding,
            save_file,
            only_hash,
        } => cmd_convert(&config, &dir, encoding, save_file, only_hash),
        Commands::Size {
            mode,
            input_file,
            hashes,
            json,
        } => cmd_size(&config, mode, input_file.as_deref(), hashes, json),
        Commands::Get { hash, mode } => cmd_get(&config, &hash, mode),
        Commands::Config { save } => cmd_config(&config, save),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "emldag.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Open the configured filesystem store and wrap it in a converter.
fn open_converter(config: &Config) -> anyhow::Result<Converter<FsStore>> {
    let root = config::store_root(config);
    let store = FsStore::open(&root)
        .with_context(|| format!("Cannot open store at {}", root.display()))?;
    tracing::debug!(root = %root.display(), "Opened store");
    Ok(Converter::new(store).with_chunk_size(config.chunking.max_chunk_size))
}

/// Convert a directory of messages and write the resulting hashes.
fn cmd_convert(
    config: &Config,
    dir: &Path,
    encoding: Option<Encoding>,
    save_file: Option<PathBuf>,
    only_hash: bool,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let encoding = encoding.unwrap_or(config.convert.encoding);
    let only_hash = only_hash || config.convert.only_hash;
    let save_file = save_file.unwrap_or_else(|| config.convert.results_file.clone());
    let converter = open_converter(config)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let results = ingest::add_from_directory(
        &converter,
        dir,
        encoding,
        Some(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let mut out = std::io::BufWriter::new(
        std::fs::File::create(&save_file)
            .with_context(|| format!("Cannot create {}", save_file.display()))?,
    );
    for converted in &results {
        if only_hash {
            writeln!(out, "{}", converted.hash)?;
        } else {
            writeln!(out, "file: {}\thash: {}", converted.file_name, converted.hash)?;
        }
    }
    out.flush()?;

    println!();
    println!("  {:<20} {}", "Directory", dir.display());
    println!("  {:<20} {}", "Encoding", encoding);
    println!("  {:<20} {}", "Messages", results.len());
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
    println!("  {:<20} {}", "Results", save_file.display());
    println!();

    Ok(())
}

/// Calculate and print the deduplicated size of a set of roots.
fn cmd_size(
    config: &Config,
    mode: Encoding,
    input_file: Option<&Path>,
    hashes: Vec<ContentHash>,
    json: bool,
) -> anyhow::Result<()> {
    let roots = match input_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            parse_results_file(&contents)?
        }
        None => hashes,
    };

    let converter = open_converter(config)?;
    let (unique, size) = converter.calculate_size_detailed(mode, &roots)?;
    let unique = unique.len();

    if json {
        let output = serde_json::json!({
            "mode": mode,
            "roots": roots.len(),
            "unique_hashes": unique,
            "size": size,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        use humansize::{format_size, BINARY};
        println!();
        println!("  {:<20} {}", "Mode", mode);
        println!("  {:<20} {}", "Roots", roots.len());
        println!("  {:<20} {}", "Unique hashes", unique);
        println!(
            "  {:<20} {} ({} bytes)",
            "Deduplicated size",
            format_size(size, BINARY),
            size
        );
        println!();
    }

    Ok(())
}

/// Extract root hashes from a results file.
///
/// Accepts both the bare-hash form and `file: <name>\thash: <hash>` lines;
/// blank lines are skipped.
fn parse_results_file(contents: &str) -> anyhow::Result<Vec<ContentHash>> {
    let mut roots = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let hash_text = match line.rsplit_once("hash:") {
            Some((_, h)) => h,
            None => line,
        };
        let hash: ContentHash = hash_text
            .parse()
            .map_err(|e| anyhow::anyhow!("line {}: {e}", lineno + 1))?;
        roots.push(hash);
    }
    Ok(roots)
}

/// Fetch a record and print it as JSON.
fn cmd_get(config: &Config, hash: &ContentHash, mode: Encoding) -> anyhow::Result<()> {
    let converter = open_converter(config)?;
    let email = converter.load_email(hash, mode)?;
    println!("{}", serde_json::to_string_pretty(&email)?);
    Ok(())
}

/// Print or save the effective configuration.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    if save {
        let path = config::save_config(config)?;
        println!("  Saved configuration to {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emldag", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}
