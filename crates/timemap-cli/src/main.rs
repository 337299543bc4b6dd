use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;
use timemap_core::{normalizer, parser, utc, Error, ParseOptions, Timemap};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Timemap: parse Memento Timemaps and canonicalize archival URIs
#[derive(Parser)]
#[command(name = "timemap", version, about, long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a Link-format Timemap and summarize it
    Parse {
        /// Path to the Timemap file
        file: PathBuf,
        /// URI the Timemap was retrieved from; relative targets resolve against it
        #[arg(long)]
        base: String,
        /// Also recognize first memento, last memento and timebundle
        #[arg(long)]
        extended: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the mementos captured at one instant
    Lookup {
        /// Path to the Timemap file
        file: PathBuf,
        /// URI the Timemap was retrieved from
        #[arg(long)]
        base: String,
        /// Capture instant, e.g. "Tue, 24 Jan 2012 15:30:45 GMT" or 20120124153045
        #[arg(long)]
        datetime: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Canonicalize a URI
    Normalize {
        /// URI to canonicalize
        uri: String,
        /// Base URI for resolving a relative reference
        #[arg(long)]
        base: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let exit_code = match cli.command {
        Commands::Parse {
            file,
            base,
            extended,
            json,
        } => {
            let options = if extended {
                ParseOptions::extended()
            } else {
                ParseOptions::default()
            };
            cmd_parse(&file, &base, &options, json)
        }
        Commands::Lookup {
            file,
            base,
            datetime,
            json,
        } => cmd_lookup(&file, &base, &datetime, json),
        Commands::Normalize { uri, base, json } => cmd_normalize(&uri, base.as_deref(), json),
        Commands::Version => {
            println!(
                "timemap {} (timemap-core {})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_VERSION")
            );
            0
        }
    };

    process::exit(exit_code);
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Commands ───────────────────────────────────────────────

fn cmd_parse(file: &Path, base: &str, options: &ParseOptions, json: bool) -> i32 {
    tracing::debug!(file = %file.display(), base, profile = ?options.profile, "parse command");
    let timemap = match parser::from_file_with(file, base, options) {
        Ok(tm) => tm,
        Err(e) => return report(file, &e),
    };

    if json {
        return print_json(&timemap);
    }

    println!("{} {}", "✓".green().bold(), file.display());
    print_summary(&timemap);
    0
}

fn cmd_lookup(file: &Path, base: &str, datetime: &str, json: bool) -> i32 {
    let Some(instant) = utc::parse_instant(datetime) else {
        eprintln!("{} unrecognized datetime '{}'", "error:".red().bold(), datetime);
        return 2;
    };

    tracing::debug!(file = %file.display(), base, %instant, "lookup command");
    let timemap = match parser::from_file(file, base) {
        Ok(tm) => tm,
        Err(e) => return report(file, &e),
    };

    let uris = match timemap.lookup(&instant) {
        Ok(uris) => uris,
        Err(e) => return report(file, &e),
    };

    if json {
        let list: Vec<&str> = uris.iter().map(|uri| uri.as_str()).collect();
        return print_json(&list);
    }

    for uri in uris {
        println!("{}", uri);
    }
    0
}

fn cmd_normalize(uri: &str, base: Option<&str>, json: bool) -> i32 {
    let canonical = normalizer::normalize(uri, base);
    tracing::debug!(
        raw = uri,
        canonical = %canonical,
        hash = canonical.content_hash(),
        "normalized uri"
    );

    if json {
        return print_json(&canonical);
    }

    println!("{}", canonical);
    0
}

// ── Output ─────────────────────────────────────────────────

fn print_summary(timemap: &Timemap) {
    let uri_or_none = |uri: Option<&normalizer::CanonicalUri>| {
        uri.map_or_else(|| "N/A".dimmed().to_string(), |u| u.to_string())
    };
    let instant = |dt: Option<DateTime<Utc>>| utc::r(dt.as_ref());

    println!("  {:<10} {}", "original:".bold(), uri_or_none(timemap.original_uri()));
    println!("  {:<10} {}", "timegate:".bold(), uri_or_none(timemap.timegate_uri()));
    println!("  {:<10} {}", "timemap:".bold(), uri_or_none(timemap.timemap_uri()));
    if let Some(uri) = timemap.timebundle_uri() {
        println!("  {:<10} {}", "bundle:".bold(), uri);
    }
    println!("  {:<10} {}", "from:".bold(), instant(timemap.from_datetime()));
    println!("  {:<10} {}", "until:".bold(), instant(timemap.until_datetime()));
    if let Some(first) = timemap.first_memento() {
        println!("  {:<10} {}", "first:".bold(), utc::r(Some(&first)));
    }
    if let Some(last) = timemap.last_memento() {
        println!("  {:<10} {}", "last:".bold(), utc::r(Some(&last)));
    }
    println!(
        "  {:<10} {} instants, {} URIs",
        "mementos:".bold(),
        timemap.len(),
        timemap.memento_count()
    );
    for (at, uris) in timemap {
        for uri in uris {
            println!("    {}  {}", utc::r(Some(at)).cyan(), uri);
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            2
        }
    }
}

/// Print `err` and map it to an exit code: 1 for bad input or a lookup
/// miss, 2 for I/O.
fn report(file: &Path, err: &Error) -> i32 {
    eprintln!("{} {}: {}", "error:".red().bold(), file.display(), err);
    let exit_code = match err {
        Error::Io(_) => 2,
        Error::NotFound(_) => 1,
        _ if err.is_lexical() => 1,
        _ => 2,
    };
    tracing::debug!(error = ?err, span = ?err.span(), exit_code, "command failed");
    exit_code
}
