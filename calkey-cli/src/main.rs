//! CLI for calkey aggregation-period keys.
//!
//! Provides commands for generating, decoding, and navigating keys, either
//! standalone or against a hierarchy configuration file.

use std::path::PathBuf;

use calkey::{AggregationPeriod, HierarchyConfig, KeyScheme, PeriodHierarchy};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// calkey - Sortable keys for calendar aggregation buckets.
#[derive(Parser)]
#[command(name = "calkey", version, about)]
struct Cli {
    /// Hierarchy configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Compress key suffixes (also enabled by the configuration file).
    #[arg(long, global = true)]
    compress: bool,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Generate the key of the bucket containing a date/time.
    Generate {
        /// Period code name (e.g. "1H", "3M", "15N(Europe/Paris)").
        period: String,

        /// "YYYY-MM-DDTHH:MM[:SS]" on the period's wall clock, or an RFC 3339
        /// timestamp with offset.
        datetime: String,
    },

    /// Print the key of the following bucket.
    Next {
        /// Key to navigate from.
        key: String,
    },

    /// Print the key of the preceding bucket.
    Previous {
        /// Key to navigate from.
        key: String,
    },

    /// Print the wall-clock start of a bucket.
    Start {
        /// Key to decode.
        key: String,
    },

    /// Print the zoned end (exclusive) of a bucket.
    End {
        /// Key to decode.
        key: String,
    },

    /// Print the keys of the coarser buckets containing a bucket.
    Upper {
        /// Key to roll up.
        key: String,
    },

    /// Print the key of the first finer bucket inside a bucket.
    Lower {
        /// Key to drill down.
        key: String,
    },

    /// Decode a key into its parts.
    Inspect {
        /// Key to decode.
        key: String,
    },

    /// List the keys of every bucket intersecting [from, to).
    Range {
        /// Period code name.
        period: String,

        /// Inclusive start, in the same formats as `generate`.
        from: String,

        /// Exclusive end, in the same formats as `generate`.
        to: String,
    },
}

/// Output format for command results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One value per line.
    Text,
    /// A JSON document.
    Json,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = build_scheme(&cli).and_then(|scheme| {
        let format = &cli.format;
        match &cli.command {
            Commands::Generate { period, datetime } => {
                cmd_generate(&scheme, period, datetime, format)
            }
            Commands::Next { key } => print_key(&scheme.next_key(key)?, format),
            Commands::Previous { key } => print_key(&scheme.previous_key(key)?, format),
            Commands::Start { key } => cmd_start(&scheme, key, format),
            Commands::End { key } => cmd_end(&scheme, key, format),
            Commands::Upper { key } => cmd_upper(&scheme, key, format),
            Commands::Lower { key } => cmd_lower(&scheme, key, format),
            Commands::Inspect { key } => cmd_inspect(&scheme, key, format),
            Commands::Range { period, from, to } => cmd_range(&scheme, period, from, to, format),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Builds the scheme from `--config`, or an empty one.
///
/// The period of the key being navigated is registered when missing so
/// roll-up commands report "no parent" instead of failing.
fn build_scheme(cli: &Cli) -> Result<KeyScheme, Box<dyn std::error::Error>> {
    let (mut hierarchy, compression) = match &cli.config {
        Some(path) => {
            let config = HierarchyConfig::load(path)?;
            tracing::info!(path = %path.display(), "using hierarchy config");
            (config.build_hierarchy()?, config.compression || cli.compress)
        }
        None => (PeriodHierarchy::new(), cli.compress),
    };

    let key = match &cli.command {
        Commands::Upper { key } | Commands::Lower { key } => Some(key),
        _ => None,
    };
    if let Some(period) = key
        .map(|k| KeyScheme::retrieve_aggregation_period(k))
        .transpose()?
        .flatten()
    {
        hierarchy.add_period(period);
    }

    Ok(KeyScheme::new(hierarchy, compression))
}

/// A command-line date/time: wall-clock or absolute.
enum TimeArg {
    Local(NaiveDateTime),
    Absolute(DateTime<FixedOffset>),
}

impl TimeArg {
    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Absolute(instant));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
            .map(Self::Local)
            .map_err(|_| {
                format!("invalid date/time '{s}': expected YYYY-MM-DDTHH:MM[:SS] or RFC 3339")
                    .into()
            })
    }

    /// The wall-clock time in `period`'s zone.
    fn local_to(&self, period: &AggregationPeriod) -> NaiveDateTime {
        match self {
            Self::Local(local) => *local,
            Self::Absolute(instant) => instant.with_timezone(&period.zone()).naive_local(),
        }
    }
}

fn print_key(key: &str, format: &OutputFormat) -> CliResult {
    match format {
        OutputFormat::Text => println!("{key}"),
        OutputFormat::Json => println!("{}", serde_json::json!({ "key": key })),
    }
    Ok(())
}

/// Implements `calkey generate <period> <datetime>`.
fn cmd_generate(
    scheme: &KeyScheme,
    period: &str,
    datetime: &str,
    format: &OutputFormat,
) -> CliResult {
    let period = AggregationPeriod::parse(period)?;
    let at = TimeArg::parse(datetime)?;
    let key = scheme.generate_key(&period, &at.local_to(&period))?;
    print_key(&key, format)
}

/// Implements `calkey start <key>`.
fn cmd_start(scheme: &KeyScheme, key: &str, format: &OutputFormat) -> CliResult {
    let start = scheme.start_time(key)?.format("%Y-%m-%dT%H:%M:%S").to_string();
    match format {
        OutputFormat::Text => println!("{start}"),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "key": key, "start": start }));
        }
    }
    Ok(())
}

/// Implements `calkey end <key>`.
fn cmd_end(scheme: &KeyScheme, key: &str, format: &OutputFormat) -> CliResult {
    let end = scheme.end_time(key)?;
    match format {
        OutputFormat::Text => println!("{}", end.to_rfc3339()),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "key": key, "end": end.to_rfc3339() }));
        }
    }
    Ok(())
}

/// Implements `calkey upper <key>`.
fn cmd_upper(scheme: &KeyScheme, key: &str, format: &OutputFormat) -> CliResult {
    let uppers = scheme.upper_level_keys(key)?;
    match format {
        OutputFormat::Text => {
            if uppers.is_empty() {
                println!("(no upper level)");
            }
            for upper in &uppers {
                println!("{upper}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "key": key, "upper": uppers }));
        }
    }
    Ok(())
}

/// Implements `calkey lower <key>`.
fn cmd_lower(scheme: &KeyScheme, key: &str, format: &OutputFormat) -> CliResult {
    let lower = scheme.first_lower_level_key(key)?;
    match format {
        OutputFormat::Text => println!("{}", lower.as_deref().unwrap_or("(no lower level)")),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "key": key, "lower": lower }));
        }
    }
    Ok(())
}

/// Implements `calkey inspect <key>`.
fn cmd_inspect(scheme: &KeyScheme, key: &str, format: &OutputFormat) -> CliResult {
    let (code_name, digits) = KeyScheme::separate_aggregation_period(key);
    let period = KeyScheme::retrieve_aggregation_period(key)?
        .ok_or_else(|| format!("'{key}' has no aggregation period prefix"))?;
    let (start, end) = scheme.time_range(key)?;

    match format {
        OutputFormat::Text => {
            println!("Key: {key}");
            println!("  Code name: {}", code_name.unwrap_or_default());
            println!("  Digits: {digits}");
            println!("  Unit: {}", period.unit().name());
            println!("  Amount: {}", period.amount());
            println!("  Zone: {}", period.zone().name());
            println!("  Compressed: {}", scheme.compression_enabled());
            println!("  Start: {}", start.to_rfc3339());
            println!("  End: {}", end.to_rfc3339());
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "key": key,
                "code_name": code_name,
                "digits": digits,
                "unit": period.unit(),
                "amount": period.amount(),
                "zone": period.zone().name(),
                "compressed": scheme.compression_enabled(),
                "start": start.to_rfc3339(),
                "end": end.to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

/// Implements `calkey range <period> <from> <to>`.
fn cmd_range(
    scheme: &KeyScheme,
    period: &str,
    from: &str,
    to: &str,
    format: &OutputFormat,
) -> CliResult {
    let period = AggregationPeriod::parse(period)?;
    let from = TimeArg::parse(from)?.local_to(&period);
    let to = TimeArg::parse(to)?.local_to(&period);

    let keys = scheme
        .keys_between(&period, &from, &to)?
        .collect::<calkey::Result<Vec<_>>>()?;
    tracing::debug!(period = %period, count = keys.len(), "listed keys");

    match format {
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "period": period, "keys": keys }));
        }
    }
    Ok(())
}
