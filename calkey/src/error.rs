//! Error types for calkey aggregation-period keys.

use thiserror::Error;

use crate::unit::PeriodUnit;

/// The main error type for all calkey operations.
///
/// This enum covers every failure a caller can observe, from describing an
/// invalid aggregation period up to decoding a malformed key.
#[derive(Error, Debug)]
pub enum CalkeyError {
    /// An aggregation period was described with an invalid unit/amount pair.
    #[error("period error: {0}")]
    Period(#[from] PeriodError),

    /// A key or code name does not match the expected grammar.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A hierarchy lookup or mutation failed.
    #[error("hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    /// A key could not be generated or navigated.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// A hierarchy configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised when constructing an aggregation period.
///
/// These are programmer errors: a period is validated once, at construction,
/// never at use time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// The amount must be a positive number of units.
    #[error("amount must be at least 1 for unit {unit}")]
    ZeroAmount {
        /// The unit the period was declared with.
        unit: PeriodUnit,
    },

    /// The unit has irregular boundaries and only supports one unit per bucket.
    #[error("aggregation periods with {unit} as unit can only have 1 as amount: {amount}")]
    AmountMustBeOne {
        /// The unit the period was declared with.
        unit: PeriodUnit,
        /// The rejected amount.
        amount: u32,
    },
}

/// Errors raised when parsing code names and keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The code name carries no unit letter.
    #[error("code name '{code_name}' has no unit abbreviation")]
    MissingUnit {
        /// The code name that was parsed.
        code_name: String,
    },

    /// The unit letter is not one of the known abbreviations.
    #[error("unknown unit abbreviation '{abbreviation}' in code name '{code_name}'")]
    UnknownUnit {
        /// The code name that was parsed.
        code_name: String,
        /// The unrecognized abbreviation.
        abbreviation: char,
    },

    /// The leading amount could not be read as a number.
    #[error("invalid amount in code name '{code_name}'")]
    InvalidAmount {
        /// The code name that was parsed.
        code_name: String,
    },

    /// The zone suffix is not a parenthesized zone id.
    #[error("malformed zone suffix '{suffix}' in code name '{code_name}'")]
    MalformedZone {
        /// The code name that was parsed.
        code_name: String,
        /// The text following the unit letter.
        suffix: String,
    },

    /// The zone id is not a known IANA time zone.
    #[error("unknown time zone '{zone}': {reason}")]
    UnknownZone {
        /// The zone id that failed to resolve.
        zone: String,
        /// Why the zone id was rejected.
        reason: String,
    },

    /// The key has no code name or no trailing digit run.
    #[error("key '{key}' does not end with a digit run preceded by a code name")]
    MissingDigits {
        /// The key that was parsed.
        key: String,
    },

    /// The digit run is not as wide as the period's key format requires.
    #[error("key '{key}' has {actual} digits, expected {expected}")]
    UnexpectedWidth {
        /// The key that was parsed.
        key: String,
        /// The width required by the period and compression setting.
        expected: usize,
        /// The width found in the key.
        actual: usize,
    },

    /// The digits do not describe the start of a bucket.
    #[error("key '{key}' is malformed: {reason}")]
    MalformedDigits {
        /// The key that was parsed.
        key: String,
        /// Why the digits were rejected.
        reason: String,
    },
}

/// Errors raised by the period hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// The code name is not registered in the hierarchy.
    #[error("aggregation period '{code_name}' is not registered in the hierarchy")]
    UnknownPeriod {
        /// The code name that was looked up.
        code_name: String,
    },

    /// The edge would make the hierarchy cyclic.
    #[error("declaring '{parent}' as parent of '{child}' would create a cycle")]
    Cycle {
        /// The coarser period of the rejected edge.
        parent: String,
        /// The finer period of the rejected edge.
        child: String,
    },
}

/// Errors raised while generating or navigating keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The calendar fields do not form a valid date and time.
    #[error("invalid date/time {year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}")]
    InvalidDateTime {
        /// Calendar year.
        year: i32,
        /// Month of year (1-12).
        month: u32,
        /// Day of month (1-31).
        day: u32,
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },

    /// Keys only cover years that fit in four digits.
    #[error("year {year} is outside the supported range 0..=9999")]
    YearOutOfRange {
        /// The offending year.
        year: i64,
    },

    /// The bounded search for an adjacent bucket found none.
    #[error("no adjacent bucket found for key '{key}' within {max_steps} steps")]
    NoAdjacentBucket {
        /// The key navigation started from.
        key: String,
        /// The number of steps searched.
        max_steps: u32,
    },
}

/// Errors raised while loading a hierarchy configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// The configuration file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a hierarchy.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// The configuration file path, or `<inline>` for string input.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration file could not be written.
    #[error("failed to write config '{path}': {source}")]
    Write {
        /// The configuration file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for `Result<T, CalkeyError>`.
pub type Result<T> = std::result::Result<T, CalkeyError>;
