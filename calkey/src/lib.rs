//! # calkey
//!
//! Sortable, self-describing keys for calendar aggregation buckets.
//!
//! calkey maps points in time to string keys identifying the calendar bucket
//! (hour, quarter, ISO week, ...) they fall into, in a given time zone. A key
//! carries its own period in its prefix, so it can be decoded back into the
//! bucket's start and end, stepped to the next or previous bucket, or rolled
//! up to a coarser bucket through a declared hierarchy of periods.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Keys of one period sort lexicographically in chronological order
//! - Buckets align to the wall clock of an IANA time zone, DST included
//! - Optional compression of multi-unit suffixes (`3M201504` becomes `3M20151`)
//! - No shared mutable state: a built scheme is `Send + Sync`
//!
//! ## Quick Start
//!
//! ```rust
//! use calkey::{KeyScheme, PeriodHierarchy};
//! use chrono::NaiveDate;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 15-minute buckets roll up into hours, hours into 6-hour blocks and days
//! let mut hierarchy = PeriodHierarchy::new();
//! hierarchy.add("1H", "15N")?;
//! hierarchy.add("6H", "1H")?;
//! hierarchy.add("1D", "1H")?;
//!
//! let scheme = KeyScheme::new(hierarchy, true);
//!
//! let at = NaiveDate::from_ymd_opt(2015, 3, 12)
//!     .unwrap()
//!     .and_hms_opt(17, 3, 0)
//!     .unwrap();
//! let key = scheme.generate_key_for_code("1H", &at)?;
//! assert_eq!(key, "1H2015031217");
//!
//! // Navigate
//! assert_eq!(scheme.next_key(&key)?, "1H2015031218");
//! assert_eq!(scheme.upper_level_keys(&key)?, ["6H201503122", "1D20150312"]);
//! assert_eq!(scheme.first_lower_level_key(&key)?.as_deref(), Some("15N20150312170"));
//!
//! // Decode
//! let (start, end) = scheme.time_range(&key)?;
//! assert_eq!((end - start).num_minutes(), 60);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`AggregationPeriod`] - A unit, an amount, and a zone; its code name prefixes every key
//! - [`PeriodHierarchy`] - Roll-up graph between periods
//! - [`KeyScheme`] - Generates, decodes, and navigates keys
//! - [`HierarchyConfig`] - JSON description of a hierarchy and scheme
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`unit`] - Repeat units and their abbreviations
//! - [`period`] - Period descriptors and code-name parsing
//! - [`week`] - Week-of-year numbering inside calendar years
//! - [`compression`] - Numeric compression of key suffixes
//! - [`hierarchy`] - The period roll-up graph
//! - [`scheme`] - Key generation and navigation
//! - [`range`] - Iteration over consecutive keys
//! - [`config`] - Hierarchy configuration files
//! - [`error`] - Error types

pub mod compression;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod period;
pub mod range;
pub mod scheme;
pub mod unit;
pub mod week;

// Re-export primary API types at crate root for convenience.
pub use compression::Compressed;
pub use config::{HierarchyConfig, RollupConfig};
pub use error::{CalkeyError, Result};
pub use hierarchy::PeriodHierarchy;
pub use period::AggregationPeriod;
pub use range::KeyRange;
pub use scheme::KeyScheme;
pub use unit::PeriodUnit;
