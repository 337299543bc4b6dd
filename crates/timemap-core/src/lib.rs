//! Timemap Core - Memento Timemap parsing and URI canonicalization
//!
//! Reads `application/link-format` Timemaps (RFC 7089) into an in-memory
//! [`Timemap`] and canonicalizes archival URIs so the same resource always
//! compares equal, whatever encoding or case quirks the archive used.
//!
//! # Architecture
//!
//! ```text
//! Timemap text → LineSource → Tokenizer → LinkRecordParser → TimemapAssembler → Timemap
//!                                               ↓                   ↓
//!                                            Curator           Normalizer → CanonicalUri
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: Same input always produces an identical Timemap
//! - **Total**: URI normalization never fails; it is best effort
//! - **Idempotent**: `normalize(normalize(u))` equals `normalize(u)`
//! - **UTC**: Every stored instant is in UTC

pub mod curator;
pub mod error;
pub mod escape;
pub mod normalizer;
pub mod parser;
pub mod timemap;
pub mod utc;

pub use error::{Error, Result};
pub use normalizer::{normalize, CanonicalUri};
pub use parser::link::LinkRecord;
pub use parser::{from_file, parse, parse_str, parse_with, ParseOptions};
pub use timemap::{RelationProfile, Timemap};
