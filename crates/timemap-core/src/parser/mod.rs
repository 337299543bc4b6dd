//! Timemap parser: line source, tokenizer, link-value state machine
//!
//! Converts `application/link-format` Timemap text into a [`Timemap`].
//! Relative targets are resolved against the base URI supplied by the caller.

pub mod link;
pub mod source;
pub mod tokenizer;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::timemap::{RelationProfile, Timemap, TimemapAssembler};
use crate::Result;
use link::LinkRecordParser;
use source::{LineSource, ReaderSource};

/// Parser configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub profile: RelationProfile,
}

impl ParseOptions {
    /// Options recognizing the legacy `first memento`, `last memento`
    /// and `timebundle` relations.
    pub fn extended() -> Self {
        ParseOptions {
            profile: RelationProfile::Extended,
        }
    }
}

/// Parse a Timemap from a line source
///
/// The source is released exactly once, whether parsing finishes, fails
/// or the parser is dropped.
///
/// # Errors
/// Returns `Lexical` with line:column for input the tokenizer cannot match,
/// `UnexpectedToken` for attributes outside the Timemap vocabulary,
/// `InvalidDatetime` for unparseable instants and `Io` for read failures.
///
/// # Example
/// ```
/// use timemap_core::parser::{parse, source::ReaderSource};
///
/// let text = "<http://example.com/>;rel=\"original\"";
/// let timemap = parse(ReaderSource::from_text(text), "http://example.com/").unwrap();
/// assert_eq!(timemap.original_uri().unwrap().as_str(), "http://example.com/");
/// ```
pub fn parse<S: LineSource>(source: S, base_uri: &str) -> Result<Timemap> {
    parse_with(source, base_uri, &ParseOptions::default())
}

pub fn parse_with<S: LineSource>(
    source: S,
    base_uri: &str,
    options: &ParseOptions,
) -> Result<Timemap> {
    let mut assembler = TimemapAssembler::new(base_uri, options.profile);
    for record in LinkRecordParser::new(source) {
        assembler.add(record?);
    }
    Ok(assembler.finish())
}

/// Parse a Timemap held in memory.
pub fn parse_str(text: &str, base_uri: &str) -> Result<Timemap> {
    parse(ReaderSource::from_text(text), base_uri)
}

/// Parse a Timemap file. Lines that are not UTF-8 are read as Latin-1.
pub fn from_file(path: impl AsRef<Path>, base_uri: &str) -> Result<Timemap> {
    from_file_with(path, base_uri, &ParseOptions::default())
}

pub fn from_file_with(
    path: impl AsRef<Path>,
    base_uri: &str,
    options: &ParseOptions,
) -> Result<Timemap> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), base_uri, "parsing timemap file");
    parse_with(ReaderSource::open(path)?, base_uri, options)
}
