//! Link-value state machine: turns tokens into link records
//!
//! The machine state is an explicit value ([`LinkState`]) with a pure
//! transition ([`LinkState::step`]), so every transition can be exercised
//! without a tokenizer. [`LinkRecordParser`] drives it from a token stream.
//!
//! ```text
//!   SeekingUri ──<uri>──▶ InAttrs ──;/attr──▶ InAttrs
//!        ▲                   │
//!        └────────,──────────┘      (emit record)
//!   end of tokens ──▶ Done          (emit pending record, if any)
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::source::{LineSource, ReaderSource};
use super::tokenizer::{SpannedToken, Token, Tokenizer};
use crate::{curator, utc, Error, Result};

/// One parsed Link-value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub relations: BTreeSet<String>,
    pub target: String,
    pub memento_datetime: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LinkRecord {
    pub fn has_relation(&self, relation: &str) -> bool {
        self.relations.contains(relation)
    }
}

/// Where the machine is within a Link-value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    SeekingUri,
    InAttrs,
    Done,
}

/// Fields accumulated for the Link-value being read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLink {
    pub target: Option<String>,
    pub relations: BTreeSet<String>,
    pub datetime: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PendingLink {
    fn is_empty(&self) -> bool {
        *self == PendingLink::default()
    }

    /// Build the record; `None` without a target URI.
    fn into_record(self) -> Option<LinkRecord> {
        let target = self.target?;
        let memento_datetime = self
            .datetime
            .map(|dt| curator::curate(dt, Some(target.as_str())));
        Some(LinkRecord {
            relations: self.relations,
            memento_datetime,
            content_type: self.content_type,
            from: self.from.map(|dt| curator::curate(dt, None)),
            until: self.until.map(|dt| curator::curate(dt, None)),
            target,
        })
    }
}

/// Complete machine state between tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    pub phase: Phase,
    pub pending: PendingLink,
}

impl LinkState {
    pub fn new() -> Self {
        LinkState::default()
    }

    fn done() -> Self {
        LinkState {
            phase: Phase::Done,
            pending: PendingLink::default(),
        }
    }

    /// Apply one token, returning the next state and any completed record.
    ///
    /// # Errors
    /// `UnexpectedToken` for an attribute name outside the Timemap
    /// vocabulary or any token after `Done`; `InvalidDatetime` for an
    /// instant attribute no supported format accepts.
    pub fn step(mut self, spanned: SpannedToken) -> Result<(LinkState, Option<LinkRecord>)> {
        let SpannedToken { token, span } = spanned;
        if self.phase == Phase::Done {
            return Err(Error::UnexpectedToken {
                token: token.to_string(),
                span,
            });
        }

        match token {
            Token::Uri(uri) => {
                if let Some(previous) = &self.pending.target {
                    tracing::warn!(%span, previous = %previous, replacement = %uri, "second URI in one link-value");
                }
                self.pending.target = Some(uri);
                self.phase = Phase::InAttrs;
                Ok((self, None))
            }
            Token::Attribute { name, value } => {
                let instant = |value: String| {
                    utc::parse_instant(&value).ok_or(Error::InvalidDatetime { value, span })
                };
                match name.as_str() {
                    "rel" => {
                        self.pending.relations =
                            value.split_whitespace().map(str::to_string).collect();
                    }
                    "datetime" => self.pending.datetime = Some(instant(value)?),
                    "from" => self.pending.from = Some(instant(value)?),
                    "until" => self.pending.until = Some(instant(value)?),
                    "type" => self.pending.content_type = Some(value),
                    _ => {
                        return Err(Error::UnexpectedToken {
                            token: Token::Attribute { name, value }.to_string(),
                            span,
                        })
                    }
                }
                Ok((self, None))
            }
            Token::Semicolon => Ok((self, None)),
            Token::Comma => {
                let pending = std::mem::take(&mut self.pending);
                if pending.target.is_none() && !pending.is_empty() {
                    tracing::warn!(%span, "attributes without a URI dropped");
                }
                self.phase = Phase::SeekingUri;
                Ok((self, pending.into_record()))
            }
        }
    }

    /// End of input: the pending record, if a URI was seen.
    pub fn finish(self) -> Option<LinkRecord> {
        match self.phase {
            Phase::Done => None,
            Phase::SeekingUri | Phase::InAttrs => self.pending.into_record(),
        }
    }
}

/// Lazy stream of link records over a token stream
pub struct LinkRecordParser<S: LineSource> {
    tokens: Tokenizer<S>,
    state: LinkState,
}

impl<S: LineSource> LinkRecordParser<S> {
    pub fn new(source: S) -> Self {
        LinkRecordParser {
            tokens: Tokenizer::new(source),
            state: LinkState::new(),
        }
    }

    /// Current machine state.
    pub fn state(&self) -> &LinkState {
        &self.state
    }

    fn terminate(&mut self) -> LinkState {
        self.tokens.close();
        std::mem::replace(&mut self.state, LinkState::done())
    }
}

impl<S: LineSource> Iterator for LinkRecordParser<S> {
    type Item = Result<LinkRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.state.phase != Phase::Done {
            match self.tokens.next() {
                Some(Ok(token)) => {
                    let state = std::mem::take(&mut self.state);
                    match state.step(token) {
                        Ok((next, record)) => {
                            self.state = next;
                            if let Some(record) = record {
                                tracing::debug!(uri = %record.target, rels = ?record.relations, "link record");
                                return Some(Ok(record));
                            }
                        }
                        Err(e) => {
                            self.terminate();
                            return Some(Err(e));
                        }
                    }
                }
                Some(Err(e)) => {
                    self.terminate();
                    return Some(Err(e));
                }
                None => {
                    let record = self.terminate().finish();
                    if let Some(record) = &record {
                        tracing::debug!(uri = %record.target, "trailing link record without comma");
                    }
                    return record.map(Ok);
                }
            }
        }
        None
    }
}

/// Parse every link record in `text`, stopping at the first error.
pub fn parse_records(text: &str) -> Result<Vec<LinkRecord>> {
    LinkRecordParser::new(ReaderSource::from_text(text)).collect()
}
