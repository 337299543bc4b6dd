//! Canonical URI normalizer: converts archival URIs to a stable identity
//!
//! URIs harvested from archives are messy: double- and triple-encoded
//! redirect targets, duplicated schemes, stray whitespace, Latin-1 bytes,
//! dot-segments. The normalizer turns any raw string into one canonical form
//! used for comparison, deduplication and hashing.
//!
//! # Pipeline
//!
//! `raw → (percent-decode → UTF-8/Latin-1 → scrub whitespace) to fixpoint → fixup
//!  → resolve against base → split & normalize → recompose → SHA-256 prefix`
//!
//! The structural steps can expose text an earlier step would have rewritten
//! (a dot segment hiding trailing space, say), so the pipeline is reapplied to
//! its own output until the canonical string stops changing.
//!
//! # Guarantees
//!
//! - **Total**: every input yields a `CanonicalUri`; there is no error path
//! - **Idempotent**: `normalize(normalize(x).as_str(), None) == normalize(x, None)`
//! - **Deterministic**: same input always produces same output
//! - **Fragment-free identity**: the fragment is kept as an accessor only

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::escape;

/// Upper bound on decode passes; real inputs settle in two or three.
pub const MAX_DECODE_PASSES: usize = 16;

/// Upper bound on whole-pipeline passes; real inputs settle in one.
pub const MAX_SETTLE_PASSES: usize = 8;

/// Length of the hex content hash.
pub const HASH_LEN: usize = 5;

/// Sentinel domain for IPv4-literal hosts.
pub const IPADDR_DOMAIN: &str = "IPADDR";

/// A normalized URI with its parsed components
///
/// Equality, ordering and hashing use the canonical string only; the
/// fragment never takes part.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalUri {
    canonical: String,
    scheme: String,
    authority: String,
    host: String,
    path: String,
    query: String,
    fragment: String,
    content_hash: String,
}

// ── Public API ─────────────────────────────────────────────

/// Normalize `raw`, resolving it against `base` when given.
///
/// Never fails: malformed input yields a best-effort canonical value.
pub fn normalize(raw: &str, base: Option<&str>) -> CanonicalUri {
    let cleaned = fixup(&decode_and_scrub(raw));

    let resolved = match base.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => resolve(base, &cleaned),
        None => cleaned,
    };

    settle(CanonicalUri::from_resolved(&resolved))
}

/// One base-less pass over an already resolved string.
fn canonicalize(text: &str) -> CanonicalUri {
    CanonicalUri::from_resolved(&fixup(&decode_and_scrub(text)))
}

/// Reapply the pipeline until the canonical string is a fixpoint, keeping
/// the fragment of the first pass.
fn settle(mut uri: CanonicalUri) -> CanonicalUri {
    for _ in 0..MAX_SETTLE_PASSES {
        let next = canonicalize(&uri.canonical);
        if next.canonical == uri.canonical {
            return uri;
        }
        uri = CanonicalUri {
            fragment: uri.fragment,
            ..next
        };
    }
    tracing::warn!(
        passes = MAX_SETTLE_PASSES,
        canonical = %uri.canonical,
        "canonical form did not settle"
    );
    uri
}

/// Normalize a value stored in web-safe or path-safe form.
///
/// One percent-decoding pass undoes the escaping, then the usual pipeline
/// runs. Path-safe `+` is left alone since it cannot be told apart from a
/// literal plus.
pub fn from_safe_encoding(encoded: &str) -> CanonicalUri {
    let unescaped = percent_decode(encoded.as_bytes());
    normalize(&coerce_encoding(unescaped), None)
}

/// Normalize every URI in `uris`; `None` for an empty list.
pub fn uris_from_list<I, S>(uris: I) -> Option<Vec<CanonicalUri>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let normalized: Vec<_> = uris
        .into_iter()
        .map(|uri| normalize(uri.as_ref(), None))
        .collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

impl CanonicalUri {
    /// Shorthand for [`normalize`] without a base.
    pub fn parse(raw: &str) -> Self {
        normalize(raw, None)
    }

    fn from_resolved(resolved: &str) -> Self {
        let (body, fragment) = match resolved.split_once('#') {
            Some((body, fragment)) => (body.trim_end(), fragment),
            None => (resolved, ""),
        };
        let parts = split(body);

        let scheme = parts.scheme.map(str::to_ascii_lowercase);
        let authority = parts.authority.map(normalize_authority);
        let path = normalize_path(parts.path);
        let query = parts.query.unwrap_or("");

        let canonical = recompose(scheme.as_deref(), authority.as_deref(), &path, query);
        let content_hash = make_hash(&canonical);
        let authority = authority.unwrap_or_default();
        let host = get_host(&authority).to_string();

        CanonicalUri {
            canonical,
            scheme: scheme.unwrap_or_default(),
            authority,
            host,
            path,
            query: query.to_string(),
            fragment: fragment.to_string(),
            content_hash,
        }
    }

    // ── Components ─────────────────────────────────────

    /// The canonical string: scheme, authority, path and query.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authority with user info and port, host lower-cased.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Authority without `user@` prefix or `:port` suffix.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Approximate registrable domain, see [`get_domain`].
    pub fn domain(&self) -> String {
        get_domain(&self.host)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fragment as it appeared in the input; not part of identity.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// First [`HASH_LEN`] hex digits of SHA-256 over the canonical string.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn path_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    pub fn path_query_fragment(&self) -> String {
        if self.fragment.is_empty() {
            self.path_query()
        } else {
            format!("{}#{}", self.path_query(), self.fragment)
        }
    }

    // ── Safe encodings ─────────────────────────────────

    pub fn pathsafe_uri(&self) -> String {
        escape::make_pathsafe(&self.canonical)
    }

    pub fn pathsafe_authority(&self) -> String {
        escape::make_pathsafe(&self.authority)
    }

    pub fn pathsafe_host(&self) -> String {
        escape::make_pathsafe(&self.host)
    }

    pub fn pathsafe_domain(&self) -> String {
        escape::make_pathsafe(&self.domain())
    }

    pub fn pathsafe_path(&self) -> String {
        escape::make_pathsafe(&self.path)
    }

    pub fn pathsafe_query(&self) -> String {
        escape::make_pathsafe(&self.query)
    }

    pub fn pathsafe_path_query(&self) -> String {
        escape::make_pathsafe(&self.path_query())
    }

    pub fn pathsafe_path_query_fragment(&self) -> String {
        escape::make_pathsafe(&self.path_query_fragment())
    }

    pub fn websafe_uri(&self) -> String {
        escape::make_websafe(&self.canonical)
    }

    pub fn dbsafe_uri(&self) -> String {
        escape::make_dbsafe(&self.canonical)
    }

    pub fn dbsafe_domain(&self) -> String {
        escape::make_dbsafe(&self.domain())
    }
}

impl fmt::Display for CanonicalUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl AsRef<str> for CanonicalUri {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for CanonicalUri {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for CanonicalUri {}

impl PartialOrd for CanonicalUri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalUri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Hash for CanonicalUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

// ── Decoding ───────────────────────────────────────────────

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// One percent-decoding pass; malformed triplets are left as they are.
pub fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() {
            if let (Some(hi), Some(lo)) = (hex_value(input[i + 1]), hex_value(input[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

/// Percent-decode and scrub whitespace until neither changes the text, or
/// [`MAX_DECODE_PASSES`] is reached.
///
/// The two run as one loop: removing a stray CR/LF/TAB can join a new `%XX`
/// triplet (`%2\n0`), which the next pass decodes.
pub fn decode_and_scrub(raw: &str) -> String {
    let mut current = clean_whitespace(raw);
    for _ in 0..MAX_DECODE_PASSES {
        let decoded = coerce_encoding(percent_decode(current.as_bytes()));
        let next = clean_whitespace(&decoded);
        if next == current {
            return current;
        }
        current = next;
    }
    tracing::warn!(
        passes = MAX_DECODE_PASSES,
        "percent-decoding did not reach a fixpoint"
    );
    current
}

/// UTF-8 when valid, otherwise Latin-1, which accepts every byte.
pub fn coerce_encoding(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

// ── Structural cleanup ─────────────────────────────────────

/// Trim, drop repeated `scheme://` prefixes (in any case) and surplus
/// leading slashes.
pub fn fixup(raw: &str) -> String {
    let raw = raw.trim();
    let Some(sep) = raw.find("://") else {
        return raw.to_string();
    };
    let prefix = &raw[..sep + 3];
    let mut rest = &raw[sep + 3..];
    loop {
        rest = rest.trim_start_matches('/');
        match rest.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => rest = &rest[prefix.len()..],
            _ => break,
        }
    }
    format!("{}{}", prefix, rest)
}

/// Remove CR, LF and TAB (raw or percent-encoded), decode `%20`, trim.
pub fn clean_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '\r' | '\n' | '\t' => rest = &rest[1..],
            '%' => {
                let triplet = rest.get(..3).map(str::to_ascii_uppercase);
                match triplet.as_deref() {
                    Some("%0D") | Some("%0A") | Some("%09") | Some("%07") => rest = &rest[3..],
                    Some("%20") => {
                        out.push(' ');
                        rest = &rest[3..];
                    }
                    _ => {
                        out.push('%');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out.trim().to_string()
}

// ── Splitting & resolution ─────────────────────────────────

/// URI components as they appear in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriParts<'a> {
    pub scheme: Option<&'a str>,
    pub authority: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

fn split_re() -> &'static Regex {
    // RFC 3986 appendix B
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
            .expect("URI split pattern is valid")
    })
}

/// Split into scheme, authority, path, query and fragment.
pub fn split(uri: &str) -> UriParts<'_> {
    let caps = match split_re().captures(uri) {
        Some(caps) => caps,
        None => {
            return UriParts {
                scheme: None,
                authority: None,
                path: uri,
                query: None,
                fragment: None,
            }
        }
    };
    UriParts {
        scheme: caps.get(1).map(|m| m.as_str()),
        authority: caps.get(2).map(|m| m.as_str()),
        path: caps.get(3).map_or("", |m| m.as_str()),
        query: caps.get(4).map(|m| m.as_str()),
        fragment: caps.get(5).map(|m| m.as_str()),
    }
}

/// Resolve `reference` against `base` (RFC 3986 section 5.2.2).
///
/// Dot-segments are left for [`normalize_path`].
pub fn resolve(base: &str, reference: &str) -> String {
    let r = split(reference);
    if r.scheme.is_some() {
        return reference.to_string();
    }

    let b = split(base);
    let (authority, path, query) = if r.authority.is_some() {
        (r.authority, r.path.to_string(), r.query)
    } else if r.path.is_empty() {
        (b.authority, b.path.to_string(), r.query.or(b.query))
    } else if r.path.starts_with('/') {
        (b.authority, r.path.to_string(), r.query)
    } else {
        (b.authority, merge(&b, r.path), r.query)
    };

    let mut out = String::new();
    if let Some(scheme) = b.scheme {
        out.push_str(scheme);
        out.push(':');
    }
    if let Some(authority) = authority {
        out.push_str("//");
        out.push_str(authority);
    }
    out.push_str(&path);
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = r.fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn merge(base: &UriParts<'_>, path: &str) -> String {
    if base.authority.is_some() && base.path.is_empty() {
        return format!("/{}", path);
    }
    match base.path.rfind('/') {
        Some(idx) => format!("{}{}", &base.path[..=idx], path),
        None => path.to_string(),
    }
}

// ── Component normalization ────────────────────────────────

/// Lower-case the host part and collapse runs of dots in it.
fn normalize_authority(authority: &str) -> String {
    let (userinfo, host_port) = match authority.rfind('@') {
        Some(idx) => authority.split_at(idx + 1),
        None => ("", authority),
    };
    let (host, port) = split_port(host_port);

    let mut host = host.to_lowercase();
    while host.contains("..") {
        host = host.replace("..", ".");
    }
    format!("{}{}{}", userinfo, host, port)
}

/// Split `host:port`, keeping bracketed IPv6 literals whole.
fn split_port(host_port: &str) -> (&str, &str) {
    let search_from = if host_port.starts_with('[') {
        host_port.find(']').map_or(host_port.len(), |idx| idx + 1)
    } else {
        0
    };
    match host_port[search_from..].find(':') {
        Some(idx) => host_port.split_at(search_from + idx),
        None => (host_port, ""),
    }
}

/// Remove dot-segments without ever ascending past the first segment.
///
/// `.` is dropped; `..` pops the previous segment only while more than one
/// segment is retained, so `/../a` becomes `/a`.
pub fn normalize_path(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if output.len() > 1 {
                    output.pop();
                }
            }
            _ => output.push(segment),
        }
    }
    output.join("/")
}

fn recompose(scheme: Option<&str>, authority: Option<&str>, path: &str, query: &str) -> String {
    let mut out = String::new();
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push(':');
    }
    match authority {
        Some(authority) => {
            out.push_str("//");
            out.push_str(authority);
            if !path.is_empty() && !path.starts_with('/') {
                out.push('/');
            }
        }
        // keep the path from reparsing as an authority or a scheme
        None if path.starts_with("//") => out.push_str("/."),
        None if scheme.is_none() && path.split('/').next().is_some_and(|s| s.contains(':')) => {
            out.push_str("./")
        }
        None => {}
    }
    out.push_str(path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(query);
    }
    out
}

// ── Derived values ─────────────────────────────────────────

/// Authority without `user@` prefix or `:port` suffix.
pub fn get_host(authority: &str) -> &str {
    let host_port = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    split_port(host_port).0
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$")
            .expect("IPv4 pattern is valid")
    })
}

/// Heuristic registrable domain.
///
/// IPv4 literals map to [`IPADDR_DOMAIN`]. A leading `www` label is dropped.
/// Hosts with at most two labels are returned whole; a two-letter TLD under a
/// label of at most three letters (`co.uk`, `com.au`) keeps three labels;
/// everything else keeps two. This is not a public-suffix lookup.
pub fn get_domain(host: &str) -> String {
    if ipv4_re().is_match(host) {
        return IPADDR_DOMAIN.to_string();
    }
    let mut labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 1 && labels[0] == "www" {
        labels.remove(0);
    }
    let n = labels.len();
    if n <= 2 {
        labels.join(".")
    } else if labels[n - 1].len() == 2 && labels[n - 2].len() <= 3 {
        labels[n - 3..].join(".")
    } else {
        labels[n - 2..].join(".")
    }
}

/// Short uniquifying key; collisions are possible, compare canonical strings.
pub fn make_hash(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}
