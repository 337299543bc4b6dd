//! Safe-encoding tables for canonical URIs
//!
//! Each variant is an explicit substitution table rather than general
//! percent-encoding, so the exact set of escaped characters is visible and
//! stable:
//!
//! - **path-safe**: usable as a single file-system path component
//! - **web-safe**: printable ASCII over the UTF-8 bytes
//! - **db-safe**: currently the identity transform

use std::collections::HashMap;
use std::sync::OnceLock;

fn percent(byte: u32) -> String {
    format!("%{:02X}", byte)
}

fn pathsafe_table() -> &'static HashMap<char, String> {
    static TABLE: OnceLock<HashMap<char, String>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<char, String> = (0x00u8..0x20)
            .map(|b| (char::from(b), percent(u32::from(b))))
            .collect();
        for (c, replacement) in [
            (' ', "+"),
            ('"', "%22"),
            ('%', "%25"),
            ('\'', "%27"),
            ('/', "%2F"),
            (':', "%3A"),
            ('\\', "%5C"),
            ('`', "%60"),
            ('\x7F', "%7F"),
        ] {
            table.insert(c, replacement.to_string());
        }
        table
    })
}

fn websafe_table() -> &'static HashMap<u8, String> {
    static TABLE: OnceLock<HashMap<u8, String>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<u8, String> = (0x00u8..0x20)
            .chain(0x7F..=0xFF)
            .map(|b| (b, percent(u32::from(b))))
            .collect();
        for b in [b' ', b'"', b'%', b'\'', b'\\', b'`'] {
            table.insert(b, percent(u32::from(b)));
        }
        table
    })
}

/// Escape for use as a path component: controls, space (`+`), quotes,
/// `%`, `/`, `:`, backslash, backtick and DEL.
pub fn make_pathsafe(decoded: &str) -> String {
    let table = pathsafe_table();
    let mut out = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        match table.get(&c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Escape the UTF-8 bytes: controls, 0x7F-0xFF, space, quotes, `%`,
/// backslash and backtick. The result is always ASCII.
pub fn make_websafe(decoded: &str) -> String {
    let table = websafe_table();
    let mut out = String::with_capacity(decoded.len());
    for &b in decoded.as_bytes() {
        match table.get(&b) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(char::from(b)),
        }
    }
    out
}

/// Identity; storage layers receive the decoded form as-is for now.
pub fn make_dbsafe(decoded: &str) -> String {
    decoded.to_string()
}
