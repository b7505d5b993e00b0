//! `H key:value` header-line parsing (spec.md §6).
//!
//! A session's header block is a run of lines starting with `H `, ending at
//! the first line that isn't. Each value is a scalar or a comma-separated
//! list of scalars, each scalar tried as integer, then float, then string,
//! in that preference order (spec.md §6), matching `orangebox`'s
//! `_trycast` helper.

use std::collections::BTreeMap;
use std::fmt;

/// One header value: either a single scalar or a homogeneous-looking list
/// of scalars (the source does not enforce homogeneity; each element is
/// cast independently, same as the original).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(v) => write!(f, "{v}"),
        }
    }
}

impl Scalar {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) => Some(*v as i64),
            Scalar::Str(_) => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Str(_) => None,
        }
    }
}

/// Parse one comma-separated scalar field, preferring integer, then float,
/// then string — `orangebox._trycast`.
fn trycast(s: &str) -> Scalar {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Scalar::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Scalar::Float(f);
    }
    Scalar::Str(s.to_string())
}

fn parse_value(raw: &str) -> HeaderValue {
    if raw.contains(',') {
        HeaderValue::List(raw.split(',').map(trycast).collect())
    } else {
        HeaderValue::Scalar(trycast(raw))
    }
}

/// All headers for one session, keyed by name, iterated in sorted-key order
/// (backed by a `BTreeMap`, not the order header lines appeared in the log).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Headers(BTreeMap<String, HeaderValue>);

impl Headers {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_scalar(&self, key: &str) -> Option<&Scalar> {
        match self.0.get(key)? {
            HeaderValue::Scalar(s) => Some(s),
            HeaderValue::List(_) => None,
        }
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[Scalar]> {
        match self.0.get(key)? {
            HeaderValue::List(l) => Some(l),
            HeaderValue::Scalar(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.0.iter()
    }

    /// Headers excluding `Field ...` keys, i.e. what `SessionView::headers`
    /// exposes (spec.md §6).
    #[must_use]
    pub fn without_field_defs(&self) -> Headers {
        Headers(
            self.0
                .iter()
                .filter(|(k, _)| !k.starts_with("Field "))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Parse one session's header block starting at `buf[0]`. Returns the
/// parsed headers and the byte length of the header block (so the caller
/// can slice off the remaining frame-stream bytes).
///
/// Lines not shaped `key:value` are skipped with a warning (spec.md §7 kind
/// 2); the session still proceeds as long as at least one `H` line parsed.
#[must_use]
pub fn parse_header_block(buf: &[u8]) -> (Headers, usize) {
    let mut map = BTreeMap::new();
    let mut offset = 0;

    for line in buf.split_inclusive(|&b| b == b'\n') {
        if line.first() != Some(&b'H') {
            break;
        }
        let Ok(text) = std::str::from_utf8(line) else {
            break;
        };
        let trimmed = text.trim_end_matches(['\r', '\n']);
        // "H key:value" -> strip one leading "H " occurrence.
        let Some(rest) = trimmed.strip_prefix("H ") else {
            break;
        };
        match rest.split_once(':') {
            Some((name, value)) => {
                map.insert(name.trim().to_string(), parse_value(value));
            }
            None => {
                tracing::warn!(line = trimmed, "skipping malformed header line");
            }
        }
        offset += line.len();
    }

    (Headers(map), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_int_float_string() {
        let buf = b"H a:1\nH b:1.5\nH c:hello\nnot a header\n";
        let (headers, len) = parse_header_block(buf);
        assert_eq!(headers.get_scalar("a"), Some(&Scalar::Int(1)));
        assert_eq!(headers.get_scalar("b"), Some(&Scalar::Float(1.5)));
        assert_eq!(headers.get_scalar("c"), Some(&Scalar::Str("hello".into())));
        assert_eq!(len, "H a:1\nH b:1.5\nH c:hello\n".len());
    }

    #[test]
    fn parses_list_values() {
        let buf = b"H Field I name:a,b,c\n";
        let (headers, _) = parse_header_block(buf);
        let list = headers.get_list("Field I name").unwrap();
        assert_eq!(
            list,
            &[
                Scalar::Str("a".into()),
                Scalar::Str("b".into()),
                Scalar::Str("c".into())
            ]
        );
    }

    #[test]
    fn stops_at_first_non_header_line() {
        let buf = b"H a:1\nbinary garbage follows";
        let (headers, len) = parse_header_block(buf);
        assert_eq!(headers.get_scalar("a"), Some(&Scalar::Int(1)));
        assert_eq!(len, "H a:1\n".len());
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let buf = b"H a:1\nH no-colon-here\nH b:2\n";
        let (headers, _) = parse_header_block(buf);
        assert_eq!(headers.get_scalar("a"), Some(&Scalar::Int(1)));
        assert_eq!(headers.get_scalar("b"), Some(&Scalar::Int(2)));
    }

    #[test]
    fn without_field_defs_drops_field_keys() {
        let buf = b"H Product:x\nH Field I name:a\n";
        let (headers, _) = parse_header_block(buf);
        let filtered = headers.without_field_defs();
        assert!(filtered.get("Product").is_some());
        assert!(filtered.get("Field I name").is_none());
    }
}
