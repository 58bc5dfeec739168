//! Grammar of the headers that name content-codings.

use crate::error::{Error, Result};
use http::header::{self, HeaderMap, HeaderName};
use std::borrow::Cow;
use std::fmt;

/// Transfer framing token, never matched against a coding.
const CHUNKED: &str = "chunked";

/// The four headers that name content-codings.
///
/// `Content-Encoding` and `Transfer-Encoding` describe a coding that was
/// already applied to a message and carry at most one coding besides
/// `chunked`. `Accept-Encoding` and `TE` carry a ranked wish list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// `Content-Encoding`
    ContentEncoding,
    /// `Transfer-Encoding`
    TransferEncoding,
    /// `Accept-Encoding`
    AcceptEncoding,
    /// `TE`
    Te,
}

impl HeaderKind {
    /// Whether values of this header are ranked lists with quality values.
    pub fn is_ranked(self) -> bool {
        matches!(self, HeaderKind::AcceptEncoding | HeaderKind::Te)
    }

    /// The header this kind is read from.
    pub fn header_name(self) -> HeaderName {
        match self {
            HeaderKind::ContentEncoding => header::CONTENT_ENCODING,
            HeaderKind::TransferEncoding => header::TRANSFER_ENCODING,
            HeaderKind::AcceptEncoding => header::ACCEPT_ENCODING,
            HeaderKind::Te => header::TE,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name().as_str())
    }
}

/// A coding named by a header, with its quality value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    /// Coding name as written, without surrounding whitespace.
    pub name: &'a str,
    /// Preference weight in `[0, 1]`. `0` means "not acceptable".
    pub quality: f32,
}

impl Candidate<'_> {
    /// Whether this candidate is the `*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }

    /// Case-insensitive name comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Parses one header value into its codings.
///
/// An empty or all-whitespace value yields no candidates. `chunked` is
/// accepted everywhere and left out of the result. Names keep their
/// original case; callers compare them case-insensitively.
pub fn parse(value: &str, kind: HeaderKind) -> Result<Vec<Candidate<'_>>> {
    if trim_ows(value).is_empty() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for element in value.split(',') {
        let element = trim_ows(element);
        if element.is_empty() {
            return Err(Error::malformed(kind, "empty list element"));
        }

        let mut parts = element.split(';');
        let name = trim_ows(parts.next().unwrap_or_default());
        if name.is_empty() {
            return Err(Error::malformed(
                kind,
                format!("missing coding in `{element}`"),
            ));
        }
        if !name.bytes().all(is_tchar) {
            return Err(Error::malformed(kind, format!("invalid coding `{name}`")));
        }

        let mut quality = None;
        for param in parts {
            let Some((key, value)) = trim_ows(param).split_once('=') else {
                return Err(Error::malformed(
                    kind,
                    format!("invalid parameter in `{element}`"),
                ));
            };
            let (key, value) = (trim_ows(key), trim_ows(value));
            if !key.eq_ignore_ascii_case("q") {
                return Err(Error::malformed(
                    kind,
                    format!("unexpected parameter `{key}`"),
                ));
            }
            if !kind.is_ranked() {
                return Err(Error::malformed(kind, "quality value on an applied coding"));
            }
            if quality.is_some() {
                return Err(Error::malformed(
                    kind,
                    format!("repeated quality in `{element}`"),
                ));
            }
            let Some(q) = parse_quality(value) else {
                return Err(Error::malformed(kind, format!("invalid quality `{value}`")));
            };
            quality = Some(q);
        }

        if name.eq_ignore_ascii_case(CHUNKED) {
            continue;
        }
        candidates.push(Candidate {
            name,
            quality: quality.unwrap_or(1.0),
        });
    }

    if !kind.is_ranked() && candidates.len() > 1 {
        return Err(Error::malformed(kind, "more than one applied coding"));
    }
    Ok(candidates)
}

/// Returns the combined value of every field line of `kind`'s header.
///
/// Several field lines are joined with `", "` as if they had been sent as
/// one list. Returns `None` when the header is absent.
pub fn joined_value(headers: &HeaderMap, kind: HeaderKind) -> Result<Option<Cow<'_, str>>> {
    let mut values = headers.get_all(kind.header_name()).iter();
    let Some(first) = values.next() else {
        return Ok(None);
    };
    let first = to_str(first, kind)?;
    let mut joined: Option<String> = None;
    for value in values {
        let value = to_str(value, kind)?;
        let joined = joined.get_or_insert_with(|| first.to_owned());
        joined.push_str(", ");
        joined.push_str(value);
    }
    Ok(Some(joined.map_or(Cow::Borrowed(first), Cow::Owned)))
}

fn to_str(value: &http::HeaderValue, kind: HeaderKind) -> Result<&str> {
    value
        .to_str()
        .map_err(|_| Error::malformed(kind, "value is not visible ASCII"))
}

/// `DIGIT+ [ "." DIGIT* ]`, within `[0, 1]`.
fn parse_quality(value: &str) -> Option<f32> {
    let (int, frac) = value.split_once('.').unwrap_or((value, ""));
    if int.is_empty() || !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let positive = frac.bytes().any(|b| b != b'0');
    match (int.trim_start_matches('0'), positive) {
        ("", false) => Some(0.0),
        ("1", false) => Some(1.0),
        ("", true) => {
            let quality: f32 = value.parse().ok()?;
            // Below f32 precision, but still acceptable
            Some(quality.max(f32::MIN_POSITIVE))
        }
        _ => None,
    }
}

fn trim_ows(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
