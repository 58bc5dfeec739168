//! Applying negotiated codings to whole `http` messages.
//!
//! These helpers cover both ends of a connection: decoding a message by the
//! coding its headers declare, compressing an outgoing request, and
//! advertising which codings this side can decode.

use crate::body::CodingBody;
use crate::error::{Error, Result};
use crate::factory::{DecompressFactory, Factory};
use crate::header::{self, HeaderKind};
use crate::negotiate;
use crate::provider::CompressProvider;
use crate::registry::{DecompressRegistry, Registry};
use http::header::{CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue, Request, Response};

/// Finds the decoder for the coding a message declares.
///
/// `Content-Encoding` is consulted first; `Transfer-Encoding` only when
/// `Content-Encoding` names no coding. Returns the header the coding was
/// read from along with its factory.
pub fn decoder_for_headers<'r>(
    headers: &HeaderMap,
    registry: &'r DecompressRegistry,
) -> Result<Option<(HeaderKind, &'r DecompressFactory)>> {
    for kind in [HeaderKind::ContentEncoding, HeaderKind::TransferEncoding] {
        if let Some(factory) = resolve_headers(headers, kind, registry)? {
            return Ok(Some((kind, factory)));
        }
    }
    Ok(None)
}

/// Resolves every field line of `kind`'s header against `registry`.
pub fn resolve_headers<'r, F: Factory>(
    headers: &HeaderMap,
    kind: HeaderKind,
    registry: &'r Registry<F>,
) -> Result<Option<&'r F>> {
    match header::joined_value(headers, kind)? {
        Some(value) => negotiate::resolve(&value, kind, registry),
        None => Ok(None),
    }
}

/// Wraps `body` in the decoder `headers` call for, removing the headers
/// that no longer describe the decoded body.
fn decode<B>(
    headers: &mut HeaderMap,
    body: B,
    registry: &DecompressRegistry,
) -> Result<CodingBody<B>> {
    let Some((kind, factory)) = decoder_for_headers(headers, registry)? else {
        return Ok(CodingBody::passthrough(body));
    };
    tracing::debug!(%kind, algorithm = factory.algorithm(), "decoding message body");
    headers.remove(kind.header_name());
    headers.remove(CONTENT_LENGTH);
    let (decompressor, buffer_size) = (factory.make_decompressor(), factory.buffer_size());
    Ok(CodingBody::decompressed(body, decompressor, buffer_size))
}

/// Decodes a response body by the coding its headers declare.
///
/// The consumed coding header and `Content-Length` are removed. A malformed
/// or unsupported coding fails the whole response.
pub fn decompress_response<B>(
    response: Response<B>,
    registry: &DecompressRegistry,
) -> Result<Response<CodingBody<B>>> {
    let (mut parts, body) = response.into_parts();
    let body = decode(&mut parts.headers, body, registry)?;
    Ok(Response::from_parts(parts, body))
}

/// Decodes a request body by the coding its headers declare.
///
/// A malformed or unsupported coding yields a body that fails when read, so
/// the handler reading it sees the error.
pub fn decompress_request<B>(
    request: Request<B>,
    registry: &DecompressRegistry,
) -> Request<CodingBody<B>> {
    let (mut parts, body) = request.into_parts();
    let body = decode(&mut parts.headers, body, registry).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "rejecting request body");
        CodingBody::rejected(err)
    });
    Request::from_parts(parts, body)
}

/// Compresses a request body with `compressor`.
///
/// The coding is appended to any `Content-Encoding` already present and
/// `Content-Length` is removed.
pub fn compress_request<B>(
    request: Request<B>,
    compressor: Box<dyn CompressProvider>,
) -> Result<Request<CodingBody<B>>> {
    let algorithm = compressor.algorithm();
    let Ok(value) = HeaderValue::from_str(algorithm) else {
        let reason = format!("coding `{algorithm}` is not a valid header value");
        return Err(Error::malformed(HeaderKind::ContentEncoding, reason));
    };
    let (mut parts, body) = request.into_parts();
    parts.headers.append(CONTENT_ENCODING, value);
    parts.headers.remove(CONTENT_LENGTH);
    let body = CodingBody::compressed(body, compressor);
    Ok(Request::from_parts(parts, body))
}

/// Advertises the codings in `registry` through `kind`'s header.
///
/// `TE` also needs a `Connection: TE` option so intermediaries do not
/// forward it. An empty registry leaves `headers` untouched.
pub fn advertise<F: Factory>(
    headers: &mut HeaderMap,
    kind: HeaderKind,
    registry: &Registry<F>,
) -> Result<()> {
    let value = negotiate::build_supported_header(kind, registry)?;
    if value.is_empty() {
        return Ok(());
    }
    let Ok(header_value) = HeaderValue::from_str(&value) else {
        let reason = format!("`{value}` is not a valid header value");
        return Err(Error::malformed(kind, reason));
    };
    headers.insert(kind.header_name(), header_value);

    if kind == HeaderKind::Te && !has_connection_option(headers, "te") {
        headers.append(CONNECTION, HeaderValue::from_static("te"));
    }
    Ok(())
}

fn has_connection_option(headers: &HeaderMap, option: &str) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case(option))
}
