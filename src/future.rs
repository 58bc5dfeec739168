use crate::body::CodingBody;
use crate::factory::{CompressFactory, Factory};
use http::{Response, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Future for compression service responses.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        accepted: Option<CompressFactory>,
        min_size: usize,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(inner: F, accepted: Option<CompressFactory>, min_size: usize) -> Self {
        Self {
            inner,
            accepted,
            min_size,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<CodingBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => {
                let response = wrap_response(response, this.accepted.as_ref(), *this.min_size);
                Poll::Ready(Ok(response))
            }
        }
    }
}

/// Wraps the response body with compression if appropriate.
fn wrap_response<B>(
    response: Response<B>,
    accepted: Option<&CompressFactory>,
    min_size: usize,
) -> Response<CodingBody<B>> {
    let (mut parts, body) = response.into_parts();

    // Determine if we should compress
    let factory = accepted.filter(|_| {
        !has_content_encoding(&parts.headers)
            && !has_content_range(&parts.headers)
            && !is_uncompressible_content_type(&parts.headers)
            && !is_streaming(&parts.headers)
            && !is_below_min_size(&parts.headers, min_size)
    });
    let Some(factory) = factory else {
        return Response::from_parts(parts, CodingBody::passthrough(body));
    };
    let Ok(value) = header::HeaderValue::from_str(factory.algorithm()) else {
        tracing::warn!(
            algorithm = factory.algorithm(),
            "coding name is not a valid header value, sending identity"
        );
        return Response::from_parts(parts, CodingBody::passthrough(body));
    };
    tracing::debug!(algorithm = factory.algorithm(), "compressing response");

    parts.headers.insert(header::CONTENT_ENCODING, value);

    // Remove Content-Length since compressed size is unknown
    parts.headers.remove(header::CONTENT_LENGTH);

    // Remove Accept-Ranges since we can't support ranges on compressed content
    parts.headers.remove(header::ACCEPT_RANGES);

    add_vary_accept_encoding(&mut parts.headers);

    let body = CodingBody::compressed(body, factory.make_compressor());
    Response::from_parts(parts, body)
}

/// Checks if Content-Encoding header is already present.
fn has_content_encoding(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_ENCODING)
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &header::HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}

fn content_type(headers: &header::HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Checks if the content type should not be compressed.
fn is_uncompressible_content_type(headers: &header::HeaderMap) -> bool {
    let Some(content_type) = content_type(headers) else {
        return false;
    };

    // Skip all images except SVG
    if content_type.starts_with("image/") {
        return !content_type.starts_with("image/svg+xml");
    }

    // Skip gRPC except grpc-web
    if content_type.starts_with("application/grpc") {
        return !content_type.starts_with("application/grpc-web");
    }

    false
}

/// Checks if the response is streamed to the client as it is produced.
///
/// Providers have no flush, so these go out uncompressed.
fn is_streaming(headers: &header::HeaderMap) -> bool {
    let unbuffered = headers
        .get("x-accel-buffering")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("no"));
    unbuffered
        || content_type(headers).is_some_and(|ct| {
            ct.starts_with("text/event-stream") || ct.starts_with("application/grpc-web")
        })
}

/// Checks if Content-Length is below the minimum size.
fn is_below_min_size(headers: &header::HeaderMap, min_size: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len < min_size)
}
