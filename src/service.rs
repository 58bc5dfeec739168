use crate::body::CodingBody;
use crate::factory::CompressFactory;
use crate::future::ResponseFuture;
use crate::header::HeaderKind;
use crate::message;
use crate::registry::{CompressRegistry, DecompressRegistry};
use http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that compresses HTTP response bodies.
#[derive(Debug, Clone)]
pub struct CompressionService<S> {
    inner: S,
    min_size: usize,
    registry: Arc<CompressRegistry>,
}

impl<S> CompressionService<S> {
    /// Creates a new compression service wrapping the given inner service.
    pub fn new(inner: S, min_size: usize, registry: Arc<CompressRegistry>) -> Self {
        Self {
            inner,
            min_size,
            registry,
        }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Picks the compressor factory for a request's `Accept-Encoding`.
    fn accepted(&self, headers: &http::HeaderMap) -> Option<CompressFactory> {
        match message::resolve_headers(headers, HeaderKind::AcceptEncoding, &*self.registry) {
            Ok(factory) => factory.cloned(),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring accept-encoding");
                None
            }
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = http::Response<CodingBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let accepted = self.accepted(req.headers());
        let inner = self.inner.call(req);

        ResponseFuture::new(inner, accepted, self.min_size)
    }
}

/// A Tower service that decodes compressed HTTP request bodies.
///
/// Requests whose coding is malformed or unsupported still reach the inner
/// service, with a body that fails when read.
#[derive(Debug, Clone)]
pub struct RequestDecompressionService<S> {
    inner: S,
    registry: Arc<DecompressRegistry>,
}

impl<S> RequestDecompressionService<S> {
    /// Creates a new decompression service wrapping the given inner service.
    pub fn new(inner: S, registry: Arc<DecompressRegistry>) -> Self {
        Self { inner, registry }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for RequestDecompressionService<S>
where
    S: Service<Request<CodingBody<ReqBody>>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let req = message::decompress_request(req, &self.registry);
        self.inner.call(req)
    }
}
