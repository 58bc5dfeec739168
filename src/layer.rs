use crate::registry::{CompressRegistry, DecompressRegistry};
use crate::service::{CompressionService, RequestDecompressionService};
use std::sync::Arc;
use tower::Layer;

/// Default minimum body size for compression (approximately 1 MTU).
pub const DEFAULT_MIN_SIZE: usize = 860;

/// A Tower layer that compresses HTTP response bodies.
///
/// This layer wraps services and compresses response bodies with the
/// coding the client ranks highest in its `Accept-Encoding` header among
/// those in the registry.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    min_size: usize,
    registry: Arc<CompressRegistry>,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// The default minimum size for compression is 860 bytes and the
    /// registry holds the built-in codings.
    pub fn new() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            registry: Arc::new(CompressRegistry::builtin()),
        }
    }

    /// Sets the minimum body size required for compression.
    ///
    /// Responses with a known Content-Length smaller than this value
    /// will not be compressed.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Sets the codings offered to clients, in preference order.
    ///
    /// An empty registry turns compression off.
    pub fn registry(mut self, registry: Arc<CompressRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.min_size, self.registry.clone())
    }
}

/// A Tower layer that decodes compressed HTTP request bodies.
#[derive(Debug, Clone)]
pub struct RequestDecompressionLayer {
    registry: Arc<DecompressRegistry>,
}

impl RequestDecompressionLayer {
    /// Creates a layer accepting the built-in codings.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DecompressRegistry::builtin()))
    }

    /// Creates a layer accepting the codings in `registry`.
    pub fn with_registry(registry: Arc<DecompressRegistry>) -> Self {
        Self { registry }
    }
}

impl Default for RequestDecompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RequestDecompressionLayer {
    type Service = RequestDecompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestDecompressionService::new(inner, self.registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::CodingBody;
    use crate::testing::block_on;
    use bytes::Bytes;
    use http::{Request, Response, header};
    use http_body_util::Full;
    use std::convert::Infallible;
    use tower::{Service, ServiceBuilder, ServiceExt, service_fn};

    type Coded = CodingBody<Full<Bytes>>;

    async fn handler(_req: Request<Coded>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::builder()
            .header(header::CONTENT_LENGTH, "1000")
            .body(Full::new(Bytes::from(vec![b'x'; 1000])))
            .unwrap())
    }

    /// The coding a response to `accept_encoding` comes back with.
    fn encoding<S>(service: &mut S, accept_encoding: &'static str) -> Option<String>
    where
        S: Service<Request<Full<Bytes>>, Response = Response<Coded>, Error = Infallible>,
    {
        let req = Request::builder()
            .header(header::ACCEPT_ENCODING, accept_encoding)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = match block_on(service.ready()) {
            Ok(service) => block_on(service.call(req)),
            Err(never) => match never {},
        };
        let response = match response {
            Ok(response) => response,
            Err(never) => match never {},
        };
        response
            .headers()
            .get(header::CONTENT_ENCODING)
            .map(|v| v.to_str().unwrap().to_owned())
    }

    #[test]
    fn test_stack_with_defaults() {
        let mut service = ServiceBuilder::new()
            .layer(CompressionLayer::new())
            .layer(RequestDecompressionLayer::new())
            .service(service_fn(handler));
        assert_eq!(encoding(&mut service, "gzip").as_deref(), Some("gzip"));
        assert_eq!(
            encoding(&mut service, "deflate").as_deref(),
            Some("deflate")
        );
    }

    #[test]
    fn test_min_size() {
        let mut service = ServiceBuilder::new()
            .layer(CompressionLayer::new().min_size(1001))
            .layer(RequestDecompressionLayer::default())
            .service(service_fn(handler));
        assert_eq!(encoding(&mut service, "gzip"), None);
    }

    #[test]
    fn test_empty_registry_disables_compression() {
        let compression = CompressionLayer::new().registry(Arc::new(CompressRegistry::empty()));
        let decompression =
            RequestDecompressionLayer::with_registry(Arc::new(DecompressRegistry::empty()));
        let mut service = ServiceBuilder::new()
            .layer(compression)
            .layer(decompression)
            .service(service_fn(handler));
        assert_eq!(encoding(&mut service, "gzip, deflate"), None);
    }

    #[test]
    fn test_default_layer() {
        let layer = CompressionLayer::default();
        assert_eq!(layer.min_size, DEFAULT_MIN_SIZE);
        assert_eq!(layer.registry.len(), CompressRegistry::builtin().len());
    }
}
