//! HTTP content-coding negotiation and streaming compression.
//!
//! This crate parses the four headers that name content-codings, picks a
//! coding by quality ranking against a registry of codec factories, and
//! drives incremental compress/decompress providers over message bodies.
//!
//! # Example
//!
//! ```ignore
//! use http_content_coding::{CompressionLayer, RequestDecompressionLayer};
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::new())
//!     .layer(RequestDecompressionLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Header Grammar
//!
//! - `Content-Encoding` and `Transfer-Encoding` carry at most one coding
//!   besides `chunked`, without quality values
//! - `Accept-Encoding` and `TE` carry a ranked list; `q=0` excludes a coding
//!   and `*` stands for every coding not listed
//! - Empty list elements and qualities outside `[0, 1]` are malformed
//!
//! # Compression Rules
//!
//! The middleware will **not** compress responses when:
//! - No registered coding is acceptable to the client
//! - `Content-Encoding` header is already set
//! - `Content-Range` header is present (range responses)
//! - `Content-Type` starts with `image/` (except `image/svg+xml`)
//! - `Content-Type` starts with `application/grpc` (except `application/grpc-web`)
//! - The response is streamed: `X-Accel-Buffering: no`, `text/event-stream`
//!   or `application/grpc-web`
//! - `Content-Length` is below the minimum size threshold (default: 860 bytes)
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to the coding used
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Accept-Ranges` header is removed
//! - `Vary` header includes `Accept-Encoding`

#![deny(missing_docs)]

mod body;
mod codec;
mod error;
mod factory;
mod future;
pub mod header;
mod layer;
pub mod message;
pub mod negotiate;
mod provider;
mod registry;
mod service;
#[cfg(test)]
mod testing;

pub use body::CodingBody;
pub use codec::{Algorithm, BuiltinCompressor, BuiltinDecompressor, BuiltinSupport};
pub use error::{Error, Result};
pub use factory::{CompressFactory, DEFAULT_BUFFER_SIZE, DecompressFactory, Factory};
pub use future::ResponseFuture;
pub use header::{Candidate, HeaderKind};
pub use layer::{CompressionLayer, DEFAULT_MIN_SIZE, RequestDecompressionLayer};
pub use provider::{
    CodecFuture, CompressProvider, DecompressProvider, OperationHint, OperationResult,
};
pub use registry::{CompressRegistry, DecompressRegistry, Registry};
pub use service::{CompressionService, RequestDecompressionService};
