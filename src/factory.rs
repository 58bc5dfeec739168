use crate::codec::{Algorithm, BuiltinCompressor, BuiltinDecompressor};
use crate::provider::{CompressProvider, DecompressProvider};
use std::fmt;
use std::sync::Arc;

/// Buffer size hint declared by the built-in decompress factories.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// A named constructor of providers, storable in a [`Registry`](crate::Registry).
pub trait Factory {
    /// Canonical coding name of the providers this factory makes.
    fn algorithm(&self) -> &str;

    /// The factory for a built-in algorithm.
    fn builtin(algorithm: Algorithm) -> Self
    where
        Self: Sized;
}

type MakeCompressor = dyn Fn() -> Box<dyn CompressProvider> + Send + Sync;
type MakeDecompressor = dyn Fn() -> Box<dyn DecompressProvider> + Send + Sync;

/// Makes fresh compressors for one coding.
#[derive(Clone)]
pub struct CompressFactory {
    algorithm: String,
    make: Arc<MakeCompressor>,
}

impl CompressFactory {
    /// Creates a factory from a coding name and a constructor.
    pub fn new<F>(algorithm: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> Box<dyn CompressProvider> + Send + Sync + 'static,
    {
        Self {
            algorithm: algorithm.into(),
            make: Arc::new(make),
        }
    }

    /// Constructs a compressor in its pristine state.
    pub fn make_compressor(&self) -> Box<dyn CompressProvider> {
        (self.make)()
    }
}

impl Factory for CompressFactory {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn builtin(algorithm: Algorithm) -> Self {
        Self::new(algorithm.name(), move || {
            Box::new(BuiltinCompressor::new(algorithm))
        })
    }
}

impl fmt::Debug for CompressFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressFactory")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Makes fresh decompressors for one coding.
///
/// The buffer size hint tells a streaming reader how much output space to
/// offer per call.
#[derive(Clone)]
pub struct DecompressFactory {
    algorithm: String,
    buffer_size: usize,
    make: Arc<MakeDecompressor>,
}

impl DecompressFactory {
    /// Creates a factory from a coding name, a buffer size hint and a constructor.
    pub fn new<F>(algorithm: impl Into<String>, buffer_size: usize, make: F) -> Self
    where
        F: Fn() -> Box<dyn DecompressProvider> + Send + Sync + 'static,
    {
        Self {
            algorithm: algorithm.into(),
            buffer_size: buffer_size.max(1),
            make: Arc::new(make),
        }
    }

    /// Output buffer size a reader should use with this coding.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Constructs a decompressor in its pristine state.
    pub fn make_decompressor(&self) -> Box<dyn DecompressProvider> {
        (self.make)()
    }
}

impl Factory for DecompressFactory {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn builtin(algorithm: Algorithm) -> Self {
        Self::new(algorithm.name(), DEFAULT_BUFFER_SIZE, move || {
            Box::new(BuiltinDecompressor::new(algorithm))
        })
    }
}

impl fmt::Debug for DecompressFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompressFactory")
            .field("algorithm", &self.algorithm)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}
