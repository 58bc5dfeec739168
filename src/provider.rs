use crate::error::{Error, Result};
use std::any::Any;
use std::future::{self, Ready};
use std::panic::{self, AssertUnwindSafe};

/// Tells a provider whether more input follows the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationHint {
    /// More input will be offered after this call.
    HasMore,
    /// This call carries the final input of the stream.
    IsLast,
}

/// Outcome of a single compress or decompress call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationResult {
    /// Bytes taken from the front of the input slice.
    pub input_bytes_processed: usize,
    /// Bytes written to the front of the output slice.
    pub output_bytes_produced: usize,
    /// Whether the stream is complete.
    pub done: bool,
}

impl OperationResult {
    /// The result every call returns once a provider has finished.
    pub const fn finished() -> Self {
        Self {
            input_bytes_processed: 0,
            output_bytes_produced: 0,
            done: true,
        }
    }
}

/// Future returned by the asynchronous codec calls.
///
/// The codec work runs synchronously inside the call, so the future is
/// already resolved when it is returned.
pub type CodecFuture = Ready<Result<OperationResult>>;

/// An incremental encoder for one content-coding and one stream.
///
/// A compressor may be driven with any partition of its input and any size
/// of output buffer; the concatenated output is the same as one call with
/// all input and unlimited space would produce. `done` is only reported on
/// an [`OperationHint::IsLast`] call that consumed all of its input and
/// emitted the coding's trailer. Once done, every call is a no-op returning
/// [`OperationResult::finished`] until [`reset`](Self::reset).
pub trait CompressProvider: Send {
    /// Canonical coding name, e.g. `gzip`.
    fn algorithm(&self) -> &str;

    /// Encodes as much of `input` into `output` as fits.
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> Result<OperationResult>;

    /// Discards all stream state so the provider can encode a new stream.
    fn reset(&mut self);

    /// Runs [`compress`](Self::compress) and delivers its outcome through a future.
    ///
    /// A panic inside the call is caught and delivered as
    /// [`Error::ProviderPanic`].
    fn compress_async(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> CodecFuture {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.compress(input, output, hint)));
        let result = result.unwrap_or_else(|payload| Err(panicked(self.algorithm(), payload)));
        future::ready(result)
    }
}

/// An incremental decoder for one content-coding and one stream.
///
/// `done` is reported as soon as the decoder has recognized the end of its
/// framing and handed out all decoded bytes, regardless of the hint. Corrupt
/// or truncated input is reported as [`Error::Decode`]; after that the
/// decoder stays failed until [`reset`](Self::reset).
pub trait DecompressProvider: Send {
    /// Canonical coding name, e.g. `gzip`.
    fn algorithm(&self) -> &str;

    /// Decodes as much of `input` into `output` as fits.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> Result<OperationResult>;

    /// Discards all stream state so the provider can decode a new stream.
    fn reset(&mut self);

    /// Runs [`decompress`](Self::decompress) and delivers its outcome through a future.
    ///
    /// A panic inside the call is caught and delivered as
    /// [`Error::ProviderPanic`].
    fn decompress_async(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> CodecFuture {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.decompress(input, output, hint)));
        let result = result.unwrap_or_else(|payload| Err(panicked(self.algorithm(), payload)));
        future::ready(result)
    }
}

fn panicked(algorithm: &str, payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    };
    Error::ProviderPanic {
        algorithm: algorithm.to_owned(),
        message,
    }
}
