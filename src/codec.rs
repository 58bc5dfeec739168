use crate::error::{Error, Result};
use crate::provider::{CompressProvider, DecompressProvider, OperationHint, OperationResult};
#[cfg(feature = "brotli")]
use compression_codecs::brotli::{
    BrotliDecoder, BrotliEncoder, params::EncoderParams as BrotliParams,
};
use compression_codecs::{
    DecodeV2, EncodeV2,
    gzip::{GzipDecoder, GzipEncoder},
    zlib::{ZlibDecoder, ZlibEncoder},
};
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::io;
use std::sync::OnceLock;

/// Content-codings implemented by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Gzip (RFC 1952).
    Gzip,
    /// Zlib-wrapped DEFLATE, the HTTP `deflate` coding (RFC 1950).
    Deflate,
    /// Brotli (RFC 7932).
    #[cfg(feature = "brotli")]
    Brotli,
}

impl Algorithm {
    /// Canonical coding name as it appears in HTTP headers.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
            #[cfg(feature = "brotli")]
            Algorithm::Brotli => "br",
        }
    }

    /// Looks up a compiled-in algorithm by coding name, ignoring case.
    pub fn from_name(name: &str) -> Option<Algorithm> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("gzip") || name.eq_ignore_ascii_case("x-gzip") {
            return Some(Algorithm::Gzip);
        }
        if name.eq_ignore_ascii_case("deflate") {
            return Some(Algorithm::Deflate);
        }
        #[cfg(feature = "brotli")]
        if name.eq_ignore_ascii_case("br") || name.eq_ignore_ascii_case("brotli") {
            return Some(Algorithm::Brotli);
        }
        None
    }

    /// Whether the algorithm is usable in this process.
    pub fn supported(&self) -> bool {
        BuiltinSupport::detect().supports(*self)
    }

    /// Creates a new encoder for this algorithm.
    fn encoder(&self) -> Box<dyn EncodeV2 + Send> {
        match self {
            Algorithm::Gzip => Box::new(GzipEncoder::new(Level::Default.into())),
            Algorithm::Deflate => Box::new(ZlibEncoder::new(Level::Default.into())),
            #[cfg(feature = "brotli")]
            Algorithm::Brotli => Box::new(BrotliEncoder::new(BrotliParams::default())),
        }
    }

    /// Creates a new decoder for this algorithm.
    fn decoder(&self) -> Box<dyn DecodeV2 + Send> {
        match self {
            Algorithm::Gzip => Box::new(GzipDecoder::new()),
            Algorithm::Deflate => Box::new(ZlibDecoder::new()),
            #[cfg(feature = "brotli")]
            Algorithm::Brotli => Box::new(BrotliDecoder::new()),
        }
    }
}

/// Which built-in algorithms the running process can use.
///
/// `gzip` and `deflate` are always available. The optional codec is checked
/// once per process; see [`BuiltinSupport::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSupport {
    /// Whether `br` passed its availability check.
    pub brotli: bool,
}

static DETECTED: OnceLock<BuiltinSupport> = OnceLock::new();

impl BuiltinSupport {
    /// Returns the process-wide capability set, checking on first use.
    pub fn detect() -> &'static BuiltinSupport {
        DETECTED.get_or_init(|| {
            let support = BuiltinSupport {
                brotli: brotli_round_trips(),
            };
            tracing::debug!(brotli = support.brotli, "checked built-in content-codings");
            support
        })
    }

    /// A capability set with only the mandatory algorithms.
    pub const fn mandatory() -> BuiltinSupport {
        BuiltinSupport { brotli: false }
    }

    /// Whether `algorithm` is usable under this capability set.
    pub fn supports(&self, algorithm: Algorithm) -> bool {
        match algorithm {
            Algorithm::Gzip | Algorithm::Deflate => true,
            #[cfg(feature = "brotli")]
            Algorithm::Brotli => self.brotli,
        }
    }

    /// Usable algorithms in preference order.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms = vec![Algorithm::Gzip, Algorithm::Deflate];
        #[cfg(feature = "brotli")]
        if self.brotli {
            algorithms.push(Algorithm::Brotli);
        }
        algorithms
    }
}

#[cfg(feature = "brotli")]
fn brotli_round_trips() -> bool {
    const SAMPLE: &[u8] = b"content-coding sample";
    let mut compressed = [0u8; 256];
    let mut restored = [0u8; 64];

    let mut encoder = BuiltinCompressor::new(Algorithm::Brotli);
    let Ok(c) = encoder.compress(SAMPLE, &mut compressed, OperationHint::IsLast) else {
        return false;
    };
    let mut decoder = BuiltinDecompressor::new(Algorithm::Brotli);
    let Ok(d) = decoder.decompress(
        &compressed[..c.output_bytes_produced],
        &mut restored,
        OperationHint::IsLast,
    ) else {
        return false;
    };
    c.done && d.done && &restored[..d.output_bytes_produced] == SAMPLE
}

#[cfg(not(feature = "brotli"))]
fn brotli_round_trips() -> bool {
    false
}

/// Built-in compressor backed by `compression-codecs`.
pub struct BuiltinCompressor {
    algorithm: Algorithm,
    encoder: Box<dyn EncodeV2 + Send>,
    done: bool,
}

impl BuiltinCompressor {
    /// Creates a compressor in its pristine state.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            encoder: algorithm.encoder(),
            done: false,
        }
    }

    fn encode(
        &mut self,
        input: &mut PartialBuffer<&[u8]>,
        output: &mut WriteBuffer<'_>,
        input_len: usize,
        output_len: usize,
        hint: OperationHint,
    ) -> io::Result<()> {
        // Keep encoding until the input is consumed or the output is full
        while input.written_len() < input_len && output.written_len() < output_len {
            let (consumed, produced) = (input.written_len(), output.written_len());
            self.encoder.encode(input, output)?;
            if input.written_len() == consumed && output.written_len() == produced {
                break;
            }
        }

        if hint != OperationHint::IsLast || input.written_len() < input_len {
            return Ok(());
        }

        // Emit the trailer while there is room for it
        while output.written_len() < output_len {
            let produced = output.written_len();
            if self.encoder.finish(output)? {
                self.done = true;
                break;
            }
            if output.written_len() == produced {
                break;
            }
        }
        Ok(())
    }
}

impl CompressProvider for BuiltinCompressor {
    fn algorithm(&self) -> &str {
        self.algorithm.name()
    }

    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> Result<OperationResult> {
        if self.done {
            return Ok(OperationResult::finished());
        }

        let (input_len, output_len) = (input.len(), output.len());
        let mut input_buf = PartialBuffer::new(input);
        let mut output_buf = WriteBuffer::new_initialized(output);

        self.encode(&mut input_buf, &mut output_buf, input_len, output_len, hint)
            .map_err(|e| Error::encode(self.algorithm.name(), e))?;

        let result = OperationResult {
            input_bytes_processed: input_buf.written_len(),
            output_bytes_produced: output_buf.written_len(),
            done: self.done,
        };
        tracing::trace!(
            algorithm = self.algorithm.name(),
            consumed = result.input_bytes_processed,
            produced = result.output_bytes_produced,
            done = result.done,
            "compress"
        );
        Ok(result)
    }

    fn reset(&mut self) {
        self.encoder = self.algorithm.encoder();
        self.done = false;
    }
}

/// State machine for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Feeding input to the decoder.
    Decoding,
    /// The decoder saw the end of its framing; flushing what it holds.
    Finishing,
    /// All output has been handed out.
    Done,
    /// A previous call hit corrupt input.
    Failed,
}

/// Built-in decompressor backed by `compression-codecs`.
pub struct BuiltinDecompressor {
    algorithm: Algorithm,
    decoder: Box<dyn DecodeV2 + Send>,
    state: DecodeState,
    // The last decode filled the output, so the decoder may still hold output.
    pending: bool,
}

impl BuiltinDecompressor {
    /// Creates a decompressor in its pristine state.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            decoder: algorithm.decoder(),
            state: DecodeState::Decoding,
            pending: false,
        }
    }

    fn decode(
        &mut self,
        input: &mut PartialBuffer<&[u8]>,
        output: &mut WriteBuffer<'_>,
        input_len: usize,
        output_len: usize,
    ) -> io::Result<()> {
        loop {
            match self.state {
                DecodeState::Decoding => {
                    let (consumed, produced) = (input.written_len(), output.written_len());
                    let drain_only = consumed == input_len;
                    if drain_only && !(self.pending && produced < output_len) {
                        return Ok(());
                    }

                    let ended = match self.decoder.decode(input, output) {
                        Ok(ended) => ended,
                        // Draining without input ends in an error once the decoder
                        // wants more; whatever it wrote before that still counts
                        Err(e) if drain_only => {
                            tracing::trace!(
                                algorithm = self.algorithm.name(),
                                produced = output.written_len() - produced,
                                error = %e,
                                "decoder drained"
                            );
                            self.pending = output.written_len() == output_len;
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    };
                    self.pending = output.written_len() == output_len;

                    if ended {
                        self.state = DecodeState::Finishing;
                    } else if input.written_len() == consumed && output.written_len() == produced {
                        return Ok(());
                    }
                }
                DecodeState::Finishing => {
                    let produced = output.written_len();
                    if self.decoder.finish(output)? {
                        self.state = DecodeState::Done;
                    } else if output.written_len() == produced {
                        return Ok(());
                    }
                }
                DecodeState::Done | DecodeState::Failed => return Ok(()),
            }
        }
    }
}

impl DecompressProvider for BuiltinDecompressor {
    fn algorithm(&self) -> &str {
        self.algorithm.name()
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        _hint: OperationHint,
    ) -> Result<OperationResult> {
        match self.state {
            DecodeState::Done => return Ok(OperationResult::finished()),
            DecodeState::Failed => {
                return Err(Error::decode(
                    self.algorithm.name(),
                    io::Error::other("decoder must be reset after a failure"),
                ));
            }
            DecodeState::Decoding | DecodeState::Finishing => {}
        }

        let (input_len, output_len) = (input.len(), output.len());
        let mut input_buf = PartialBuffer::new(input);
        let mut output_buf = WriteBuffer::new_initialized(output);

        if let Err(e) = self.decode(&mut input_buf, &mut output_buf, input_len, output_len) {
            self.state = DecodeState::Failed;
            return Err(Error::decode(self.algorithm.name(), e));
        }

        let result = OperationResult {
            input_bytes_processed: input_buf.written_len(),
            output_bytes_produced: output_buf.written_len(),
            done: self.state == DecodeState::Done,
        };
        tracing::trace!(
            algorithm = self.algorithm.name(),
            consumed = result.input_bytes_processed,
            produced = result.output_bytes_produced,
            done = result.done,
            "decompress"
        );
        Ok(result)
    }

    fn reset(&mut self) {
        self.decoder = self.algorithm.decoder();
        self.state = DecodeState::Decoding;
        self.pending = false;
    }
}
