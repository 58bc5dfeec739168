use crate::error::Error;
use crate::provider::{CompressProvider, DecompressProvider, OperationHint, OperationResult};
use bytes::{Buf, Bytes, BytesMut};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

pin_project! {
    /// A message body that may be encoded or decoded on the fly.
    ///
    /// This type wraps an inner body and either runs every data frame
    /// through one provider or passes it through unchanged.
    #[project = CodingBodyProj]
    #[allow(missing_docs)]
    pub enum CodingBody<B> {
        /// Body compressed by a provider.
        Compressed {
            #[pin]
            inner: B,
            state: CodingState,
        },
        /// Body decompressed by a provider.
        Decompressed {
            #[pin]
            inner: B,
            state: CodingState,
        },
        /// Body without coding.
        Passthrough {
            #[pin]
            inner: B,
        },
        /// Body whose coding could not be negotiated.
        Rejected {
            error: Option<Error>,
        },
    }
}

/// The provider driving a coded body.
enum Coder {
    Compress(Box<dyn CompressProvider>),
    Decompress(Box<dyn DecompressProvider>),
}

impl Coder {
    fn algorithm(&self) -> &str {
        match self {
            Coder::Compress(p) => p.algorithm(),
            Coder::Decompress(p) => p.algorithm(),
        }
    }

    fn call(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        hint: OperationHint,
    ) -> crate::Result<OperationResult> {
        match self {
            Coder::Compress(p) => p.compress(input, output, hint),
            Coder::Decompress(p) => p.decompress(input, output, hint),
        }
    }

    /// Error for a provider that stopped making progress before `done`.
    fn stalled(&self) -> Error {
        match self {
            Coder::Compress(p) => Error::encode(
                p.algorithm(),
                io::Error::new(io::ErrorKind::WriteZero, "encoder made no progress"),
            ),
            Coder::Decompress(p) => Error::decode(
                p.algorithm(),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended before the end of its coding",
                ),
            ),
        }
    }
}

/// State and buffers for an actively coded body.
pub(crate) struct CodingState {
    coder: Coder,
    output_buffer: Vec<u8>,
    state: CodeState,
    finished: bool,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeState {
    /// Reading data from inner body and coding it.
    Reading,
    /// Draining the provider after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Coding is complete.
    Done,
}

impl CodingState {
    fn new(coder: Coder, buffer_size: usize) -> Self {
        Self {
            coder,
            output_buffer: vec![0u8; buffer_size.max(1)],
            state: CodeState::Reading,
            finished: false,
            pending_trailers: None,
        }
    }

    /// Returns the current coding state.
    pub(crate) fn state(&self) -> CodeState {
        self.state
    }

    /// Returns the algorithm of the driving provider.
    pub(crate) fn algorithm(&self) -> &str {
        self.coder.algorithm()
    }

    fn after_finish(&self) -> CodeState {
        if self.pending_trailers.is_some() {
            CodeState::Trailers
        } else {
            CodeState::Done
        }
    }

    /// Polls the inner body and codes its data.
    fn poll_coded<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                CodeState::Done => return Poll::Ready(None),

                CodeState::Trailers => {
                    self.state = CodeState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                    return Poll::Ready(None);
                }

                CodeState::Finishing => {
                    let output = &mut self.output_buffer;
                    let r = match self.coder.call(&[], output, OperationHint::IsLast) {
                        Ok(r) => r,
                        Err(e) => return self.fail(e),
                    };
                    if r.done {
                        self.finished = true;
                        self.state = self.after_finish();
                    } else if r.output_bytes_produced == 0 {
                        return self.fail(self.coder.stalled());
                    }
                    if r.output_bytes_produced > 0 {
                        let output = &self.output_buffer[..r.output_bytes_produced];
                        let data = Bytes::copy_from_slice(output);
                        return Poll::Ready(Some(Ok(Frame::data(data))));
                    }
                }

                CodeState::Reading => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = CodeState::Finishing;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        self.state = CodeState::Done;
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => match self.code_chunk(&mut data) {
                            Ok(output) if output.is_empty() => continue,
                            Ok(output) => return Poll::Ready(Some(Ok(Frame::data(output)))),
                            Err(e) => return self.fail(e),
                        },
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Finish coding before the trailers go out
                                self.pending_trailers = Some(trailers);
                                self.state = CodeState::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }

    /// Runs every chunk of one data frame through the provider.
    fn code_chunk<D: Buf>(&mut self, data: &mut D) -> Result<Bytes, Error> {
        let mut all_output = BytesMut::new();
        while data.has_remaining() {
            let input = data.chunk();
            let len = input.len();
            if self.finished {
                tracing::debug!(
                    algorithm = self.coder.algorithm(),
                    discarded = data.remaining(),
                    "discarding bytes after the end of the coded stream"
                );
                data.advance(data.remaining());
                break;
            }

            let mut consumed = 0;
            loop {
                let r = self.coder.call(
                    &input[consumed..],
                    &mut self.output_buffer,
                    OperationHint::HasMore,
                )?;
                consumed += r.input_bytes_processed;
                all_output.extend_from_slice(&self.output_buffer[..r.output_bytes_produced]);
                if r.done {
                    self.finished = true;
                    break;
                }
                if consumed == len && r.output_bytes_produced < self.output_buffer.len() {
                    break;
                }
                if r.input_bytes_processed == 0 && r.output_bytes_produced == 0 {
                    if consumed == len {
                        break;
                    }
                    return Err(self.coder.stalled());
                }
            }
            data.advance(consumed);
        }
        tracing::trace!(
            algorithm = self.coder.algorithm(),
            produced = all_output.len(),
            "coded data frame"
        );
        Ok(all_output.freeze())
    }

    fn fail(&mut self, error: Error) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.state = CodeState::Done;
        Poll::Ready(Some(Err(error.into())))
    }
}

impl<B> CodingBody<B> {
    /// Creates a body compressed by `compressor`.
    pub fn compressed(inner: B, compressor: Box<dyn CompressProvider>) -> Self {
        Self::Compressed {
            inner,
            state: CodingState::new(Coder::Compress(compressor), OUTPUT_BUFFER_SIZE),
        }
    }

    /// Creates a body decompressed by `decompressor`, decoding into
    /// `buffer_size`-byte frames.
    ///
    /// Bytes that follow the end of the coded stream are discarded. An inner
    /// body that ends early yields an [`io::ErrorKind::UnexpectedEof`] error.
    pub fn decompressed(
        inner: B,
        decompressor: Box<dyn DecompressProvider>,
        buffer_size: usize,
    ) -> Self {
        Self::Decompressed {
            inner,
            state: CodingState::new(Coder::Decompress(decompressor), buffer_size),
        }
    }

    /// Creates a passthrough body without coding.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }

    /// Creates a body that fails with `error` when first polled.
    pub fn rejected(error: Error) -> Self {
        Self::Rejected { error: Some(error) }
    }

    /// The coding applied to the inner body, if any.
    pub fn algorithm(&self) -> Option<&str> {
        match self {
            CodingBody::Compressed { state, .. } | CodingBody::Decompressed { state, .. } => {
                Some(state.algorithm())
            }
            CodingBody::Passthrough { .. } | CodingBody::Rejected { .. } => None,
        }
    }
}

impl<B> Body for CodingBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CodingBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            CodingBodyProj::Compressed { inner, state }
            | CodingBodyProj::Decompressed { inner, state } => state.poll_coded(cx, inner),
            CodingBodyProj::Rejected { error } => Poll::Ready(error.take().map(|e| Err(e.into()))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CodingBody::Passthrough { inner } => inner.is_end_stream(),
            CodingBody::Compressed { state, .. } | CodingBody::Decompressed { state, .. } => {
                state.state() == CodeState::Done
            }
            CodingBody::Rejected { error } => error.is_none(),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            CodingBody::Passthrough { inner } => inner.size_hint(),
            // Coded size is unknown
            CodingBody::Compressed { .. } | CodingBody::Decompressed { .. } => {
                http_body::SizeHint::default()
            }
            CodingBody::Rejected { .. } => http_body::SizeHint::with_exact(0),
        }
    }
}
