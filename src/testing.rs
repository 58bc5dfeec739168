//! Test support shared by the unit tests of several modules.

use crate::error::{Error, Result};
use crate::provider::{CompressProvider, DecompressProvider, OperationHint, OperationResult};
use std::future::Future;
use std::io;
use std::pin::pin;
use std::task::{Context, Poll, Waker};

/// Name of the pass-through coding implemented by [`FakeProvider`].
pub(crate) const FAKE: &str = "fake";

/// Pass-through coder that copies bytes and knows the stream length up front.
///
/// Offering more bytes than the declared length is an error, which lets
/// tests detect callers that re-feed consumed input.
pub(crate) struct FakeProvider {
    name: &'static str,
    size: Option<usize>,
    so_far: usize,
    done: bool,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::named(FAKE)
    }

    pub(crate) fn named(name: &'static str) -> Self {
        Self {
            name,
            size: None,
            so_far: 0,
            done: false,
        }
    }

    pub(crate) fn with_size(size: usize) -> Self {
        Self {
            size: Some(size),
            ..Self::new()
        }
    }

    fn copy(&mut self, input: &[u8], output: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.map_or(0, |size| size - self.so_far);
        if self.size.is_none() || input.len() > remaining {
            return Err(io::Error::other(format!(
                "invalid data {}, {} with {} / {:?}",
                input.len(),
                output.len(),
                self.so_far,
                self.size
            )));
        }
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.so_far += n;
        Ok(n)
    }
}

impl CompressProvider for FakeProvider {
    fn algorithm(&self) -> &str {
        self.name
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
        let n = self
            .copy(input, output)
            .map_err(|e| Error::encode(self.name, e))?;
        self.done = hint == OperationHint::IsLast && Some(self.so_far) == self.size;
        Ok(OperationResult {
            input_bytes_processed: n,
            output_bytes_produced: n,
            done: self.done,
        })
    }

    fn reset(&mut self) {
        self.so_far = 0;
        self.done = false;
    }
}

impl DecompressProvider for FakeProvider {
    fn algorithm(&self) -> &str {
        self.name
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        _hint: OperationHint,
    ) -> Result<OperationResult> {
        if self.done {
            return Ok(OperationResult::finished());
        }
        let n = self
            .copy(input, output)
            .map_err(|e| Error::decode(self.name, e))?;
        self.done = Some(self.so_far) == self.size;
        Ok(OperationResult {
            input_bytes_processed: n,
            output_bytes_produced: n,
            done: self.done,
        })
    }

    fn reset(&mut self) {
        self.so_far = 0;
        self.done = false;
    }
}

/// Polls a future that must already be resolved.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(output) => output,
        Poll::Pending => panic!("future was not ready"),
    }
}

/// Kinds of test payload.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Payload {
    /// Repeating `a..z`, highly compressible.
    Alphabet,
    /// Pseudo-random bytes, incompressible.
    Random,
}

impl Payload {
    pub(crate) fn generate(self, size: usize) -> Vec<u8> {
        match self {
            Payload::Alphabet => (0..size).map(|i| b'a' + (i % 26) as u8).collect(),
            Payload::Random => {
                let mut state = 0x2545_f491_4f6c_dd1du64 ^ size as u64;
                (0..size)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 7;
                        state ^= state << 17;
                        (state >> 24) as u8
                    })
                    .collect()
            }
        }
    }
}

const MAX_CALLS: usize = 1_000_000;

/// Compresses a payload in `chunk`-sized pieces, then decodes it three ways:
/// in the pieces the compressor produced, in fixed `chunk`-sized pieces, and
/// in one call. Every pass must reproduce the payload and finish with `done`.
/// Built-in codecs are also checked to reject a tampered first byte.
pub(crate) fn round_trip(
    compressor: &mut dyn CompressProvider,
    decompressor: &mut dyn DecompressProvider,
    size: usize,
    chunk: usize,
    payload: Payload,
) {
    assert_eq!(compressor.algorithm(), decompressor.algorithm());
    let input = payload.generate(size);
    let context = format!(
        "{} {payload:?} size={size} chunk={chunk}",
        compressor.algorithm()
    );

    // Compress, growing the output buffer whenever it fills up
    let mut compressed = vec![0u8; size];
    let mut pieces = Vec::new();
    let mut csize = 0;
    let mut offset = 0;
    let mut hint = OperationHint::HasMore;
    let mut r = OperationResult::default();
    let mut calls = 0;
    while offset < size || csize == compressed.len() || !r.done {
        calls += 1;
        assert!(calls < MAX_CALLS, "compressor stalled: {context}");
        if offset == size {
            hint = OperationHint::IsLast;
        }
        if csize == compressed.len() {
            compressed.resize(csize + chunk.min(200), 0);
        }
        let in_len = chunk.min(size - offset);
        let out_len = chunk.min(compressed.len() - csize);
        r = compressor
            .compress(
                &input[offset..offset + in_len],
                &mut compressed[csize..csize + out_len],
                hint,
            )
            .unwrap();
        assert!(
            r.input_bytes_processed == in_len || r.output_bytes_produced == out_len,
            "compressor returned early: {context}"
        );
        assert!(hint == OperationHint::IsLast || !r.done, "{context}");
        pieces.push(r.output_bytes_produced);
        csize += r.output_bytes_produced;
        offset += r.input_bytes_processed;
    }
    assert!(r.done, "{context}");

    let r = compressor
        .compress(&[], &mut [], OperationHint::IsLast)
        .unwrap();
    assert_eq!(r, OperationResult::finished(), "{context}");
    compressed.truncate(csize);

    // One spare byte so over-production is caught instead of panicking
    let mut restored = vec![0u8; size + 1];

    // Decompress in the pieces the compressor produced
    let mut dsize = 0;
    let mut nn = 0;
    let mut r = OperationResult::default();
    for piece in pieces.into_iter().filter(|n| *n > 0) {
        let end = nn + piece;
        let mut calls = 0;
        while nn < end {
            calls += 1;
            assert!(calls < MAX_CALLS, "decompressor stalled: {context}");
            let out_len = chunk.min(restored.len() - dsize);
            r = decompressor
                .decompress(
                    &compressed[nn..end],
                    &mut restored[dsize..dsize + out_len],
                    OperationHint::HasMore,
                )
                .unwrap();
            nn += r.input_bytes_processed;
            dsize += r.output_bytes_produced;
            if r.done {
                break;
            }
        }
    }
    let mut calls = 0;
    while !r.done {
        calls += 1;
        assert!(calls < MAX_CALLS, "decompressor never finished: {context}");
        let out_len = chunk.min(restored.len() - dsize);
        r = decompressor
            .decompress(
                &[],
                &mut restored[dsize..dsize + out_len],
                OperationHint::IsLast,
            )
            .unwrap();
        dsize += r.output_bytes_produced;
    }
    assert_eq!(nn, csize, "{context}");
    assert_eq!(dsize, size, "{context}");
    assert!(restored[..size] == input[..], "{context}");

    // Decompress again in fixed-size pieces
    decompressor.reset();
    restored.fill(0);
    let (mut nn, mut dsize) = (0, 0);
    let mut calls = 0;
    loop {
        calls += 1;
        assert!(calls < MAX_CALLS, "decompressor stalled: {context}");
        let end = (nn + chunk).min(csize);
        let out_len = chunk.min(restored.len() - dsize);
        let r = decompressor
            .decompress(
                &compressed[nn..end],
                &mut restored[dsize..dsize + out_len],
                OperationHint::HasMore,
            )
            .unwrap();
        nn += r.input_bytes_processed;
        dsize += r.output_bytes_produced;
        if r.done && nn == csize {
            break;
        }
    }
    assert_eq!(dsize, size, "{context}");
    assert!(restored[..size] == input[..], "{context}");

    let r = decompressor
        .decompress(&[], &mut [], OperationHint::HasMore)
        .unwrap();
    assert_eq!(r, OperationResult::finished(), "{context}");

    // Decompress in one call
    decompressor.reset();
    restored.fill(0);
    let r = decompressor
        .decompress(&compressed, &mut restored, OperationHint::IsLast)
        .unwrap();
    assert!(r.done, "{context}");
    assert_eq!(r.input_bytes_processed, csize, "{context}");
    assert_eq!(r.output_bytes_produced, size, "{context}");
    assert!(restored[..size] == input[..], "{context}");

    if decompressor.algorithm() == FAKE {
        return;
    }

    // A tampered first byte must never decode to the full payload
    compressed[0] = !compressed[1];
    decompressor.reset();
    for _ in 0..2 {
        if let Ok(r) = decompressor.decompress(&compressed, &mut restored, OperationHint::IsLast) {
            assert!(!(r.done && r.output_bytes_produced == size), "{context}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_round_trip() {
        for (size, chunk) in [(3, 1024), (7999, 8192), (16001, 8192), (140000, 65536)] {
            for payload in [Payload::Alphabet, Payload::Random] {
                round_trip(
                    &mut FakeProvider::with_size(size),
                    &mut FakeProvider::with_size(size),
                    size,
                    chunk,
                    payload,
                );
            }
        }
    }

    #[test]
    fn test_payloads_are_deterministic() {
        assert_eq!(Payload::Random.generate(64), Payload::Random.generate(64));
        assert_eq!(&Payload::Alphabet.generate(28)[24..], b"yzab");
    }
}
