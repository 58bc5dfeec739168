//! Choosing a coding from a parsed header, and advertising the codings a
//! registry can handle.

use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::header::{self, Candidate, HeaderKind};
use crate::provider::{CompressProvider, DecompressProvider};
use crate::registry::{CompressRegistry, DecompressRegistry, Registry};

/// Applied-coding name that means "no coding".
const IDENTITY: &str = "identity";

/// Quality of the first advertised coding, in thousandths.
const MAX_MILLIS: usize = 1000;

/// Largest quality step between adjacent advertised codings, in thousandths.
const MAX_STEP: usize = 100;

/// Picks the best registered factory for a list of candidates.
///
/// Every effective registry entry gets the highest quality any candidate
/// with its name carries, or the quality of a `*` candidate when no
/// candidate names it. Entries ending up with quality `0` or no quality are
/// skipped. The highest quality wins; ties go to the earlier entry.
pub fn select<'r, F: Factory>(
    candidates: &[Candidate<'_>],
    registry: &'r Registry<F>,
) -> Option<&'r F> {
    let wildcard = max_quality(candidates.iter().filter(|c| c.is_wildcard()));

    let mut best: Option<(&F, f32)> = None;
    for factory in registry.iter().filter(|f| registry.is_effective(f)) {
        let quality = max_quality(candidates.iter().filter(|c| c.matches(factory.algorithm())))
            .or(wildcard);
        let Some(quality) = quality.filter(|q| *q > 0.0) else {
            continue;
        };
        if best.is_none_or(|(_, q)| quality > q) {
            best = Some((factory, quality));
        }
    }
    best.map(|(factory, _)| factory)
}

fn max_quality<'a, 'b: 'a>(candidates: impl Iterator<Item = &'a Candidate<'b>>) -> Option<f32> {
    candidates.map(|c| c.quality).reduce(f32::max)
}

/// Parses `value` as a `kind` header and finds the factory it calls for.
///
/// Ranked kinds return the [`select`]ed factory, or `None` when nothing
/// registered is acceptable. Applied kinds return `None` when the value
/// names no coding (only `chunked`, `identity` or nothing), and
/// [`Error::UnsupportedAlgorithm`] when the coding is not registered.
pub fn resolve<'r, F: Factory>(
    value: &str,
    kind: HeaderKind,
    registry: &'r Registry<F>,
) -> Result<Option<&'r F>> {
    let candidates = header::parse(value, kind)?;
    let found = if kind.is_ranked() {
        select(&candidates, registry)
    } else {
        match candidates.first() {
            None => None,
            Some(c) if c.matches(IDENTITY) => None,
            Some(c) => Some(registry.find(c.name).ok_or_else(|| Error::UnsupportedAlgorithm {
                kind,
                name: c.name.to_owned(),
            })?),
        }
    };
    tracing::debug!(
        %kind,
        value,
        selected = found.map(|f| f.algorithm()),
        "resolved content-coding"
    );
    Ok(found)
}

/// Creates the compressor a `kind` header value calls for.
pub fn compressor_from_header(
    value: &str,
    kind: HeaderKind,
    registry: &CompressRegistry,
) -> Result<Option<Box<dyn CompressProvider>>> {
    let factory = resolve(value, kind, registry)?;
    Ok(factory.map(|f| f.make_compressor()))
}

/// Creates the decompressor a `kind` header value calls for.
pub fn decompressor_from_header(
    value: &str,
    kind: HeaderKind,
    registry: &DecompressRegistry,
) -> Result<Option<Box<dyn DecompressProvider>>> {
    let factory = resolve(value, kind, registry)?;
    Ok(factory.map(|f| f.make_decompressor()))
}

/// Builds the ranked value advertising every coding in `registry`.
///
/// Codings appear in registry order with strictly decreasing qualities
/// starting at `1.0`, e.g. `gzip;q=1.0, deflate;q=0.9`. A name is listed
/// once, where its effective entry sits. An empty registry yields an empty
/// string. Applied kinds have no ranked form and are rejected.
pub fn build_supported_header<F: Factory>(
    kind: HeaderKind,
    registry: &Registry<F>,
) -> Result<String> {
    if !kind.is_ranked() {
        return Err(Error::UnrankedHeaderKind(kind));
    }

    let mut names: Vec<&str> = registry
        .iter()
        .filter(|f| registry.is_effective(f))
        .map(|f| f.algorithm())
        .collect();
    if names.len() > MAX_MILLIS {
        tracing::debug!(
            count = names.len(),
            "too many codings to rank, advertising the first {MAX_MILLIS}"
        );
        names.truncate(MAX_MILLIS);
    }

    let step = match names.len() {
        0 => return Ok(String::new()),
        n => (MAX_MILLIS / n).min(MAX_STEP),
    };
    let value = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let quality = format_quality(MAX_MILLIS - i * step);
            format!("{name};q={quality}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    Ok(value)
}

/// Renders thousandths with one to three decimals.
fn format_quality(millis: usize) -> String {
    if millis >= MAX_MILLIS {
        return "1.0".to_owned();
    }
    let mut s = format!("0.{millis:03}");
    while s.len() > 3 && s.ends_with('0') {
        s.pop();
    }
    s
}
