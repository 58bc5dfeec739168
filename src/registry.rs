use crate::codec::BuiltinSupport;
use crate::factory::{CompressFactory, DecompressFactory, Factory};
use std::slice;

/// Registry of compression factories.
pub type CompressRegistry = Registry<CompressFactory>;

/// Registry of decompression factories.
pub type DecompressRegistry = Registry<DecompressFactory>;

/// An ordered, immutable list of factories.
///
/// Caller-supplied factories come first and shadow built-ins with the same
/// name. Order is preference order: negotiation breaks quality ties by it
/// and the supported-header builder ranks by it.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    factories: Vec<F>,
}

impl<F: Factory> Registry<F> {
    /// The built-in factories available in this process.
    pub fn builtin() -> Self {
        Self::with_builtins(Vec::new())
    }

    /// Only the given factories. An empty list disables every coding.
    pub fn supplied(factories: Vec<F>) -> Self {
        Self { factories }
    }

    /// The given factories followed by the built-ins available in this process.
    pub fn with_builtins(supplied: Vec<F>) -> Self {
        Self::with_support(supplied, BuiltinSupport::detect())
    }

    /// The given factories followed by the built-ins `support` allows.
    pub fn with_support(supplied: Vec<F>, support: &BuiltinSupport) -> Self {
        let mut factories = supplied;
        factories.extend(support.algorithms().into_iter().map(F::builtin));
        Self { factories }
    }

    /// A registry with no factories.
    pub fn empty() -> Self {
        Self::supplied(Vec::new())
    }

    /// Finds the first factory named `name`, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<&F> {
        self.factories
            .iter()
            .find(|f| f.algorithm().eq_ignore_ascii_case(name))
    }

    /// Factories in preference order, shadowed entries included.
    pub fn iter(&self) -> slice::Iter<'_, F> {
        self.factories.iter()
    }

    /// Number of factories, shadowed entries included.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry has no factories.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Whether `factory` is the entry [`find`](Self::find) returns for its name.
    pub(crate) fn is_effective(&self, factory: &F) -> bool {
        self.find(factory.algorithm())
            .is_some_and(|found| std::ptr::eq(found, factory))
    }
}

impl<F: Factory> Default for Registry<F> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a, F> IntoIterator for &'a Registry<F> {
    type Item = &'a F;
    type IntoIter = slice::Iter<'a, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.factories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Algorithm;
    use crate::testing::{FAKE, FakeProvider};

    fn fake_compress(name: &'static str) -> CompressFactory {
        CompressFactory::new(name, move || Box::new(FakeProvider::named(name)))
    }

    fn names<F: Factory>(registry: &Registry<F>) -> Vec<&str> {
        registry.iter().map(|f| f.algorithm()).collect()
    }

    #[test]
    fn test_mandatory_builtins() {
        let registry = CompressRegistry::with_support(Vec::new(), &BuiltinSupport::mandatory());
        assert_eq!(names(&registry), ["gzip", "deflate"]);
    }

    #[cfg(feature = "brotli")]
    #[test]
    fn test_optional_builtin() {
        let registry =
            DecompressRegistry::with_support(Vec::new(), &BuiltinSupport { brotli: true });
        assert_eq!(names(&registry), ["gzip", "deflate", "br"]);
        assert_eq!(
            registry.find("BR").unwrap().make_decompressor().algorithm(),
            "br"
        );
    }

    #[test]
    fn test_builtin_follows_detection() {
        let registry = CompressRegistry::builtin();
        let expected: Vec<_> = BuiltinSupport::detect()
            .algorithms()
            .into_iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(names(&registry), expected);
    }

    #[test]
    fn test_find_ignores_case() {
        let registry = CompressRegistry::with_support(Vec::new(), &BuiltinSupport::mandatory());
        assert_eq!(registry.find("GZip").unwrap().algorithm(), "gzip");
        assert_eq!(registry.find("Deflate").unwrap().algorithm(), "deflate");
        assert!(registry.find("zstd").is_none());
    }

    #[test]
    fn test_supplied_only() {
        let registry = CompressRegistry::supplied(vec![fake_compress(FAKE)]);
        assert_eq!(names(&registry), [FAKE]);
        assert!(registry.find("gzip").is_none());
    }

    #[test]
    fn test_supplied_overrides_builtin() {
        let registry = CompressRegistry::with_support(
            vec![fake_compress("GZIP")],
            &BuiltinSupport::mandatory(),
        );
        assert_eq!(names(&registry), ["GZIP", "gzip", "deflate"]);

        let found = registry.find("gzip").unwrap();
        assert_eq!(found.algorithm(), "GZIP");
        assert_eq!(found.make_compressor().algorithm(), "GZIP");
        assert!(registry.is_effective(found));
        assert!(!registry.is_effective(&registry.iter().as_slice()[1]));
    }

    #[test]
    fn test_empty() {
        let registry = DecompressRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.find("gzip").is_none());
        assert!(DecompressRegistry::supplied(Vec::new()).is_empty());
    }

    #[test]
    fn test_builtin_factory_names_match_algorithms() {
        for algorithm in BuiltinSupport::detect().algorithms() {
            let registry = DecompressRegistry::builtin();
            let factory = registry.find(algorithm.name()).unwrap();
            assert_eq!(Algorithm::from_name(factory.algorithm()), Some(algorithm));
        }
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompressRegistry>();
        assert_send_sync::<DecompressRegistry>();
    }
}
