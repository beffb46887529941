//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage, backend, notification) provides a
/// `Registry` struct per implementation that declares the name used in the
/// configuration file and the factory that builds it.
pub trait ImplementationRegistry {
	/// Key of the implementation table, e.g. `memory` for
	/// `storage.implementations.memory` or `remote` for
	/// `backend.implementations.remote`.
	const NAME: &'static str;

	/// Factory function type defined by the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
