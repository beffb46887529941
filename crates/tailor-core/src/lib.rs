//! Core of the tailor shop service.
//!
//! Holds the order lifecycle controller, the engine that applies it against
//! the configured backend and notification delivery, and the builder that
//! assembles the engine from configuration.

pub mod builder;
pub mod engine;
pub mod lifecycle;

pub use builder::{BuilderError, TailorBuilder, TailorFactories};
pub use engine::{event_bus::EventBus, EngineError, TailorEngine, TransitionReport};
pub use lifecycle::{LifecycleError, OrderLifecycle, Outcome, Transition};
