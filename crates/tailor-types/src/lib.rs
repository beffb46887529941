//! Common types module for the tailor shop workflow service.
//!
//! This module defines the core data types shared by every component of the
//! workspace: orders and their lifecycle vocabulary, client profiles and
//! measurements, API request/response shapes, and the configuration
//! validation framework used by pluggable implementations.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Events for inter-component communication.
pub mod events;
/// Form validation errors reported per field.
pub mod form;
/// Lifecycle vocabulary: roles, actors, actions and notifications.
pub mod lifecycle;
/// Body measurement records.
pub mod measurement;
/// Order types, lifecycle states, list queries and dashboard metrics.
pub mod order;
/// Client and administrator profiles.
pub mod profile;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for tokens and other secrets.
pub mod secret_string;
/// Storage types for managing persistent data.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use form::FormError;
pub use lifecycle::*;
pub use measurement::*;
pub use order::*;
pub use profile::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use validation::*;
