//! Shared types for the SVC control-plane: array object models, request
//! types exchanged with the driver service, and the persisted-state
//! encodings.

/// Common error machinery shared across the control-plane.
pub mod transport_api;
/// All the types.
pub mod types;
