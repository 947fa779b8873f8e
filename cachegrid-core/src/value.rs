//! Replicable value representation.
//!
//! The grid replicates values between members, so everything it stores must
//! have a process-independent shape. `GridValue` is that shape; arbitrary
//! Rust values are wrapped into it with [`to_grid_value`] and recovered with
//! [`from_grid_value`], round-tripping transparently through storage.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// The value representation stored and replicated by the grid.
pub type GridValue = serde_json::Value;

/// Wraps any serializable value into a [`GridValue`].
pub fn to_grid_value<T: Serialize>(value: &T) -> Result<GridValue> {
    Ok(serde_json::to_value(value)?)
}

/// Recovers a typed value from a [`GridValue`].
///
/// Fails if the stored shape does not match `T`.
pub fn from_grid_value<T: DeserializeOwned>(value: GridValue) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
