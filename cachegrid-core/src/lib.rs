//! Shared vocabulary for the cachegrid cluster cache.
//!
//! This crate defines the pieces every cachegrid component agrees on: the
//! error type, the identity of distributed objects, the closed native event
//! model, and the replicable value representation. The grid engine and the
//! listener coordination layer live in `cachegrid-node`.

pub mod error;
pub mod event;
pub mod object;
pub mod value;

pub use error::{CacheError, Result};
pub use event::{
    DistributedObjectEvent, EntryEvent, EntryEventType, ItemEvent, ItemEventType, NativeEvent,
    ObjectEventType, COLLECTION_ITEM_KEY,
};
pub use object::{ObjectCategory, ObjectId, LISTENER_CATEGORIES};
pub use value::{from_grid_value, to_grid_value, GridValue};
