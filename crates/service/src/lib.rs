//! Service layer for the WMS store catalog.
//! - `catalog`: the store catalog seam and its memory/file backends.
//! - `wms_store`: business rules of the `wmsstores` REST resource.
//! - `storage`: reusable JSON file persistence.

pub mod catalog;
pub mod errors;
pub mod storage;
pub mod wms_store;

pub use catalog::Catalog;
pub use wms_store::{QueryFlags, StoreError, StoreOutcome, StoreResource, Target, Verb};
