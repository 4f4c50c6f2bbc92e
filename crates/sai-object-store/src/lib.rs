//! Object storage shared by the SAI ACL engine.
//!
//! - [`IndexedStore`]: fixed-capacity slot array addressed by small integer
//!   indices, one per object type
//! - [`RefCounted`]: reference counts that report underflow instead of wrapping
//!
//! Neither type ever creates a record implicitly: lookups of free slots are
//! errors, and reference counts can only be changed on records that exist.

mod ref_count;
mod store;

pub use ref_count::{RefCount, RefCounted};
pub use store::{IndexedStore, SlotState, StoreError};
