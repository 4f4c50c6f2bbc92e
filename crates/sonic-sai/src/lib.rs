//! SAI object model and field-processor bindings.
//!
//! This crate holds the pieces of SAI that the ACL engine shares with the
//! rest of the switch driver:
//!
//! - [`types`]: object handle layout, type-safe object IDs and MAC addresses
//! - [`error`]: SAI status codes and the [`SaiError`] taxonomy
//! - [`api`]: the [`MatchEngine`](api::MatchEngine) trait over the
//!   classification hardware, plus an in-memory implementation
//!
//! # Example
//!
//! ```
//! use sonic_sai::{AclTableOid, SaiObjectType};
//! use sonic_sai::types::object_type_of;
//!
//! let table = AclTableOid::new(0, 0, 7);
//! assert_eq!(object_type_of(table.as_raw()).unwrap(), SaiObjectType::AclTable);
//! ```

pub mod api;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use types::{
    decode_object_id, encode_object_id, object_type_of, AclCounterKind, AclCounterOid,
    AclEntryKind, AclEntryOid, AclTableGroupKind, AclTableGroupMemberKind,
    AclTableGroupMemberOid, AclTableGroupOid, AclTableKind, AclTableOid, LagKind, LagOid,
    MacAddress, ObjectIdParts, PortKind, PortOid, RawSaiObjectId, RouterInterfaceKind,
    RouterInterfaceOid, SaiObjectId, SaiObjectKind, SaiObjectType, SwitchKind, SwitchOid,
    VlanKind, VlanOid,
};

pub use error::{status_of, SaiError, SaiResult, SaiStatus, SaiStatusExt};
