//! Hardware-facing APIs consumed by the ACL engine.
//!
//! - [`field`]: the field-processor primitives ([`MatchEngine`]) and the
//!   qualifier, action and port-bitmap types they take.
//! - [`soft`]: an in-memory [`MatchEngine`] used by tests and the replay tool.

pub mod field;
pub mod soft;

pub use field::{
    EgressId, FieldAction, FieldActionKind, FieldEntryId, FieldGroupId, FieldStatId, GroupStatus,
    L3IntfId, MatchEngine, PortBitmap, Qualifier, QualifierSet, QualifierValue, StatKind,
    PBMP_PORT_MAX,
};
pub use soft::{SoftEngineLimits, SoftMatchEngine};
