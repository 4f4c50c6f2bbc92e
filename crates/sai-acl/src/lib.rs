//! SAI ACL engine for fixed-function switch ASICs.
//!
//! Implements ACL tables, table groups, group members, entries, counters
//! and bind points on top of a ternary match engine ([`MatchEngine`]).
//!
//! # Architecture
//!
//! ```text
//! [AclApi / AclService] ──> [AclOrch] ──> [MatchEngine] ──> [ASIC]
//!                               │
//!                               ├── IndexedStore per object type
//!                               └── LagResolver (LAG member ports)
//! ```
//!
//! A hardware entry matches one value per qualifier, so an entry whose
//! table is bound to several ports (or LAGs, or VLANs) is backed by a
//! canonical hardware entry plus one clone per extra value. Clones are
//! created and destroyed as bind points come and go; they are never
//! visible as user entries.
//!
//! [`MatchEngine`]: sonic_sai::api::MatchEngine

pub mod bind;
mod clone;
pub mod config;
pub mod counter;
pub mod entry;
pub mod group;
pub mod lag;
pub mod orch;
pub mod rule;
pub mod script;
pub mod service;
pub mod snapshot;
pub mod table;
pub mod types;

pub use bind::bind_type_qualifier;
pub use config::{AclConfig, ConfigError, PlatformCapabilities};
pub use counter::{AclCounter, AclCounterAttrId, AclCounterAttrValue, AclCounterConfig};
pub use entry::{
    AclEntry, AclEntryAttr, AclEntryAttrId, AclEntryAttrValue, AclEntryConfig, MacRewrite,
};
pub use group::{
    AclTableGroup, AclTableGroupAttrId, AclTableGroupAttrValue, AclTableGroupConfig,
    AclTableGroupMember, AclTableGroupMemberAttrId, AclTableGroupMemberAttrValue,
    AclTableGroupMemberConfig,
};
pub use lag::{LagResolver, StaticLagResolver};
pub use orch::{AclOrch, AclOrchStats, ENTRY_SUB_TYPE_CANONICAL, ENTRY_SUB_TYPE_CLONE};
pub use rule::{AclActionValue, AclEntryAction, AclEntryMatch, AclMatchValue};
pub use script::{Script, ScriptError, ScriptOp, ScriptRunner, ScriptStep, StepOutcome};
pub use service::{AclApi, AclService};
pub use snapshot::{AclSnapshot, EntrySnapshot, GroupSnapshot, MemberSnapshot, TableSnapshot};
pub use table::{AclTable, AclTableAttrId, AclTableAttrValue, AclTableConfig};
pub use types::{
    AclActionType, AclBindPointType, AclMatchField, AclPacketAction, AclPriority, AclStage,
    AclTableGroupType, BindMask, BindPoint,
};
