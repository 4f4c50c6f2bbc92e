//! AclOrch - ACL object graph over a match engine.
//!
//! The AclOrch owns every ACL object and keeps the hardware in step with it:
//! - Table and table group creation and deletion
//! - Group membership and qualifier propagation
//! - Entry creation, update, deletion and cloning
//! - Bind point attach and detach on tables and groups
//!
//! Each object type lives in its own [`IndexedStore`]; records refer to each
//! other by store index. Operations are spread over the `table`, `group`,
//! `entry`, `counter`, `bind` and `clone` modules, each adding an `impl`
//! block to [`AclOrch`].

use log::info;
use sai_object_store::IndexedStore;
use serde::Serialize;
use sonic_sai::api::MatchEngine;
use sonic_sai::{
    AclCounterOid, AclEntryOid, AclTableGroupMemberOid, AclTableGroupOid, AclTableOid, SaiError,
    SaiResult,
};

use crate::config::{AclConfig, ConfigError};
use crate::counter::AclCounter;
use crate::entry::AclEntry;
use crate::group::{AclTableGroup, AclTableGroupMember};
use crate::lag::LagResolver;
use crate::table::AclTable;

/// Entry handle sub-type of a user-created entry.
pub const ENTRY_SUB_TYPE_CANONICAL: u8 = 0;
/// Entry handle sub-type of a bind point clone.
pub const ENTRY_SUB_TYPE_CLONE: u8 = 1;

/// Object counts, derived from store occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AclOrchStats {
    pub tables: u32,
    pub groups: u32,
    pub members: u32,
    /// Canonical entries.
    pub entries: u32,
    /// Hardware entries created for extra bind point values.
    pub clones: u32,
    pub counters: u32,
}

/// AclOrch - ACL object graph and its hardware state.
#[derive(Debug)]
pub struct AclOrch<E, L> {
    pub(crate) config: AclConfig,
    pub(crate) engine: E,
    pub(crate) lags: L,

    // ============ Object Stores ============
    pub(crate) tables: IndexedStore<AclTable>,
    pub(crate) groups: IndexedStore<AclTableGroup>,
    pub(crate) members: IndexedStore<AclTableGroupMember>,
    pub(crate) entries: IndexedStore<AclEntry>,
    pub(crate) counters: IndexedStore<AclCounter>,
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    /// Creates an AclOrch with stores sized from `config`.
    pub fn new(config: AclConfig, engine: E, lags: L) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "AclOrch: {} tables, {} groups, {} entries, {} ports",
            config.max_tables, config.max_groups, config.max_entries, config.platform.port_count
        );
        Ok(Self {
            tables: IndexedStore::with_capacity("acl_tables", config.max_tables),
            groups: IndexedStore::with_capacity("acl_table_groups", config.max_groups),
            members: IndexedStore::with_capacity("acl_table_group_members", config.max_members),
            entries: IndexedStore::with_capacity("acl_entries", config.max_entries),
            counters: IndexedStore::with_capacity("acl_counters", config.max_counters),
            config,
            engine,
            lags,
        })
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn lag_resolver(&self) -> &L {
        &self.lags
    }

    /// Gives access to the LAG resolver. Call
    /// [`AclOrch::lag_membership_changed`] after changing a LAG's members.
    pub fn lag_resolver_mut(&mut self) -> &mut L {
        &mut self.lags
    }

    /// Returns object counts.
    pub fn stats(&self) -> AclOrchStats {
        let clones = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_clone())
            .count() as u32;
        AclOrchStats {
            tables: self.tables.len(),
            groups: self.groups.len(),
            members: self.members.len(),
            entries: self.entries.len() - clones,
            clones,
            counters: self.counters.len(),
        }
    }

    // ============ Handle Lookup ============

    pub(crate) fn table_index(&self, table: AclTableOid) -> SaiResult<u32> {
        let index = table.index();
        if !self.tables.contains(index) {
            return Err(SaiError::not_found(format!("ACL table {:?}", table)));
        }
        Ok(index)
    }

    pub(crate) fn table_oid(index: u32) -> AclTableOid {
        AclTableOid::new(0, 0, index)
    }

    pub(crate) fn group_index(&self, group: AclTableGroupOid) -> SaiResult<u32> {
        let index = group.index();
        if !self.groups.contains(index) {
            return Err(SaiError::not_found(format!("ACL table group {:?}", group)));
        }
        Ok(index)
    }

    pub(crate) fn group_oid(index: u32) -> AclTableGroupOid {
        AclTableGroupOid::new(0, 0, index)
    }

    pub(crate) fn member_index(&self, member: AclTableGroupMemberOid) -> SaiResult<u32> {
        let index = member.index();
        match self.members.get(index) {
            Ok(record) if record.group == u32::from(member.map_index()) => Ok(index),
            _ => Err(SaiError::not_found(format!(
                "ACL table group member {:?}",
                member
            ))),
        }
    }

    pub(crate) fn member_oid(index: u32, group: u32) -> AclTableGroupMemberOid {
        AclTableGroupMemberOid::new(0, group as u16, index)
    }

    /// Resolves an entry handle; the handle's owner and sub-type must match
    /// the stored record.
    pub(crate) fn entry_index(&self, entry: AclEntryOid) -> SaiResult<u32> {
        let index = entry.index();
        match self.entries.get(index) {
            Ok(record)
                if record.table == u32::from(entry.map_index())
                    && record.sub_type() == entry.sub_type() =>
            {
                Ok(index)
            }
            _ => Err(SaiError::not_found(format!("ACL entry {:?}", entry))),
        }
    }

    pub(crate) fn entry_oid(&self, index: u32) -> SaiResult<AclEntryOid> {
        let record = self.entries.get(index)?;
        Ok(AclEntryOid::new(
            record.sub_type(),
            record.table as u16,
            index,
        ))
    }

    pub(crate) fn counter_index(&self, counter: AclCounterOid) -> SaiResult<u32> {
        let index = counter.index();
        match self.counters.get(index) {
            Ok(record) if record.table == u32::from(counter.map_index()) => Ok(index),
            _ => Err(SaiError::not_found(format!("ACL counter {:?}", counter))),
        }
    }

    pub(crate) fn counter_oid(index: u32, table: u32) -> AclCounterOid {
        AclCounterOid::new(0, table as u16, index)
    }

    // ============ Read Access ============

    /// Returns the record of a table.
    pub fn table(&self, table: AclTableOid) -> SaiResult<&AclTable> {
        let index = self.table_index(table)?;
        Ok(self.tables.get(index)?)
    }

    /// Returns the record of a table group.
    pub fn group(&self, group: AclTableGroupOid) -> SaiResult<&AclTableGroup> {
        let index = self.group_index(group)?;
        Ok(self.groups.get(index)?)
    }

    /// Returns the record of an entry or clone.
    pub fn entry(&self, entry: AclEntryOid) -> SaiResult<&AclEntry> {
        let index = self.entry_index(entry)?;
        Ok(self.entries.get(index)?)
    }

    /// Returns a canonical entry followed by its clones.
    pub fn entry_family(&self, entry: AclEntryOid) -> SaiResult<Vec<AclEntryOid>> {
        let index = self.entry_index(entry)?;
        self.family(index)?
            .into_iter()
            .map(|i| self.entry_oid(i))
            .collect()
    }

    /// Returns the handles of every hardware entry in a table, clones
    /// included, in attach order.
    pub fn table_hw_entries(&self, table: AclTableOid) -> SaiResult<Vec<AclEntryOid>> {
        let index = self.table_index(table)?;
        self.tables
            .get(index)?
            .entries
            .iter()
            .map(|i| self.entry_oid(*i))
            .collect()
    }

    /// Indices of a canonical entry (or a clone's canonical entry) and all
    /// its clones, canonical first.
    pub(crate) fn family(&self, index: u32) -> SaiResult<Vec<u32>> {
        let record = self.entries.get(index)?;
        let canonical = record.canonical.unwrap_or(index);
        let mut family = vec![canonical];
        family.extend(self.entries.get(canonical)?.clones.iter().copied());
        Ok(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::StaticLagResolver;
    use sonic_sai::api::SoftMatchEngine;

    #[test]
    fn test_new_orch_is_empty() {
        let orch = AclOrch::new(
            AclConfig::default(),
            SoftMatchEngine::new(),
            StaticLagResolver::new(),
        )
        .unwrap();
        assert_eq!(orch.stats(), AclOrchStats::default());
        assert_eq!(orch.config().max_tables, 64);
    }

    #[test]
    fn test_new_orch_rejects_invalid_config() {
        let config = AclConfig {
            max_tables: 0,
            ..Default::default()
        };
        let result = AclOrch::new(config, SoftMatchEngine::new(), StaticLagResolver::new());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_handles_not_found() {
        let orch = AclOrch::new(
            AclConfig::default(),
            SoftMatchEngine::new(),
            StaticLagResolver::new(),
        )
        .unwrap();
        assert!(orch.table(AclTableOid::new(0, 0, 3)).is_err());
        assert!(orch.entry(AclEntryOid::new(0, 0, 0)).is_err());
        // Out of range indices are lookup misses
        assert!(orch.group(AclTableGroupOid::new(0, 0, u32::MAX)).is_err());
    }
}
