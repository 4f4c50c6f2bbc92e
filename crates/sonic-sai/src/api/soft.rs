//! In-memory match engine.
//!
//! `SoftMatchEngine` keeps groups, entries and stat objects in ordered maps so
//! that tests and the replay tool can inspect exactly what would have been
//! programmed. Capacities follow [`SoftEngineLimits`], and individual
//! operations can be made to fail on demand with [`SoftMatchEngine::inject_fault`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, error};

use super::field::{
    EgressId, FieldAction, FieldActionKind, FieldEntryId, FieldGroupId, FieldStatId, GroupStatus,
    L3IntfId, MatchEngine, Qualifier, QualifierSet, QualifierValue, StatKind,
};
use crate::error::{SaiError, SaiResult};
use crate::types::MacAddress;

/// Capacities of the in-memory engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftEngineLimits {
    pub max_groups: u32,
    pub entries_per_group: u32,
    pub counters_per_group: u32,
}

impl Default for SoftEngineLimits {
    fn default() -> Self {
        Self {
            max_groups: 16,
            entries_per_group: 256,
            counters_per_group: 128,
        }
    }
}

/// A priority group as programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftGroup {
    pub qset: QualifierSet,
    pub priority: i32,
    pub entries: BTreeSet<FieldEntryId>,
    pub stats: BTreeSet<FieldStatId>,
}

/// An entry as programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftEntry {
    pub group: FieldGroupId,
    pub priority: i32,
    pub enabled: bool,
    pub installed: bool,
    /// Number of install and reinstall calls seen.
    pub installs: u32,
    pub qualifiers: BTreeMap<Qualifier, QualifierValue>,
    pub actions: BTreeMap<FieldActionKind, FieldAction>,
    pub stat: Option<FieldStatId>,
}

impl SoftEntry {
    fn new(group: FieldGroupId) -> Self {
        Self {
            group,
            priority: 0,
            enabled: true,
            installed: false,
            installs: 0,
            qualifiers: BTreeMap::new(),
            actions: BTreeMap::new(),
            stat: None,
        }
    }
}

/// A statistics object as programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftStat {
    pub group: FieldGroupId,
    pub kinds: Vec<StatKind>,
    pub packets: u64,
    pub bytes: u64,
    pub attached: BTreeSet<FieldEntryId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SoftEgress {
    intf: L3IntfId,
    dst_mac: MacAddress,
}

/// In-memory [`MatchEngine`].
#[derive(Debug, Default)]
pub struct SoftMatchEngine {
    limits: SoftEngineLimits,
    groups: BTreeMap<FieldGroupId, SoftGroup>,
    entries: BTreeMap<FieldEntryId, SoftEntry>,
    stats: BTreeMap<FieldStatId, SoftStat>,
    intfs: BTreeMap<L3IntfId, MacAddress>,
    egresses: BTreeMap<EgressId, SoftEgress>,
    next_id: i32,
    /// Operation name -> number of calls left to succeed before one failure.
    faults: HashMap<&'static str, u32>,
}

impl SoftMatchEngine {
    /// Creates an engine with default limits.
    pub fn new() -> Self {
        Self::with_limits(SoftEngineLimits::default())
    }

    /// Creates an engine with the given limits.
    pub fn with_limits(limits: SoftEngineLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn limits(&self) -> SoftEngineLimits {
        self.limits
    }

    /// Makes the named operation (for example `"entry_install"`) fail with
    /// `Failure` after `after` more successful calls.
    pub fn inject_fault(&mut self, op: &'static str, after: u32) {
        self.faults.insert(op, after);
    }

    /// Removes every pending fault.
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    pub fn group(&self, group: FieldGroupId) -> Option<&SoftGroup> {
        self.groups.get(&group)
    }

    pub fn entry(&self, entry: FieldEntryId) -> Option<&SoftEntry> {
        self.entries.get(&entry)
    }

    pub fn stat(&self, stat: FieldStatId) -> Option<&SoftStat> {
        self.stats.get(&stat)
    }

    /// Entries of a group in creation order.
    pub fn group_entries(&self, group: FieldGroupId) -> Vec<FieldEntryId> {
        self.groups
            .get(&group)
            .map(|g| g.entries.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn stat_count(&self) -> usize {
        self.stats.len()
    }

    pub fn l3_intf_count(&self) -> usize {
        self.intfs.len()
    }

    pub fn egress_count(&self) -> usize {
        self.egresses.len()
    }

    /// Returns the destination MAC programmed on an egress object.
    pub fn egress_dst_mac(&self, egress: EgressId) -> Option<MacAddress> {
        self.egresses.get(&egress).map(|e| e.dst_mac)
    }

    /// Simulates traffic hitting a stat object.
    pub fn add_stat_counts(&mut self, stat: FieldStatId, packets: u64, bytes: u64) -> SaiResult<()> {
        let s = self
            .stats
            .get_mut(&stat)
            .ok_or_else(|| SaiError::not_found(format!("stat {}", stat)))?;
        s.packets += packets;
        s.bytes += bytes;
        Ok(())
    }

    fn check_fault(&mut self, op: &'static str) -> SaiResult<()> {
        let Some(left) = self.faults.get_mut(op) else {
            return Ok(());
        };
        if *left > 0 {
            *left -= 1;
            return Ok(());
        }
        self.faults.remove(op);
        error!("soft engine: injected fault in {}", op);
        Err(SaiError::failure(format!("injected fault in {}", op)))
    }

    fn alloc_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn group_ref(&self, group: FieldGroupId) -> SaiResult<&SoftGroup> {
        self.groups
            .get(&group)
            .ok_or_else(|| SaiError::not_found(format!("field group {}", group)))
    }

    fn group_mut(&mut self, group: FieldGroupId) -> SaiResult<&mut SoftGroup> {
        self.groups
            .get_mut(&group)
            .ok_or_else(|| SaiError::not_found(format!("field group {}", group)))
    }

    fn entry_ref(&self, entry: FieldEntryId) -> SaiResult<&SoftEntry> {
        self.entries
            .get(&entry)
            .ok_or_else(|| SaiError::not_found(format!("field entry {}", entry)))
    }

    fn entry_mut(&mut self, entry: FieldEntryId) -> SaiResult<&mut SoftEntry> {
        self.entries
            .get_mut(&entry)
            .ok_or_else(|| SaiError::not_found(format!("field entry {}", entry)))
    }

    fn reserve_entry(&self, group: FieldGroupId) -> SaiResult<()> {
        let g = self.group_ref(group)?;
        if g.entries.len() as u32 >= self.limits.entries_per_group {
            return Err(SaiError::insufficient_resources(format!(
                "field group {} entries",
                group
            )));
        }
        Ok(())
    }
}

impl MatchEngine for SoftMatchEngine {
    fn group_create(&mut self, qset: QualifierSet, priority: i32) -> SaiResult<FieldGroupId> {
        self.check_fault("group_create")?;
        if self.groups.len() as u32 >= self.limits.max_groups {
            return Err(SaiError::insufficient_resources("field groups"));
        }
        let id = self.alloc_id();
        self.groups.insert(
            id,
            SoftGroup {
                qset,
                priority,
                entries: BTreeSet::new(),
                stats: BTreeSet::new(),
            },
        );
        debug!("soft engine: group {} created with {:?}", id, qset);
        Ok(id)
    }

    fn group_destroy(&mut self, group: FieldGroupId) -> SaiResult<()> {
        self.check_fault("group_destroy")?;
        let g = self.group_ref(group)?;
        if !g.entries.is_empty() || !g.stats.is_empty() {
            return Err(SaiError::object_in_use(format!("field group {}", group)));
        }
        self.groups.remove(&group);
        Ok(())
    }

    fn group_get(&self, group: FieldGroupId) -> SaiResult<QualifierSet> {
        Ok(self.group_ref(group)?.qset)
    }

    fn group_set(&mut self, group: FieldGroupId, qset: QualifierSet) -> SaiResult<()> {
        self.check_fault("group_set")?;
        self.group_mut(group)?.qset = qset;
        Ok(())
    }

    fn group_priority_set(&mut self, group: FieldGroupId, priority: i32) -> SaiResult<()> {
        self.check_fault("group_priority_set")?;
        self.group_mut(group)?.priority = priority;
        Ok(())
    }

    fn group_status_get(&self, group: FieldGroupId) -> SaiResult<GroupStatus> {
        let g = self.group_ref(group)?;
        Ok(GroupStatus {
            entries_total: self.limits.entries_per_group,
            entries_free: self
                .limits
                .entries_per_group
                .saturating_sub(g.entries.len() as u32),
            counters_total: self.limits.counters_per_group,
            counters_free: self
                .limits
                .counters_per_group
                .saturating_sub(g.stats.len() as u32),
        })
    }

    fn entry_create(&mut self, group: FieldGroupId) -> SaiResult<FieldEntryId> {
        self.check_fault("entry_create")?;
        self.reserve_entry(group)?;
        let id = self.alloc_id();
        self.group_mut(group)?.entries.insert(id);
        self.entries.insert(id, SoftEntry::new(group));
        Ok(id)
    }

    fn entry_copy(&mut self, src: FieldEntryId) -> SaiResult<FieldEntryId> {
        self.check_fault("entry_copy")?;
        let source = self.entry_ref(src)?;
        let copy = SoftEntry {
            group: source.group,
            priority: source.priority,
            enabled: source.enabled,
            installed: false,
            installs: 0,
            qualifiers: source.qualifiers.clone(),
            actions: source.actions.clone(),
            stat: None,
        };
        self.reserve_entry(copy.group)?;
        let id = self.alloc_id();
        self.group_mut(copy.group)?.entries.insert(id);
        self.entries.insert(id, copy);
        Ok(id)
    }

    fn entry_destroy(&mut self, entry: FieldEntryId) -> SaiResult<()> {
        self.check_fault("entry_destroy")?;
        let e = self
            .entries
            .remove(&entry)
            .ok_or_else(|| SaiError::not_found(format!("field entry {}", entry)))?;
        if let Some(g) = self.groups.get_mut(&e.group) {
            g.entries.remove(&entry);
        }
        if let Some(stat) = e.stat.and_then(|s| self.stats.get_mut(&s)) {
            stat.attached.remove(&entry);
        }
        Ok(())
    }

    fn entry_install(&mut self, entry: FieldEntryId) -> SaiResult<()> {
        self.check_fault("entry_install")?;
        let e = self.entry_mut(entry)?;
        e.installed = true;
        e.installs += 1;
        Ok(())
    }

    fn entry_reinstall(&mut self, entry: FieldEntryId) -> SaiResult<()> {
        self.check_fault("entry_reinstall")?;
        let e = self.entry_mut(entry)?;
        if !e.installed {
            return Err(SaiError::invalid_parameter(format!(
                "field entry {} is not installed",
                entry
            )));
        }
        e.installs += 1;
        Ok(())
    }

    fn entry_enable_get(&self, entry: FieldEntryId) -> SaiResult<bool> {
        Ok(self.entry_ref(entry)?.enabled)
    }

    fn entry_enable_set(&mut self, entry: FieldEntryId, enable: bool) -> SaiResult<()> {
        self.check_fault("entry_enable_set")?;
        self.entry_mut(entry)?.enabled = enable;
        Ok(())
    }

    fn entry_prio_get(&self, entry: FieldEntryId) -> SaiResult<i32> {
        Ok(self.entry_ref(entry)?.priority)
    }

    fn entry_prio_set(&mut self, entry: FieldEntryId, priority: i32) -> SaiResult<()> {
        self.check_fault("entry_prio_set")?;
        self.entry_mut(entry)?.priority = priority;
        Ok(())
    }

    fn qualify(
        &mut self,
        entry: FieldEntryId,
        qualifier: Qualifier,
        value: QualifierValue,
    ) -> SaiResult<()> {
        self.check_fault("qualify")?;
        let group = self.entry_ref(entry)?.group;
        if !self.group_ref(group)?.qset.contains(qualifier) {
            return Err(SaiError::invalid_parameter(format!(
                "qualifier {:?} not in qualifier set of field group {}",
                qualifier, group
            )));
        }
        self.entry_mut(entry)?.qualifiers.insert(qualifier, value);
        Ok(())
    }

    fn qualify_get(
        &self,
        entry: FieldEntryId,
        qualifier: Qualifier,
    ) -> SaiResult<Option<QualifierValue>> {
        Ok(self.entry_ref(entry)?.qualifiers.get(&qualifier).copied())
    }

    fn qualify_clear(&mut self, entry: FieldEntryId, qualifier: Qualifier) -> SaiResult<()> {
        self.check_fault("qualify_clear")?;
        self.entry_mut(entry)?.qualifiers.remove(&qualifier);
        Ok(())
    }

    fn action_add(&mut self, entry: FieldEntryId, action: FieldAction) -> SaiResult<()> {
        self.check_fault("action_add")?;
        self.entry_mut(entry)?.actions.insert(action.kind(), action);
        Ok(())
    }

    fn action_remove(&mut self, entry: FieldEntryId, kind: FieldActionKind) -> SaiResult<()> {
        self.check_fault("action_remove")?;
        self.entry_mut(entry)?
            .actions
            .remove(&kind)
            .map(|_| ())
            .ok_or_else(|| SaiError::not_found(format!("action {:?} on entry {}", kind, entry)))
    }

    fn action_get(
        &self,
        entry: FieldEntryId,
        kind: FieldActionKind,
    ) -> SaiResult<Option<FieldAction>> {
        Ok(self.entry_ref(entry)?.actions.get(&kind).copied())
    }

    fn stat_create(&mut self, group: FieldGroupId, kinds: &[StatKind]) -> SaiResult<FieldStatId> {
        self.check_fault("stat_create")?;
        if kinds.is_empty() {
            return Err(SaiError::invalid_parameter("stat without statistics"));
        }
        let limit = self.limits.counters_per_group;
        let g = self.group_ref(group)?;
        if g.stats.len() as u32 >= limit {
            return Err(SaiError::insufficient_resources(format!(
                "field group {} counters",
                group
            )));
        }
        let id = self.alloc_id();
        self.group_mut(group)?.stats.insert(id);
        self.stats.insert(
            id,
            SoftStat {
                group,
                kinds: kinds.to_vec(),
                packets: 0,
                bytes: 0,
                attached: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    fn stat_destroy(&mut self, stat: FieldStatId) -> SaiResult<()> {
        self.check_fault("stat_destroy")?;
        let s = self
            .stats
            .get(&stat)
            .ok_or_else(|| SaiError::not_found(format!("stat {}", stat)))?;
        if !s.attached.is_empty() {
            return Err(SaiError::object_in_use(format!("stat {}", stat)));
        }
        let group = s.group;
        self.stats.remove(&stat);
        if let Some(g) = self.groups.get_mut(&group) {
            g.stats.remove(&stat);
        }
        Ok(())
    }

    fn stat_attach(&mut self, entry: FieldEntryId, stat: FieldStatId) -> SaiResult<()> {
        self.check_fault("stat_attach")?;
        let e = self.entry_ref(entry)?;
        if e.stat.is_some() {
            return Err(SaiError::invalid_parameter(format!(
                "field entry {} already has a stat attached",
                entry
            )));
        }
        let group = e.group;
        let s = self
            .stats
            .get_mut(&stat)
            .ok_or_else(|| SaiError::not_found(format!("stat {}", stat)))?;
        if s.group != group {
            return Err(SaiError::invalid_parameter(format!(
                "stat {} belongs to field group {}, entry {} to {}",
                stat, s.group, entry, group
            )));
        }
        s.attached.insert(entry);
        self.entry_mut(entry)?.stat = Some(stat);
        Ok(())
    }

    fn stat_detach(&mut self, entry: FieldEntryId, stat: FieldStatId) -> SaiResult<()> {
        self.check_fault("stat_detach")?;
        if self.entry_ref(entry)?.stat != Some(stat) {
            return Err(SaiError::not_found(format!(
                "stat {} on field entry {}",
                stat, entry
            )));
        }
        self.entry_mut(entry)?.stat = None;
        if let Some(s) = self.stats.get_mut(&stat) {
            s.attached.remove(&entry);
        }
        Ok(())
    }

    fn stat_get(&self, stat: FieldStatId, kind: StatKind) -> SaiResult<u64> {
        let s = self
            .stats
            .get(&stat)
            .ok_or_else(|| SaiError::not_found(format!("stat {}", stat)))?;
        if !s.kinds.contains(&kind) {
            return Err(SaiError::invalid_parameter(format!(
                "stat {} does not collect {:?}",
                stat, kind
            )));
        }
        Ok(match kind {
            StatKind::Packets => s.packets,
            StatKind::Bytes => s.bytes,
        })
    }

    fn l3_intf_create(&mut self, mac: MacAddress) -> SaiResult<L3IntfId> {
        self.check_fault("l3_intf_create")?;
        let id = self.alloc_id();
        self.intfs.insert(id, mac);
        Ok(id)
    }

    fn l3_intf_destroy(&mut self, intf: L3IntfId) -> SaiResult<()> {
        self.check_fault("l3_intf_destroy")?;
        if self.egresses.values().any(|e| e.intf == intf) {
            return Err(SaiError::object_in_use(format!("l3 interface {}", intf)));
        }
        self.intfs
            .remove(&intf)
            .map(|_| ())
            .ok_or_else(|| SaiError::not_found(format!("l3 interface {}", intf)))
    }

    fn l3_egress_create(&mut self, intf: L3IntfId, dst_mac: MacAddress) -> SaiResult<EgressId> {
        self.check_fault("l3_egress_create")?;
        if !self.intfs.contains_key(&intf) {
            return Err(SaiError::not_found(format!("l3 interface {}", intf)));
        }
        let id = self.alloc_id();
        self.egresses.insert(id, SoftEgress { intf, dst_mac });
        Ok(id)
    }

    fn l3_egress_destroy(&mut self, egress: EgressId) -> SaiResult<()> {
        self.check_fault("l3_egress_destroy")?;
        self.egresses
            .remove(&egress)
            .map(|_| ())
            .ok_or_else(|| SaiError::not_found(format!("l3 egress {}", egress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::field::PortBitmap;
    use crate::error::SaiStatus;
    use std::net::Ipv4Addr;

    fn src_ip_qset() -> QualifierSet {
        [Qualifier::StageIngress, Qualifier::SrcIp, Qualifier::InPorts]
            .into_iter()
            .collect()
    }

    fn src_ip(last: u8) -> QualifierValue {
        QualifierValue::Ipv4 {
            data: Ipv4Addr::new(10, 0, 0, last),
            mask: Ipv4Addr::BROADCAST,
        }
    }

    #[test]
    fn test_group_lifecycle() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 3).unwrap();
        assert_eq!(engine.group_get(group).unwrap(), src_ip_qset());
        engine.group_priority_set(group, 7).unwrap();
        assert_eq!(engine.group(group).unwrap().priority, 7);

        let entry = engine.entry_create(group).unwrap();
        assert_eq!(
            engine.group_destroy(group).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
        engine.entry_destroy(entry).unwrap();
        engine.group_destroy(group).unwrap();
        assert_eq!(engine.group_count(), 0);
    }

    #[test]
    fn test_qualify_outside_qset() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        let entry = engine.entry_create(group).unwrap();

        engine.qualify(entry, Qualifier::SrcIp, src_ip(1)).unwrap();
        let err = engine
            .qualify(entry, Qualifier::DstIp, src_ip(1))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidParameter);

        assert_eq!(
            engine.qualify_get(entry, Qualifier::SrcIp).unwrap(),
            Some(src_ip(1))
        );
        engine.qualify_clear(entry, Qualifier::SrcIp).unwrap();
        assert_eq!(engine.qualify_get(entry, Qualifier::SrcIp).unwrap(), None);
    }

    #[test]
    fn test_entry_copy_skips_stat_and_install() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        let entry = engine.entry_create(group).unwrap();
        engine.qualify(entry, Qualifier::SrcIp, src_ip(1)).unwrap();
        engine.action_add(entry, FieldAction::Drop).unwrap();
        engine.entry_prio_set(entry, 10).unwrap();
        engine.entry_enable_set(entry, false).unwrap();
        let stat = engine.stat_create(group, &[StatKind::Packets]).unwrap();
        engine.stat_attach(entry, stat).unwrap();
        engine.entry_install(entry).unwrap();

        let copy = engine.entry_copy(entry).unwrap();
        let c = engine.entry(copy).unwrap();
        assert_eq!(c.priority, 10);
        assert!(!c.enabled);
        assert!(!c.installed);
        assert_eq!(c.stat, None);
        assert_eq!(c.qualifiers.get(&Qualifier::SrcIp), Some(&src_ip(1)));
        assert_eq!(c.actions.get(&FieldActionKind::Drop), Some(&FieldAction::Drop));
    }

    #[test]
    fn test_reinstall_requires_install() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        let entry = engine.entry_create(group).unwrap();
        assert!(engine.entry_reinstall(entry).is_err());
        engine.entry_install(entry).unwrap();
        engine.entry_reinstall(entry).unwrap();
        assert_eq!(engine.entry(entry).unwrap().installs, 2);
    }

    #[test]
    fn test_group_capacity() {
        let mut engine = SoftMatchEngine::with_limits(SoftEngineLimits {
            max_groups: 1,
            entries_per_group: 2,
            counters_per_group: 1,
        });
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        assert!(engine.group_create(src_ip_qset(), 0).is_err());

        let first = engine.entry_create(group).unwrap();
        engine.entry_create(group).unwrap();
        assert_eq!(
            engine.entry_copy(first).unwrap_err().status(),
            SaiStatus::InsufficientResources
        );

        let status = engine.group_status_get(group).unwrap();
        assert_eq!(status.entries_total, 2);
        assert_eq!(status.entries_free, 0);
        assert_eq!(status.counters_free, 1);
    }

    #[test]
    fn test_stat_counts_and_in_use() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        let entry = engine.entry_create(group).unwrap();
        let stat = engine
            .stat_create(group, &[StatKind::Packets, StatKind::Bytes])
            .unwrap();
        engine.stat_attach(entry, stat).unwrap();
        engine.add_stat_counts(stat, 3, 192).unwrap();
        assert_eq!(engine.stat_get(stat, StatKind::Packets).unwrap(), 3);
        assert_eq!(engine.stat_get(stat, StatKind::Bytes).unwrap(), 192);

        assert_eq!(
            engine.stat_destroy(stat).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
        engine.stat_detach(entry, stat).unwrap();
        engine.stat_destroy(stat).unwrap();
        assert_eq!(engine.stat_count(), 0);
    }

    #[test]
    fn test_mac_rewrite_objects() {
        let mut engine = SoftMatchEngine::new();
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let intf = engine.l3_intf_create(mac).unwrap();
        let egress = engine.l3_egress_create(intf, mac).unwrap();
        assert_eq!(engine.egress_dst_mac(egress), Some(mac));
        assert!(engine.l3_intf_destroy(intf).is_err());
        engine.l3_egress_destroy(egress).unwrap();
        engine.l3_intf_destroy(intf).unwrap();
        assert_eq!(engine.l3_intf_count(), 0);
    }

    #[test]
    fn test_injected_fault() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        engine.inject_fault("entry_create", 1);
        engine.entry_create(group).unwrap();
        assert_eq!(
            engine.entry_create(group).unwrap_err().status(),
            SaiStatus::Failure
        );
        // One-shot
        engine.entry_create(group).unwrap();
        assert_eq!(engine.entry_count(), 2);
    }

    #[test]
    fn test_ports_qualifier() {
        let mut engine = SoftMatchEngine::new();
        let group = engine.group_create(src_ip_qset(), 0).unwrap();
        let entry = engine.entry_create(group).unwrap();
        let ports: PortBitmap = [1, 2].into_iter().collect();
        let value = QualifierValue::Ports {
            data: ports,
            mask: ports,
        };
        engine.qualify(entry, Qualifier::InPorts, value).unwrap();
        assert_eq!(
            engine.qualify_get(entry, Qualifier::InPorts).unwrap(),
            Some(value)
        );
    }
}
