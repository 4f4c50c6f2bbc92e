//! ACL entry lifecycle.
//!
//! A user-created entry is the canonical entry of its family. Bind points
//! that need a second value for the same qualifier add clones (see
//! `clone`); every attribute change on the canonical entry is applied to
//! the whole family.
//!
//! Entries are created disabled, bound to every effective bind point of
//! their table, installed, and only then enabled, so hardware never matches
//! a partially bound entry.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use sonic_sai::api::{EgressId, FieldAction, FieldActionKind, FieldEntryId, L3IntfId, MatchEngine};
use sonic_sai::{
    AclCounterOid, AclEntryOid, AclTableOid, MacAddress, RawSaiObjectId, SaiError, SaiResult,
};

use crate::lag::LagResolver;
use crate::orch::{AclOrch, ENTRY_SUB_TYPE_CANONICAL, ENTRY_SUB_TYPE_CLONE};
use crate::rule::{AclActionValue, AclEntryAction, AclEntryMatch, AclMatchValue};
use crate::types::{AclActionType, AclBindPointType, AclMatchField, AclPriority, BindMask, BindPoint};

/// ACL entry creation attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclEntryConfig {
    /// Owning table (mandatory).
    pub table: Option<RawSaiObjectId>,
    /// Defaults to the configured minimum priority.
    pub priority: Option<AclPriority>,
    /// Defaults to enabled.
    pub admin_state: Option<bool>,
    pub counter: Option<RawSaiObjectId>,
    pub matches: Vec<AclEntryMatch>,
    pub actions: Vec<AclEntryAction>,
}

impl AclEntryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<RawSaiObjectId>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_priority(mut self, priority: AclPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_admin_state(mut self, enabled: bool) -> Self {
        self.admin_state = Some(enabled);
        self
    }

    pub fn with_counter(mut self, counter: impl Into<RawSaiObjectId>) -> Self {
        self.counter = Some(counter.into());
        self
    }

    pub fn with_match(mut self, m: AclEntryMatch) -> Self {
        self.matches.push(m);
        self
    }

    pub fn with_action(mut self, action: AclEntryAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// A settable entry attribute. `None` values clear the field, action or
/// counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclEntryAttr {
    AdminState(bool),
    Priority(AclPriority),
    Counter(Option<RawSaiObjectId>),
    Field(AclMatchField, Option<AclMatchValue>),
    Action(AclActionType, Option<AclActionValue>),
}

/// Entry attribute identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclEntryAttrId {
    Table,
    Priority,
    AdminState,
    Counter,
    Field(AclMatchField),
    Action(AclActionType),
}

impl fmt::Display for AclEntryAttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "SAI_ACL_ENTRY_ATTR_TABLE_ID"),
            Self::Priority => write!(f, "SAI_ACL_ENTRY_ATTR_PRIORITY"),
            Self::AdminState => write!(f, "SAI_ACL_ENTRY_ATTR_ADMIN_STATE"),
            Self::Counter => write!(f, "SAI_ACL_ENTRY_ATTR_ACTION_COUNTER"),
            Self::Field(field) => write!(f, "SAI_ACL_ENTRY_ATTR_FIELD_{}", field),
            Self::Action(action) => write!(f, "SAI_ACL_ENTRY_ATTR_ACTION_{}", action),
        }
    }
}

/// Entry attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclEntryAttrValue {
    Table(AclTableOid),
    Priority(AclPriority),
    AdminState(bool),
    Counter(Option<AclCounterOid>),
    Field(AclMatchField, Option<AclMatchValue>),
    Action(AclActionType, Option<AclActionValue>),
}

/// L3 objects backing a MAC rewrite action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacRewrite {
    pub intf: L3IntfId,
    pub egress: EgressId,
}

/// ACL entry record, canonical or clone.
#[derive(Debug, Clone)]
pub struct AclEntry {
    pub table: u32,
    pub hw_entry: FieldEntryId,
    /// Canonical entry of a clone; `None` for canonical entries.
    pub canonical: Option<u32>,
    /// Clones of a canonical entry.
    pub clones: Vec<u32>,
    /// Bind point types a clone diverges from its canonical entry on.
    pub bind_mask: BindMask,
    /// Bind value programmed per bind point type.
    pub bind_values: BTreeMap<AclBindPointType, u32>,
    pub priority: AclPriority,
    pub admin_state: bool,
    pub installed: bool,
    pub counter: Option<u32>,
    /// User matches; kept on the canonical entry only.
    pub matches: BTreeMap<AclMatchField, AclMatchValue>,
    /// User actions; kept on the canonical entry only.
    pub actions: BTreeMap<AclActionType, AclEntryAction>,
    pub mac_rewrite: Option<MacRewrite>,
}

impl AclEntry {
    pub fn is_clone(&self) -> bool {
        self.canonical.is_some()
    }

    /// Handle sub-type for this record.
    pub fn sub_type(&self) -> u8 {
        if self.is_clone() {
            ENTRY_SUB_TYPE_CLONE
        } else {
            ENTRY_SUB_TYPE_CANONICAL
        }
    }

    /// Bind points programmed on this hardware entry.
    pub fn bind_points(&self) -> impl Iterator<Item = BindPoint> + '_ {
        self.bind_values
            .iter()
            .map(|(bind_type, value)| BindPoint::new(*bind_type, *value))
    }

    /// Source and destination MACs of the rewrite actions, if any is set.
    fn rewrite_macs(&self) -> Option<(MacAddress, MacAddress)> {
        let mac = |action_type: AclActionType| match self.actions.get(&action_type) {
            Some(AclEntryAction {
                value: AclActionValue::Mac(mac),
                ..
            }) => Some(*mac),
            _ => None,
        };
        let src = mac(AclActionType::SetSrcMac);
        let dst = mac(AclActionType::SetDstMac);
        if src.is_none() && dst.is_none() {
            return None;
        }
        Some((
            src.unwrap_or(MacAddress::ZERO),
            dst.unwrap_or(MacAddress::ZERO),
        ))
    }
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    // ============ Validation ============

    fn check_priority(&self, priority: AclPriority) -> SaiResult<()> {
        if !self.config.priority_in_range(priority) {
            return Err(SaiError::invalid_value(
                AclEntryAttrId::Priority.to_string(),
                format!(
                    "{} outside {}..={}",
                    priority, self.config.min_priority, self.config.max_priority
                ),
            ));
        }
        Ok(())
    }

    /// Checks a match against the table's own qualifier set and the
    /// platform's ports.
    ///
    /// Qualifiers a table only carries through group membership are left
    /// out: they disappear with the member.
    fn validate_match(&self, table: u32, m: &AclEntryMatch) -> SaiResult<()> {
        m.validate()?;
        let qset = self.tables.get(table)?.base_qset;
        if !m.field.qualifier().is_some_and(|q| qset.contains(q)) {
            return Err(SaiError::invalid_parameter(format!(
                "ACL field {} is not in the qualifier set of table {}",
                m.field, table
            )));
        }
        let port_count = self.config.platform.port_count;
        let ports: Vec<u32> = match &m.value {
            AclMatchValue::Port(port) => vec![port.index()],
            AclMatchValue::PortList(ports) => ports.iter().map(|p| p.index()).collect(),
            _ => Vec::new(),
        };
        if let Some(port) = ports.into_iter().find(|p| *p >= port_count) {
            return Err(SaiError::invalid_value(
                AclEntryAttrId::Field(m.field).to_string(),
                format!("port {} out of range", port),
            ));
        }
        Ok(())
    }

    // ============ Hardware Programming ============

    fn add_field_actions(&mut self, index: u32) -> SaiResult<()> {
        let entry = self.entries.get(index)?;
        let hw_entry = entry.hw_entry;
        let actions: Vec<FieldAction> = entry
            .actions
            .values()
            .filter_map(|a| a.field_action())
            .collect();
        for action in actions {
            self.engine.action_add(hw_entry, action)?;
        }
        Ok(())
    }

    /// Creates the L3 interface and egress object for the family's MAC
    /// rewrite actions and points every family member at them.
    fn create_mac_rewrite(&mut self, canonical: u32) -> SaiResult<()> {
        let Some((src, dst)) = self.entries.get(canonical)?.rewrite_macs() else {
            return Ok(());
        };
        let intf = self.engine.l3_intf_create(src)?;
        let egress = self.engine.l3_egress_create(intf, dst)?;
        self.entries.get_mut(canonical)?.mac_rewrite = Some(MacRewrite { intf, egress });
        for index in self.family(canonical)? {
            let hw_entry = self.entries.get(index)?.hw_entry;
            self.engine.action_add(hw_entry, FieldAction::L3Switch(egress))?;
        }
        debug!(
            "ACL entry {}: MAC rewrite src {} dst {} via egress {}",
            canonical, src, dst, egress
        );
        Ok(())
    }

    /// Destroys the family's MAC rewrite objects.
    fn release_mac_rewrite(&mut self, canonical: u32) -> SaiResult<()> {
        let Some(rewrite) = self.entries.get_mut(canonical)?.mac_rewrite.take() else {
            return Ok(());
        };
        self.engine.l3_egress_destroy(rewrite.egress)?;
        self.engine.l3_intf_destroy(rewrite.intf)
    }

    // ============ Entry Operations ============

    /// Creates an entry, replays the table's bind points onto it and
    /// enables it.
    pub fn create_entry(&mut self, config: &AclEntryConfig) -> SaiResult<AclEntryOid> {
        let table_raw = config
            .table
            .ok_or_else(|| SaiError::mandatory_missing(AclEntryAttrId::Table.to_string()))?;
        let table = self.table_index(AclTableOid::try_from_raw(table_raw)?)?;
        let priority = config.priority.unwrap_or(self.config.min_priority);
        self.check_priority(priority)?;
        for m in &config.matches {
            self.validate_match(table, m)?;
        }
        for action in &config.actions {
            action.validate()?;
        }
        let counter = match config.counter {
            Some(raw) => Some(self.resolve_counter(table, raw)?),
            None => None,
        };
        self.check_table_room(table)?;

        let index = self.entries.reserve()?;
        let hw_group = self.tables.get(table)?.hw_group;
        let hw_entry = match self.engine.entry_create(hw_group) {
            Ok(hw_entry) => hw_entry,
            Err(e) => {
                self.entries.free(index)?;
                return Err(e);
            }
        };
        let admin_state = config.admin_state.unwrap_or(true);
        let record = AclEntry {
            table,
            hw_entry,
            canonical: None,
            clones: Vec::new(),
            bind_mask: BindMask::empty(),
            bind_values: BTreeMap::new(),
            priority,
            admin_state,
            installed: false,
            counter: None,
            matches: config
                .matches
                .iter()
                .map(|m| (m.field, m.value.clone()))
                .collect(),
            actions: config.actions.iter().map(|a| (a.action_type, *a)).collect(),
            mac_rewrite: None,
        };
        self.entries.set(index, record)?;
        self.table_entry_attach(table, index)?;

        self.engine.entry_enable_set(hw_entry, false)?;
        self.engine.entry_prio_set(hw_entry, priority)?;
        let qualifiers: Vec<_> = config
            .matches
            .iter()
            .filter_map(|m| m.field.qualifier())
            .collect();
        for qualifier in qualifiers {
            self.program_qualifier(index, qualifier)?;
        }
        self.add_field_actions(index)?;
        self.create_mac_rewrite(index)?;
        if let Some(counter) = counter {
            self.attach_family_counter(index, counter)?;
        }

        let bind_points: Vec<BindPoint> =
            self.tables.get(table)?.effective_bind_points().collect();
        for bind_point in bind_points {
            self.attach_to_family(index, bind_point)?;
        }

        let family = self.family(index)?;
        for member in &family {
            let hw_entry = self.entries.get(*member)?.hw_entry;
            self.engine.entry_install(hw_entry)?;
            self.entries.get_mut(*member)?.installed = true;
        }
        for member in &family {
            let hw_entry = self.entries.get(*member)?.hw_entry;
            self.engine.entry_enable_set(hw_entry, admin_state)?;
        }

        let oid = self.entry_oid(index)?;
        info!(
            "Created ACL entry {} in table {} priority {} ({} clones)",
            oid,
            Self::table_oid(table),
            priority,
            family.len() - 1
        );
        Ok(oid)
    }

    /// Removes a canonical entry and all its clones.
    pub fn remove_entry(&mut self, entry: AclEntryOid) -> SaiResult<()> {
        let index = self.entry_index(entry)?;
        let record = self.entries.get(index)?;
        if record.is_clone() {
            return Err(SaiError::invalid_parameter(format!(
                "ACL entry {} is a clone and cannot be removed directly",
                entry
            )));
        }
        let hw_entry = record.hw_entry;
        let table = record.table;
        let counter = record.counter;
        let clones = record.clones.clone();

        self.release_mac_rewrite(index)?;
        if let Some(counter) = counter {
            let hw_stat = self.counters.get(counter)?.hw_stat;
            self.engine.stat_detach(hw_entry, hw_stat)?;
            self.counters.decrement_ref(counter)?;
        }
        self.engine.entry_destroy(hw_entry)?;
        self.table_entry_detach(table, index)?;
        for clone in clones {
            self.destroy_clone(clone)?;
        }
        self.entries.free(index)?;
        info!("Removed ACL entry {}", entry);
        Ok(())
    }

    /// Updates one attribute of a canonical entry and its clones.
    pub fn set_entry_attribute(&mut self, entry: AclEntryOid, attr: AclEntryAttr) -> SaiResult<()> {
        let index = self.entry_index(entry)?;
        if self.entries.get(index)?.is_clone() {
            return Err(SaiError::invalid_parameter(format!(
                "ACL entry {} is a clone; set attributes on its canonical entry",
                entry
            )));
        }
        match attr {
            AclEntryAttr::AdminState(enabled) => {
                for member in self.family(index)? {
                    let record = self.entries.get_mut(member)?;
                    record.admin_state = enabled;
                    let hw_entry = record.hw_entry;
                    self.engine.entry_enable_set(hw_entry, enabled)?;
                }
            }
            AclEntryAttr::Priority(priority) => {
                self.check_priority(priority)?;
                for member in self.family(index)? {
                    let record = self.entries.get_mut(member)?;
                    record.priority = priority;
                    let hw_entry = record.hw_entry;
                    self.engine.entry_prio_set(hw_entry, priority)?;
                    self.refresh_hw(member)?;
                }
            }
            AclEntryAttr::Counter(counter) => self.set_entry_counter(index, counter)?,
            AclEntryAttr::Field(field, value) => self.set_entry_field(index, field, value)?,
            AclEntryAttr::Action(action_type, value) => {
                self.set_entry_action(index, action_type, value)?
            }
        }
        debug!("Updated ACL entry {}", entry);
        Ok(())
    }

    fn set_entry_counter(&mut self, index: u32, counter: Option<RawSaiObjectId>) -> SaiResult<()> {
        let table = self.entries.get(index)?.table;
        let new = match counter {
            Some(raw) => Some(self.resolve_counter(table, raw)?),
            None => None,
        };
        let old = self.entries.get(index)?.counter;
        if old == new {
            return Ok(());
        }
        if let Some(old) = old {
            self.detach_family_counter(index, old)?;
        }
        if let Some(new) = new {
            self.attach_family_counter(index, new)?;
        }
        Ok(())
    }

    fn set_entry_field(
        &mut self,
        index: u32,
        field: AclMatchField,
        value: Option<AclMatchValue>,
    ) -> SaiResult<()> {
        let table = self.entries.get(index)?.table;
        let qualifier = field
            .qualifier()
            .ok_or_else(|| SaiError::not_supported(format!("ACL field {}", field)))?;
        match &value {
            Some(value) => self.validate_match(table, &AclEntryMatch::new(field, value.clone()))?,
            None if !self.tables.get(table)?.base_qset.contains(qualifier) => {
                return Err(SaiError::invalid_parameter(format!(
                    "ACL field {} is not in the qualifier set of table {}",
                    field, table
                )))
            }
            None => {}
        }

        let matches = &mut self.entries.get_mut(index)?.matches;
        match value {
            Some(value) => {
                matches.insert(field, value);
            }
            None => {
                matches.remove(&field);
            }
        }
        for member in self.family(index)? {
            self.program_qualifier(member, qualifier)?;
            self.refresh_hw(member)?;
        }
        Ok(())
    }

    fn set_entry_action(
        &mut self,
        index: u32,
        action_type: AclActionType,
        value: Option<AclActionValue>,
    ) -> SaiResult<()> {
        let new = value.map(|v| AclEntryAction::new(action_type, v));
        if let Some(action) = &new {
            action.validate()?;
        }
        let family = self.family(index)?;

        if action_type.is_mac_rewrite() {
            if self.entries.get(index)?.mac_rewrite.is_some() {
                for member in &family {
                    let hw_entry = self.entries.get(*member)?.hw_entry;
                    self.engine.action_remove(hw_entry, FieldActionKind::L3Switch)?;
                }
            }
            self.release_mac_rewrite(index)?;
            let actions = &mut self.entries.get_mut(index)?.actions;
            match new {
                Some(action) => actions.insert(action_type, action),
                None => actions.remove(&action_type),
            };
            self.create_mac_rewrite(index)?;
        } else {
            let old = self.entries.get(index)?.actions.get(&action_type).copied();
            let old = old.and_then(|a| a.field_action());
            let replacement = new.and_then(|a| a.field_action());
            for member in &family {
                let hw_entry = self.entries.get(*member)?.hw_entry;
                if let Some(old) = old {
                    self.engine.action_remove(hw_entry, old.kind())?;
                }
                if let Some(replacement) = replacement {
                    self.engine.action_add(hw_entry, replacement)?;
                }
            }
            let actions = &mut self.entries.get_mut(index)?.actions;
            match new {
                Some(action) => actions.insert(action_type, action),
                None => actions.remove(&action_type),
            };
        }

        for member in &family {
            self.refresh_hw(*member)?;
        }
        Ok(())
    }

    /// Reads entry attributes. Clones report their canonical entry's
    /// matches and actions.
    pub fn get_entry_attribute(
        &self,
        entry: AclEntryOid,
        ids: &[AclEntryAttrId],
    ) -> SaiResult<Vec<AclEntryAttrValue>> {
        let index = self.entry_index(entry)?;
        let record = self.entries.get(index)?;
        let canonical = self.entries.get(record.canonical.unwrap_or(index))?;
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let value = match id {
                AclEntryAttrId::Table => AclEntryAttrValue::Table(Self::table_oid(record.table)),
                AclEntryAttrId::Priority => AclEntryAttrValue::Priority(record.priority),
                AclEntryAttrId::AdminState => AclEntryAttrValue::AdminState(record.admin_state),
                AclEntryAttrId::Counter => AclEntryAttrValue::Counter(
                    record
                        .counter
                        .map(|c| Self::counter_oid(c, record.table)),
                ),
                AclEntryAttrId::Field(field) => {
                    AclEntryAttrValue::Field(*field, canonical.matches.get(field).cloned())
                }
                AclEntryAttrId::Action(action_type) => AclEntryAttrValue::Action(
                    *action_type,
                    canonical.actions.get(action_type).map(|a| a.value),
                ),
            };
            values.push(value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;
    use crate::lag::StaticLagResolver;
    use crate::table::AclTableConfig;
    use crate::types::{AclPacketAction, AclStage};
    use pretty_assertions::assert_eq;
    use sai_object_store::RefCounted;
    use sonic_sai::api::{Qualifier, QualifierValue, SoftMatchEngine};
    use sonic_sai::{PortOid, SaiStatus};
    use std::net::Ipv4Addr;

    type Orch = AclOrch<SoftMatchEngine, StaticLagResolver>;

    fn setup() -> (Orch, AclTableOid) {
        let mut orch = AclOrch::new(
            AclConfig::default(),
            SoftMatchEngine::new(),
            StaticLagResolver::new(),
        )
        .unwrap();
        let table = orch
            .create_table(
                &AclTableConfig::new()
                    .with_stage(AclStage::Ingress)
                    .with_fields([AclMatchField::SrcIp, AclMatchField::InPorts])
                    .with_bind_type(AclBindPointType::Port),
            )
            .unwrap();
        (orch, table)
    }

    fn src_ip_entry(table: AclTableOid) -> AclEntryConfig {
        AclEntryConfig::new()
            .with_table(table)
            .with_priority(10)
            .with_match(AclEntryMatch::src_ip(Ipv4Addr::new(10, 0, 0, 1), None))
            .with_action(AclEntryAction::drop())
    }

    #[test]
    fn test_create_entry() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();

        let record = orch.entry(entry).unwrap();
        assert!(record.installed);
        assert!(!record.is_clone());
        assert_eq!(entry.map_index(), table.index() as u16);

        let hw = orch.engine().entry(record.hw_entry).unwrap();
        assert!(hw.installed);
        assert!(hw.enabled);
        assert_eq!(hw.priority, 10);
        assert_eq!(
            hw.qualifiers.get(&Qualifier::SrcIp),
            Some(&QualifierValue::Ipv4 {
                data: Ipv4Addr::new(10, 0, 0, 1),
                mask: Ipv4Addr::BROADCAST
            })
        );
        assert_eq!(
            hw.actions.get(&FieldActionKind::Drop),
            Some(&FieldAction::Drop)
        );
        assert_eq!(orch.table(table).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_create_entry_disabled() {
        let (mut orch, table) = setup();
        let entry = orch
            .create_entry(&src_ip_entry(table).with_admin_state(false))
            .unwrap();
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        let hw = orch.engine().entry(hw_entry).unwrap();
        assert!(hw.installed);
        assert!(!hw.enabled);
    }

    #[test]
    fn test_create_entry_validation() {
        let (mut orch, table) = setup();

        let err = orch.create_entry(&AclEntryConfig::new()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::MandatoryAttributeMissing);

        let err = orch
            .create_entry(&src_ip_entry(table).with_priority(-5))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttributeValue);

        let err = orch
            .create_entry(
                &src_ip_entry(table)
                    .with_match(AclEntryMatch::dst_ip(Ipv4Addr::new(1, 1, 1, 1), None)),
            )
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidParameter);

        let err = orch
            .create_entry(&src_ip_entry(table).with_match(AclEntryMatch::in_ports(vec![
                PortOid::new(0, 0, 500),
            ])))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttributeValue);

        let err = orch
            .create_entry(&AclEntryConfig::new().with_table(PortOid::new(0, 0, 1)))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidObjectType);

        // Nothing was allocated by the failed attempts
        assert_eq!(orch.stats().entries, 0);
        assert_eq!(orch.engine().entry_count(), 0);
    }

    #[test]
    fn test_create_entry_respects_table_size() {
        let (mut orch, _) = setup();
        let table = orch
            .create_table(
                &AclTableConfig::new()
                    .with_stage(AclStage::Ingress)
                    .with_field(AclMatchField::SrcIp)
                    .with_size(1),
            )
            .unwrap();
        orch.create_entry(&src_ip_entry(table)).unwrap();
        let err = orch.create_entry(&src_ip_entry(table)).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
    }

    #[test]
    fn test_remove_entry() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        let hw_entry = orch.entry(entry).unwrap().hw_entry;

        orch.remove_entry(entry).unwrap();
        assert!(orch.entry(entry).is_err());
        assert!(orch.engine().entry(hw_entry).is_none());
        assert_eq!(orch.table(table).unwrap().ref_count(), 0);
        orch.remove_table(table).unwrap();
    }

    #[test]
    fn test_table_in_use_by_entry() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        assert_eq!(
            orch.remove_table(table).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
        orch.remove_entry(entry).unwrap();
        orch.remove_table(table).unwrap();
    }

    #[test]
    fn test_set_admin_state() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        orch.set_entry_attribute(entry, AclEntryAttr::AdminState(false))
            .unwrap();

        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        assert!(!orch.engine().entry(hw_entry).unwrap().enabled);
        assert_eq!(
            orch.get_entry_attribute(entry, &[AclEntryAttrId::AdminState])
                .unwrap(),
            vec![AclEntryAttrValue::AdminState(false)]
        );
    }

    #[test]
    fn test_set_field_reinstalls() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        let installs = orch.engine().entry(hw_entry).unwrap().installs;

        let value = AclMatchValue::Ipv4 {
            addr: Ipv4Addr::new(10, 0, 0, 0),
            mask: Some(Ipv4Addr::new(255, 0, 0, 0)),
        };
        orch.set_entry_attribute(
            entry,
            AclEntryAttr::Field(AclMatchField::SrcIp, Some(value.clone())),
        )
        .unwrap();

        let hw = orch.engine().entry(hw_entry).unwrap();
        assert_eq!(hw.installs, installs + 1);
        assert!(hw.enabled);
        assert_eq!(
            hw.qualifiers.get(&Qualifier::SrcIp),
            Some(&value.qualifier_value())
        );

        orch.set_entry_attribute(entry, AclEntryAttr::Field(AclMatchField::SrcIp, None))
            .unwrap();
        let hw = orch.engine().entry(hw_entry).unwrap();
        assert!(hw.qualifiers.get(&Qualifier::SrcIp).is_none());
    }

    #[test]
    fn test_set_action() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        let hw_entry = orch.entry(entry).unwrap().hw_entry;

        orch.set_entry_attribute(
            entry,
            AclEntryAttr::Action(
                AclActionType::PacketAction,
                Some(AclActionValue::PacketAction(AclPacketAction::Forward)),
            ),
        )
        .unwrap();
        let hw = orch.engine().entry(hw_entry).unwrap();
        assert!(!hw.actions.contains_key(&FieldActionKind::Drop));
        assert!(hw.actions.contains_key(&FieldActionKind::DropCancel));
    }

    #[test]
    fn test_mac_rewrite_lifecycle() {
        let (mut orch, table) = setup();
        let dst: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let entry = orch
            .create_entry(&src_ip_entry(table).with_action(AclEntryAction::set_dst_mac(dst)))
            .unwrap();
        let rewrite = orch.entry(entry).unwrap().mac_rewrite.unwrap();
        assert_eq!(orch.engine().egress_dst_mac(rewrite.egress), Some(dst));
        assert_eq!(orch.engine().l3_intf_count(), 1);

        let src: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        orch.set_entry_attribute(
            entry,
            AclEntryAttr::Action(AclActionType::SetSrcMac, Some(AclActionValue::Mac(src))),
        )
        .unwrap();
        let replaced = orch.entry(entry).unwrap().mac_rewrite.unwrap();
        assert_ne!(replaced, rewrite);
        assert_eq!(orch.engine().egress_count(), 1);
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        assert_eq!(
            orch.engine()
                .entry(hw_entry)
                .unwrap()
                .actions
                .get(&FieldActionKind::L3Switch),
            Some(&FieldAction::L3Switch(replaced.egress))
        );

        orch.remove_entry(entry).unwrap();
        assert_eq!(orch.engine().egress_count(), 0);
        assert_eq!(orch.engine().l3_intf_count(), 0);
    }

    #[test]
    fn test_get_entry_attribute() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        let values = orch
            .get_entry_attribute(
                entry,
                &[
                    AclEntryAttrId::Table,
                    AclEntryAttrId::Priority,
                    AclEntryAttrId::Counter,
                    AclEntryAttrId::Field(AclMatchField::SrcIp),
                    AclEntryAttrId::Action(AclActionType::Redirect),
                ],
            )
            .unwrap();
        assert_eq!(
            values,
            vec![
                AclEntryAttrValue::Table(table),
                AclEntryAttrValue::Priority(10),
                AclEntryAttrValue::Counter(None),
                AclEntryAttrValue::Field(
                    AclMatchField::SrcIp,
                    Some(AclMatchValue::Ipv4 {
                        addr: Ipv4Addr::new(10, 0, 0, 1),
                        mask: None
                    })
                ),
                AclEntryAttrValue::Action(AclActionType::Redirect, None),
            ]
        );
    }

    #[test]
    fn test_stale_entry_handle() {
        let (mut orch, table) = setup();
        let entry = orch.create_entry(&src_ip_entry(table)).unwrap();
        // Same index, wrong owning table
        let forged = AclEntryOid::new(0, 9, entry.index());
        assert_eq!(
            orch.remove_entry(forged).unwrap_err().status(),
            SaiStatus::ItemNotFound
        );
    }
}
