//! ACL table management.
//!
//! A table turns a requested set of match fields and bind point types into a
//! hardware qualifier set backed by one match engine priority group. It
//! tracks its entries (clones included), the groups it belongs to and the
//! bind points that reach it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info, warn};
use sai_object_store::{RefCount, RefCounted};
use serde::Deserialize;
use sonic_sai::api::{FieldGroupId, MatchEngine, QualifierSet};
use sonic_sai::{AclEntryOid, AclTableOid, SaiError, SaiResult};

use crate::bind::bind_type_qualifier;
use crate::config::PlatformCapabilities;
use crate::lag::LagResolver;
use crate::orch::AclOrch;
use crate::types::{AclBindPointType, AclMatchField, AclPriority, AclStage, BindPoint};

/// ACL table creation attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclTableConfig {
    /// ACL stage (mandatory).
    pub stage: Option<AclStage>,
    /// Bind point types the table accepts.
    pub bind_types: Vec<AclBindPointType>,
    /// Match fields (at least one).
    pub fields: Vec<AclMatchField>,
    /// Entry limit; `None` leaves the table bounded by the hardware group.
    pub size: Option<u32>,
}

impl AclTableConfig {
    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: AclStage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_bind_type(mut self, bind_type: AclBindPointType) -> Self {
        self.bind_types.push(bind_type);
        self
    }

    pub fn with_bind_types(mut self, bind_types: impl IntoIterator<Item = AclBindPointType>) -> Self {
        self.bind_types.extend(bind_types);
        self
    }

    pub fn with_field(mut self, field: AclMatchField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = AclMatchField>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SaiResult<()> {
        if self.stage.is_none() {
            return Err(SaiError::mandatory_missing("SAI_ACL_TABLE_ATTR_ACL_STAGE"));
        }
        if self.fields.is_empty() {
            return Err(SaiError::mandatory_missing("SAI_ACL_TABLE_ATTR_FIELD_*"));
        }
        if let Some(field) = self.fields.iter().find(|f| f.qualifier().is_none()) {
            return Err(SaiError::not_supported(format!("ACL field {}", field)));
        }
        if self.bind_types.contains(&AclBindPointType::RouterInterface) {
            return Err(SaiError::not_supported(format!(
                "ACL bind point type {}",
                AclBindPointType::RouterInterface
            )));
        }
        Ok(())
    }

    /// Computes the hardware qualifier set for this configuration.
    pub fn qualifiers(&self, platform: &PlatformCapabilities) -> SaiResult<QualifierSet> {
        self.validate()?;
        let stage = self
            .stage
            .ok_or_else(|| SaiError::mandatory_missing("SAI_ACL_TABLE_ATTR_ACL_STAGE"))?;
        let mut qset = QualifierSet::new();
        qset.insert(stage.qualifier());
        for field in &self.fields {
            if let Some(q) = field.qualifier() {
                qset.insert(q);
            }
        }
        for bind_type in &self.bind_types {
            if let Some(q) = bind_type_qualifier(stage, *bind_type, platform)? {
                qset.insert(q);
            }
        }
        Ok(qset)
    }
}

/// Table attribute identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclTableAttrId {
    Stage,
    BindPointTypeList,
    Field(AclMatchField),
    Size,
    AvailableEntry,
    AvailableCounter,
    EntryList,
}

impl fmt::Display for AclTableAttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage => write!(f, "SAI_ACL_TABLE_ATTR_ACL_STAGE"),
            Self::BindPointTypeList => write!(f, "SAI_ACL_TABLE_ATTR_ACL_BIND_POINT_TYPE_LIST"),
            Self::Field(field) => write!(f, "SAI_ACL_TABLE_ATTR_FIELD_{}", field),
            Self::Size => write!(f, "SAI_ACL_TABLE_ATTR_SIZE"),
            Self::AvailableEntry => write!(f, "SAI_ACL_TABLE_ATTR_AVAILABLE_ACL_ENTRY"),
            Self::AvailableCounter => write!(f, "SAI_ACL_TABLE_ATTR_AVAILABLE_ACL_COUNTER"),
            Self::EntryList => write!(f, "SAI_ACL_TABLE_ATTR_ENTRY_LIST"),
        }
    }
}

/// Table attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclTableAttrValue {
    Stage(AclStage),
    BindPointTypeList(Vec<AclBindPointType>),
    /// Whether the field's qualifier is in the hardware qualifier set.
    Field(AclMatchField, bool),
    /// Configured entry limit, 0 when unbounded.
    Size(u32),
    AvailableEntry(u32),
    AvailableCounter(u32),
    /// Canonical entries only.
    EntryList(Vec<AclEntryOid>),
}

impl AclTableAttrValue {
    pub fn id(&self) -> AclTableAttrId {
        match self {
            Self::Stage(_) => AclTableAttrId::Stage,
            Self::BindPointTypeList(_) => AclTableAttrId::BindPointTypeList,
            Self::Field(field, _) => AclTableAttrId::Field(*field),
            Self::Size(_) => AclTableAttrId::Size,
            Self::AvailableEntry(_) => AclTableAttrId::AvailableEntry,
            Self::AvailableCounter(_) => AclTableAttrId::AvailableCounter,
            Self::EntryList(_) => AclTableAttrId::EntryList,
        }
    }
}

/// ACL table record.
#[derive(Debug, Clone)]
pub struct AclTable {
    pub stage: AclStage,
    pub bind_types: Vec<AclBindPointType>,
    pub fields: BTreeSet<AclMatchField>,
    pub size: Option<u32>,
    /// Match engine priority group.
    pub hw_group: FieldGroupId,
    /// Qualifiers required by the table's own fields and bind types.
    pub base_qset: QualifierSet,
    /// Qualifiers programmed in hardware: the base set plus the bind type
    /// qualifiers of every group the table belongs to.
    pub qset: QualifierSet,
    /// Priority set by the most recent group membership.
    pub priority: Option<AclPriority>,
    /// Bind points attached to the table directly.
    pub bind_points: Vec<BindPoint>,
    pub groups: Vec<u32>,
    /// Hardware entries, canonical and clones, in attach order.
    pub entries: Vec<u32>,
    pub counters: Vec<u32>,
    /// Effective bind points, direct and through groups, with the number of
    /// sources attaching each.
    pub(crate) bind_refs: BTreeMap<BindPoint, u32>,
    refs: RefCount,
}

impl AclTable {
    fn new(config: &AclTableConfig, stage: AclStage, hw_group: FieldGroupId, qset: QualifierSet) -> Self {
        let bind_types: BTreeSet<_> = config.bind_types.iter().copied().collect();
        Self {
            stage,
            bind_types: bind_types.into_iter().collect(),
            fields: config.fields.iter().copied().collect(),
            size: config.size,
            hw_group,
            base_qset: qset,
            qset,
            priority: None,
            bind_points: Vec::new(),
            groups: Vec::new(),
            entries: Vec::new(),
            counters: Vec::new(),
            bind_refs: BTreeMap::new(),
            refs: RefCount::new(),
        }
    }

    pub fn accepts_bind_type(&self, bind_type: AclBindPointType) -> bool {
        self.bind_types.contains(&bind_type)
    }

    pub fn has_direct_bind_point(&self, bind_point: &BindPoint) -> bool {
        self.bind_points.contains(bind_point)
    }

    /// Bind points reaching the table directly or through any group.
    pub fn effective_bind_points(&self) -> impl Iterator<Item = BindPoint> + '_ {
        self.bind_refs.keys().copied()
    }
}

impl RefCounted for AclTable {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    // ============ Table Operations ============

    /// Creates a table and its hardware priority group.
    pub fn create_table(&mut self, config: &AclTableConfig) -> SaiResult<AclTableOid> {
        let qset = config.qualifiers(&self.config.platform)?;
        let stage = config
            .stage
            .ok_or_else(|| SaiError::mandatory_missing("SAI_ACL_TABLE_ATTR_ACL_STAGE"))?;

        let index = self.tables.reserve()?;
        let hw_group = match self.engine.group_create(qset, 0) {
            Ok(group) => group,
            Err(e) => {
                self.tables.free(index)?;
                return Err(e);
            }
        };
        self.tables
            .set(index, AclTable::new(config, stage, hw_group, qset))?;

        let oid = Self::table_oid(index);
        info!(
            "Created ACL table {} stage {} group {} qualifiers {:?}",
            oid, stage, hw_group, qset
        );
        Ok(oid)
    }

    /// Removes a table.
    ///
    /// Fails with `ObjectInUse` while entries, counters or group memberships
    /// reference it. Bind points still attached directly are dropped.
    pub fn remove_table(&mut self, table: AclTableOid) -> SaiResult<()> {
        let index = self.table_index(table)?;
        let record = self.tables.get(index)?;
        if !record.is_unreferenced() || !record.groups.is_empty() {
            return Err(SaiError::object_in_use(format!(
                "ACL table {} ({} references, {} groups)",
                table,
                record.ref_count(),
                record.groups.len()
            )));
        }
        if !record.counters.is_empty() {
            return Err(SaiError::object_in_use(format!(
                "ACL table {} ({} counters)",
                table,
                record.counters.len()
            )));
        }
        if !record.bind_points.is_empty() {
            warn!(
                "Removing ACL table {} with bind points still attached: {:?}",
                table, record.bind_points
            );
        }
        let hw_group = record.hw_group;

        self.engine.group_destroy(hw_group)?;
        self.tables.free(index)?;
        info!("Removed ACL table {}", table);
        Ok(())
    }

    /// Reads table attributes.
    pub fn get_table_attribute(
        &self,
        table: AclTableOid,
        ids: &[AclTableAttrId],
    ) -> SaiResult<Vec<AclTableAttrValue>> {
        let index = self.table_index(table)?;
        let record = self.tables.get(index)?;
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let value = match id {
                AclTableAttrId::Stage => AclTableAttrValue::Stage(record.stage),
                AclTableAttrId::BindPointTypeList => {
                    AclTableAttrValue::BindPointTypeList(record.bind_types.clone())
                }
                AclTableAttrId::Field(field) => {
                    let qset = self.engine.group_get(record.hw_group)?;
                    let present = field.qualifier().is_some_and(|q| qset.contains(q));
                    AclTableAttrValue::Field(*field, present)
                }
                AclTableAttrId::Size => AclTableAttrValue::Size(record.size.unwrap_or(0)),
                AclTableAttrId::AvailableEntry => {
                    let status = self.engine.group_status_get(record.hw_group)?;
                    let mut free = status.entries_free;
                    if let Some(size) = record.size {
                        let left = size.saturating_sub(record.entries.len() as u32);
                        free = free.min(left);
                    }
                    AclTableAttrValue::AvailableEntry(free)
                }
                AclTableAttrId::AvailableCounter => {
                    let status = self.engine.group_status_get(record.hw_group)?;
                    AclTableAttrValue::AvailableCounter(status.counters_free)
                }
                AclTableAttrId::EntryList => {
                    let mut list = Vec::new();
                    for entry in &record.entries {
                        if !self.entries.get(*entry)?.is_clone() {
                            list.push(self.entry_oid(*entry)?);
                        }
                    }
                    AclTableAttrValue::EntryList(list)
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Table attributes are create-only.
    pub fn set_table_attribute(
        &mut self,
        table: AclTableOid,
        value: &AclTableAttrValue,
    ) -> SaiResult<()> {
        self.table_index(table)?;
        Err(SaiError::not_supported(value.id().to_string()))
    }

    // ============ Collaborator Interface ============

    /// Links a hardware entry into a table's entry list and takes a
    /// reference on the table.
    pub(crate) fn table_entry_attach(&mut self, table: u32, entry: u32) -> SaiResult<()> {
        let record = self.tables.get_mut(table)?;
        record.entries.push(entry);
        record.increment_ref();
        debug!("ACL table {}: attached entry {}", table, entry);
        Ok(())
    }

    /// Unlinks a hardware entry from a table and drops its reference.
    pub(crate) fn table_entry_detach(&mut self, table: u32, entry: u32) -> SaiResult<()> {
        let record = self.tables.get_mut(table)?;
        let before = record.entries.len();
        record.entries.retain(|e| *e != entry);
        if record.entries.len() == before {
            return Err(SaiError::not_found(format!(
                "entry {} in ACL table {}",
                entry, table
            )));
        }
        self.tables.decrement_ref(table)?;
        debug!("ACL table {}: detached entry {}", table, entry);
        Ok(())
    }

    /// Fails with `InsufficientResources` when a table with a configured
    /// size has no room for another hardware entry.
    pub(crate) fn check_table_room(&self, table: u32) -> SaiResult<()> {
        let record = self.tables.get(table)?;
        match record.size {
            Some(size) if record.entries.len() as u32 >= size => Err(
                SaiError::insufficient_resources(format!("ACL table {} is full ({} entries)", table, size)),
            ),
            _ => Ok(()),
        }
    }
}
