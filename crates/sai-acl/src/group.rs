//! ACL table groups and group members.
//!
//! A group bundles tables that share bind points. Membership widens the
//! member table's hardware qualifier set with the qualifiers of the group's
//! bind point types and sets the table's lookup priority. Bind points
//! attached to the group reach every member table.

use std::collections::BTreeSet;
use std::fmt;

use log::{info, warn};
use sai_object_store::{RefCount, RefCounted};
use serde::Deserialize;
use sonic_sai::api::{MatchEngine, QualifierSet};
use sonic_sai::{
    AclTableGroupMemberOid, AclTableGroupOid, AclTableOid, RawSaiObjectId, SaiError, SaiResult,
};

use crate::bind::bind_type_qualifier;
use crate::lag::LagResolver;
use crate::orch::AclOrch;
use crate::types::{AclBindPointType, AclPriority, AclStage, AclTableGroupType, BindPoint};

/// Table group creation attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclTableGroupConfig {
    /// ACL stage (mandatory).
    pub stage: Option<AclStage>,
    pub bind_types: Vec<AclBindPointType>,
    /// Lookup type, sequential when absent.
    pub group_type: Option<AclTableGroupType>,
}

impl AclTableGroupConfig {
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

    pub fn with_group_type(mut self, group_type: AclTableGroupType) -> Self {
        self.group_type = Some(group_type);
        self
    }
}

/// Group member creation attributes. All three are mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclTableGroupMemberConfig {
    pub group: Option<RawSaiObjectId>,
    pub table: Option<RawSaiObjectId>,
    pub priority: Option<AclPriority>,
}

impl AclTableGroupMemberConfig {
    pub fn new(
        group: impl Into<RawSaiObjectId>,
        table: impl Into<RawSaiObjectId>,
        priority: AclPriority,
    ) -> Self {
        Self {
            group: Some(group.into()),
            table: Some(table.into()),
            priority: Some(priority),
        }
    }
}

/// Table group attribute identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclTableGroupAttrId {
    Stage,
    BindPointTypeList,
    Type,
    MemberList,
}

impl fmt::Display for AclTableGroupAttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage => write!(f, "SAI_ACL_TABLE_GROUP_ATTR_ACL_STAGE"),
            Self::BindPointTypeList => {
                write!(f, "SAI_ACL_TABLE_GROUP_ATTR_ACL_BIND_POINT_TYPE_LIST")
            }
            Self::Type => write!(f, "SAI_ACL_TABLE_GROUP_ATTR_TYPE"),
            Self::MemberList => write!(f, "SAI_ACL_TABLE_GROUP_ATTR_MEMBER_LIST"),
        }
    }
}

/// Table group attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclTableGroupAttrValue {
    Stage(AclStage),
    BindPointTypeList(Vec<AclBindPointType>),
    Type(AclTableGroupType),
    MemberList(Vec<AclTableGroupMemberOid>),
}

impl AclTableGroupAttrValue {
    pub fn id(&self) -> AclTableGroupAttrId {
        match self {
            Self::Stage(_) => AclTableGroupAttrId::Stage,
            Self::BindPointTypeList(_) => AclTableGroupAttrId::BindPointTypeList,
            Self::Type(_) => AclTableGroupAttrId::Type,
            Self::MemberList(_) => AclTableGroupAttrId::MemberList,
        }
    }
}

/// Group member attribute identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclTableGroupMemberAttrId {
    Group,
    Table,
    Priority,
}

impl fmt::Display for AclTableGroupMemberAttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "SAI_ACL_TABLE_GROUP_MEMBER_ATTR_ACL_TABLE_GROUP_ID"),
            Self::Table => write!(f, "SAI_ACL_TABLE_GROUP_MEMBER_ATTR_ACL_TABLE_ID"),
            Self::Priority => write!(f, "SAI_ACL_TABLE_GROUP_MEMBER_ATTR_PRIORITY"),
        }
    }
}

/// Group member attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTableGroupMemberAttrValue {
    Group(AclTableGroupOid),
    Table(AclTableOid),
    Priority(AclPriority),
}

/// ACL table group record.
#[derive(Debug, Clone)]
pub struct AclTableGroup {
    pub stage: AclStage,
    pub group_type: AclTableGroupType,
    pub bind_types: Vec<AclBindPointType>,
    pub bind_points: Vec<BindPoint>,
    pub members: Vec<u32>,
    /// One reference per member.
    refs: RefCount,
}

impl RefCounted for AclTableGroup {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }
}

/// ACL table group member record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclTableGroupMember {
    pub group: u32,
    pub table: u32,
    pub priority: AclPriority,
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    // ============ Group Operations ============

    /// Creates a table group.
    pub fn create_group(&mut self, config: &AclTableGroupConfig) -> SaiResult<AclTableGroupOid> {
        let stage = config.stage.ok_or_else(|| {
            SaiError::mandatory_missing(AclTableGroupAttrId::Stage.to_string())
        })?;
        if config.bind_types.contains(&AclBindPointType::RouterInterface) {
            return Err(SaiError::not_supported(format!(
                "{} {}",
                AclTableGroupAttrId::BindPointTypeList,
                AclBindPointType::RouterInterface
            )));
        }
        let bind_types: BTreeSet<_> = config.bind_types.iter().copied().collect();
        let group_type = config.group_type.unwrap_or_default();

        let index = self.groups.reserve()?;
        self.groups.set(
            index,
            AclTableGroup {
                stage,
                group_type,
                bind_types: bind_types.into_iter().collect(),
                bind_points: Vec::new(),
                members: Vec::new(),
                refs: RefCount::new(),
            },
        )?;
        let oid = Self::group_oid(index);
        info!("Created ACL table group {} ({}, {})", oid, stage, group_type);
        Ok(oid)
    }

    /// Removes a table group without members.
    pub fn remove_group(&mut self, group: AclTableGroupOid) -> SaiResult<()> {
        let index = self.group_index(group)?;
        let record = self.groups.get(index)?;
        if !record.is_unreferenced() {
            return Err(SaiError::object_in_use(format!(
                "ACL table group {} ({} members)",
                group,
                record.ref_count()
            )));
        }
        if !record.bind_points.is_empty() {
            warn!(
                "Removing ACL table group {} with bind points still attached: {:?}",
                group, record.bind_points
            );
        }
        self.groups.free(index)?;
        info!("Removed ACL table group {}", group);
        Ok(())
    }

    pub fn get_group_attribute(
        &self,
        group: AclTableGroupOid,
        ids: &[AclTableGroupAttrId],
    ) -> SaiResult<Vec<AclTableGroupAttrValue>> {
        let index = self.group_index(group)?;
        let record = self.groups.get(index)?;
        Ok(ids
            .iter()
            .map(|id| match id {
                AclTableGroupAttrId::Stage => AclTableGroupAttrValue::Stage(record.stage),
                AclTableGroupAttrId::BindPointTypeList => {
                    AclTableGroupAttrValue::BindPointTypeList(record.bind_types.clone())
                }
                AclTableGroupAttrId::Type => AclTableGroupAttrValue::Type(record.group_type),
                AclTableGroupAttrId::MemberList => AclTableGroupAttrValue::MemberList(
                    record
                        .members
                        .iter()
                        .map(|m| Self::member_oid(*m, index))
                        .collect(),
                ),
            })
            .collect())
    }

    /// Table group attributes are create-only.
    pub fn set_group_attribute(
        &mut self,
        group: AclTableGroupOid,
        value: &AclTableGroupAttrValue,
    ) -> SaiResult<()> {
        self.group_index(group)?;
        Err(SaiError::not_supported(value.id().to_string()))
    }

    // ============ Member Operations ============

    /// Qualifiers a table needs for its own configuration and every group
    /// it belongs to.
    fn member_qset(&self, table: u32) -> SaiResult<QualifierSet> {
        let record = self.tables.get(table)?;
        let mut qset = record.base_qset;
        for group in &record.groups {
            for bind_type in &self.groups.get(*group)?.bind_types {
                if let Some(q) = bind_type_qualifier(record.stage, *bind_type, &self.config.platform)? {
                    qset.insert(q);
                }
            }
        }
        Ok(qset)
    }

    /// Adds a table to a group.
    pub fn create_member(
        &mut self,
        config: &AclTableGroupMemberConfig,
    ) -> SaiResult<AclTableGroupMemberOid> {
        let group_raw = config.group.ok_or_else(|| {
            SaiError::mandatory_missing(AclTableGroupMemberAttrId::Group.to_string())
        })?;
        let table_raw = config.table.ok_or_else(|| {
            SaiError::mandatory_missing(AclTableGroupMemberAttrId::Table.to_string())
        })?;
        let priority = config.priority.ok_or_else(|| {
            SaiError::mandatory_missing(AclTableGroupMemberAttrId::Priority.to_string())
        })?;
        let group = self.group_index(AclTableGroupOid::try_from_raw(group_raw)?)?;
        let table = self.table_index(AclTableOid::try_from_raw(table_raw)?)?;
        if !self.config.priority_in_range(priority) {
            return Err(SaiError::invalid_value(
                AclTableGroupMemberAttrId::Priority.to_string(),
                format!(
                    "{} outside {}..={}",
                    priority, self.config.min_priority, self.config.max_priority
                ),
            ));
        }

        let group_record = self.groups.get(group)?;
        let table_record = self.tables.get(table)?;
        if group_record.stage != table_record.stage {
            warn!(
                "ACL table {} ({}) joins group {} ({})",
                Self::table_oid(table),
                table_record.stage,
                Self::group_oid(group),
                group_record.stage
            );
        }
        if table_record.groups.contains(&group) {
            return Err(SaiError::invalid_parameter(format!(
                "ACL table {} is already a member of group {}",
                Self::table_oid(table),
                Self::group_oid(group)
            )));
        }
        if table_record.groups.len() as u32 >= self.config.max_groups_per_table {
            return Err(SaiError::insufficient_resources(format!(
                "ACL table {} is in {} groups",
                Self::table_oid(table),
                table_record.groups.len()
            )));
        }
        let hw_group = table_record.hw_group;
        let bind_points = group_record.bind_points.clone();

        let index = self.members.reserve()?;
        if let Err(e) = self.engine.group_priority_set(hw_group, priority) {
            self.members.free(index)?;
            return Err(e);
        }
        self.members.set(
            index,
            AclTableGroupMember {
                group,
                table,
                priority,
            },
        )?;
        self.group_member_attach(group, table, index)?;
        self.tables.get_mut(table)?.priority = Some(priority);

        let qset = self.member_qset(table)?;
        self.engine.group_set(hw_group, qset)?;
        self.tables.get_mut(table)?.qset = qset;

        for bind_point in bind_points {
            self.apply_bind_to_table(table, bind_point)?;
        }

        let oid = Self::member_oid(index, group);
        info!(
            "Created ACL table group member {}: table {} in group {} priority {}",
            oid,
            Self::table_oid(table),
            Self::group_oid(group),
            priority
        );
        Ok(oid)
    }

    /// Removes a table from a group, dropping the group's bind points and
    /// group-only qualifiers from it.
    pub fn remove_member(&mut self, member: AclTableGroupMemberOid) -> SaiResult<()> {
        let index = self.member_index(member)?;
        let record = *self.members.get(index)?;
        let bind_points = self.groups.get(record.group)?.bind_points.clone();

        for bind_point in bind_points {
            self.remove_bind_from_table(record.table, bind_point)?;
        }
        self.group_member_detach(record.group, record.table, index)?;

        let qset = self.member_qset(record.table)?;
        let hw_group = self.tables.get(record.table)?.hw_group;
        self.engine.group_set(hw_group, qset)?;
        self.tables.get_mut(record.table)?.qset = qset;

        self.members.free(index)?;
        info!("Removed ACL table group member {}", member);
        Ok(())
    }

    pub fn get_member_attribute(
        &self,
        member: AclTableGroupMemberOid,
        ids: &[AclTableGroupMemberAttrId],
    ) -> SaiResult<Vec<AclTableGroupMemberAttrValue>> {
        let index = self.member_index(member)?;
        let record = self.members.get(index)?;
        Ok(ids
            .iter()
            .map(|id| match id {
                AclTableGroupMemberAttrId::Group => {
                    AclTableGroupMemberAttrValue::Group(Self::group_oid(record.group))
                }
                AclTableGroupMemberAttrId::Table => {
                    AclTableGroupMemberAttrValue::Table(Self::table_oid(record.table))
                }
                AclTableGroupMemberAttrId::Priority => {
                    AclTableGroupMemberAttrValue::Priority(record.priority)
                }
            })
            .collect())
    }

    // ============ Collaborator Interface ============

    /// Tables that are members of a group.
    pub(crate) fn group_member_tables(&self, group: u32) -> SaiResult<Vec<u32>> {
        let mut tables = Vec::new();
        for member in &self.groups.get(group)?.members {
            tables.push(self.members.get(*member)?.table);
        }
        Ok(tables)
    }

    /// Links a member into its group and table, taking a reference on both.
    pub(crate) fn group_member_attach(&mut self, group: u32, table: u32, member: u32) -> SaiResult<()> {
        let group_record = self.groups.get_mut(group)?;
        group_record.members.push(member);
        group_record.increment_ref();
        let table_record = self.tables.get_mut(table)?;
        table_record.groups.push(group);
        table_record.increment_ref();
        Ok(())
    }

    /// Unlinks a member from its group and table, dropping both references.
    pub(crate) fn group_member_detach(&mut self, group: u32, table: u32, member: u32) -> SaiResult<()> {
        self.groups
            .get_mut(group)?
            .members
            .retain(|m| *m != member);
        self.groups.decrement_ref(group)?;
        self.tables.get_mut(table)?.groups.retain(|g| *g != group);
        self.tables.decrement_ref(table)?;
        Ok(())
    }
}
