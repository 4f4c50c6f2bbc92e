//! Serializable view of the ACL object graph and its hardware state.

use serde::Serialize;
use sonic_sai::api::MatchEngine;
use sonic_sai::SaiResult;

use crate::lag::LagResolver;
use crate::orch::{AclOrch, AclOrchStats};
use crate::types::{AclBindPointType, AclPriority, AclStage, AclTableGroupType, BindMask, BindPoint};

/// Hardware state of one entry, canonical or clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub oid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    pub bind_mask: BindMask,
    pub bind_points: Vec<BindPoint>,
    pub priority: AclPriority,
    pub installed: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<String>,
    /// `FIELD=value` for every user match.
    pub matches: Vec<String>,
    /// `ACTION=value` for every user action.
    pub actions: Vec<String>,
    /// Programmed qualifiers, as `Qualifier=value`.
    pub hw_qualifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    pub oid: String,
    pub stage: AclStage,
    pub bind_types: Vec<AclBindPointType>,
    pub qualifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<AclPriority>,
    /// Bind points attached to the table itself.
    pub bind_points: Vec<BindPoint>,
    /// Bind points reaching the table directly or through groups.
    pub effective_bind_points: Vec<BindPoint>,
    pub groups: Vec<String>,
    pub entries: Vec<EntrySnapshot>,
    pub counters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSnapshot {
    pub oid: String,
    pub table: String,
    pub priority: AclPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub oid: String,
    pub stage: AclStage,
    pub group_type: AclTableGroupType,
    pub bind_types: Vec<AclBindPointType>,
    pub bind_points: Vec<BindPoint>,
    pub members: Vec<MemberSnapshot>,
}

/// Everything an [`AclOrch`] holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclSnapshot {
    pub stats: AclOrchStats,
    pub tables: Vec<TableSnapshot>,
    pub groups: Vec<GroupSnapshot>,
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    fn entry_snapshot(&self, index: u32) -> SaiResult<EntrySnapshot> {
        let record = self.entries.get(index)?;
        let mut hw_qualifiers = Vec::new();
        for qualifier in self.tables.get(record.table)?.qset.iter() {
            if let Some(value) = self.engine.qualify_get(record.hw_entry, qualifier)? {
                hw_qualifiers.push(format!("{:?}={:?}", qualifier, value));
            }
        }
        Ok(EntrySnapshot {
            oid: self.entry_oid(index)?.to_string(),
            canonical: match record.canonical {
                Some(canonical) => Some(self.entry_oid(canonical)?.to_string()),
                None => None,
            },
            bind_mask: record.bind_mask,
            bind_points: record.bind_points().collect(),
            priority: record.priority,
            installed: record.installed,
            enabled: self.engine.entry_enable_get(record.hw_entry)?,
            counter: record
                .counter
                .map(|c| Self::counter_oid(c, record.table).to_string()),
            matches: record
                .matches
                .iter()
                .map(|(field, value)| format!("{}={}", field, value))
                .collect(),
            actions: record.actions.values().map(|a| a.to_string()).collect(),
            hw_qualifiers,
        })
    }

    /// Captures every table, entry and group in index order.
    pub fn snapshot(&self) -> SaiResult<AclSnapshot> {
        let mut tables = Vec::new();
        for (index, table) in self.tables.iter() {
            let mut entries = Vec::new();
            for entry in &table.entries {
                entries.push(self.entry_snapshot(*entry)?);
            }
            tables.push(TableSnapshot {
                oid: Self::table_oid(index).to_string(),
                stage: table.stage,
                bind_types: table.bind_types.clone(),
                qualifiers: table.qset.iter().map(|q| format!("{:?}", q)).collect(),
                priority: table.priority,
                bind_points: table.bind_points.clone(),
                effective_bind_points: table.effective_bind_points().collect(),
                groups: table
                    .groups
                    .iter()
                    .map(|g| Self::group_oid(*g).to_string())
                    .collect(),
                entries,
                counters: table
                    .counters
                    .iter()
                    .map(|c| Self::counter_oid(*c, index).to_string())
                    .collect(),
            });
        }

        let mut groups = Vec::new();
        for (index, group) in self.groups.iter() {
            let mut members = Vec::new();
            for member in &group.members {
                let record = self.members.get(*member)?;
                members.push(MemberSnapshot {
                    oid: Self::member_oid(*member, index).to_string(),
                    table: Self::table_oid(record.table).to_string(),
                    priority: record.priority,
                });
            }
            groups.push(GroupSnapshot {
                oid: Self::group_oid(index).to_string(),
                stage: group.stage,
                group_type: group.group_type,
                bind_types: group.bind_types.clone(),
                bind_points: group.bind_points.clone(),
                members,
            });
        }

        Ok(AclSnapshot {
            stats: self.stats(),
            tables,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;
    use crate::entry::AclEntryConfig;
    use crate::lag::StaticLagResolver;
    use crate::rule::AclEntryMatch;
    use crate::table::AclTableConfig;
    use crate::types::AclMatchField;
    use sonic_sai::api::SoftMatchEngine;
    use std::net::Ipv4Addr;

    #[test]
    fn test_snapshot_lists_clones_under_table() {
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
                    .with_field(AclMatchField::SrcIp)
                    .with_bind_type(AclBindPointType::Port),
            )
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();
        orch.create_entry(
            &AclEntryConfig::new()
                .with_table(table)
                .with_match(AclEntryMatch::src_ip(Ipv4Addr::new(10, 0, 0, 1), None)),
        )
        .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(2))
            .unwrap();

        let snapshot = orch.snapshot().unwrap();
        assert_eq!(snapshot.stats.entries, 1);
        assert_eq!(snapshot.stats.clones, 1);
        let entries = &snapshot.tables[0].entries;
        assert_eq!(entries.len(), 2);
        assert!(entries[0].canonical.is_none());
        assert_eq!(entries[1].canonical.as_deref(), Some(entries[0].oid.as_str()));
        assert!(entries.iter().all(|e| e.enabled && e.installed));
        assert!(entries[1].hw_qualifiers.iter().any(|q| q.starts_with("SrcIp=")));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["tables"][0]["entries"][1]["bind_mask"][0], "PORT");
    }
}
