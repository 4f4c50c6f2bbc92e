//! ACL counters.
//!
//! A counter is a hardware stat object in its table's priority group. An
//! entry using a counter attaches the stat to every hardware entry of its
//! family, so clones count into the same object.

use std::fmt;

use log::{debug, info};
use sai_object_store::{RefCount, RefCounted};
use serde::Deserialize;
use sonic_sai::api::{FieldStatId, MatchEngine, StatKind};
use sonic_sai::{AclCounterOid, AclTableOid, RawSaiObjectId, SaiError, SaiResult};

use crate::lag::LagResolver;
use crate::orch::AclOrch;

/// Creation attributes of an ACL counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AclCounterConfig {
    /// Owning table. Mandatory.
    pub table: Option<RawSaiObjectId>,
    pub enable_packet_count: bool,
    pub enable_byte_count: bool,
}

impl AclCounterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<RawSaiObjectId>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_packet_count(mut self, enabled: bool) -> Self {
        self.enable_packet_count = enabled;
        self
    }

    pub fn with_byte_count(mut self, enabled: bool) -> Self {
        self.enable_byte_count = enabled;
        self
    }

    fn stat_kinds(&self) -> Vec<StatKind> {
        let mut kinds = Vec::new();
        if self.enable_packet_count {
            kinds.push(StatKind::Packets);
        }
        if self.enable_byte_count {
            kinds.push(StatKind::Bytes);
        }
        kinds
    }
}

/// Readable counter attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclCounterAttrId {
    Table,
    EnablePacketCount,
    EnableByteCount,
    Packets,
    Bytes,
}

impl fmt::Display for AclCounterAttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "SAI_ACL_COUNTER_ATTR_TABLE_ID",
            Self::EnablePacketCount => "SAI_ACL_COUNTER_ATTR_ENABLE_PACKET_COUNT",
            Self::EnableByteCount => "SAI_ACL_COUNTER_ATTR_ENABLE_BYTE_COUNT",
            Self::Packets => "SAI_ACL_COUNTER_ATTR_PACKETS",
            Self::Bytes => "SAI_ACL_COUNTER_ATTR_BYTES",
        };
        write!(f, "{}", name)
    }
}

/// Counter attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclCounterAttrValue {
    Table(AclTableOid),
    EnablePacketCount(bool),
    EnableByteCount(bool),
    Packets(u64),
    Bytes(u64),
}

/// A counter record.
#[derive(Debug, Clone)]
pub struct AclCounter {
    pub table: u32,
    pub hw_stat: FieldStatId,
    pub packets_enabled: bool,
    pub bytes_enabled: bool,
    /// Canonical entries using the counter.
    refs: RefCount,
}

impl RefCounted for AclCounter {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        &mut self.refs
    }
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    // ============ Counter Operations ============

    /// Creates a counter in a table's hardware group.
    pub fn create_counter(&mut self, config: &AclCounterConfig) -> SaiResult<AclCounterOid> {
        let table_raw = config
            .table
            .ok_or_else(|| SaiError::mandatory_missing(AclCounterAttrId::Table.to_string()))?;
        let table = self.table_index(AclTableOid::try_from_raw(table_raw)?)?;
        let kinds = config.stat_kinds();
        if kinds.is_empty() {
            return Err(SaiError::invalid_parameter(
                "ACL counter counts neither packets nor bytes",
            ));
        }

        let index = self.counters.reserve()?;
        let hw_group = self.tables.get(table)?.hw_group;
        let hw_stat = match self.engine.stat_create(hw_group, &kinds) {
            Ok(stat) => stat,
            Err(e) => {
                self.counters.free(index)?;
                return Err(e);
            }
        };
        self.counters.set(
            index,
            AclCounter {
                table,
                hw_stat,
                packets_enabled: config.enable_packet_count,
                bytes_enabled: config.enable_byte_count,
                refs: RefCount::new(),
            },
        )?;
        self.tables.get_mut(table)?.counters.push(index);

        let oid = Self::counter_oid(index, table);
        info!("Created ACL counter {} in table {}", oid, Self::table_oid(table));
        Ok(oid)
    }

    /// Removes a counter no entry uses.
    pub fn remove_counter(&mut self, counter: AclCounterOid) -> SaiResult<()> {
        let index = self.counter_index(counter)?;
        let record = self.counters.get(index)?;
        if !record.is_unreferenced() {
            return Err(SaiError::object_in_use(format!(
                "ACL counter {} ({} entries)",
                counter,
                record.ref_count()
            )));
        }
        let table = record.table;
        let hw_stat = record.hw_stat;

        self.engine.stat_destroy(hw_stat)?;
        self.tables
            .get_mut(table)?
            .counters
            .retain(|c| *c != index);
        self.counters.free(index)?;
        info!("Removed ACL counter {}", counter);
        Ok(())
    }

    /// Reads counter attributes. Disabled statistics read as zero.
    pub fn get_counter_attribute(
        &self,
        counter: AclCounterOid,
        ids: &[AclCounterAttrId],
    ) -> SaiResult<Vec<AclCounterAttrValue>> {
        let index = self.counter_index(counter)?;
        let record = self.counters.get(index)?;
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let value = match id {
                AclCounterAttrId::Table => AclCounterAttrValue::Table(Self::table_oid(record.table)),
                AclCounterAttrId::EnablePacketCount => {
                    AclCounterAttrValue::EnablePacketCount(record.packets_enabled)
                }
                AclCounterAttrId::EnableByteCount => {
                    AclCounterAttrValue::EnableByteCount(record.bytes_enabled)
                }
                AclCounterAttrId::Packets => AclCounterAttrValue::Packets(if record.packets_enabled {
                    self.engine.stat_get(record.hw_stat, StatKind::Packets)?
                } else {
                    0
                }),
                AclCounterAttrId::Bytes => AclCounterAttrValue::Bytes(if record.bytes_enabled {
                    self.engine.stat_get(record.hw_stat, StatKind::Bytes)?
                } else {
                    0
                }),
            };
            values.push(value);
        }
        Ok(values)
    }

    // ============ Entry Attachment ============

    /// Resolves a counter handle an entry of `table` may use.
    pub(crate) fn resolve_counter(&self, table: u32, raw: RawSaiObjectId) -> SaiResult<u32> {
        let counter = AclCounterOid::try_from_raw(raw)?;
        let index = self.counter_index(counter)?;
        if self.counters.get(index)?.table != table {
            return Err(SaiError::invalid_parameter(format!(
                "ACL counter {} belongs to another table",
                counter
            )));
        }
        Ok(index)
    }

    /// Attaches a counter to a canonical entry and its clones.
    pub(crate) fn attach_family_counter(&mut self, canonical: u32, counter: u32) -> SaiResult<()> {
        let hw_stat = self.counters.get(counter)?.hw_stat;
        for member in self.family(canonical)? {
            let record = self.entries.get_mut(member)?;
            record.counter = Some(counter);
            let hw_entry = record.hw_entry;
            self.engine.stat_attach(hw_entry, hw_stat)?;
        }
        self.counters.increment_ref(counter)?;
        debug!("ACL entry {}: attached counter {}", canonical, counter);
        Ok(())
    }

    /// Detaches a counter from a canonical entry and its clones.
    pub(crate) fn detach_family_counter(&mut self, canonical: u32, counter: u32) -> SaiResult<()> {
        let hw_stat = self.counters.get(counter)?.hw_stat;
        for member in self.family(canonical)? {
            let record = self.entries.get_mut(member)?;
            record.counter = None;
            let hw_entry = record.hw_entry;
            self.engine.stat_detach(hw_entry, hw_stat)?;
        }
        self.counters.decrement_ref(counter)?;
        debug!("ACL entry {}: detached counter {}", canonical, counter);
        Ok(())
    }
}
