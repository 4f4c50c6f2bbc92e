//! Entry cloning.
//!
//! A ternary entry holds one value per qualifier. The first value of a bind
//! point type is written into the canonical entry; every further value of
//! that type gets clones: hardware copies with only the bind qualifier
//! changed, one per combination of the other types' values, so the family
//! covers every combination of attached bind points. A clone's bind mask
//! names the types it diverges on from the canonical entry.
//!
//! Clones never hold user matches or actions. Those live on the canonical
//! entry and are pushed to every clone when they change.

use std::collections::BTreeMap;

use log::debug;
use sonic_sai::api::{MatchEngine, Qualifier};
use sonic_sai::{SaiError, SaiResult};

use crate::entry::AclEntry;
use crate::lag::LagResolver;
use crate::orch::AclOrch;
use crate::types::{AclBindPointType, BindMask, BindPoint};

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    /// Applies a newly effective bind point to a canonical entry and its
    /// clones.
    ///
    /// A second value of a type is crossed with every combination the
    /// family already covers: each member that does not diverge on the type
    /// is copied, and the copy diverges on the new type as well as on
    /// whatever its source diverged on.
    pub(crate) fn attach_to_family(&mut self, canonical: u32, bind_point: BindPoint) -> SaiResult<()> {
        let table = self.entries.get(canonical)?.table;
        let Some(qualifier) = self.table_bind_qualifier(table, bind_point.bind_type)? else {
            return Ok(());
        };
        let current = self
            .entries
            .get(canonical)?
            .bind_values
            .get(&bind_point.bind_type)
            .copied();
        match current {
            // First writer wins
            None => self.set_family_bind_value(
                canonical,
                bind_point.bind_type,
                Some(bind_point.value),
                qualifier,
            ),
            Some(value) if value == bind_point.value => Ok(()),
            Some(_) => {
                if !self.diverging_clones(canonical, bind_point)?.is_empty() {
                    return Ok(());
                }
                for source in self.non_diverging(canonical, bind_point.bind_type)? {
                    self.clone_entry(canonical, source, bind_point, qualifier)?;
                }
                Ok(())
            }
        }
    }

    /// Removes a bind point that stopped being effective from a canonical
    /// entry's family.
    ///
    /// Clones diverging on the value lose that bit; what remains is a
    /// combination a sibling already covers, so they are destroyed. If the
    /// canonical entry itself carried the value, another value of the same
    /// type is promoted onto it and the clones that carried that value go.
    pub(crate) fn detach_from_family(&mut self, canonical: u32, bind_point: BindPoint) -> SaiResult<()> {
        let table = self.entries.get(canonical)?.table;
        let bind_type = bind_point.bind_type;
        let Some(qualifier) = self.table_bind_qualifier(table, bind_type)? else {
            return Ok(());
        };

        let current = self.entries.get(canonical)?.bind_values.get(&bind_type).copied();
        if current != Some(bind_point.value) {
            for clone in self.diverging_clones(canonical, bind_point)? {
                self.remove_clone_bit(clone, bind_type)?;
            }
            return Ok(());
        }

        let mut donor = None;
        for clone in &self.entries.get(canonical)?.clones {
            let record = self.entries.get(*clone)?;
            if record.bind_mask.contains(bind_type) {
                donor = record.bind_values.get(&bind_type).copied();
                break;
            }
        }
        match donor {
            Some(value) => {
                debug!(
                    "ACL entry {}: promoting {}:{} onto the canonical entry",
                    canonical, bind_type, value
                );
                let promoted = BindPoint::new(bind_type, value);
                for clone in self.diverging_clones(canonical, promoted)? {
                    self.remove_clone_bit(clone, bind_type)?;
                }
                self.set_family_bind_value(canonical, bind_type, Some(value), qualifier)
            }
            None => self.set_family_bind_value(canonical, bind_type, None, qualifier),
        }
    }

    /// Clones carrying `bind_point`'s value as a divergence from the
    /// canonical entry.
    fn diverging_clones(&self, canonical: u32, bind_point: BindPoint) -> SaiResult<Vec<u32>> {
        let mut found = Vec::new();
        for clone in &self.entries.get(canonical)?.clones {
            let record = self.entries.get(*clone)?;
            if record.bind_mask.contains(bind_point.bind_type)
                && record.bind_values.get(&bind_point.bind_type) == Some(&bind_point.value)
            {
                found.push(*clone);
            }
        }
        Ok(found)
    }

    /// The canonical entry and every clone sharing its value of `bind_type`.
    fn non_diverging(&self, canonical: u32, bind_type: AclBindPointType) -> SaiResult<Vec<u32>> {
        let mut members = vec![canonical];
        for clone in &self.entries.get(canonical)?.clones {
            if !self.entries.get(*clone)?.bind_mask.contains(bind_type) {
                members.push(*clone);
            }
        }
        Ok(members)
    }

    /// Sets or clears one bind value on a hardware entry, reprogramming it
    /// if the value changed.
    fn set_bind_value(
        &mut self,
        index: u32,
        bind_type: AclBindPointType,
        value: Option<u32>,
        qualifier: Qualifier,
    ) -> SaiResult<()> {
        let record = self.entries.get_mut(index)?;
        let changed = match value {
            Some(value) => record.bind_values.insert(bind_type, value) != Some(value),
            None => record.bind_values.remove(&bind_type).is_some(),
        };
        if !changed {
            return Ok(());
        }
        self.program_qualifier(index, qualifier)?;
        self.refresh_hw(index)
    }

    /// Sets a bind value on the canonical entry and on every clone that
    /// does not diverge on `bind_type`.
    fn set_family_bind_value(
        &mut self,
        canonical: u32,
        bind_type: AclBindPointType,
        value: Option<u32>,
        qualifier: Qualifier,
    ) -> SaiResult<()> {
        for index in self.non_diverging(canonical, bind_type)? {
            self.set_bind_value(index, bind_type, value, qualifier)?;
        }
        Ok(())
    }

    /// Drops a diverging value from a clone.
    ///
    /// Clones cover the cross product of the family's bind values, so
    /// without the bit the clone duplicates a sibling and is destroyed,
    /// whether or not other bits remain.
    fn remove_clone_bit(&mut self, clone: u32, bind_type: AclBindPointType) -> SaiResult<()> {
        let mut mask = self.entries.get(clone)?.bind_mask;
        mask.remove(bind_type);
        if !mask.is_empty() {
            debug!(
                "ACL entry clone {} duplicates a sibling without {}",
                clone, bind_type
            );
        }
        self.destroy_clone(clone)
    }

    /// Copies a family member for an extra bind point value and returns
    /// the clone's index.
    ///
    /// The copy keeps the source's other bind values and diverges on
    /// everything the source diverged on plus `bind_point`'s type.
    pub(crate) fn clone_entry(
        &mut self,
        canonical: u32,
        source: u32,
        bind_point: BindPoint,
        qualifier: Qualifier,
    ) -> SaiResult<u32> {
        let record = self.entries.get(canonical)?;
        let table = record.table;
        let canonical_hw = record.hw_entry;
        let counter = record.counter;
        let priority = record.priority;
        let admin_state = record.admin_state;
        let installed = record.installed;
        let source = self.entries.get(source)?;
        let source_hw = source.hw_entry;
        let mut bind_mask = source.bind_mask;
        bind_mask.insert(bind_point.bind_type);
        let mut bind_values = source.bind_values.clone();
        bind_values.insert(bind_point.bind_type, bind_point.value);
        self.check_table_room(table)?;

        let index = self.entries.reserve()?;
        let hw_copy = match self.engine.entry_copy(source_hw) {
            Ok(hw_copy) => hw_copy,
            Err(e) => {
                self.entries.free(index)?;
                return Err(e);
            }
        };
        self.entries.set(
            index,
            AclEntry {
                table,
                hw_entry: hw_copy,
                canonical: Some(canonical),
                clones: Vec::new(),
                bind_mask,
                bind_values,
                priority,
                admin_state,
                installed: false,
                counter,
                matches: BTreeMap::new(),
                actions: BTreeMap::new(),
                mac_rewrite: None,
            },
        )?;
        self.entries.get_mut(canonical)?.clones.push(index);
        self.table_entry_attach(table, index)?;

        self.program_qualifier(index, qualifier)?;
        if let Some(counter) = counter {
            let hw_stat = self.counters.get(counter)?.hw_stat;
            self.engine.stat_attach(hw_copy, hw_stat)?;
        }
        if installed {
            self.engine.entry_install(hw_copy)?;
            self.entries.get_mut(index)?.installed = true;
            let enabled = self.engine.entry_enable_get(canonical_hw)?;
            self.engine.entry_enable_set(hw_copy, enabled)?;
        }
        debug!(
            "ACL entry {}: clone {} for {}",
            canonical, index, bind_point
        );
        Ok(index)
    }

    /// Destroys a clone and unlinks it from its canonical entry and table.
    pub(crate) fn destroy_clone(&mut self, clone: u32) -> SaiResult<()> {
        let record = self.entries.get(clone)?;
        let canonical = record
            .canonical
            .ok_or_else(|| SaiError::failure(format!("ACL entry {} is not a clone", clone)))?;
        let hw_entry = record.hw_entry;
        let table = record.table;
        let counter = record.counter;

        if let Some(counter) = counter {
            let hw_stat = self.counters.get(counter)?.hw_stat;
            self.engine.stat_detach(hw_entry, hw_stat)?;
        }
        self.engine.entry_destroy(hw_entry)?;
        self.entries.get_mut(canonical)?.clones.retain(|c| *c != clone);
        self.table_entry_detach(table, clone)?;
        self.entries.free(clone)?;
        debug!("ACL entry {}: destroyed clone {}", canonical, clone);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;
    use crate::counter::AclCounterConfig;
    use crate::entry::{AclEntryAttr, AclEntryConfig};
    use crate::lag::StaticLagResolver;
    use crate::rule::AclEntryMatch;
    use crate::table::AclTableConfig;
    use crate::types::{AclMatchField, AclStage};
    use pretty_assertions::assert_eq;
    use sonic_sai::api::{PortBitmap, QualifierValue, SoftMatchEngine};
    use sonic_sai::{AclEntryOid, AclTableOid};
    use std::net::Ipv4Addr;

    type Orch = AclOrch<SoftMatchEngine, StaticLagResolver>;

    fn setup() -> (Orch, AclTableOid, AclEntryOid) {
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
                    .with_bind_types([AclBindPointType::Port, AclBindPointType::Vlan]),
            )
            .unwrap();
        let entry = orch
            .create_entry(
                &AclEntryConfig::new()
                    .with_table(table)
                    .with_match(AclEntryMatch::src_ip(Ipv4Addr::new(192, 168, 0, 1), None)),
            )
            .unwrap();
        (orch, table, entry)
    }

    fn in_ports(orch: &Orch, entry: AclEntryOid) -> Option<QualifierValue> {
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        orch.engine()
            .entry(hw_entry)
            .unwrap()
            .qualifiers
            .get(&Qualifier::InPorts)
            .copied()
    }

    fn ports(list: &[u32]) -> QualifierValue {
        let bitmap: PortBitmap = list.iter().copied().collect();
        QualifierValue::Ports {
            data: bitmap,
            mask: bitmap,
        }
    }

    #[test]
    fn test_first_writer_edits_canonical() {
        let (mut orch, table, entry) = setup();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();

        assert_eq!(orch.entry_family(entry).unwrap().len(), 1);
        assert_eq!(in_ports(&orch, entry), Some(ports(&[1])));
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        let hw = orch.engine().entry(hw_entry).unwrap();
        // Reinstalled once for the bind point, still enabled
        assert_eq!(hw.installs, 2);
        assert!(hw.enabled);
    }

    #[test]
    fn test_second_value_clones() {
        let (mut orch, table, entry) = setup();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(2))
            .unwrap();

        let family = orch.entry_family(entry).unwrap();
        assert_eq!(family.len(), 2);
        let clone = family[1];
        assert_eq!(clone.sub_type(), 1);

        let record = orch.entry(clone).unwrap();
        assert_eq!(record.bind_mask, BindMask::single(AclBindPointType::Port));
        assert!(record.installed);
        assert_eq!(in_ports(&orch, clone), Some(ports(&[2])));
        assert_eq!(in_ports(&orch, entry), Some(ports(&[1])));
        assert_eq!(orch.stats().clones, 1);
    }

    #[test]
    fn test_other_type_mirrors_onto_clones() {
        let (mut orch, table, entry) = setup();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(2))
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::vlan(10))
            .unwrap();

        let family = orch.entry_family(entry).unwrap();
        assert_eq!(family.len(), 2);
        for member in family {
            let record = orch.entry(member).unwrap();
            assert_eq!(record.bind_values.get(&AclBindPointType::Vlan), Some(&10));
            let hw = orch.engine().entry(record.hw_entry).unwrap();
            assert_eq!(
                hw.qualifiers.get(&Qualifier::OuterVlanId),
                Some(&QualifierValue::U16 {
                    data: 10,
                    mask: 0xfff
                })
            );
        }
    }

    #[test]
    fn test_detach_canonical_value_promotes_clone() {
        let (mut orch, table, entry) = setup();
        for port in [1, 2, 3] {
            orch.table_bind_point_attach(table, BindPoint::port(port))
                .unwrap();
        }
        assert_eq!(orch.stats().clones, 2);
        let refs_before = orch.table(table).unwrap().entries.len();

        orch.table_bind_point_detach(table, BindPoint::port(1))
            .unwrap();
        assert_eq!(orch.stats().clones, 1);
        assert_eq!(orch.table(table).unwrap().entries.len(), refs_before - 1);
        assert_eq!(in_ports(&orch, entry), Some(ports(&[2])));
        let clone = orch.entry_family(entry).unwrap()[1];
        assert_eq!(in_ports(&orch, clone), Some(ports(&[3])));
    }

    #[test]
    fn test_detach_last_value_clears_qualifier() {
        let (mut orch, table, entry) = setup();
        orch.table_bind_point_attach(table, BindPoint::port(4))
            .unwrap();
        orch.table_bind_point_detach(table, BindPoint::port(4))
            .unwrap();
        assert_eq!(in_ports(&orch, entry), None);
        assert!(orch.entry(entry).unwrap().bind_values.is_empty());
    }

    #[test]
    fn test_clone_copy_failure_leaves_no_slot() {
        let (mut orch, table, entry) = setup();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();
        orch.engine_mut().inject_fault("entry_copy", 0);
        let err = orch
            .table_bind_point_attach(table, BindPoint::port(2))
            .unwrap_err();
        assert_eq!(err.status(), sonic_sai::SaiStatus::Failure);
        assert_eq!(orch.entry_family(entry).unwrap().len(), 1);
        assert_eq!(orch.stats().clones, 0);
    }

    fn bind_values(orch: &Orch, entry: AclEntryOid) -> Vec<(Option<u32>, Option<u32>)> {
        let mut combos: Vec<_> = orch
            .entry_family(entry)
            .unwrap()
            .into_iter()
            .map(|member| {
                let record = orch.entry(member).unwrap();
                (
                    record.bind_values.get(&AclBindPointType::Port).copied(),
                    record.bind_values.get(&AclBindPointType::Vlan).copied(),
                )
            })
            .collect();
        combos.sort();
        combos
    }

    #[test]
    fn test_cross_type_bind_points_cover_every_combination() {
        let orders = [
            [
                BindPoint::port(1),
                BindPoint::port(2),
                BindPoint::vlan(10),
                BindPoint::vlan(20),
            ],
            [
                BindPoint::vlan(10),
                BindPoint::port(1),
                BindPoint::vlan(20),
                BindPoint::port(2),
            ],
        ];
        for order in orders {
            let (mut orch, table, entry) = setup();
            for bind_point in order {
                orch.table_bind_point_attach(table, bind_point).unwrap();
            }
            assert_eq!(
                bind_values(&orch, entry),
                vec![
                    (Some(1), Some(10)),
                    (Some(1), Some(20)),
                    (Some(2), Some(10)),
                    (Some(2), Some(20)),
                ]
            );
            assert_eq!(orch.stats().clones, 3);

            let both = orch
                .entry_family(entry)
                .unwrap()
                .into_iter()
                .find(|member| {
                    let mask = orch.entry(*member).unwrap().bind_mask;
                    mask.contains(AclBindPointType::Port) && mask.contains(AclBindPointType::Vlan)
                })
                .unwrap();
            let record = orch.entry(both).unwrap();
            let hw = orch.engine().entry(record.hw_entry).unwrap();
            assert!(hw.installed);
            assert_eq!(hw.qualifiers.get(&Qualifier::InPorts), Some(&ports(&[2])));
            assert_eq!(
                hw.qualifiers.get(&Qualifier::OuterVlanId),
                Some(&QualifierValue::U16 {
                    data: 20,
                    mask: 0xfff
                })
            );
        }
    }

    #[test]
    fn test_cross_type_detach_keeps_remaining_combinations() {
        let (mut orch, table, entry) = setup();
        for bind_point in [
            BindPoint::port(1),
            BindPoint::port(2),
            BindPoint::vlan(10),
            BindPoint::vlan(20),
        ] {
            orch.table_bind_point_attach(table, bind_point).unwrap();
        }

        orch.table_bind_point_detach(table, BindPoint::vlan(10))
            .unwrap();
        assert_eq!(
            bind_values(&orch, entry),
            vec![(Some(1), Some(20)), (Some(2), Some(20))]
        );
        assert_eq!(
            orch.entry(entry).unwrap().bind_values.get(&AclBindPointType::Vlan),
            Some(&20)
        );

        orch.table_bind_point_detach(table, BindPoint::port(2))
            .unwrap();
        assert_eq!(bind_values(&orch, entry), vec![(Some(1), Some(20))]);
        assert_eq!(orch.stats().clones, 0);
        assert_eq!(orch.table(table).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_clone_of_disabled_entry_stays_disabled() {
        let (mut orch, table, _) = setup();
        let entry = orch
            .create_entry(
                &AclEntryConfig::new()
                    .with_table(table)
                    .with_admin_state(false)
                    .with_match(AclEntryMatch::src_ip(Ipv4Addr::new(10, 0, 0, 1), None)),
            )
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(1))
            .unwrap();
        orch.table_bind_point_attach(table, BindPoint::port(2))
            .unwrap();

        let family = orch.entry_family(entry).unwrap();
        assert_eq!(family.len(), 2);
        for member in family {
            let record = orch.entry(member).unwrap();
            let hw = orch.engine().entry(record.hw_entry).unwrap();
            assert!(hw.installed);
            assert!(!hw.enabled);
        }
    }

    #[test]
    fn test_admin_state_and_counter_reach_clones() {
        let (mut orch, table, entry) = setup();
        for bind_point in [
            BindPoint::port(1),
            BindPoint::port(2),
            BindPoint::vlan(10),
            BindPoint::vlan(20),
        ] {
            orch.table_bind_point_attach(table, bind_point).unwrap();
        }
        let family = orch.entry_family(entry).unwrap();
        assert_eq!(family.len(), 4);

        orch.set_entry_attribute(entry, AclEntryAttr::AdminState(false))
            .unwrap();
        for member in &family {
            let hw_entry = orch.entry(*member).unwrap().hw_entry;
            assert!(!orch.engine().entry(hw_entry).unwrap().enabled);
        }

        let counter = orch
            .create_counter(
                &AclCounterConfig::new()
                    .with_table(table)
                    .with_packet_count(true),
            )
            .unwrap();
        orch.set_entry_attribute(entry, AclEntryAttr::Counter(Some(counter.as_raw())))
            .unwrap();
        let hw_entry = orch.entry(entry).unwrap().hw_entry;
        let hw_stat = orch.engine().entry(hw_entry).unwrap().stat;
        assert!(hw_stat.is_some());
        for member in &family {
            let record = orch.entry(*member).unwrap();
            assert_eq!(record.counter, orch.entry(entry).unwrap().counter);
            assert_eq!(orch.engine().entry(record.hw_entry).unwrap().stat, hw_stat);
        }

        orch.set_entry_attribute(entry, AclEntryAttr::Counter(None))
            .unwrap();
        for member in &family {
            let hw_entry = orch.entry(*member).unwrap().hw_entry;
            assert_eq!(orch.engine().entry(hw_entry).unwrap().stat, None);
        }
        orch.remove_counter(counter).unwrap();
    }
}
