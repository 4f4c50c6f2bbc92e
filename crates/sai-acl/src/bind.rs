//! Bind point attach and detach.
//!
//! A bind point reaches a table either directly or through every group the
//! table is a member of. Each table counts the sources of each effective
//! bind point; entries change only when the first source attaches and the
//! last one detaches.
//!
//! How a bind point shows up on an entry depends on stage and type:
//!
//! | stage   | type | qualifier                                          |
//! |---------|------|----------------------------------------------------|
//! | ingress | PORT | in-ports bitmap                                    |
//! | ingress | LAG  | in-ports bitmap of the LAG's members               |
//! | egress  | PORT | out-port                                           |
//! | egress  | LAG  | destination trunk (in-ports with `lag_via_in_ports`) |
//! | any     | VLAN | outer VLAN id                                      |
//! | any     | SWITCH | none                                             |

use log::{debug, info, warn};
use sonic_sai::api::{MatchEngine, PortBitmap, Qualifier, QualifierValue};
use sonic_sai::{
    decode_object_id, object_type_of, AclTableGroupOid, AclTableOid, LagOid, RawSaiObjectId,
    SaiError, SaiObjectType, SaiResult,
};

use crate::config::PlatformCapabilities;
use crate::lag::LagResolver;
use crate::orch::AclOrch;
use crate::types::{AclBindPointType, AclStage, BindPoint, VLAN_ID_MASK, VLAN_ID_MAX};

/// Returns the qualifier a bind point type is matched with at `stage`.
///
/// Switch bind points need no qualifier. Router interfaces are not
/// supported.
pub fn bind_type_qualifier(
    stage: AclStage,
    bind_type: AclBindPointType,
    platform: &PlatformCapabilities,
) -> SaiResult<Option<Qualifier>> {
    let q = match (stage, bind_type) {
        (AclStage::Ingress, AclBindPointType::Port | AclBindPointType::Lag) => {
            Some(Qualifier::InPorts)
        }
        (AclStage::Egress, AclBindPointType::Port) => Some(Qualifier::OutPort),
        (AclStage::Egress, AclBindPointType::Lag) if platform.lag_via_in_ports => {
            Some(Qualifier::InPorts)
        }
        (AclStage::Egress, AclBindPointType::Lag) => Some(Qualifier::DstTrunk),
        (_, AclBindPointType::Vlan) => Some(Qualifier::OuterVlanId),
        (_, AclBindPointType::Switch) => None,
        (_, AclBindPointType::RouterInterface) => {
            return Err(SaiError::not_supported(format!(
                "ACL bind point type {}",
                bind_type
            )))
        }
    };
    Ok(q)
}

/// Qualifier value of a single-valued bind point.
fn bind_qualifier_value(qualifier: Qualifier, value: u32) -> QualifierValue {
    match qualifier {
        Qualifier::OuterVlanId => QualifierValue::U16 {
            data: value as u16,
            mask: VLAN_ID_MASK,
        },
        _ => QualifierValue::U32 {
            data: value,
            mask: u32::MAX,
        },
    }
}

impl<E: MatchEngine, L: LagResolver> AclOrch<E, L> {
    // ============ Hardware Qualifiers ============

    /// Ports an in-ports bind point contributes.
    fn bind_ports(&self, bind_point: &BindPoint) -> PortBitmap {
        match bind_point.bind_type {
            AclBindPointType::Port => [bind_point.value].into_iter().collect(),
            AclBindPointType::Lag => self.lags.lag_members(bind_point.value).unwrap_or_else(|| {
                warn!("LAG {} has no known members", bind_point.value);
                PortBitmap::new()
            }),
            _ => PortBitmap::new(),
        }
    }

    /// Computes the value `qualifier` should hold on an entry: the user
    /// match of the entry's family combined with the entry's bind values.
    ///
    /// In-ports merges both; other qualifiers take the bind value over the
    /// user match.
    fn desired_qualifier(
        &self,
        index: u32,
        qualifier: Qualifier,
    ) -> SaiResult<Option<QualifierValue>> {
        let entry = self.entries.get(index)?;
        let canonical = self.entries.get(entry.canonical.unwrap_or(index))?;
        let stage = self.tables.get(entry.table)?.stage;
        let platform = &self.config.platform;

        let user = canonical
            .matches
            .iter()
            .find(|(field, _)| field.qualifier() == Some(qualifier))
            .map(|(_, value)| value);
        let mut bound = Vec::new();
        for (bind_type, value) in &entry.bind_values {
            if bind_type_qualifier(stage, *bind_type, platform)? == Some(qualifier) {
                bound.push(BindPoint::new(*bind_type, *value));
            }
        }

        if qualifier == Qualifier::InPorts {
            if user.is_none() && bound.is_empty() {
                return Ok(None);
            }
            let mut ports = user.map(|v| v.port_bitmap()).unwrap_or_default();
            for bind_point in &bound {
                ports = ports | self.bind_ports(bind_point);
            }
            // An all-zero mask would match every port. An empty port set
            // (a LAG without members) must match none.
            let mask = if platform.in_ports_full_mask || ports.is_empty() {
                platform.all_ports()
            } else {
                ports
            };
            return Ok(Some(QualifierValue::Ports { data: ports, mask }));
        }

        if let Some(bind_point) = bound.first() {
            return Ok(Some(bind_qualifier_value(qualifier, bind_point.value)));
        }
        Ok(user.map(|v| v.qualifier_value()))
    }

    /// Programs one qualifier of a hardware entry from its record.
    pub(crate) fn program_qualifier(&mut self, index: u32, qualifier: Qualifier) -> SaiResult<()> {
        let value = self.desired_qualifier(index, qualifier)?;
        let hw_entry = self.entries.get(index)?.hw_entry;
        match value {
            Some(value) => self.engine.qualify(hw_entry, qualifier, value),
            None => self.engine.qualify_clear(hw_entry, qualifier),
        }
    }

    /// Pushes a modified installed entry to hardware, keeping its enabled
    /// state.
    pub(crate) fn refresh_hw(&mut self, index: u32) -> SaiResult<()> {
        let entry = self.entries.get(index)?;
        if !entry.installed {
            return Ok(());
        }
        let hw_entry = entry.hw_entry;
        let enabled = self.engine.entry_enable_get(hw_entry)?;
        self.engine.entry_reinstall(hw_entry)?;
        self.engine.entry_enable_set(hw_entry, enabled)
    }

    /// Returns the qualifier a bind point type maps to for a table.
    pub(crate) fn table_bind_qualifier(
        &self,
        table: u32,
        bind_type: AclBindPointType,
    ) -> SaiResult<Option<Qualifier>> {
        let stage = self.tables.get(table)?.stage;
        bind_type_qualifier(stage, bind_type, &self.config.platform)
    }

    // ============ Validation ============

    fn validate_bind_value(&self, bind_point: &BindPoint) -> SaiResult<()> {
        let attr = format!("ACL bind point {}", bind_point);
        match bind_point.bind_type {
            AclBindPointType::Port if bind_point.value >= self.config.platform.port_count => Err(
                SaiError::invalid_value(
                    attr,
                    format!(
                        "port {} out of range (platform has {})",
                        bind_point.value, self.config.platform.port_count
                    ),
                ),
            ),
            AclBindPointType::Vlan if !(1..=VLAN_ID_MAX).contains(&bind_point.value) => Err(
                SaiError::invalid_value(attr, format!("VLAN id must be in 1..={}", VLAN_ID_MAX)),
            ),
            AclBindPointType::Lag if self.lags.lag_members(bind_point.value).is_none() => {
                Err(SaiError::invalid_value(attr, "unknown LAG"))
            }
            AclBindPointType::RouterInterface => Err(SaiError::not_supported(attr)),
            _ => Ok(()),
        }
    }

    // ============ Table Fan-out ============

    /// Canonical entries of a table, in attach order.
    pub(crate) fn table_canonical_entries(&self, table: u32) -> SaiResult<Vec<u32>> {
        let mut canonical = Vec::new();
        for entry in &self.tables.get(table)?.entries {
            if !self.entries.get(*entry)?.is_clone() {
                canonical.push(*entry);
            }
        }
        Ok(canonical)
    }

    /// Adds one source of `bind_point` to a table, applying it to every
    /// entry when it becomes effective.
    pub(crate) fn apply_bind_to_table(&mut self, table: u32, bind_point: BindPoint) -> SaiResult<()> {
        let record = self.tables.get_mut(table)?;
        let sources = record.bind_refs.entry(bind_point).or_insert(0);
        *sources += 1;
        if *sources > 1 {
            debug!(
                "ACL table {}: bind point {} now has {} sources",
                table, bind_point, sources
            );
            return Ok(());
        }
        for entry in self.table_canonical_entries(table)? {
            self.attach_to_family(entry, bind_point)?;
        }
        debug!("ACL table {}: bind point {} applied", table, bind_point);
        Ok(())
    }

    /// Drops one source of `bind_point` from a table, removing it from every
    /// entry when the last source goes.
    pub(crate) fn remove_bind_from_table(
        &mut self,
        table: u32,
        bind_point: BindPoint,
    ) -> SaiResult<()> {
        let record = self.tables.get_mut(table)?;
        match record.bind_refs.get(&bind_point).copied().unwrap_or(0) {
            0 => {
                warn!(
                    "ACL table {}: bind point {} is not applied",
                    table, bind_point
                );
                return Ok(());
            }
            1 => {
                record.bind_refs.remove(&bind_point);
            }
            sources => {
                record.bind_refs.insert(bind_point, sources - 1);
                return Ok(());
            }
        }
        for entry in self.table_canonical_entries(table)? {
            self.detach_from_family(entry, bind_point)?;
        }
        debug!("ACL table {}: bind point {} removed", table, bind_point);
        Ok(())
    }

    // ============ Bind Point Operations ============

    /// Binds a table directly to a forwarding entity.
    ///
    /// Binding an already bound entity succeeds without changes.
    pub fn table_bind_point_attach(
        &mut self,
        table: AclTableOid,
        bind_point: BindPoint,
    ) -> SaiResult<()> {
        let index = self.table_index(table)?;
        let record = self.tables.get(index)?;
        if !record.accepts_bind_type(bind_point.bind_type) {
            return Err(SaiError::invalid_parameter(format!(
                "ACL table {} does not accept {} bind points",
                table, bind_point.bind_type
            )));
        }
        self.validate_bind_value(&bind_point)?;
        if record.has_direct_bind_point(&bind_point) {
            debug!("ACL table {} already bound to {}", table, bind_point);
            return Ok(());
        }

        self.tables.get_mut(index)?.bind_points.push(bind_point);
        self.apply_bind_to_table(index, bind_point)?;
        info!("Bound ACL table {} to {}", table, bind_point);
        Ok(())
    }

    /// Unbinds a table from a forwarding entity it is bound to directly.
    pub fn table_bind_point_detach(
        &mut self,
        table: AclTableOid,
        bind_point: BindPoint,
    ) -> SaiResult<()> {
        let index = self.table_index(table)?;
        let record = self.tables.get_mut(index)?;
        if !record.has_direct_bind_point(&bind_point) {
            return Err(SaiError::not_found(format!(
                "bind point {} on ACL table {}",
                bind_point, table
            )));
        }
        record.bind_points.retain(|bp| *bp != bind_point);
        self.remove_bind_from_table(index, bind_point)?;
        info!("Unbound ACL table {} from {}", table, bind_point);
        Ok(())
    }

    /// Binds a group, and through it every member table, to a forwarding
    /// entity.
    pub fn group_bind_point_attach(
        &mut self,
        group: AclTableGroupOid,
        bind_point: BindPoint,
    ) -> SaiResult<()> {
        let index = self.group_index(group)?;
        let record = self.groups.get(index)?;
        if !record.bind_types.contains(&bind_point.bind_type) {
            return Err(SaiError::invalid_parameter(format!(
                "ACL table group {} does not accept {} bind points",
                group, bind_point.bind_type
            )));
        }
        self.validate_bind_value(&bind_point)?;
        if record.bind_points.contains(&bind_point) {
            debug!("ACL table group {} already bound to {}", group, bind_point);
            return Ok(());
        }
        let tables = self.group_member_tables(index)?;

        self.groups.get_mut(index)?.bind_points.push(bind_point);
        for table in tables {
            self.apply_bind_to_table(table, bind_point)?;
        }
        info!("Bound ACL table group {} to {}", group, bind_point);
        Ok(())
    }

    /// Unbinds a group from a forwarding entity.
    pub fn group_bind_point_detach(
        &mut self,
        group: AclTableGroupOid,
        bind_point: BindPoint,
    ) -> SaiResult<()> {
        let index = self.group_index(group)?;
        if !self.groups.get(index)?.bind_points.contains(&bind_point) {
            return Err(SaiError::not_found(format!(
                "bind point {} on ACL table group {}",
                bind_point, group
            )));
        }
        let tables = self.group_member_tables(index)?;

        self.groups
            .get_mut(index)?
            .bind_points
            .retain(|bp| *bp != bind_point);
        for table in tables {
            self.remove_bind_from_table(table, bind_point)?;
        }
        info!("Unbound ACL table group {} from {}", group, bind_point);
        Ok(())
    }

    /// Decodes the forwarding entity a raw handle names.
    ///
    /// Port and LAG handles carry the port or LAG number as their index,
    /// VLAN handles the VLAN id.
    pub fn bind_point_of(target: RawSaiObjectId) -> SaiResult<BindPoint> {
        let index = decode_object_id(target).index;
        match object_type_of(target)? {
            SaiObjectType::Port => Ok(BindPoint::port(index)),
            SaiObjectType::Lag => Ok(BindPoint::lag(index)),
            SaiObjectType::Vlan => Ok(BindPoint::vlan(index)),
            SaiObjectType::Switch => Ok(BindPoint::switch()),
            SaiObjectType::RouterInterface => Err(SaiError::not_supported(format!(
                "ACL bind point type {}",
                AclBindPointType::RouterInterface
            ))),
            other => Err(SaiError::InvalidObjectType {
                expected: "Port, Lag, Vlan or Switch".to_string(),
                found: other.tag(),
            }),
        }
    }

    /// Binds an ACL table or group to the entity named by `target`.
    pub fn bind_object(&mut self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()> {
        let bind_point = Self::bind_point_of(target)?;
        match object_type_of(acl)? {
            SaiObjectType::AclTable => {
                self.table_bind_point_attach(AclTableOid::try_from_raw(acl)?, bind_point)
            }
            SaiObjectType::AclTableGroup => {
                self.group_bind_point_attach(AclTableGroupOid::try_from_raw(acl)?, bind_point)
            }
            other => Err(SaiError::InvalidObjectType {
                expected: "AclTable or AclTableGroup".to_string(),
                found: other.tag(),
            }),
        }
    }

    /// Unbinds an ACL table or group from the entity named by `target`.
    pub fn unbind_object(&mut self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()> {
        let bind_point = Self::bind_point_of(target)?;
        match object_type_of(acl)? {
            SaiObjectType::AclTable => {
                self.table_bind_point_detach(AclTableOid::try_from_raw(acl)?, bind_point)
            }
            SaiObjectType::AclTableGroup => {
                self.group_bind_point_detach(AclTableGroupOid::try_from_raw(acl)?, bind_point)
            }
            other => Err(SaiError::InvalidObjectType {
                expected: "AclTable or AclTableGroup".to_string(),
                found: other.tag(),
            }),
        }
    }

    // ============ LAG Membership ============

    /// Recomputes the in-ports qualifier of every entry bound to `lag`.
    ///
    /// Called after the LAG resolver's view of the LAG changed.
    pub fn lag_membership_changed(&mut self, lag: LagOid) -> SaiResult<()> {
        let lag_id = lag.index();
        let mut affected = Vec::new();
        for (index, entry) in self.entries.iter() {
            if entry.bind_values.get(&AclBindPointType::Lag) != Some(&lag_id) {
                continue;
            }
            if self.table_bind_qualifier(entry.table, AclBindPointType::Lag)?
                == Some(Qualifier::InPorts)
            {
                affected.push(index);
            }
        }
        for index in &affected {
            self.program_qualifier(*index, Qualifier::InPorts)?;
            self.refresh_hw(*index)?;
        }
        info!(
            "LAG {} membership changed, {} ACL entries updated",
            lag_id,
            affected.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_sai::{PortOid, SaiStatus, VlanOid};

    #[test]
    fn test_bind_type_qualifier() {
        let platform = PlatformCapabilities::default();
        let fixup = PlatformCapabilities {
            lag_via_in_ports: true,
            ..Default::default()
        };
        let cases = [
            (AclStage::Ingress, AclBindPointType::Port, Some(Qualifier::InPorts)),
            (AclStage::Ingress, AclBindPointType::Lag, Some(Qualifier::InPorts)),
            (AclStage::Egress, AclBindPointType::Port, Some(Qualifier::OutPort)),
            (AclStage::Egress, AclBindPointType::Lag, Some(Qualifier::DstTrunk)),
            (AclStage::Ingress, AclBindPointType::Vlan, Some(Qualifier::OuterVlanId)),
            (AclStage::Egress, AclBindPointType::Switch, None),
        ];
        for (stage, bind_type, expected) in cases {
            assert_eq!(
                bind_type_qualifier(stage, bind_type, &platform).unwrap(),
                expected,
                "{} {}",
                stage,
                bind_type
            );
        }
        assert_eq!(
            bind_type_qualifier(AclStage::Egress, AclBindPointType::Lag, &fixup).unwrap(),
            Some(Qualifier::InPorts)
        );
        assert_eq!(
            bind_type_qualifier(AclStage::Ingress, AclBindPointType::RouterInterface, &platform)
                .unwrap_err()
                .status(),
            SaiStatus::AttrNotSupported
        );
    }

    #[test]
    fn test_bind_qualifier_value() {
        assert_eq!(
            bind_qualifier_value(Qualifier::OuterVlanId, 100),
            QualifierValue::U16 {
                data: 100,
                mask: 0xfff
            }
        );
        assert_eq!(
            bind_qualifier_value(Qualifier::OutPort, 7),
            QualifierValue::U32 {
                data: 7,
                mask: u32::MAX
            }
        );
    }

    #[test]
    fn test_bind_point_of() {
        type Orch = AclOrch<sonic_sai::api::SoftMatchEngine, crate::lag::StaticLagResolver>;

        assert_eq!(
            Orch::bind_point_of(PortOid::new(0, 0, 3).as_raw()).unwrap(),
            BindPoint::port(3)
        );
        assert_eq!(
            Orch::bind_point_of(VlanOid::new(0, 0, 100).as_raw()).unwrap(),
            BindPoint::vlan(100)
        );
        assert_eq!(
            Orch::bind_point_of(AclTableOid::new(0, 0, 1).as_raw())
                .unwrap_err()
                .status(),
            SaiStatus::InvalidObjectType
        );
        assert_eq!(
            Orch::bind_point_of(0).unwrap_err().status(),
            SaiStatus::InvalidObjectType
        );
    }
}
