//! Raw-handle ACL API.
//!
//! [`AclApi`] is the switch-facing surface: every operation takes and
//! returns raw 64-bit handles, validated against their type tag before use.
//! [`AclService`] serializes all calls through one lock around an
//! [`AclOrch`].

use std::sync::{Mutex, MutexGuard};

use log::error;
use sonic_sai::api::MatchEngine;
use sonic_sai::{
    AclCounterOid, AclEntryOid, AclTableGroupMemberOid, AclTableGroupOid, AclTableOid, LagOid,
    RawSaiObjectId, SaiError, SaiResult,
};

use crate::counter::{AclCounterAttrId, AclCounterAttrValue, AclCounterConfig};
use crate::entry::{AclEntryAttr, AclEntryAttrId, AclEntryAttrValue, AclEntryConfig};
use crate::group::{
    AclTableGroupAttrId, AclTableGroupAttrValue, AclTableGroupConfig, AclTableGroupMemberAttrId,
    AclTableGroupMemberAttrValue, AclTableGroupMemberConfig,
};
use crate::lag::LagResolver;
use crate::orch::{AclOrch, AclOrchStats};
use crate::snapshot::AclSnapshot;
use crate::table::{AclTableAttrId, AclTableAttrValue, AclTableConfig};

/// ACL operations over raw handles.
pub trait AclApi {
    // ============ Tables ============
    fn create_acl_table(&self, config: &AclTableConfig) -> SaiResult<RawSaiObjectId>;
    fn remove_acl_table(&self, table: RawSaiObjectId) -> SaiResult<()>;
    fn get_acl_table_attribute(
        &self,
        table: RawSaiObjectId,
        ids: &[AclTableAttrId],
    ) -> SaiResult<Vec<AclTableAttrValue>>;
    fn set_acl_table_attribute(
        &self,
        table: RawSaiObjectId,
        value: &AclTableAttrValue,
    ) -> SaiResult<()>;

    // ============ Groups ============
    fn create_acl_table_group(&self, config: &AclTableGroupConfig) -> SaiResult<RawSaiObjectId>;
    fn remove_acl_table_group(&self, group: RawSaiObjectId) -> SaiResult<()>;
    fn get_acl_table_group_attribute(
        &self,
        group: RawSaiObjectId,
        ids: &[AclTableGroupAttrId],
    ) -> SaiResult<Vec<AclTableGroupAttrValue>>;
    fn set_acl_table_group_attribute(
        &self,
        group: RawSaiObjectId,
        value: &AclTableGroupAttrValue,
    ) -> SaiResult<()>;
    fn create_acl_table_group_member(
        &self,
        config: &AclTableGroupMemberConfig,
    ) -> SaiResult<RawSaiObjectId>;
    fn remove_acl_table_group_member(&self, member: RawSaiObjectId) -> SaiResult<()>;
    fn get_acl_table_group_member_attribute(
        &self,
        member: RawSaiObjectId,
        ids: &[AclTableGroupMemberAttrId],
    ) -> SaiResult<Vec<AclTableGroupMemberAttrValue>>;

    // ============ Entries ============
    fn create_acl_entry(&self, config: &AclEntryConfig) -> SaiResult<RawSaiObjectId>;
    fn remove_acl_entry(&self, entry: RawSaiObjectId) -> SaiResult<()>;
    fn set_acl_entry_attribute(&self, entry: RawSaiObjectId, attr: AclEntryAttr) -> SaiResult<()>;
    fn get_acl_entry_attribute(
        &self,
        entry: RawSaiObjectId,
        ids: &[AclEntryAttrId],
    ) -> SaiResult<Vec<AclEntryAttrValue>>;

    // ============ Counters ============
    fn create_acl_counter(&self, config: &AclCounterConfig) -> SaiResult<RawSaiObjectId>;
    fn remove_acl_counter(&self, counter: RawSaiObjectId) -> SaiResult<()>;
    fn get_acl_counter_attribute(
        &self,
        counter: RawSaiObjectId,
        ids: &[AclCounterAttrId],
    ) -> SaiResult<Vec<AclCounterAttrValue>>;

    // ============ Bind Points ============
    /// Binds the table or group `acl` to the port, LAG, VLAN or switch
    /// named by `target`.
    fn bind_acl(&self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()>;
    fn unbind_acl(&self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()>;

    // ============ Introspection ============
    fn stats(&self) -> SaiResult<AclOrchStats>;
    fn snapshot(&self) -> SaiResult<AclSnapshot>;
}

/// [`AclApi`] over a lock-protected [`AclOrch`].
#[derive(Debug)]
pub struct AclService<E, L> {
    orch: Mutex<AclOrch<E, L>>,
}

impl<E: MatchEngine, L: LagResolver> AclService<E, L> {
    pub fn new(orch: AclOrch<E, L>) -> Self {
        Self {
            orch: Mutex::new(orch),
        }
    }

    fn lock(&self) -> SaiResult<MutexGuard<'_, AclOrch<E, L>>> {
        self.orch.lock().map_err(|_| {
            error!("AclService: lock poisoned by a panicked caller");
            SaiError::failure("ACL service lock poisoned")
        })
    }

    /// Runs `f` with exclusive access to the orch.
    pub fn with_orch<T>(&self, f: impl FnOnce(&mut AclOrch<E, L>) -> SaiResult<T>) -> SaiResult<T> {
        let mut orch = self.lock()?;
        f(&mut orch)
    }

    /// Changes a LAG through the resolver and reprograms every entry bound
    /// to it.
    pub fn update_lag(&self, lag: RawSaiObjectId, f: impl FnOnce(&mut L)) -> SaiResult<()> {
        let lag = LagOid::try_from_raw(lag)?;
        let mut orch = self.lock()?;
        f(orch.lag_resolver_mut());
        orch.lag_membership_changed(lag)
    }

    /// Returns the orch, or a failure if the lock was poisoned.
    pub fn into_inner(self) -> SaiResult<AclOrch<E, L>> {
        self.orch
            .into_inner()
            .map_err(|_| SaiError::failure("ACL service lock poisoned"))
    }
}

impl<E: MatchEngine, L: LagResolver> AclApi for AclService<E, L> {
    fn create_acl_table(&self, config: &AclTableConfig) -> SaiResult<RawSaiObjectId> {
        Ok(self.lock()?.create_table(config)?.as_raw())
    }

    fn remove_acl_table(&self, table: RawSaiObjectId) -> SaiResult<()> {
        let table = AclTableOid::try_from_raw(table)?;
        self.lock()?.remove_table(table)
    }

    fn get_acl_table_attribute(
        &self,
        table: RawSaiObjectId,
        ids: &[AclTableAttrId],
    ) -> SaiResult<Vec<AclTableAttrValue>> {
        let table = AclTableOid::try_from_raw(table)?;
        self.lock()?.get_table_attribute(table, ids)
    }

    fn set_acl_table_attribute(
        &self,
        table: RawSaiObjectId,
        value: &AclTableAttrValue,
    ) -> SaiResult<()> {
        let table = AclTableOid::try_from_raw(table)?;
        self.lock()?.set_table_attribute(table, value)
    }

    fn create_acl_table_group(&self, config: &AclTableGroupConfig) -> SaiResult<RawSaiObjectId> {
        Ok(self.lock()?.create_group(config)?.as_raw())
    }

    fn remove_acl_table_group(&self, group: RawSaiObjectId) -> SaiResult<()> {
        let group = AclTableGroupOid::try_from_raw(group)?;
        self.lock()?.remove_group(group)
    }

    fn get_acl_table_group_attribute(
        &self,
        group: RawSaiObjectId,
        ids: &[AclTableGroupAttrId],
    ) -> SaiResult<Vec<AclTableGroupAttrValue>> {
        let group = AclTableGroupOid::try_from_raw(group)?;
        self.lock()?.get_group_attribute(group, ids)
    }

    fn set_acl_table_group_attribute(
        &self,
        group: RawSaiObjectId,
        value: &AclTableGroupAttrValue,
    ) -> SaiResult<()> {
        let group = AclTableGroupOid::try_from_raw(group)?;
        self.lock()?.set_group_attribute(group, value)
    }

    fn create_acl_table_group_member(
        &self,
        config: &AclTableGroupMemberConfig,
    ) -> SaiResult<RawSaiObjectId> {
        Ok(self.lock()?.create_member(config)?.as_raw())
    }

    fn remove_acl_table_group_member(&self, member: RawSaiObjectId) -> SaiResult<()> {
        let member = AclTableGroupMemberOid::try_from_raw(member)?;
        self.lock()?.remove_member(member)
    }

    fn get_acl_table_group_member_attribute(
        &self,
        member: RawSaiObjectId,
        ids: &[AclTableGroupMemberAttrId],
    ) -> SaiResult<Vec<AclTableGroupMemberAttrValue>> {
        let member = AclTableGroupMemberOid::try_from_raw(member)?;
        self.lock()?.get_member_attribute(member, ids)
    }

    fn create_acl_entry(&self, config: &AclEntryConfig) -> SaiResult<RawSaiObjectId> {
        Ok(self.lock()?.create_entry(config)?.as_raw())
    }

    fn remove_acl_entry(&self, entry: RawSaiObjectId) -> SaiResult<()> {
        let entry = AclEntryOid::try_from_raw(entry)?;
        self.lock()?.remove_entry(entry)
    }

    fn set_acl_entry_attribute(&self, entry: RawSaiObjectId, attr: AclEntryAttr) -> SaiResult<()> {
        let entry = AclEntryOid::try_from_raw(entry)?;
        self.lock()?.set_entry_attribute(entry, attr)
    }

    fn get_acl_entry_attribute(
        &self,
        entry: RawSaiObjectId,
        ids: &[AclEntryAttrId],
    ) -> SaiResult<Vec<AclEntryAttrValue>> {
        let entry = AclEntryOid::try_from_raw(entry)?;
        self.lock()?.get_entry_attribute(entry, ids)
    }

    fn create_acl_counter(&self, config: &AclCounterConfig) -> SaiResult<RawSaiObjectId> {
        Ok(self.lock()?.create_counter(config)?.as_raw())
    }

    fn remove_acl_counter(&self, counter: RawSaiObjectId) -> SaiResult<()> {
        let counter = AclCounterOid::try_from_raw(counter)?;
        self.lock()?.remove_counter(counter)
    }

    fn get_acl_counter_attribute(
        &self,
        counter: RawSaiObjectId,
        ids: &[AclCounterAttrId],
    ) -> SaiResult<Vec<AclCounterAttrValue>> {
        let counter = AclCounterOid::try_from_raw(counter)?;
        self.lock()?.get_counter_attribute(counter, ids)
    }

    fn bind_acl(&self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()> {
        self.lock()?.bind_object(target, acl)
    }

    fn unbind_acl(&self, target: RawSaiObjectId, acl: RawSaiObjectId) -> SaiResult<()> {
        self.lock()?.unbind_object(target, acl)
    }

    fn stats(&self) -> SaiResult<AclOrchStats> {
        Ok(self.lock()?.stats())
    }

    fn snapshot(&self) -> SaiResult<AclSnapshot> {
        self.lock()?.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;
    use crate::lag::StaticLagResolver;
    use crate::types::{AclBindPointType, AclMatchField, AclStage};
    use sonic_sai::api::SoftMatchEngine;
    use sonic_sai::{PortOid, SaiStatus};

    fn service() -> AclService<SoftMatchEngine, StaticLagResolver> {
        let orch = AclOrch::new(
            AclConfig::default(),
            SoftMatchEngine::new(),
            StaticLagResolver::new(),
        )
        .unwrap();
        AclService::new(orch)
    }

    fn table_config() -> AclTableConfig {
        AclTableConfig::new()
            .with_stage(AclStage::Ingress)
            .with_field(AclMatchField::SrcIp)
            .with_bind_type(AclBindPointType::Port)
    }

    #[test]
    fn test_raw_handle_round_trip() {
        let service = service();
        let table = service.create_acl_table(&table_config()).unwrap();
        let entry = service
            .create_acl_entry(&AclEntryConfig::new().with_table(table))
            .unwrap();
        service
            .bind_acl(PortOid::new(0, 0, 3).as_raw(), table)
            .unwrap();
        assert_eq!(service.stats().unwrap().entries, 1);

        service.remove_acl_entry(entry).unwrap();
        service
            .unbind_acl(PortOid::new(0, 0, 3).as_raw(), table)
            .unwrap();
        service.remove_acl_table(table).unwrap();
        assert_eq!(service.stats().unwrap(), AclOrchStats::default());
    }

    #[test]
    fn test_wrong_handle_type_rejected() {
        let service = service();
        let table = service.create_acl_table(&table_config()).unwrap();
        let err = service.remove_acl_entry(table).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidObjectType);
        let err = service.remove_acl_table_group(table).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidObjectType);
        assert_eq!(service.stats().unwrap().tables, 1);
    }

    #[test]
    fn test_poisoned_lock_is_failure() {
        let service = service();
        std::thread::scope(|s| {
            let result = s
                .spawn(|| {
                    service.with_orch(|_| -> SaiResult<()> { panic!("caller panicked") })
                })
                .join();
            assert!(result.is_err());
        });
        let err = service.create_acl_table(&table_config()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::Failure);
        assert!(service.into_inner().is_err());
    }

    #[test]
    fn test_update_lag() {
        let service = service();
        let table = service.create_acl_table(&table_config().with_bind_type(AclBindPointType::Lag)).unwrap();
        let lag = sonic_sai::LagOid::new(0, 0, 1).as_raw();
        service.update_lag(lag, |lags| lags.set_members(1, [4, 5])).unwrap();
        service.bind_acl(lag, table).unwrap();
        service.create_acl_entry(&AclEntryConfig::new().with_table(table)).unwrap();
        service.update_lag(lag, |lags| lags.set_members(1, [6])).unwrap();

        let snapshot = service.snapshot().unwrap();
        let qualifiers = &snapshot.tables[0].entries[0].hw_qualifiers;
        assert!(qualifiers.iter().any(|q| q.starts_with("InPorts=")));
        assert_eq!(snapshot.tables[0].effective_bind_points.len(), 1);
    }
}
