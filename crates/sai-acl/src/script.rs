//! Scenario replay.
//!
//! A script is a JSON document naming ACL objects and the operations to run
//! on them, in order. Each step may state the SAI status it expects; a step
//! without one must succeed. Used by the `acl-replay` binary and by tests.
//!
//! ```json
//! {
//!   "lags": { "1": [4, 5] },
//!   "steps": [
//!     { "op": "create_table", "name": "t", "stage": "INGRESS",
//!       "fields": ["SRC_IP"], "bind_types": ["PORT"] },
//!     { "op": "bind", "acl": "t", "bind_type": "PORT", "value": 1 },
//!     { "op": "create_entry", "name": "e", "table": "t",
//!       "matches": { "SRC_IP": "10.0.0.1" }, "actions": { "PACKET_ACTION": "DROP" } },
//!     { "op": "remove_table", "name": "t", "expect": "SAI_STATUS_OBJECT_IN_USE" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sonic_sai::api::MatchEngine;
use sonic_sai::{
    status_of, AclCounterOid, AclEntryOid, AclTableGroupMemberOid, AclTableGroupOid,
    AclTableOid, LagOid, PortOid, RawSaiObjectId, RouterInterfaceOid, SaiResult, SaiStatus,
    SwitchOid, VlanOid,
};
use thiserror::Error;

use crate::counter::AclCounterConfig;
use crate::entry::{AclEntryAttr, AclEntryConfig};
use crate::group::{AclTableGroupConfig, AclTableGroupMemberConfig};
use crate::lag::StaticLagResolver;
use crate::orch::AclOrch;
use crate::rule::{AclEntryAction, AclEntryMatch};
use crate::table::AclTableConfig;
use crate::types::{
    AclActionType, AclBindPointType, AclMatchField, AclPriority, AclStage, AclTableGroupType,
    BindPoint,
};

/// Error type for script loading and replay.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("step {step}: unknown object '{name}'")]
    UnknownName { step: usize, name: String },

    #[error("step {step}: object '{name}' is not {expected}")]
    WrongKind {
        step: usize,
        name: String,
        expected: &'static str,
    },

    #[error("step {step}: {message}")]
    InvalidValue { step: usize, message: String },

    #[error("step {step} ({op}): expected {expected}, got {actual}")]
    Unexpected {
        step: usize,
        op: String,
        expected: String,
        actual: String,
    },
}

/// One operation of a script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    CreateTable {
        name: String,
        stage: AclStage,
        fields: Vec<AclMatchField>,
        #[serde(default)]
        bind_types: Vec<AclBindPointType>,
        #[serde(default)]
        size: Option<u32>,
    },
    RemoveTable {
        name: String,
    },
    CreateGroup {
        name: String,
        stage: AclStage,
        #[serde(default)]
        bind_types: Vec<AclBindPointType>,
        #[serde(default)]
        group_type: Option<AclTableGroupType>,
    },
    RemoveGroup {
        name: String,
    },
    CreateMember {
        name: String,
        group: String,
        table: String,
        priority: AclPriority,
    },
    RemoveMember {
        name: String,
    },
    CreateCounter {
        name: String,
        table: String,
        #[serde(default)]
        packets: bool,
        #[serde(default)]
        bytes: bool,
    },
    RemoveCounter {
        name: String,
    },
    CreateEntry {
        name: String,
        table: String,
        #[serde(default)]
        priority: Option<AclPriority>,
        #[serde(default)]
        admin_state: Option<bool>,
        #[serde(default)]
        counter: Option<String>,
        #[serde(default)]
        matches: BTreeMap<AclMatchField, String>,
        #[serde(default)]
        actions: BTreeMap<AclActionType, String>,
    },
    RemoveEntry {
        name: String,
    },
    SetEntryAdminState {
        name: String,
        enabled: bool,
    },
    SetEntryPriority {
        name: String,
        priority: AclPriority,
    },
    /// A missing value clears the field.
    SetEntryField {
        name: String,
        field: AclMatchField,
        #[serde(default)]
        value: Option<String>,
    },
    /// A missing value clears the action.
    SetEntryAction {
        name: String,
        action: AclActionType,
        #[serde(default)]
        value: Option<String>,
    },
    SetEntryCounter {
        name: String,
        #[serde(default)]
        counter: Option<String>,
    },
    Bind {
        acl: String,
        bind_type: AclBindPointType,
        #[serde(default)]
        value: u32,
    },
    Unbind {
        acl: String,
        bind_type: AclBindPointType,
        #[serde(default)]
        value: u32,
    },
    /// Replaces a LAG's member ports.
    SetLag { lag: u32, ports: Vec<u32> },
}

impl ScriptOp {
    fn label(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::RemoveTable { .. } => "remove_table",
            Self::CreateGroup { .. } => "create_group",
            Self::RemoveGroup { .. } => "remove_group",
            Self::CreateMember { .. } => "create_member",
            Self::RemoveMember { .. } => "remove_member",
            Self::CreateCounter { .. } => "create_counter",
            Self::RemoveCounter { .. } => "remove_counter",
            Self::CreateEntry { .. } => "create_entry",
            Self::RemoveEntry { .. } => "remove_entry",
            Self::SetEntryAdminState { .. } => "set_entry_admin_state",
            Self::SetEntryPriority { .. } => "set_entry_priority",
            Self::SetEntryField { .. } => "set_entry_field",
            Self::SetEntryAction { .. } => "set_entry_action",
            Self::SetEntryCounter { .. } => "set_entry_counter",
            Self::Bind { .. } => "bind",
            Self::Unbind { .. } => "unbind",
            Self::SetLag { .. } => "set_lag",
        }
    }
}

/// A script step: an operation and the status it should return.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptStep {
    #[serde(flatten)]
    pub op: ScriptOp,
    /// Expected SAI status name, e.g. `SAI_STATUS_OBJECT_IN_USE`.
    #[serde(default)]
    pub expect: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Script {
    /// LAG member ports known before the first step.
    pub lags: BTreeMap<u32, Vec<u32>>,
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// Result of one replayed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: &'static str,
    pub status: String,
}

/// A handle created by the script, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Named {
    Table(AclTableOid),
    Group(AclTableGroupOid),
    Member(AclTableGroupMemberOid),
    Counter(AclCounterOid),
    Entry(AclEntryOid),
}

impl Named {
    fn raw(&self) -> RawSaiObjectId {
        match self {
            Self::Table(oid) => oid.as_raw(),
            Self::Group(oid) => oid.as_raw(),
            Self::Member(oid) => oid.as_raw(),
            Self::Counter(oid) => oid.as_raw(),
            Self::Entry(oid) => oid.as_raw(),
        }
    }
}

/// Replays scripts against an [`AclOrch`].
pub struct ScriptRunner<'a, E> {
    orch: &'a mut AclOrch<E, StaticLagResolver>,
    names: BTreeMap<String, Named>,
}

/// Raw handle of the forwarding entity a bind point names.
fn bind_target(bind_point: BindPoint) -> RawSaiObjectId {
    let value = bind_point.value;
    match bind_point.bind_type {
        AclBindPointType::Port => PortOid::new(0, 0, value).as_raw(),
        AclBindPointType::Lag => LagOid::new(0, 0, value).as_raw(),
        AclBindPointType::Vlan => VlanOid::new(0, 0, value).as_raw(),
        AclBindPointType::Switch => SwitchOid::new(0, 0, 0).as_raw(),
        AclBindPointType::RouterInterface => RouterInterfaceOid::new(0, 0, value).as_raw(),
    }
}

impl<'a, E: MatchEngine> ScriptRunner<'a, E> {
    pub fn new(orch: &'a mut AclOrch<E, StaticLagResolver>) -> Self {
        Self {
            orch,
            names: BTreeMap::new(),
        }
    }

    /// Raw handle of a named object, if the script created it.
    pub fn handle(&self, name: &str) -> Option<RawSaiObjectId> {
        self.names.get(name).map(Named::raw)
    }

    fn lookup(&self, step: usize, name: &str) -> Result<Named, ScriptError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ScriptError::UnknownName {
                step,
                name: name.to_string(),
            })
    }

    fn table(&self, step: usize, name: &str) -> Result<AclTableOid, ScriptError> {
        match self.lookup(step, name)? {
            Named::Table(oid) => Ok(oid),
            _ => Err(wrong_kind(step, name, "a table")),
        }
    }

    fn group(&self, step: usize, name: &str) -> Result<AclTableGroupOid, ScriptError> {
        match self.lookup(step, name)? {
            Named::Group(oid) => Ok(oid),
            _ => Err(wrong_kind(step, name, "a table group")),
        }
    }

    fn member(&self, step: usize, name: &str) -> Result<AclTableGroupMemberOid, ScriptError> {
        match self.lookup(step, name)? {
            Named::Member(oid) => Ok(oid),
            _ => Err(wrong_kind(step, name, "a group member")),
        }
    }

    fn counter(&self, step: usize, name: &str) -> Result<AclCounterOid, ScriptError> {
        match self.lookup(step, name)? {
            Named::Counter(oid) => Ok(oid),
            _ => Err(wrong_kind(step, name, "a counter")),
        }
    }

    fn entry(&self, step: usize, name: &str) -> Result<AclEntryOid, ScriptError> {
        match self.lookup(step, name)? {
            Named::Entry(oid) => Ok(oid),
            _ => Err(wrong_kind(step, name, "an entry")),
        }
    }

    /// Names a created object; a failed create leaves the name unbound.
    fn bind_name<T>(&mut self, name: &str, result: SaiResult<T>, named: impl FnOnce(T) -> Named) -> SaiResult<()> {
        let oid = result?;
        self.names.insert(name.to_string(), named(oid));
        Ok(())
    }

    /// Runs one step. Script-level errors (unknown names, unparsable
    /// values) are returned as `Err`; the SAI result is returned as `Ok`.
    fn execute(&mut self, step: usize, op: &ScriptOp) -> Result<SaiResult<()>, ScriptError> {
        let parse_err = |message: String| ScriptError::InvalidValue { step, message };
        let result = match op {
            ScriptOp::CreateTable {
                name,
                stage,
                fields,
                bind_types,
                size,
            } => {
                let config = AclTableConfig {
                    stage: Some(*stage),
                    bind_types: bind_types.clone(),
                    fields: fields.clone(),
                    size: *size,
                };
                let result = self.orch.create_table(&config);
                self.bind_name(name, result, Named::Table)
            }
            ScriptOp::RemoveTable { name } => {
                let table = self.table(step, name)?;
                self.orch.remove_table(table)
            }
            ScriptOp::CreateGroup {
                name,
                stage,
                bind_types,
                group_type,
            } => {
                let config = AclTableGroupConfig {
                    stage: Some(*stage),
                    bind_types: bind_types.clone(),
                    group_type: *group_type,
                };
                let result = self.orch.create_group(&config);
                self.bind_name(name, result, Named::Group)
            }
            ScriptOp::RemoveGroup { name } => {
                let group = self.group(step, name)?;
                self.orch.remove_group(group)
            }
            ScriptOp::CreateMember {
                name,
                group,
                table,
                priority,
            } => {
                let config = AclTableGroupMemberConfig::new(
                    self.group(step, group)?,
                    self.table(step, table)?,
                    *priority,
                );
                let result = self.orch.create_member(&config);
                self.bind_name(name, result, Named::Member)
            }
            ScriptOp::RemoveMember { name } => {
                let member = self.member(step, name)?;
                self.orch.remove_member(member)
            }
            ScriptOp::CreateCounter {
                name,
                table,
                packets,
                bytes,
            } => {
                let config = AclCounterConfig::new()
                    .with_table(self.table(step, table)?)
                    .with_packet_count(*packets)
                    .with_byte_count(*bytes);
                let result = self.orch.create_counter(&config);
                self.bind_name(name, result, Named::Counter)
            }
            ScriptOp::RemoveCounter { name } => {
                let counter = self.counter(step, name)?;
                self.orch.remove_counter(counter)
            }
            ScriptOp::CreateEntry {
                name,
                table,
                priority,
                admin_state,
                counter,
                matches,
                actions,
            } => {
                let mut config = AclEntryConfig::new().with_table(self.table(step, table)?);
                config.priority = *priority;
                config.admin_state = *admin_state;
                if let Some(counter) = counter {
                    config = config.with_counter(self.counter(step, counter)?);
                }
                for (field, value) in matches {
                    config = config.with_match(AclEntryMatch::parse(*field, value).map_err(parse_err)?);
                }
                for (action_type, value) in actions {
                    config = config
                        .with_action(AclEntryAction::parse(*action_type, value).map_err(parse_err)?);
                }
                let result = self.orch.create_entry(&config);
                self.bind_name(name, result, Named::Entry)
            }
            ScriptOp::RemoveEntry { name } => {
                let entry = self.entry(step, name)?;
                self.orch.remove_entry(entry)
            }
            ScriptOp::SetEntryAdminState { name, enabled } => {
                let entry = self.entry(step, name)?;
                self.orch
                    .set_entry_attribute(entry, AclEntryAttr::AdminState(*enabled))
            }
            ScriptOp::SetEntryPriority { name, priority } => {
                let entry = self.entry(step, name)?;
                self.orch
                    .set_entry_attribute(entry, AclEntryAttr::Priority(*priority))
            }
            ScriptOp::SetEntryField { name, field, value } => {
                let entry = self.entry(step, name)?;
                let value = match value {
                    Some(value) => Some(AclEntryMatch::parse(*field, value).map_err(parse_err)?.value),
                    None => None,
                };
                self.orch
                    .set_entry_attribute(entry, AclEntryAttr::Field(*field, value))
            }
            ScriptOp::SetEntryAction {
                name,
                action,
                value,
            } => {
                let entry = self.entry(step, name)?;
                let value = match value {
                    Some(value) => Some(AclEntryAction::parse(*action, value).map_err(parse_err)?.value),
                    None => None,
                };
                self.orch
                    .set_entry_attribute(entry, AclEntryAttr::Action(*action, value))
            }
            ScriptOp::SetEntryCounter { name, counter } => {
                let entry = self.entry(step, name)?;
                let counter = match counter {
                    Some(counter) => Some(self.counter(step, counter)?.as_raw()),
                    None => None,
                };
                self.orch
                    .set_entry_attribute(entry, AclEntryAttr::Counter(counter))
            }
            ScriptOp::Bind {
                acl,
                bind_type,
                value,
            } => {
                let acl = self.lookup(step, acl)?.raw();
                let target = bind_target(BindPoint::new(*bind_type, *value));
                self.orch.bind_object(target, acl)
            }
            ScriptOp::Unbind {
                acl,
                bind_type,
                value,
            } => {
                let acl = self.lookup(step, acl)?.raw();
                let target = bind_target(BindPoint::new(*bind_type, *value));
                self.orch.unbind_object(target, acl)
            }
            ScriptOp::SetLag { lag, ports } => {
                self.orch
                    .lag_resolver_mut()
                    .set_members(*lag, ports.iter().copied());
                self.orch.lag_membership_changed(LagOid::new(0, 0, *lag))
            }
        };
        Ok(result)
    }

    /// Runs every step of `script`, stopping at the first step whose status
    /// differs from its expectation.
    pub fn run(&mut self, script: &Script) -> Result<Vec<StepOutcome>, ScriptError> {
        for (lag, ports) in &script.lags {
            self.orch
                .lag_resolver_mut()
                .set_members(*lag, ports.iter().copied());
        }

        let mut outcomes = Vec::with_capacity(script.steps.len());
        for (step, ScriptStep { op, expect }) in script.steps.iter().enumerate() {
            let result = self.execute(step, op)?;
            let actual = status_of(&result).to_string();
            let expected = expect
                .clone()
                .unwrap_or_else(|| SaiStatus::Success.to_string());
            debug!("step {} {}: {}", step, op.label(), actual);
            if actual != expected {
                let actual = match result {
                    Err(e) => format!("{} ({})", actual, e),
                    Ok(()) => actual,
                };
                return Err(ScriptError::Unexpected {
                    step,
                    op: op.label().to_string(),
                    expected,
                    actual,
                });
            }
            outcomes.push(StepOutcome {
                step,
                op: op.label(),
                status: actual,
            });
        }
        info!("Replayed {} steps", outcomes.len());
        Ok(outcomes)
    }
}

fn wrong_kind(step: usize, name: &str, expected: &'static str) -> ScriptError {
    ScriptError::WrongKind {
        step,
        name: name.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;
    use sonic_sai::api::SoftMatchEngine;
    use std::io::Write;

    fn orch() -> AclOrch<SoftMatchEngine, StaticLagResolver> {
        AclOrch::new(
            AclConfig::default(),
            SoftMatchEngine::new(),
            StaticLagResolver::new(),
        )
        .unwrap()
    }

    const SCENARIO: &str = r#"{
        "steps": [
            { "op": "create_table", "name": "t", "stage": "INGRESS",
              "fields": ["SRC_IP"], "bind_types": ["PORT"] },
            { "op": "bind", "acl": "t", "bind_type": "PORT", "value": 1 },
            { "op": "create_entry", "name": "e", "table": "t", "priority": 10,
              "matches": { "SRC_IP": "10.0.0.1" },
              "actions": { "PACKET_ACTION": "DROP" } },
            { "op": "bind", "acl": "t", "bind_type": "PORT", "value": 2 },
            { "op": "remove_table", "name": "t", "expect": "SAI_STATUS_OBJECT_IN_USE" },
            { "op": "set_entry_admin_state", "name": "e", "enabled": false }
        ]
    }"#;

    #[test]
    fn test_run_scenario() {
        let script = Script::from_json(SCENARIO).unwrap();
        let mut orch = orch();
        let mut runner = ScriptRunner::new(&mut orch);
        let outcomes = runner.run(&script).unwrap();
        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes[4].status, "SAI_STATUS_OBJECT_IN_USE");
        assert!(runner.handle("e").is_some());

        let stats = orch.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.clones, 1);
    }

    #[test]
    fn test_unexpected_status_stops_replay() {
        let script = Script::from_json(
            r#"{ "steps": [
                { "op": "create_table", "name": "t", "stage": "INGRESS", "fields": [] },
                { "op": "create_group", "name": "g", "stage": "INGRESS" }
            ] }"#,
        )
        .unwrap();
        let mut orch = orch();
        let err = ScriptRunner::new(&mut orch).run(&script).unwrap_err();
        assert!(matches!(err, ScriptError::Unexpected { step: 0, .. }));
        assert_eq!(orch.stats().groups, 0);
    }

    #[test]
    fn test_unknown_and_wrong_names() {
        let script = Script::from_json(
            r#"{ "steps": [
                { "op": "create_group", "name": "g", "stage": "EGRESS" },
                { "op": "remove_table", "name": "g" }
            ] }"#,
        )
        .unwrap();
        let mut orch = orch();
        let err = ScriptRunner::new(&mut orch).run(&script).unwrap_err();
        assert!(matches!(err, ScriptError::WrongKind { step: 1, .. }));

        let script =
            Script::from_json(r#"{ "steps": [ { "op": "remove_entry", "name": "x" } ] }"#).unwrap();
        let err = ScriptRunner::new(&mut orch).run(&script).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownName { step: 0, .. }));
    }

    #[test]
    fn test_lags_seeded_from_script() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "lags": {{ "7": [3, 4] }},
                "steps": [
                    {{ "op": "create_table", "name": "t", "stage": "INGRESS",
                       "fields": ["DST_IP"], "bind_types": ["LAG"] }},
                    {{ "op": "bind", "acl": "t", "bind_type": "LAG", "value": 7 }},
                    {{ "op": "bind", "acl": "t", "bind_type": "LAG", "value": 8,
                       "expect": "SAI_STATUS_INVALID_ATTR_VALUE_0" }},
                    {{ "op": "set_lag", "lag": 7, "ports": [5] }}
                ]
            }}"#
        )
        .unwrap();
        let script = Script::from_file(file.path()).unwrap();
        let mut orch = orch();
        ScriptRunner::new(&mut orch).run(&script).unwrap();
        assert_eq!(
            orch.lag_resolver().lags().map(|(lag, _)| lag).collect::<Vec<_>>(),
            vec![7]
        );
    }

    #[test]
    fn test_bad_value_is_script_error() {
        let script = Script::from_json(
            r#"{ "steps": [
                { "op": "create_table", "name": "t", "stage": "INGRESS", "fields": ["SRC_IP"] },
                { "op": "create_entry", "name": "e", "table": "t",
                  "matches": { "SRC_IP": "not-an-address" } }
            ] }"#,
        )
        .unwrap();
        let mut orch = orch();
        let err = ScriptRunner::new(&mut orch).run(&script).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidValue { step: 1, .. }));
    }
}
