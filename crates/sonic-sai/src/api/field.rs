//! Field-processor (ternary match-action) hardware interface.
//!
//! The ACL engine never programs the classification hardware directly. It
//! drives a [`MatchEngine`], which owns priority groups of ternary entries,
//! their per-field qualifiers, their actions, and the statistics objects
//! attached to them. A production build backs this trait with the vendor SDK;
//! [`super::soft::SoftMatchEngine`] is an in-memory implementation.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::{BitAnd, BitOr};

use crate::error::SaiResult;
use crate::types::MacAddress;

/// Hardware priority-group handle.
pub type FieldGroupId = i32;
/// Hardware entry handle.
pub type FieldEntryId = i32;
/// Hardware statistics handle.
pub type FieldStatId = i32;
/// L3 interface handle (MAC rewrite side resource).
pub type L3IntfId = i32;
/// L3 egress object handle (MAC rewrite side resource).
pub type EgressId = i32;

const PBMP_WORDS: usize = 4;

/// Largest port number a [`PortBitmap`] can hold, plus one.
pub const PBMP_PORT_MAX: u32 = (PBMP_WORDS * 64) as u32;

/// A set of front-panel ports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortBitmap([u64; PBMP_WORDS]);

impl PortBitmap {
    /// Creates an empty bitmap.
    pub const fn new() -> Self {
        PortBitmap([0; PBMP_WORDS])
    }

    /// Returns a bitmap with ports `0..count` set.
    pub fn first_n(count: u32) -> Self {
        (0..count.min(PBMP_PORT_MAX)).collect()
    }

    /// Adds a port. Ports past [`PBMP_PORT_MAX`] are ignored.
    pub fn add(&mut self, port: u32) {
        if port < PBMP_PORT_MAX {
            self.0[(port / 64) as usize] |= 1 << (port % 64);
        }
    }

    /// Removes a port.
    pub fn remove(&mut self, port: u32) {
        if port < PBMP_PORT_MAX {
            self.0[(port / 64) as usize] &= !(1 << (port % 64));
        }
    }

    /// Returns true if the port is set.
    pub fn contains(&self, port: u32) -> bool {
        port < PBMP_PORT_MAX && self.0[(port / 64) as usize] & (1 << (port % 64)) != 0
    }

    /// Returns true if no port is set.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    /// Returns the number of ports set.
    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    /// Iterates the set ports in ascending order.
    pub fn ports(&self) -> impl Iterator<Item = u32> + '_ {
        (0..PBMP_PORT_MAX).filter(move |p| self.contains(*p))
    }
}

impl BitOr for PortBitmap {
    type Output = PortBitmap;

    fn bitor(self, rhs: PortBitmap) -> PortBitmap {
        let mut out = self;
        for (w, r) in out.0.iter_mut().zip(rhs.0) {
            *w |= r;
        }
        out
    }
}

impl BitAnd for PortBitmap {
    type Output = PortBitmap;

    fn bitand(self, rhs: PortBitmap) -> PortBitmap {
        let mut out = self;
        for (w, r) in out.0.iter_mut().zip(rhs.0) {
            *w &= r;
        }
        out
    }
}

impl FromIterator<u32> for PortBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut pbmp = PortBitmap::new();
        for port in iter {
            pbmp.add(port);
        }
        pbmp
    }
}

impl fmt::Debug for PortBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ports()).finish()
    }
}

/// A packet-header field the hardware can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    StageIngress,
    StageEgress,
    SrcIp,
    DstIp,
    SrcIp6,
    DstIp6,
    SrcMac,
    DstMac,
    EtherType,
    IpProtocol,
    Dscp,
    Ttl,
    TcpControl,
    L4SrcPort,
    L4DstPort,
    OuterVlanId,
    InPort,
    InPorts,
    OutPort,
    DstTrunk,
}

impl Qualifier {
    /// Every qualifier, in bit order.
    pub const ALL: [Qualifier; 20] = [
        Qualifier::StageIngress,
        Qualifier::StageEgress,
        Qualifier::SrcIp,
        Qualifier::DstIp,
        Qualifier::SrcIp6,
        Qualifier::DstIp6,
        Qualifier::SrcMac,
        Qualifier::DstMac,
        Qualifier::EtherType,
        Qualifier::IpProtocol,
        Qualifier::Dscp,
        Qualifier::Ttl,
        Qualifier::TcpControl,
        Qualifier::L4SrcPort,
        Qualifier::L4DstPort,
        Qualifier::OuterVlanId,
        Qualifier::InPort,
        Qualifier::InPorts,
        Qualifier::OutPort,
        Qualifier::DstTrunk,
    ];

    const fn bit(self) -> u64 {
        1 << (self as u32)
    }
}

/// A hardware qualifier set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QualifierSet(u64);

impl QualifierSet {
    /// Creates an empty set.
    pub const fn new() -> Self {
        QualifierSet(0)
    }

    /// Adds a qualifier; returns true if it was not present.
    pub fn insert(&mut self, q: Qualifier) -> bool {
        let added = !self.contains(q);
        self.0 |= q.bit();
        added
    }

    /// Removes a qualifier; returns true if it was present.
    pub fn remove(&mut self, q: Qualifier) -> bool {
        let present = self.contains(q);
        self.0 &= !q.bit();
        present
    }

    /// Returns true if the qualifier is in the set.
    pub fn contains(&self, q: Qualifier) -> bool {
        self.0 & q.bit() != 0
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &QualifierSet) -> QualifierSet {
        QualifierSet(self.0 | other.0)
    }

    /// Returns true if every qualifier of `other` is in this set.
    pub fn is_superset(&self, other: &QualifierSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns the number of qualifiers.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the qualifiers in bit order.
    pub fn iter(&self) -> impl Iterator<Item = Qualifier> + '_ {
        Qualifier::ALL.into_iter().filter(move |q| self.contains(*q))
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<I: IntoIterator<Item = Qualifier>>(iter: I) -> Self {
        let mut qset = QualifierSet::new();
        for q in iter {
            qset.insert(q);
        }
        qset
    }
}

impl fmt::Debug for QualifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Data and mask programmed for one qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierValue {
    Ipv4 { data: Ipv4Addr, mask: Ipv4Addr },
    Ipv6 { data: Ipv6Addr, mask: Ipv6Addr },
    Mac { data: MacAddress, mask: MacAddress },
    U8 { data: u8, mask: u8 },
    U16 { data: u16, mask: u16 },
    U32 { data: u32, mask: u32 },
    Ports { data: PortBitmap, mask: PortBitmap },
}

/// An action programmed on a hardware entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    /// Drop the packet.
    Drop,
    /// Cancel any drop decision.
    DropCancel,
    /// Copy to the CPU and continue forwarding.
    CopyToCpu,
    /// Copy to the CPU and drop.
    Trap,
    /// Redirect to a front-panel port.
    RedirectPort(u32),
    /// Redirect to a trunk.
    RedirectTrunk(u32),
    /// Mirror on ingress to the given session.
    MirrorIngress(u32),
    /// Mirror on egress to the given session.
    MirrorEgress(u32),
    /// Rewrite the DSCP field.
    SetDscp(u8),
    /// Select the egress queue.
    SetCosQueue(u8),
    /// Switch through an L3 egress object (MAC rewrite).
    L3Switch(EgressId),
}

/// Discriminant of [`FieldAction`], used to look up or remove an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldActionKind {
    Drop,
    DropCancel,
    CopyToCpu,
    Trap,
    RedirectPort,
    RedirectTrunk,
    MirrorIngress,
    MirrorEgress,
    SetDscp,
    SetCosQueue,
    L3Switch,
}

impl FieldAction {
    /// Returns the action's kind.
    pub fn kind(&self) -> FieldActionKind {
        match self {
            Self::Drop => FieldActionKind::Drop,
            Self::DropCancel => FieldActionKind::DropCancel,
            Self::CopyToCpu => FieldActionKind::CopyToCpu,
            Self::Trap => FieldActionKind::Trap,
            Self::RedirectPort(_) => FieldActionKind::RedirectPort,
            Self::RedirectTrunk(_) => FieldActionKind::RedirectTrunk,
            Self::MirrorIngress(_) => FieldActionKind::MirrorIngress,
            Self::MirrorEgress(_) => FieldActionKind::MirrorEgress,
            Self::SetDscp(_) => FieldActionKind::SetDscp,
            Self::SetCosQueue(_) => FieldActionKind::SetCosQueue,
            Self::L3Switch(_) => FieldActionKind::L3Switch,
        }
    }
}

/// Statistic collected by a hardware stat object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Packets,
    Bytes,
}

/// Resource usage of a priority group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStatus {
    pub entries_total: u32,
    pub entries_free: u32,
    pub counters_total: u32,
    pub counters_free: u32,
}

/// Ternary match-action hardware primitives.
///
/// Entries are created uninstalled. Qualifier and action changes on an
/// installed entry take effect only after [`MatchEngine::entry_reinstall`].
pub trait MatchEngine {
    fn group_create(&mut self, qset: QualifierSet, priority: i32) -> SaiResult<FieldGroupId>;
    fn group_destroy(&mut self, group: FieldGroupId) -> SaiResult<()>;
    fn group_get(&self, group: FieldGroupId) -> SaiResult<QualifierSet>;
    fn group_set(&mut self, group: FieldGroupId, qset: QualifierSet) -> SaiResult<()>;
    fn group_priority_set(&mut self, group: FieldGroupId, priority: i32) -> SaiResult<()>;
    fn group_status_get(&self, group: FieldGroupId) -> SaiResult<GroupStatus>;

    fn entry_create(&mut self, group: FieldGroupId) -> SaiResult<FieldEntryId>;
    /// Duplicates qualifiers, actions, priority and enable state into a new,
    /// uninstalled entry of the same group. Stat attachments are not copied.
    fn entry_copy(&mut self, src: FieldEntryId) -> SaiResult<FieldEntryId>;
    fn entry_destroy(&mut self, entry: FieldEntryId) -> SaiResult<()>;
    fn entry_install(&mut self, entry: FieldEntryId) -> SaiResult<()>;
    fn entry_reinstall(&mut self, entry: FieldEntryId) -> SaiResult<()>;
    fn entry_enable_get(&self, entry: FieldEntryId) -> SaiResult<bool>;
    fn entry_enable_set(&mut self, entry: FieldEntryId, enable: bool) -> SaiResult<()>;
    fn entry_prio_get(&self, entry: FieldEntryId) -> SaiResult<i32>;
    fn entry_prio_set(&mut self, entry: FieldEntryId, priority: i32) -> SaiResult<()>;

    fn qualify(
        &mut self,
        entry: FieldEntryId,
        qualifier: Qualifier,
        value: QualifierValue,
    ) -> SaiResult<()>;
    fn qualify_get(
        &self,
        entry: FieldEntryId,
        qualifier: Qualifier,
    ) -> SaiResult<Option<QualifierValue>>;
    fn qualify_clear(&mut self, entry: FieldEntryId, qualifier: Qualifier) -> SaiResult<()>;

    fn action_add(&mut self, entry: FieldEntryId, action: FieldAction) -> SaiResult<()>;
    fn action_remove(&mut self, entry: FieldEntryId, kind: FieldActionKind) -> SaiResult<()>;
    fn action_get(
        &self,
        entry: FieldEntryId,
        kind: FieldActionKind,
    ) -> SaiResult<Option<FieldAction>>;

    fn stat_create(&mut self, group: FieldGroupId, kinds: &[StatKind]) -> SaiResult<FieldStatId>;
    fn stat_destroy(&mut self, stat: FieldStatId) -> SaiResult<()>;
    fn stat_attach(&mut self, entry: FieldEntryId, stat: FieldStatId) -> SaiResult<()>;
    fn stat_detach(&mut self, entry: FieldEntryId, stat: FieldStatId) -> SaiResult<()>;
    fn stat_get(&self, stat: FieldStatId, kind: StatKind) -> SaiResult<u64>;

    fn l3_intf_create(&mut self, mac: MacAddress) -> SaiResult<L3IntfId>;
    fn l3_intf_destroy(&mut self, intf: L3IntfId) -> SaiResult<()>;
    fn l3_egress_create(&mut self, intf: L3IntfId, dst_mac: MacAddress) -> SaiResult<EgressId>;
    fn l3_egress_destroy(&mut self, egress: EgressId) -> SaiResult<()>;
}
