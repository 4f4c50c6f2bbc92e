//! ACL types and enums.
//!
//! Stages, bind point types, match fields and actions as they appear on the
//! SAI ACL API, plus their mapping onto field-processor qualifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sonic_sai::api::Qualifier;

/// Priority of an ACL entry or group member.
pub type AclPriority = i32;

/// Highest VLAN id a VLAN bind point may carry.
pub const VLAN_ID_MAX: u32 = 4094;

/// Mask applied to outer VLAN id qualifiers.
pub const VLAN_ID_MASK: u16 = 0xfff;

/// ACL stage (ingress or egress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclStage {
    /// Ingress ACL (applied to incoming packets).
    #[default]
    Ingress,
    /// Egress ACL (applied to outgoing packets).
    Egress,
}

impl AclStage {
    /// Qualifier that pins a field group to this stage.
    pub fn qualifier(self) -> Qualifier {
        match self {
            Self::Ingress => Qualifier::StageIngress,
            Self::Egress => Qualifier::StageEgress,
        }
    }
}

impl fmt::Display for AclStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "INGRESS"),
            Self::Egress => write!(f, "EGRESS"),
        }
    }
}

impl FromStr for AclStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INGRESS" => Ok(Self::Ingress),
            "EGRESS" => Ok(Self::Egress),
            _ => Err(format!("Unknown ACL stage: {}", s)),
        }
    }
}

/// ACL bind point type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclBindPointType {
    /// Bind to physical port.
    Port,
    /// Bind to LAG.
    Lag,
    /// Bind to VLAN.
    Vlan,
    /// Bind to router interface.
    RouterInterface,
    /// Bind to switch (global).
    Switch,
}

impl AclBindPointType {
    pub const ALL: [AclBindPointType; 5] = [
        Self::Port,
        Self::Lag,
        Self::Vlan,
        Self::RouterInterface,
        Self::Switch,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for AclBindPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port => write!(f, "PORT"),
            Self::Lag => write!(f, "LAG"),
            Self::Vlan => write!(f, "VLAN"),
            Self::RouterInterface => write!(f, "ROUTER_INTERFACE"),
            Self::Switch => write!(f, "SWITCH"),
        }
    }
}

impl FromStr for AclBindPointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PORT" => Ok(Self::Port),
            "LAG" => Ok(Self::Lag),
            "VLAN" => Ok(Self::Vlan),
            "ROUTER_INTERFACE" | "RIF" => Ok(Self::RouterInterface),
            "SWITCH" => Ok(Self::Switch),
            _ => Err(format!("Unknown ACL bind point type: {}", s)),
        }
    }
}

/// Set of bind point types an entry diverges on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindMask(u8);

impl BindMask {
    pub const fn empty() -> Self {
        BindMask(0)
    }

    pub fn single(bind_type: AclBindPointType) -> Self {
        BindMask(bind_type.bit())
    }

    pub fn insert(&mut self, bind_type: AclBindPointType) {
        self.0 |= bind_type.bit();
    }

    pub fn remove(&mut self, bind_type: AclBindPointType) {
        self.0 &= !bind_type.bit();
    }

    pub fn contains(&self, bind_type: AclBindPointType) -> bool {
        self.0 & bind_type.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = AclBindPointType> + '_ {
        AclBindPointType::ALL
            .into_iter()
            .filter(move |t| self.contains(*t))
    }
}

impl fmt::Debug for BindMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for BindMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// A forwarding entity an ACL table or group is bound to.
///
/// Unique by (type, value). The switch bind point always carries value 0.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BindPoint {
    pub bind_type: AclBindPointType,
    pub value: u32,
}

impl BindPoint {
    pub fn new(bind_type: AclBindPointType, value: u32) -> Self {
        let value = match bind_type {
            AclBindPointType::Switch => 0,
            _ => value,
        };
        Self { bind_type, value }
    }

    pub fn port(port: u32) -> Self {
        Self::new(AclBindPointType::Port, port)
    }

    pub fn lag(lag: u32) -> Self {
        Self::new(AclBindPointType::Lag, lag)
    }

    pub fn vlan(vlan: u32) -> Self {
        Self::new(AclBindPointType::Vlan, vlan)
    }

    pub fn switch() -> Self {
        Self::new(AclBindPointType::Switch, 0)
    }
}

impl fmt::Display for BindPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bind_type, self.value)
    }
}

/// Table group lookup type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclTableGroupType {
    /// Tables are looked up in priority order; the first hit wins.
    #[default]
    Sequential,
    /// Tables are looked up in parallel; every hit applies.
    Parallel,
}

impl fmt::Display for AclTableGroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "SEQUENTIAL"),
            Self::Parallel => write!(f, "PARALLEL"),
        }
    }
}

impl FromStr for AclTableGroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SEQUENTIAL" => Ok(Self::Sequential),
            "PARALLEL" => Ok(Self::Parallel),
            _ => Err(format!("Unknown ACL table group type: {}", s)),
        }
    }
}

/// ACL match field types.
///
/// These correspond to SAI ACL table match field attributes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclMatchField {
    // IPv4 fields
    SrcIp,
    DstIp,
    EtherType,
    IpProtocol,
    Dscp,
    Ttl,
    TcpFlags,

    // IPv6 fields
    SrcIpv6,
    DstIpv6,

    // L4 fields
    L4SrcPort,
    L4DstPort,

    // L2 fields
    SrcMac,
    DstMac,
    OuterVlanId,

    // Port fields
    InPort,
    InPorts,
    OutPort,
    OutPorts,
}

impl AclMatchField {
    /// Returns the qualifier implementing this field, or `None` if the
    /// hardware cannot express it.
    pub fn qualifier(self) -> Option<Qualifier> {
        let q = match self {
            Self::SrcIp => Qualifier::SrcIp,
            Self::DstIp => Qualifier::DstIp,
            Self::EtherType => Qualifier::EtherType,
            Self::IpProtocol => Qualifier::IpProtocol,
            Self::Dscp => Qualifier::Dscp,
            Self::Ttl => Qualifier::Ttl,
            Self::TcpFlags => Qualifier::TcpControl,
            Self::SrcIpv6 => Qualifier::SrcIp6,
            Self::DstIpv6 => Qualifier::DstIp6,
            Self::L4SrcPort => Qualifier::L4SrcPort,
            Self::L4DstPort => Qualifier::L4DstPort,
            Self::SrcMac => Qualifier::SrcMac,
            Self::DstMac => Qualifier::DstMac,
            Self::OuterVlanId => Qualifier::OuterVlanId,
            Self::InPort => Qualifier::InPort,
            Self::InPorts => Qualifier::InPorts,
            Self::OutPort => Qualifier::OutPort,
            Self::OutPorts => return None,
        };
        Some(q)
    }
}

impl fmt::Display for AclMatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SrcIp => write!(f, "SRC_IP"),
            Self::DstIp => write!(f, "DST_IP"),
            Self::EtherType => write!(f, "ETHER_TYPE"),
            Self::IpProtocol => write!(f, "IP_PROTOCOL"),
            Self::Dscp => write!(f, "DSCP"),
            Self::Ttl => write!(f, "TTL"),
            Self::TcpFlags => write!(f, "TCP_FLAGS"),
            Self::SrcIpv6 => write!(f, "SRC_IPV6"),
            Self::DstIpv6 => write!(f, "DST_IPV6"),
            Self::L4SrcPort => write!(f, "L4_SRC_PORT"),
            Self::L4DstPort => write!(f, "L4_DST_PORT"),
            Self::SrcMac => write!(f, "SRC_MAC"),
            Self::DstMac => write!(f, "DST_MAC"),
            Self::OuterVlanId => write!(f, "OUTER_VLAN_ID"),
            Self::InPort => write!(f, "IN_PORT"),
            Self::InPorts => write!(f, "IN_PORTS"),
            Self::OutPort => write!(f, "OUT_PORT"),
            Self::OutPorts => write!(f, "OUT_PORTS"),
        }
    }
}

impl FromStr for AclMatchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SRC_IP" => Ok(Self::SrcIp),
            "DST_IP" => Ok(Self::DstIp),
            "ETHER_TYPE" => Ok(Self::EtherType),
            "IP_PROTOCOL" => Ok(Self::IpProtocol),
            "DSCP" => Ok(Self::Dscp),
            "TTL" => Ok(Self::Ttl),
            "TCP_FLAGS" => Ok(Self::TcpFlags),
            "SRC_IPV6" => Ok(Self::SrcIpv6),
            "DST_IPV6" => Ok(Self::DstIpv6),
            "L4_SRC_PORT" => Ok(Self::L4SrcPort),
            "L4_DST_PORT" => Ok(Self::L4DstPort),
            "SRC_MAC" => Ok(Self::SrcMac),
            "DST_MAC" => Ok(Self::DstMac),
            "OUTER_VLAN_ID" => Ok(Self::OuterVlanId),
            "IN_PORT" => Ok(Self::InPort),
            "IN_PORTS" => Ok(Self::InPorts),
            "OUT_PORT" => Ok(Self::OutPort),
            "OUT_PORTS" => Ok(Self::OutPorts),
            _ => Err(format!("Unknown ACL match field: {}", s)),
        }
    }
}

/// ACL action types.
///
/// These correspond to SAI ACL entry action attributes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclActionType {
    /// Packet action (forward, drop, copy).
    PacketAction,
    /// Redirect to a port or LAG.
    Redirect,
    /// Mirror ingress.
    MirrorIngress,
    /// Mirror egress.
    MirrorEgress,
    /// Set DSCP value.
    SetDscp,
    /// Set traffic class.
    SetTc,
    /// Rewrite source MAC.
    SetSrcMac,
    /// Rewrite destination MAC.
    SetDstMac,
}

impl AclActionType {
    /// Returns true for the actions served by an L3 egress object.
    pub fn is_mac_rewrite(self) -> bool {
        matches!(self, Self::SetSrcMac | Self::SetDstMac)
    }
}

impl fmt::Display for AclActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketAction => write!(f, "PACKET_ACTION"),
            Self::Redirect => write!(f, "REDIRECT_ACTION"),
            Self::MirrorIngress => write!(f, "MIRROR_INGRESS_ACTION"),
            Self::MirrorEgress => write!(f, "MIRROR_EGRESS_ACTION"),
            Self::SetDscp => write!(f, "SET_DSCP"),
            Self::SetTc => write!(f, "SET_TC"),
            Self::SetSrcMac => write!(f, "SET_SRC_MAC"),
            Self::SetDstMac => write!(f, "SET_DST_MAC"),
        }
    }
}

impl FromStr for AclActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PACKET_ACTION" => Ok(Self::PacketAction),
            "REDIRECT_ACTION" | "REDIRECT" => Ok(Self::Redirect),
            "MIRROR_INGRESS_ACTION" => Ok(Self::MirrorIngress),
            "MIRROR_EGRESS_ACTION" => Ok(Self::MirrorEgress),
            "SET_DSCP" => Ok(Self::SetDscp),
            "SET_TC" => Ok(Self::SetTc),
            "SET_SRC_MAC" => Ok(Self::SetSrcMac),
            "SET_DST_MAC" => Ok(Self::SetDstMac),
            _ => Err(format!("Unknown ACL action type: {}", s)),
        }
    }
}

/// ACL packet action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclPacketAction {
    /// Forward the packet.
    #[default]
    Forward,
    /// Drop the packet.
    Drop,
    /// Copy the packet to CPU.
    Copy,
    /// Trap (copy to CPU and drop).
    Trap,
    /// Log (copy to CPU and forward).
    Log,
    /// Deny (drop without logging).
    Deny,
}

impl fmt::Display for AclPacketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "FORWARD"),
            Self::Drop => write!(f, "DROP"),
            Self::Copy => write!(f, "COPY"),
            Self::Trap => write!(f, "TRAP"),
            Self::Log => write!(f, "LOG"),
            Self::Deny => write!(f, "DENY"),
        }
    }
}

impl FromStr for AclPacketAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FORWARD" => Ok(Self::Forward),
            "DROP" => Ok(Self::Drop),
            "COPY" => Ok(Self::Copy),
            "TRAP" => Ok(Self::Trap),
            "LOG" => Ok(Self::Log),
            "DENY" => Ok(Self::Deny),
            _ => Err(format!("Unknown packet action: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acl_stage_parse() {
        assert_eq!("INGRESS".parse::<AclStage>().unwrap(), AclStage::Ingress);
        assert_eq!("egress".parse::<AclStage>().unwrap(), AclStage::Egress);
        assert!("INVALID".parse::<AclStage>().is_err());
        assert_eq!(AclStage::Egress.to_string(), "EGRESS");
    }

    #[test]
    fn test_acl_bind_point_parse() {
        assert_eq!(
            "PORT".parse::<AclBindPointType>().unwrap(),
            AclBindPointType::Port
        );
        assert_eq!(
            "RIF".parse::<AclBindPointType>().unwrap(),
            AclBindPointType::RouterInterface
        );
        assert!("BRIDGE".parse::<AclBindPointType>().is_err());
    }

    #[test]
    fn test_bind_mask() {
        let mut mask = BindMask::single(AclBindPointType::Port);
        assert!(mask.contains(AclBindPointType::Port));
        assert!(!mask.contains(AclBindPointType::Vlan));
        mask.insert(AclBindPointType::Vlan);
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![AclBindPointType::Port, AclBindPointType::Vlan]
        );
        mask.remove(AclBindPointType::Port);
        mask.remove(AclBindPointType::Vlan);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_switch_bind_point_value_ignored() {
        assert_eq!(
            BindPoint::new(AclBindPointType::Switch, 77),
            BindPoint::switch()
        );
        assert_eq!(BindPoint::port(3).to_string(), "PORT:3");
    }

    #[test]
    fn test_match_field_qualifier() {
        assert_eq!(AclMatchField::SrcIp.qualifier(), Some(Qualifier::SrcIp));
        assert_eq!(
            AclMatchField::TcpFlags.qualifier(),
            Some(Qualifier::TcpControl)
        );
        assert_eq!(AclMatchField::OutPorts.qualifier(), None);
    }

    #[test]
    fn test_acl_match_field_parse() {
        assert_eq!(
            "SRC_IP".parse::<AclMatchField>().unwrap(),
            AclMatchField::SrcIp
        );
        assert_eq!(
            "DST_IPV6".parse::<AclMatchField>().unwrap(),
            AclMatchField::DstIpv6
        );
        assert!("TUNNEL_VNI".parse::<AclMatchField>().is_err());
    }

    #[test]
    fn test_acl_action_type_parse() {
        assert_eq!(
            "REDIRECT_ACTION".parse::<AclActionType>().unwrap(),
            AclActionType::Redirect
        );
        assert!("SET_SRC_MAC"
            .parse::<AclActionType>()
            .unwrap()
            .is_mac_rewrite());
        assert!(!AclActionType::SetDscp.is_mac_rewrite());
    }

    #[test]
    fn test_acl_packet_action_parse() {
        assert_eq!(
            "TRAP".parse::<AclPacketAction>().unwrap(),
            AclPacketAction::Trap
        );
        assert_eq!(AclPacketAction::default(), AclPacketAction::Forward);
    }

    #[test]
    fn test_serde_names() {
        let stage: AclStage = serde_json::from_str("\"EGRESS\"").unwrap();
        assert_eq!(stage, AclStage::Egress);
        let field: AclMatchField = serde_json::from_str("\"L4_DST_PORT\"").unwrap();
        assert_eq!(field, AclMatchField::L4DstPort);
        let mask = BindMask::single(AclBindPointType::Lag);
        assert_eq!(serde_json::to_string(&mask).unwrap(), "[\"LAG\"]");
    }
}
