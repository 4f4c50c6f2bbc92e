//! ACL entry match conditions and actions.
//!
//! An entry's user-facing content: the values it matches on and the actions
//! it takes. Each condition and action is checked against its field or
//! action type and converted into field-processor terms when programmed.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use sonic_sai::api::{FieldAction, PortBitmap, QualifierValue};
use sonic_sai::{LagOid, MacAddress, PortOid, SaiError, SaiResult};

use super::types::{AclActionType, AclMatchField, AclPacketAction};

/// Match value for an ACL entry field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclMatchValue {
    /// IPv4 address with optional mask.
    Ipv4 {
        addr: Ipv4Addr,
        mask: Option<Ipv4Addr>,
    },
    /// IPv6 address with optional mask.
    Ipv6 {
        addr: Ipv6Addr,
        mask: Option<Ipv6Addr>,
    },
    /// MAC address with optional mask.
    Mac {
        addr: MacAddress,
        mask: Option<MacAddress>,
    },
    /// 8-bit value (protocol, DSCP, TTL, TCP flags).
    U8 { value: u8, mask: Option<u8> },
    /// 16-bit value (ether type, L4 port, VLAN id).
    U16 { value: u16, mask: Option<u16> },
    /// Single port.
    Port(PortOid),
    /// List of ports (for IN_PORTS).
    PortList(Vec<PortOid>),
}

impl AclMatchValue {
    /// Returns true if this value has the shape `field` expects.
    pub fn fits(&self, field: AclMatchField) -> bool {
        use AclMatchField as F;
        matches!(
            (field, self),
            (F::SrcIp | F::DstIp, Self::Ipv4 { .. })
                | (F::SrcIpv6 | F::DstIpv6, Self::Ipv6 { .. })
                | (F::SrcMac | F::DstMac, Self::Mac { .. })
                | (
                    F::IpProtocol | F::Dscp | F::Ttl | F::TcpFlags,
                    Self::U8 { .. }
                )
                | (
                    F::EtherType | F::L4SrcPort | F::L4DstPort | F::OuterVlanId,
                    Self::U16 { .. }
                )
                | (F::InPort | F::OutPort, Self::Port(_))
                | (F::InPorts, Self::PortList(_))
        )
    }

    /// Ports named by a port or port-list value.
    pub fn port_bitmap(&self) -> PortBitmap {
        match self {
            Self::Port(port) => [port.index()].into_iter().collect(),
            Self::PortList(ports) => ports.iter().map(|p| p.index()).collect(),
            _ => PortBitmap::new(),
        }
    }

    /// Converts to a qualifier value. Missing masks mean exact match.
    pub fn qualifier_value(&self) -> QualifierValue {
        match self {
            Self::Ipv4 { addr, mask } => QualifierValue::Ipv4 {
                data: *addr,
                mask: mask.unwrap_or(Ipv4Addr::BROADCAST),
            },
            Self::Ipv6 { addr, mask } => QualifierValue::Ipv6 {
                data: *addr,
                mask: mask.unwrap_or(Ipv6Addr::from(u128::MAX)),
            },
            Self::Mac { addr, mask } => QualifierValue::Mac {
                data: *addr,
                mask: mask.unwrap_or(MacAddress::EXACT_MASK),
            },
            Self::U8 { value, mask } => QualifierValue::U8 {
                data: *value,
                mask: mask.unwrap_or(u8::MAX),
            },
            Self::U16 { value, mask } => QualifierValue::U16 {
                data: *value,
                mask: mask.unwrap_or(u16::MAX),
            },
            Self::Port(port) => QualifierValue::U32 {
                data: port.index(),
                mask: u32::MAX,
            },
            Self::PortList(_) => {
                let ports = self.port_bitmap();
                QualifierValue::Ports {
                    data: ports,
                    mask: ports,
                }
            }
        }
    }
}

impl fmt::Display for AclMatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn masked<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            value: T,
            mask: Option<T>,
        ) -> fmt::Result {
            match mask {
                Some(m) => write!(f, "{}/{}", value, m),
                None => write!(f, "{}", value),
            }
        }
        match self {
            Self::Ipv4 { addr, mask } => masked(f, addr, mask.as_ref()),
            Self::Ipv6 { addr, mask } => masked(f, addr, mask.as_ref()),
            Self::Mac { addr, mask } => masked(f, addr, mask.as_ref()),
            Self::U8 { value, mask } => masked(f, value, mask.as_ref()),
            Self::U16 { value, mask } => masked(f, value, mask.as_ref()),
            Self::Port(port) => write!(f, "{}", port.index()),
            Self::PortList(ports) => {
                let list: Vec<String> = ports.iter().map(|p| p.index().to_string()).collect();
                write!(f, "{}", list.join(","))
            }
        }
    }
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("Invalid 8-bit value: {}", s))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("Invalid 16-bit value: {}", s))
}

fn parse_port(s: &str) -> Result<PortOid, String> {
    s.trim()
        .parse::<u32>()
        .map(|index| PortOid::new(0, 0, index))
        .map_err(|_| format!("Invalid port: {}", s))
}

/// A match condition in an ACL entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntryMatch {
    /// Match field type.
    pub field: AclMatchField,
    /// Match value.
    pub value: AclMatchValue,
}

impl AclEntryMatch {
    /// Creates a new match condition.
    pub fn new(field: AclMatchField, value: AclMatchValue) -> Self {
        Self { field, value }
    }

    /// Creates an IPv4 source IP match.
    pub fn src_ip(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> Self {
        Self::new(AclMatchField::SrcIp, AclMatchValue::Ipv4 { addr, mask })
    }

    /// Creates an IPv4 destination IP match.
    pub fn dst_ip(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> Self {
        Self::new(AclMatchField::DstIp, AclMatchValue::Ipv4 { addr, mask })
    }

    /// Creates an IPv6 source IP match.
    pub fn src_ipv6(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> Self {
        Self::new(AclMatchField::SrcIpv6, AclMatchValue::Ipv6 { addr, mask })
    }

    /// Creates a destination MAC match.
    pub fn dst_mac(addr: MacAddress, mask: Option<MacAddress>) -> Self {
        Self::new(AclMatchField::DstMac, AclMatchValue::Mac { addr, mask })
    }

    /// Creates an IP protocol match.
    pub fn ip_protocol(protocol: u8) -> Self {
        Self::new(
            AclMatchField::IpProtocol,
            AclMatchValue::U8 {
                value: protocol,
                mask: None,
            },
        )
    }

    /// Creates a DSCP match.
    pub fn dscp(value: u8) -> Self {
        Self::new(AclMatchField::Dscp, AclMatchValue::U8 { value, mask: None })
    }

    /// Creates an L4 destination port match.
    pub fn l4_dst_port(port: u16) -> Self {
        Self::new(
            AclMatchField::L4DstPort,
            AclMatchValue::U16 {
                value: port,
                mask: None,
            },
        )
    }

    /// Creates an ether type match.
    pub fn ether_type(etype: u16) -> Self {
        Self::new(
            AclMatchField::EtherType,
            AclMatchValue::U16 {
                value: etype,
                mask: None,
            },
        )
    }

    /// Creates a TCP flags match.
    pub fn tcp_flags(flags: u8, mask: u8) -> Self {
        Self::new(
            AclMatchField::TcpFlags,
            AclMatchValue::U8 {
                value: flags,
                mask: Some(mask),
            },
        )
    }

    /// Creates an IN_PORTS match.
    pub fn in_ports(ports: Vec<PortOid>) -> Self {
        Self::new(AclMatchField::InPorts, AclMatchValue::PortList(ports))
    }

    /// Parses a `value[/mask]` string for the given field.
    ///
    /// Port lists are comma separated port numbers.
    pub fn parse(field: AclMatchField, s: &str) -> Result<Self, String> {
        let (value, mask) = match s.split_once('/') {
            Some((v, m)) => (v.trim(), Some(m.trim())),
            None => (s.trim(), None),
        };
        use AclMatchField as F;
        let value = match field {
            F::SrcIp | F::DstIp => AclMatchValue::Ipv4 {
                addr: value
                    .parse()
                    .map_err(|_| format!("Invalid IPv4 address: {}", value))?,
                mask: mask
                    .map(|m| m.parse().map_err(|_| format!("Invalid IPv4 mask: {}", m)))
                    .transpose()?,
            },
            F::SrcIpv6 | F::DstIpv6 => AclMatchValue::Ipv6 {
                addr: value
                    .parse()
                    .map_err(|_| format!("Invalid IPv6 address: {}", value))?,
                mask: mask
                    .map(|m| m.parse().map_err(|_| format!("Invalid IPv6 mask: {}", m)))
                    .transpose()?,
            },
            F::SrcMac | F::DstMac => AclMatchValue::Mac {
                addr: value.parse()?,
                mask: mask.map(str::parse::<MacAddress>).transpose()?,
            },
            F::IpProtocol | F::Dscp | F::Ttl | F::TcpFlags => AclMatchValue::U8 {
                value: parse_u8(value)?,
                mask: mask.map(parse_u8).transpose()?,
            },
            F::EtherType | F::L4SrcPort | F::L4DstPort | F::OuterVlanId => AclMatchValue::U16 {
                value: parse_u16(value)?,
                mask: mask.map(parse_u16).transpose()?,
            },
            F::InPort | F::OutPort => AclMatchValue::Port(parse_port(value)?),
            F::InPorts => AclMatchValue::PortList(
                value
                    .split(',')
                    .filter(|p| !p.trim().is_empty())
                    .map(parse_port)
                    .collect::<Result<_, _>>()?,
            ),
            F::OutPorts => return Err(format!("Match field {} is not supported", field)),
        };
        Ok(Self::new(field, value))
    }

    /// Checks that the value has the shape the field expects.
    pub fn validate(&self) -> SaiResult<()> {
        if self.field.qualifier().is_none() {
            return Err(SaiError::not_supported(format!("ACL field {}", self.field)));
        }
        if !self.value.fits(self.field) {
            return Err(SaiError::invalid_value(
                format!("ACL field {}", self.field),
                format!("value {} has the wrong type", self.value),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AclEntryMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Action value for an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclActionValue {
    /// Packet action (forward, drop, etc.).
    PacketAction(AclPacketAction),
    /// Redirect to a port.
    RedirectPort(PortOid),
    /// Redirect to a LAG.
    RedirectLag(LagOid),
    /// Mirror session id.
    Mirror(u32),
    /// DSCP or traffic class value to set.
    U8(u8),
    /// MAC address to set.
    Mac(MacAddress),
}

impl fmt::Display for AclActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketAction(action) => write!(f, "{}", action),
            Self::RedirectPort(port) => write!(f, "PORT:{}", port.index()),
            Self::RedirectLag(lag) => write!(f, "LAG:{}", lag.index()),
            Self::Mirror(session) => write!(f, "MIRROR:{}", session),
            Self::U8(v) => write!(f, "{}", v),
            Self::Mac(mac) => write!(f, "{}", mac),
        }
    }
}

/// An action in an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntryAction {
    /// Action type.
    pub action_type: AclActionType,
    /// Action value.
    pub value: AclActionValue,
}

impl AclEntryAction {
    /// Creates a new action.
    pub fn new(action_type: AclActionType, value: AclActionValue) -> Self {
        Self { action_type, value }
    }

    /// Creates a packet action (forward/drop/etc).
    pub fn packet_action(action: AclPacketAction) -> Self {
        Self::new(
            AclActionType::PacketAction,
            AclActionValue::PacketAction(action),
        )
    }

    /// Creates a drop action.
    pub fn drop() -> Self {
        Self::packet_action(AclPacketAction::Drop)
    }

    /// Creates a forward action.
    pub fn forward() -> Self {
        Self::packet_action(AclPacketAction::Forward)
    }

    /// Creates a redirect-to-port action.
    pub fn redirect_port(port: PortOid) -> Self {
        Self::new(AclActionType::Redirect, AclActionValue::RedirectPort(port))
    }

    /// Creates a redirect-to-LAG action.
    pub fn redirect_lag(lag: LagOid) -> Self {
        Self::new(AclActionType::Redirect, AclActionValue::RedirectLag(lag))
    }

    /// Creates an ingress mirror action.
    pub fn mirror_ingress(session: u32) -> Self {
        Self::new(AclActionType::MirrorIngress, AclActionValue::Mirror(session))
    }

    /// Creates an egress mirror action.
    pub fn mirror_egress(session: u32) -> Self {
        Self::new(AclActionType::MirrorEgress, AclActionValue::Mirror(session))
    }

    /// Creates a set DSCP action.
    pub fn set_dscp(dscp: u8) -> Self {
        Self::new(AclActionType::SetDscp, AclActionValue::U8(dscp))
    }

    /// Creates a set traffic class action.
    pub fn set_tc(tc: u8) -> Self {
        Self::new(AclActionType::SetTc, AclActionValue::U8(tc))
    }

    /// Creates a source MAC rewrite action.
    pub fn set_src_mac(mac: MacAddress) -> Self {
        Self::new(AclActionType::SetSrcMac, AclActionValue::Mac(mac))
    }

    /// Creates a destination MAC rewrite action.
    pub fn set_dst_mac(mac: MacAddress) -> Self {
        Self::new(AclActionType::SetDstMac, AclActionValue::Mac(mac))
    }

    /// Parses an action value for the given action type.
    ///
    /// Redirect targets are written `PORT:<n>` or `LAG:<n>`.
    pub fn parse(action_type: AclActionType, s: &str) -> Result<Self, String> {
        let s = s.trim();
        let value = match action_type {
            AclActionType::PacketAction => AclActionValue::PacketAction(s.parse()?),
            AclActionType::Redirect => {
                let (kind, index) = s
                    .split_once(':')
                    .ok_or_else(|| format!("Invalid redirect target: {}", s))?;
                let index: u32 = index
                    .parse()
                    .map_err(|_| format!("Invalid redirect target: {}", s))?;
                match kind.to_uppercase().as_str() {
                    "PORT" => AclActionValue::RedirectPort(PortOid::new(0, 0, index)),
                    "LAG" => AclActionValue::RedirectLag(LagOid::new(0, 0, index)),
                    _ => return Err(format!("Invalid redirect target: {}", s)),
                }
            }
            AclActionType::MirrorIngress | AclActionType::MirrorEgress => AclActionValue::Mirror(
                s.parse()
                    .map_err(|_| format!("Invalid mirror session: {}", s))?,
            ),
            AclActionType::SetDscp | AclActionType::SetTc => AclActionValue::U8(parse_u8(s)?),
            AclActionType::SetSrcMac | AclActionType::SetDstMac => {
                AclActionValue::Mac(s.parse()?)
            }
        };
        Ok(Self::new(action_type, value))
    }

    /// Checks that the value has the shape the action type expects.
    pub fn validate(&self) -> SaiResult<()> {
        use AclActionType as A;
        let ok = match (self.action_type, self.value) {
            (A::PacketAction, AclActionValue::PacketAction(_)) => true,
            (A::Redirect, AclActionValue::RedirectPort(_) | AclActionValue::RedirectLag(_)) => {
                true
            }
            (A::MirrorIngress | A::MirrorEgress, AclActionValue::Mirror(_)) => true,
            (A::SetDscp, AclActionValue::U8(v)) => v < 64,
            (A::SetTc, AclActionValue::U8(_)) => true,
            (A::SetSrcMac | A::SetDstMac, AclActionValue::Mac(_)) => true,
            _ => false,
        };
        if !ok {
            return Err(SaiError::invalid_value(
                format!("ACL action {}", self.action_type),
                format!("invalid value {}", self.value),
            ));
        }
        Ok(())
    }

    /// Converts to a field action. MAC rewrites return `None`; they are
    /// programmed through an L3 egress object instead.
    pub fn field_action(&self) -> Option<FieldAction> {
        let action = match self.value {
            AclActionValue::PacketAction(action) => match action {
                AclPacketAction::Forward => FieldAction::DropCancel,
                AclPacketAction::Drop | AclPacketAction::Deny => FieldAction::Drop,
                AclPacketAction::Copy | AclPacketAction::Log => FieldAction::CopyToCpu,
                AclPacketAction::Trap => FieldAction::Trap,
            },
            AclActionValue::RedirectPort(port) => FieldAction::RedirectPort(port.index()),
            AclActionValue::RedirectLag(lag) => FieldAction::RedirectTrunk(lag.index()),
            AclActionValue::Mirror(session) => match self.action_type {
                AclActionType::MirrorEgress => FieldAction::MirrorEgress(session),
                _ => FieldAction::MirrorIngress(session),
            },
            AclActionValue::U8(v) => match self.action_type {
                AclActionType::SetTc => FieldAction::SetCosQueue(v),
                _ => FieldAction::SetDscp(v),
            },
            AclActionValue::Mac(_) => return None,
        };
        Some(action)
    }
}

impl fmt::Display for AclEntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.action_type, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_sai::SaiStatus;

    #[test]
    fn test_parse_ipv4_match() {
        let m = AclEntryMatch::parse(AclMatchField::SrcIp, "10.0.0.1/255.255.255.0").unwrap();
        assert_eq!(
            m.value,
            AclMatchValue::Ipv4 {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                mask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            }
        );
        assert_eq!(m.to_string(), "SRC_IP=10.0.0.1/255.255.255.0");
        assert!(AclEntryMatch::parse(AclMatchField::SrcIp, "10.0.0").is_err());
    }

    #[test]
    fn test_parse_numeric_matches() {
        let m = AclEntryMatch::parse(AclMatchField::EtherType, "0x0800").unwrap();
        assert_eq!(
            m.value,
            AclMatchValue::U16 {
                value: 0x0800,
                mask: None
            }
        );
        let m = AclEntryMatch::parse(AclMatchField::TcpFlags, "0x12/0x3f").unwrap();
        assert_eq!(m, AclEntryMatch::tcp_flags(0x12, 0x3f));
        assert!(AclEntryMatch::parse(AclMatchField::Dscp, "300").is_err());
    }

    #[test]
    fn test_parse_port_list() {
        let m = AclEntryMatch::parse(AclMatchField::InPorts, "1, 4,7").unwrap();
        let ports = m.value.port_bitmap();
        assert_eq!(ports.ports().collect::<Vec<_>>(), vec![1, 4, 7]);
        assert!(AclEntryMatch::parse(AclMatchField::OutPorts, "1").is_err());
    }

    #[test]
    fn test_validate_match_shape() {
        AclEntryMatch::ip_protocol(6).validate().unwrap();
        let wrong = AclEntryMatch::new(
            AclMatchField::SrcIp,
            AclMatchValue::U8 {
                value: 1,
                mask: None,
            },
        );
        assert_eq!(
            wrong.validate().unwrap_err().status(),
            SaiStatus::InvalidAttributeValue
        );
        let unsupported =
            AclEntryMatch::new(AclMatchField::OutPorts, AclMatchValue::PortList(vec![]));
        assert_eq!(
            unsupported.validate().unwrap_err().status(),
            SaiStatus::AttrNotSupported
        );
    }

    #[test]
    fn test_exact_mask_default() {
        let m = AclEntryMatch::dscp(10);
        assert_eq!(
            m.value.qualifier_value(),
            QualifierValue::U8 {
                data: 10,
                mask: 0xff
            }
        );
    }

    #[test]
    fn test_parse_actions() {
        let a = AclEntryAction::parse(AclActionType::PacketAction, "drop").unwrap();
        assert_eq!(a, AclEntryAction::drop());
        assert_eq!(a.field_action(), Some(FieldAction::Drop));

        let a = AclEntryAction::parse(AclActionType::Redirect, "LAG:3").unwrap();
        assert_eq!(a.field_action(), Some(FieldAction::RedirectTrunk(3)));
        assert!(AclEntryAction::parse(AclActionType::Redirect, "VLAN:3").is_err());

        let a = AclEntryAction::parse(AclActionType::SetSrcMac, "00:11:22:33:44:55").unwrap();
        assert_eq!(a.field_action(), None);
    }

    #[test]
    fn test_validate_action() {
        AclEntryAction::set_dscp(46).validate().unwrap();
        assert!(AclEntryAction::set_dscp(64).validate().is_err());
        let wrong = AclEntryAction::new(AclActionType::SetTc, AclActionValue::Mirror(1));
        assert!(wrong.validate().is_err());
        assert_eq!(
            AclEntryAction::forward().field_action(),
            Some(FieldAction::DropCancel)
        );
    }
}
