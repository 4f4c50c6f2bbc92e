//! Type-safe SAI object ID wrappers and handle encoding.
//!
//! Every object identifier that crosses the driver API is a 64-bit handle
//! packing four fields:
//!
//! ```text
//!  63        56 55      48 47                32 31                     0
//! +------------+----------+--------------------+------------------------+
//! |  type tag  | sub-type |     map index      |     primary index      |
//! +------------+----------+--------------------+------------------------+
//! ```
//!
//! The map index names an owning object where one exists (the table of an
//! entry, the group of a group member). [`SaiObjectId`] adds a phantom kind
//! so a table handle can never be passed where an entry handle is expected,
//! and [`SaiObjectId::try_from_raw`] rejects raw handles whose tag does not
//! match with `InvalidObjectType`.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{SaiError, SaiResult};

/// Raw SAI object ID type (matches sai_object_id_t in C).
pub type RawSaiObjectId = u64;

/// SAI object type tags used by this crate.
///
/// Values follow `sai_object_type_t`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiObjectType {
    Null = 0,
    Port = 1,
    Lag = 2,
    VirtualRouter = 3,
    RouterInterface = 6,
    AclTable = 7,
    AclEntry = 8,
    AclCounter = 9,
    AclTableGroup = 11,
    AclTableGroupMember = 12,
    Switch = 33,
    Vlan = 38,
}

impl SaiObjectType {
    /// Decodes a type tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let ty = match tag {
            0 => Self::Null,
            1 => Self::Port,
            2 => Self::Lag,
            3 => Self::VirtualRouter,
            6 => Self::RouterInterface,
            7 => Self::AclTable,
            8 => Self::AclEntry,
            9 => Self::AclCounter,
            11 => Self::AclTableGroup,
            12 => Self::AclTableGroupMember,
            33 => Self::Switch,
            38 => Self::Vlan,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns the tag value.
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SaiObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "SAI_OBJECT_TYPE_NULL",
            Self::Port => "SAI_OBJECT_TYPE_PORT",
            Self::Lag => "SAI_OBJECT_TYPE_LAG",
            Self::VirtualRouter => "SAI_OBJECT_TYPE_VIRTUAL_ROUTER",
            Self::RouterInterface => "SAI_OBJECT_TYPE_ROUTER_INTERFACE",
            Self::AclTable => "SAI_OBJECT_TYPE_ACL_TABLE",
            Self::AclEntry => "SAI_OBJECT_TYPE_ACL_ENTRY",
            Self::AclCounter => "SAI_OBJECT_TYPE_ACL_COUNTER",
            Self::AclTableGroup => "SAI_OBJECT_TYPE_ACL_TABLE_GROUP",
            Self::AclTableGroupMember => "SAI_OBJECT_TYPE_ACL_TABLE_GROUP_MEMBER",
            Self::Switch => "SAI_OBJECT_TYPE_SWITCH",
            Self::Vlan => "SAI_OBJECT_TYPE_VLAN",
        };
        write!(f, "{}", s)
    }
}

const TAG_SHIFT: u32 = 56;
const SUB_TYPE_SHIFT: u32 = 48;
const MAP_SHIFT: u32 = 32;

/// Decoded fields of a raw handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdParts {
    /// Raw type tag (may be unknown to this crate).
    pub tag: u8,
    /// Object sub-type (e.g. clone vs. canonical ACL entry).
    pub sub_type: u8,
    /// Owning-object index, or 0.
    pub map_index: u16,
    /// Primary index into the object's store.
    pub index: u32,
}

impl ObjectIdParts {
    /// Returns the decoded object type, if the tag is known.
    pub fn object_type(&self) -> Option<SaiObjectType> {
        SaiObjectType::from_tag(self.tag)
    }
}

/// Packs handle fields into a raw object ID.
pub const fn encode_object_id(
    object_type: SaiObjectType,
    sub_type: u8,
    map_index: u16,
    index: u32,
) -> RawSaiObjectId {
    ((object_type as u64) << TAG_SHIFT)
        | ((sub_type as u64) << SUB_TYPE_SHIFT)
        | ((map_index as u64) << MAP_SHIFT)
        | index as u64
}

/// Unpacks a raw object ID.
pub const fn decode_object_id(raw: RawSaiObjectId) -> ObjectIdParts {
    ObjectIdParts {
        tag: (raw >> TAG_SHIFT) as u8,
        sub_type: (raw >> SUB_TYPE_SHIFT) as u8,
        map_index: (raw >> MAP_SHIFT) as u16,
        index: raw as u32,
    }
}

/// Returns the object type of a raw handle.
///
/// Fails with `InvalidObjectType` for null handles and unknown tags.
pub fn object_type_of(raw: RawSaiObjectId) -> SaiResult<SaiObjectType> {
    let parts = decode_object_id(raw);
    match parts.object_type() {
        Some(SaiObjectType::Null) | None => Err(SaiError::InvalidObjectType {
            expected: "known object type".to_string(),
            found: parts.tag,
        }),
        Some(ty) => Ok(ty),
    }
}

/// Marker trait for SAI object kinds.
///
/// Each SAI object type implements this trait to enable compile-time
/// type checking of object IDs.
pub trait SaiObjectKind: Send + Sync + 'static {
    /// The type tag carried by handles of this kind.
    const OBJECT_TYPE: SaiObjectType;

    /// Returns the SAI object type name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe SAI object ID.
///
/// This wrapper ensures that object IDs of different types cannot be
/// accidentally mixed. The phantom type parameter `T` indicates what
/// kind of SAI object this ID refers to.
///
/// # Examples
///
/// ```
/// use sonic_sai::{AclTableOid, AclEntryOid};
///
/// let table = AclTableOid::new(0, 0, 3);
/// let raw = table.as_raw();
///
/// assert_eq!(AclTableOid::try_from_raw(raw).unwrap().index(), 3);
/// assert!(AclEntryOid::try_from_raw(raw).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// Builds a handle for the given sub-type, map index and primary index.
    pub const fn new(sub_type: u8, map_index: u16, index: u32) -> Self {
        Self {
            raw: encode_object_id(T::OBJECT_TYPE, sub_type, map_index, index),
            _marker: PhantomData,
        }
    }

    /// Validates the type tag of a raw handle.
    pub fn try_from_raw(raw: RawSaiObjectId) -> SaiResult<Self> {
        let parts = decode_object_id(raw);
        if parts.tag != T::OBJECT_TYPE.tag() {
            return Err(SaiError::InvalidObjectType {
                expected: T::type_name().to_string(),
                found: parts.tag,
            });
        }
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    /// Returns the raw object ID value.
    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    /// Returns the primary index.
    pub const fn index(&self) -> u32 {
        decode_object_id(self.raw).index
    }

    /// Returns the owning-object index.
    pub const fn map_index(&self) -> u16 {
        decode_object_id(self.raw).map_index
    }

    /// Returns the sub-type.
    pub const fn sub_type(&self) -> u8 {
        decode_object_id(self.raw).sub_type
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SaiObjectKind> PartialOrd for SaiObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SaiObjectKind> Ord for SaiObjectId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: SaiObjectKind> From<SaiObjectId<T>> for RawSaiObjectId {
    fn from(oid: SaiObjectId<T>) -> Self {
        oid.raw
    }
}

// ============================================================================
// Object Kind Markers
// ============================================================================

macro_rules! define_object_kind {
    ($name:ident, $object_type:ident, $type_name:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker type for SAI ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            const OBJECT_TYPE: SaiObjectType = SaiObjectType::$object_type;

            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " object IDs.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(SwitchKind, Switch, "Switch", SwitchOid);
define_object_kind!(PortKind, Port, "Port", PortOid);
define_object_kind!(LagKind, Lag, "Lag", LagOid);
define_object_kind!(VlanKind, Vlan, "Vlan", VlanOid);
define_object_kind!(RouterInterfaceKind, RouterInterface, "RouterInterface", RouterInterfaceOid);
define_object_kind!(AclTableKind, AclTable, "AclTable", AclTableOid);
define_object_kind!(AclEntryKind, AclEntry, "AclEntry", AclEntryOid);
define_object_kind!(AclCounterKind, AclCounter, "AclCounter", AclCounterOid);
define_object_kind!(AclTableGroupKind, AclTableGroup, "AclTableGroup", AclTableGroupOid);
define_object_kind!(
    AclTableGroupMemberKind,
    AclTableGroupMember,
    "AclTableGroupMember",
    AclTableGroupMemberOid
);

/// A 48-bit Ethernet MAC address.
///
/// ```
/// use sonic_sai::MacAddress;
///
/// let mac: MacAddress = "00:11:22:aa:bb:cc".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:11:22:aa:bb:cc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero MAC address.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// All-ones, used as an exact-match mask.
    pub const EXACT_MASK: MacAddress = MacAddress([0xff; 6]);

    /// Creates a MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns true for the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split([':', '-']).collect();
        if octets.len() != 6 {
            return Err(format!("Invalid MAC address: {}", s));
        }
        let mut bytes = [0u8; 6];
        for (byte, octet) in bytes.iter_mut().zip(octets) {
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| format!("Invalid MAC address: {}", s))?;
        }
        Ok(MacAddress(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let raw = encode_object_id(SaiObjectType::AclEntry, 1, 7, 42);
        let parts = decode_object_id(raw);
        assert_eq!(parts.object_type(), Some(SaiObjectType::AclEntry));
        assert_eq!(parts.sub_type, 1);
        assert_eq!(parts.map_index, 7);
        assert_eq!(parts.index, 42);
    }

    #[test]
    fn test_index_zero_is_not_null() {
        let table = AclTableOid::new(0, 0, 0);
        assert_ne!(table.as_raw(), 0);
    }

    #[test]
    fn test_typed_id_accessors() {
        let entry = AclEntryOid::new(1, 3, 9);
        assert_eq!(entry.sub_type(), 1);
        assert_eq!(entry.map_index(), 3);
        assert_eq!(entry.index(), 9);
    }

    #[test]
    fn test_tag_validation() {
        let raw = AclTableGroupOid::new(0, 0, 5).as_raw();
        assert!(AclTableGroupOid::try_from_raw(raw).is_ok());

        let err = AclTableOid::try_from_raw(raw).unwrap_err();
        assert!(matches!(
            err,
            SaiError::InvalidObjectType { found: 11, .. }
        ));
    }

    #[test]
    fn test_object_type_of() {
        let raw = PortOid::new(0, 0, 12).as_raw();
        assert_eq!(object_type_of(raw).unwrap(), SaiObjectType::Port);
        assert!(object_type_of(0).is_err());
        assert!(object_type_of(0xfe00_0000_0000_0001).is_err());
    }

    #[test]
    fn test_oid_debug() {
        let lag = LagOid::new(0, 0, 1);
        let debug = format!("{:?}", lag);
        assert!(debug.contains("Lag"));
        assert!(debug.contains("0x0200000000000001"));
    }

    #[test]
    fn test_mac_parse() {
        let mac: MacAddress = "00-11-22-33-44-55".parse().unwrap();
        assert_eq!(mac, MacAddress::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]));
        assert!("00:11:22".parse::<MacAddress>().is_err());
        assert!("zz:11:22:33:44:55".parse::<MacAddress>().is_err());
        assert!(MacAddress::ZERO.is_zero());
    }
}
