//! SAI error types and status handling.
//!
//! Every ACL operation reports one of the SAI status codes below. [`SaiError`]
//! carries the context a caller needs to act on the failure and maps back to
//! the [`SaiStatus`] that crosses the driver API boundary.

use std::fmt;
use thiserror::Error;

/// Base value of the attribute-indexed status ranges.
///
/// SAI reports attribute errors as `BASE - index`, where `index` is the
/// position of the offending attribute in the caller's list.
const ATTR_RANGE: u32 = 0x0001_0000;

/// SAI status codes matching the SAI C API.
///
/// These values correspond to `sai_status_t` in the SAI header files.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    BufferOverflow = -8,
    InvalidPortNumber = -9,
    InvalidPortMember = -10,
    InvalidVlanId = -11,
    Uninitialized = -12,
    TableFull = -13,
    MandatoryAttributeMissing = -14,
    NotImplemented = -15,
    AddrNotFound = -16,
    ObjectInUse = -17,
    InvalidObjectType = -18,
    InvalidObjectId = -19,
    InvalidAttribute = -0x0001_0000,
    InvalidAttributeValue = -0x0002_0000,
    AttrNotImplemented = -0x0004_0000,
    AttrNotSupported = -0x0005_0000,
}

impl SaiStatus {
    /// Creates a SaiStatus from a raw i32 value.
    ///
    /// Attribute-indexed codes (`SAI_STATUS_INVALID_ATTR_VALUE_0 - n`) fold
    /// onto their base variant.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -1 => SaiStatus::Failure,
            -2 => SaiStatus::NotSupported,
            -3 => SaiStatus::NoMemory,
            -4 => SaiStatus::InsufficientResources,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -8 => SaiStatus::BufferOverflow,
            -9 => SaiStatus::InvalidPortNumber,
            -10 => SaiStatus::InvalidPortMember,
            -11 => SaiStatus::InvalidVlanId,
            -12 => SaiStatus::Uninitialized,
            -13 => SaiStatus::TableFull,
            -14 => SaiStatus::MandatoryAttributeMissing,
            -15 => SaiStatus::NotImplemented,
            -16 => SaiStatus::AddrNotFound,
            -17 => SaiStatus::ObjectInUse,
            -18 => SaiStatus::InvalidObjectType,
            -19 => SaiStatus::InvalidObjectId,
            s if s < 0 => match s.unsigned_abs() / ATTR_RANGE {
                1 => SaiStatus::InvalidAttribute,
                2 => SaiStatus::InvalidAttributeValue,
                4 => SaiStatus::AttrNotImplemented,
                5 => SaiStatus::AttrNotSupported,
                _ => SaiStatus::Failure,
            },
            _ => SaiStatus::Failure,
        }
    }

    /// Returns the raw status code.
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> SaiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SaiError::from_status(self))
        }
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::NoMemory => "SAI_STATUS_NO_MEMORY",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::BufferOverflow => "SAI_STATUS_BUFFER_OVERFLOW",
            SaiStatus::InvalidPortNumber => "SAI_STATUS_INVALID_PORT_NUMBER",
            SaiStatus::InvalidPortMember => "SAI_STATUS_INVALID_PORT_MEMBER",
            SaiStatus::InvalidVlanId => "SAI_STATUS_INVALID_VLAN_ID",
            SaiStatus::Uninitialized => "SAI_STATUS_UNINITIALIZED",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::MandatoryAttributeMissing => "SAI_STATUS_MANDATORY_ATTRIBUTE_MISSING",
            SaiStatus::NotImplemented => "SAI_STATUS_NOT_IMPLEMENTED",
            SaiStatus::AddrNotFound => "SAI_STATUS_ADDR_NOT_FOUND",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::InvalidObjectType => "SAI_STATUS_INVALID_OBJECT_TYPE",
            SaiStatus::InvalidObjectId => "SAI_STATUS_INVALID_OBJECT_ID",
            SaiStatus::InvalidAttribute => "SAI_STATUS_INVALID_ATTRIBUTE_0",
            SaiStatus::InvalidAttributeValue => "SAI_STATUS_INVALID_ATTR_VALUE_0",
            SaiStatus::AttrNotImplemented => "SAI_STATUS_ATTR_NOT_IMPLEMENTED_0",
            SaiStatus::AttrNotSupported => "SAI_STATUS_ATTR_NOT_SUPPORTED_0",
        };
        write!(f, "{}", s)
    }
}

/// Error type for SAI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// A required attribute (stage, field, table id, ...) was not supplied.
    #[error("Mandatory attribute missing: {attr}")]
    MandatoryAttributeMissing { attr: String },

    /// An attribute was supplied with a malformed or out-of-range value.
    #[error("Invalid value for {attr}: {message}")]
    InvalidAttributeValue { attr: String, message: String },

    /// A request was malformed or inconsistent with the object graph.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// A handle's type tag does not match what the entry point expects.
    #[error("Invalid object type: expected {expected}, found tag {found}")]
    InvalidObjectType { expected: String, found: u8 },

    /// Object is referenced and cannot be removed.
    #[error("Object in use: {object}")]
    ObjectInUse { object: String },

    /// An index pool or hardware resource is exhausted.
    #[error("Insufficient resources: {resource}")]
    InsufficientResources { resource: String },

    /// The platform cannot express the requested attribute.
    #[error("Attribute not supported: {attr}")]
    AttrNotSupported { attr: String },

    /// The requested item was not found.
    #[error("Item not found: {item}")]
    ItemNotFound { item: String },

    /// Generic Match Engine or internal failure.
    #[error("Failure: {message}")]
    Failure { message: String },

    /// SAI API returned a status with no richer mapping.
    #[error("SAI operation failed: {status}")]
    Status { status: SaiStatus },
}

impl SaiError {
    /// Creates an error from a SAI status code.
    pub fn from_status(status: SaiStatus) -> Self {
        match status {
            SaiStatus::Success => SaiError::Failure {
                message: "from_status called with success status".to_string(),
            },
            SaiStatus::MandatoryAttributeMissing => SaiError::MandatoryAttributeMissing {
                attr: "unknown".to_string(),
            },
            SaiStatus::InvalidAttributeValue => SaiError::InvalidAttributeValue {
                attr: "unknown".to_string(),
                message: format!("SAI returned {}", status),
            },
            SaiStatus::InvalidParameter | SaiStatus::InvalidObjectId => {
                SaiError::InvalidParameter {
                    message: format!("SAI returned {}", status),
                }
            }
            SaiStatus::InvalidObjectType => SaiError::InvalidObjectType {
                expected: "unknown".to_string(),
                found: 0,
            },
            SaiStatus::ObjectInUse => SaiError::ObjectInUse {
                object: "unknown".to_string(),
            },
            SaiStatus::InsufficientResources
            | SaiStatus::NoMemory
            | SaiStatus::TableFull => SaiError::InsufficientResources {
                resource: "unknown".to_string(),
            },
            SaiStatus::AttrNotSupported | SaiStatus::NotSupported => SaiError::AttrNotSupported {
                attr: "unknown".to_string(),
            },
            SaiStatus::ItemNotFound | SaiStatus::AddrNotFound => SaiError::ItemNotFound {
                item: "unknown".to_string(),
            },
            SaiStatus::Failure => SaiError::Failure {
                message: "unspecified".to_string(),
            },
            _ => SaiError::Status { status },
        }
    }

    /// Creates a mandatory attribute missing error.
    pub fn mandatory_missing(attr: impl Into<String>) -> Self {
        SaiError::MandatoryAttributeMissing { attr: attr.into() }
    }

    /// Creates an invalid attribute value error.
    pub fn invalid_value(attr: impl Into<String>, message: impl Into<String>) -> Self {
        SaiError::InvalidAttributeValue {
            attr: attr.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates an object in use error.
    pub fn object_in_use(object: impl Into<String>) -> Self {
        SaiError::ObjectInUse {
            object: object.into(),
        }
    }

    /// Creates an insufficient resources error.
    pub fn insufficient_resources(resource: impl Into<String>) -> Self {
        SaiError::InsufficientResources {
            resource: resource.into(),
        }
    }

    /// Creates an attribute not supported error.
    pub fn not_supported(attr: impl Into<String>) -> Self {
        SaiError::AttrNotSupported { attr: attr.into() }
    }

    /// Creates a not found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        SaiError::ItemNotFound { item: item.into() }
    }

    /// Creates a generic failure.
    pub fn failure(message: impl Into<String>) -> Self {
        SaiError::Failure {
            message: message.into(),
        }
    }

    /// Returns the SAI status this error is reported as.
    pub fn status(&self) -> SaiStatus {
        match self {
            SaiError::MandatoryAttributeMissing { .. } => SaiStatus::MandatoryAttributeMissing,
            SaiError::InvalidAttributeValue { .. } => SaiStatus::InvalidAttributeValue,
            SaiError::InvalidParameter { .. } => SaiStatus::InvalidParameter,
            SaiError::InvalidObjectType { .. } => SaiStatus::InvalidObjectType,
            SaiError::ObjectInUse { .. } => SaiStatus::ObjectInUse,
            SaiError::InsufficientResources { .. } => SaiStatus::InsufficientResources,
            SaiError::AttrNotSupported { .. } => SaiStatus::AttrNotSupported,
            SaiError::ItemNotFound { .. } => SaiStatus::ItemNotFound,
            SaiError::Failure { .. } => SaiStatus::Failure,
            SaiError::Status { status } => *status,
        }
    }
}

/// Result type for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;

/// Extension trait for converting raw SAI status codes.
pub trait SaiStatusExt {
    /// Converts a raw status code to a Result.
    fn to_result(self) -> SaiResult<()>;
}

impl SaiStatusExt for i32 {
    fn to_result(self) -> SaiResult<()> {
        SaiStatus::from_raw(self).into_result()
    }
}

/// Collapses a result into the status code returned across the driver API.
pub fn status_of<T>(result: &SaiResult<T>) -> SaiStatus {
    match result {
        Ok(_) => SaiStatus::Success,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_success() {
        assert!(SaiStatus::Success.is_success());
        assert!(SaiStatus::Success.into_result().is_ok());
        assert!(SaiStatus::Failure.into_result().is_err());
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(SaiStatus::from_raw(0), SaiStatus::Success);
        assert_eq!(SaiStatus::from_raw(-7), SaiStatus::ItemNotFound);
        assert_eq!(SaiStatus::from_raw(-17), SaiStatus::ObjectInUse);
        assert_eq!(SaiStatus::from_raw(-999), SaiStatus::Failure);
    }

    #[test]
    fn test_attribute_indexed_status() {
        assert_eq!(
            SaiStatus::from_raw(-0x0002_0000),
            SaiStatus::InvalidAttributeValue
        );
        // Third attribute in the list
        assert_eq!(
            SaiStatus::from_raw(-0x0002_0003),
            SaiStatus::InvalidAttributeValue
        );
        assert_eq!(
            SaiStatus::from_raw(-0x0005_0001),
            SaiStatus::AttrNotSupported
        );
        assert_eq!(SaiStatus::from_raw(i32::MIN), SaiStatus::Failure);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            SaiError::object_in_use("table").status(),
            SaiStatus::ObjectInUse
        );
        assert_eq!(
            SaiError::mandatory_missing("stage").status(),
            SaiStatus::MandatoryAttributeMissing
        );
        assert_eq!(
            SaiError::insufficient_resources("entries").status(),
            SaiStatus::InsufficientResources
        );
        assert_eq!(SaiError::failure("x").status(), SaiStatus::Failure);
    }

    #[test]
    fn test_error_from_status_round_trip() {
        for status in [
            SaiStatus::MandatoryAttributeMissing,
            SaiStatus::InvalidParameter,
            SaiStatus::ObjectInUse,
            SaiStatus::InsufficientResources,
            SaiStatus::AttrNotSupported,
            SaiStatus::ItemNotFound,
        ] {
            assert_eq!(SaiError::from_status(status).status(), status);
        }
    }

    #[test]
    fn test_raw_status_to_result() {
        assert!(0_i32.to_result().is_ok());
        assert!((-7_i32).to_result().is_err());
    }

    #[test]
    fn test_status_of() {
        let ok: SaiResult<u32> = Ok(1);
        assert_eq!(status_of(&ok), SaiStatus::Success);
        let err: SaiResult<u32> = Err(SaiError::not_found("entry"));
        assert_eq!(status_of(&err), SaiStatus::ItemNotFound);
    }
}
