//! Error taxonomy shared across the workspace.
//!
//! Every layer defines typed errors and converts via `#[from]`:
//! drivers raise [`DriverError`], discovery backends raise [`DiscoveryError`],
//! and everything that crosses the dispatcher boundary is an [`IotError`].

use crate::id::DeviceId;

/// Error returned by device operations, the registry, and the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum IotError {
    #[error(transparent)]
    NotFound(#[from] DeviceNotFound),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperation),

    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    #[error(transparent)]
    OperationFailed(#[from] OperationFailed),
}

impl IotError {
    /// Stable machine-readable tag used in bus replies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "device_not_found",
            Self::Unsupported(_) => "unsupported_operation",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OperationFailed(_) => "operation_failed",
        }
    }

    /// Translate a driver error raised while running `operation`.
    ///
    /// A driver that does not implement an operation is reported as
    /// [`UnsupportedOperation`]; any other failure becomes [`OperationFailed`].
    #[must_use]
    pub fn from_driver(device_id: &DeviceId, operation: &str, err: DriverError) -> Self {
        match err {
            DriverError::NotImplemented => UnsupportedOperation::new(device_id, operation).into(),
            source => OperationFailed {
                device_id: device_id.clone(),
                operation: operation.to_string(),
                source,
            }
            .into(),
        }
    }
}

/// No device matched an identifier or query.
#[derive(Debug, thiserror::Error)]
#[error("no device matches {query:?}")]
pub struct DeviceNotFound {
    pub query: String,
}

impl DeviceNotFound {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// The operation is unknown or not part of the device's capability set.
#[derive(Debug, thiserror::Error)]
#[error("device {device_id} does not support {operation}")]
pub struct UnsupportedOperation {
    pub device_id: DeviceId,
    pub operation: String,
}

impl UnsupportedOperation {
    #[must_use]
    pub fn new(device_id: &DeviceId, operation: impl Into<String>) -> Self {
        Self {
            device_id: device_id.clone(),
            operation: operation.into(),
        }
    }
}

/// Arguments supplied to an operation could not be interpreted.
#[derive(Debug, thiserror::Error)]
#[error("invalid argument for {operation}: {reason}")]
pub struct InvalidArgument {
    pub operation: String,
    pub reason: String,
}

impl InvalidArgument {
    #[must_use]
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// The underlying driver raised while performing an operation.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed on device {device_id}")]
pub struct OperationFailed {
    pub device_id: DeviceId,
    pub operation: String,
    #[source]
    pub source: DriverError,
}

/// Construction-time validation failures for domain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device id must not be empty")]
    EmptyId,

    #[error("device name must not be empty")]
    EmptyName,
}

/// Errors raised by concrete device drivers.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver has no implementation for this operation.
    #[error("operation not implemented by driver")]
    NotImplemented,

    /// The device could not be reached over its transport.
    #[error("device unreachable")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The device answered but refused or failed the request.
    #[error("device rejected request: {0}")]
    Rejected(String),
}

/// Errors raised by a discovery backend during one scan cycle.
///
/// Scanners log these and retry on the next cycle; they never terminate the
/// scanner task.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The discovery mechanism is not available on this host.
    #[error("discovery backend unavailable")]
    Unavailable,

    /// The discovery backend failed.
    #[error("discovery backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DiscoveryError {
    /// Wrap any backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}
