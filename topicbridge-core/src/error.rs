//! Error taxonomy shared by the service client and the binding core

use std::fmt;
use thiserror::Error;

/// Broad failure class of a queue/topic service call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested resource is absent
    NotFound,
    /// Malformed input
    Validation,
    /// Network or service unavailability
    Transport,
    /// Rejected because of existing state
    Conflict,
    /// Any other rejection reported by the service
    Rejected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Validation => "Validation",
            Self::Transport => "Transport",
            Self::Conflict => "Conflict",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQS and SNS error codes the client knows how to classify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // SQS
    QueueDoesNotExist,
    NonExistentQueue,
    QueueAlreadyExists,
    QueueNameExists,
    QueueDeletedRecently,
    InvalidAttributeName,
    InvalidMessageContents,
    ReceiptHandleIsInvalid,

    // SNS
    NotFound,
    ResourceNotFound,
    InvalidParameter,
    ConcurrentAccess,

    // Common
    InvalidParameterValue,
    MissingParameter,
    ValidationError,
    InvalidAddress,
    ServiceUnavailable,
    InternalError,
    Throttling,
    RequestThrottled,
}

impl ErrorCode {
    const ALL: [ErrorCode; 20] = [
        Self::QueueDoesNotExist,
        Self::NonExistentQueue,
        Self::QueueAlreadyExists,
        Self::QueueNameExists,
        Self::QueueDeletedRecently,
        Self::InvalidAttributeName,
        Self::InvalidMessageContents,
        Self::ReceiptHandleIsInvalid,
        Self::NotFound,
        Self::ResourceNotFound,
        Self::InvalidParameter,
        Self::ConcurrentAccess,
        Self::InvalidParameterValue,
        Self::MissingParameter,
        Self::ValidationError,
        Self::InvalidAddress,
        Self::ServiceUnavailable,
        Self::InternalError,
        Self::Throttling,
        Self::RequestThrottled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueDoesNotExist => "QueueDoesNotExist",
            Self::NonExistentQueue => "AWS.SimpleQueueService.NonExistentQueue",
            Self::QueueAlreadyExists => "QueueAlreadyExists",
            Self::QueueNameExists => "QueueNameExists",
            Self::QueueDeletedRecently => "AWS.SimpleQueueService.QueueDeletedRecently",
            Self::InvalidAttributeName => "InvalidAttributeName",
            Self::InvalidMessageContents => "InvalidMessageContents",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::NotFound => "NotFound",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::InvalidParameter => "InvalidParameter",
            Self::ConcurrentAccess => "ConcurrentAccess",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::MissingParameter => "MissingParameter",
            Self::ValidationError => "ValidationError",
            Self::InvalidAddress => "InvalidAddress",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalError => "InternalError",
            Self::Throttling => "Throttling",
            Self::RequestThrottled => "RequestThrottled",
        }
    }

    /// Look up a code as reported on the wire
    ///
    /// Newer SQS endpoints report JSON-protocol codes such as
    /// `com.amazonaws.sqs#QueueDoesNotExist`, so anything before `#` is ignored.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.rsplit('#').next().unwrap_or(code);
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueDoesNotExist | Self::NonExistentQueue | Self::NotFound
            | Self::ResourceNotFound => ErrorKind::NotFound,
            Self::QueueAlreadyExists | Self::QueueNameExists | Self::QueueDeletedRecently
            | Self::ConcurrentAccess => ErrorKind::Conflict,
            Self::InvalidAttributeName | Self::InvalidMessageContents
            | Self::ReceiptHandleIsInvalid | Self::InvalidParameter
            | Self::InvalidParameterValue | Self::MissingParameter | Self::ValidationError
            | Self::InvalidAddress => ErrorKind::Validation,
            Self::ServiceUnavailable | Self::InternalError | Self::Throttling
            | Self::RequestThrottled => ErrorKind::Transport,
        }
    }
}

/// Failure of a single queue/topic service call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
}

impl ServiceError {
    /// Classify an error code reported by the service
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorCode::parse(code).map(|c| c.kind()) {
            Some(ErrorKind::NotFound) => Self::NotFound(message),
            Some(ErrorKind::Validation) => Self::Validation(message),
            Some(ErrorKind::Conflict) => Self::Conflict(message),
            Some(ErrorKind::Transport) => Self::Transport(format!("{code}: {message}")),
            Some(ErrorKind::Rejected) | None => Self::Rejected {
                code: code.to_string(),
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Rejected { .. } => ErrorKind::Rejected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Step of the bind/unbind flow at which a failure became terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindErrorKind {
    InvalidInput,
    LookupFailed,
    CreateFailed,
    ArnResolveFailed,
    DuplicateSubscription,
    SubscribeFailed,
    UnsubscribeFailed,
}

impl BindErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::LookupFailed => "LookupFailed",
            Self::CreateFailed => "CreateFailed",
            Self::ArnResolveFailed => "ArnResolveFailed",
            Self::DuplicateSubscription => "DuplicateSubscription",
            Self::SubscribeFailed => "SubscribeFailed",
            Self::UnsubscribeFailed => "UnsubscribeFailed",
        }
    }
}

impl fmt::Display for BindErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {source}")]
pub struct BindError {
    pub kind: BindErrorKind,
    pub source: ServiceError,
}

impl BindError {
    pub fn new(kind: BindErrorKind, source: ServiceError) -> Self {
        Self { kind, source }
    }
}

/// Step of a message exchange at which a failure became terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeErrorKind {
    InvalidInput,
    PublishFailed,
    SendFailed,
    ReceiveFailed,
}

impl ExchangeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::PublishFailed => "PublishFailed",
            Self::SendFailed => "SendFailed",
            Self::ReceiveFailed => "ReceiveFailed",
        }
    }
}

impl fmt::Display for ExchangeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {source}")]
pub struct ExchangeError {
    pub kind: ExchangeErrorKind,
    pub source: ServiceError,
}

impl ExchangeError {
    pub fn new(kind: ExchangeErrorKind, source: ServiceError) -> Self {
        Self { kind, source }
    }
}

/// Registry refresh or admin mutation step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorKind {
    InvalidInput,
    ListFailed,
    DescribeFailed,
    CreateFailed,
    DeleteFailed,
}

impl RegistryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::ListFailed => "ListFailed",
            Self::DescribeFailed => "DescribeFailed",
            Self::CreateFailed => "CreateFailed",
            Self::DeleteFailed => "DeleteFailed",
        }
    }
}

impl fmt::Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {source}")]
pub struct RegistryError {
    pub kind: RegistryErrorKind,
    pub source: ServiceError,
}

impl RegistryError {
    pub fn new(kind: RegistryErrorKind, source: ServiceError) -> Self {
        Self { kind, source }
    }
}
