//! Error types, split by layer: connector faults, storage faults, domain
//! precondition faults and application startup faults.

pub type CustomResult<T, E> = error_stack::Result<T, E>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConnectorError {
    #[error("Failed to encode connector request")]
    RequestEncodingFailed,
    #[error("Failed to deserialize connector response")]
    ResponseDeserializationFailed,
    #[error("Failed to execute a processing step: {0:?}")]
    ProcessingStepFailed(Option<bytes::Bytes>),
    #[error("Failed to handle connector response")]
    ResponseHandlingFailed,
    #[error("Missing required field: {field_name}")]
    MissingRequiredField { field_name: &'static str },
    #[error("Failed to decode webhook event body")]
    WebhookBodyDecodingFailed,
    #[error("Signature not found for incoming webhook")]
    WebhookSignatureNotFound,
    #[error("Failed to verify webhook source")]
    WebhookSourceVerificationFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("ValueNotFound: {0}")]
    ValueNotFound(String),
    #[error("Serialization failure")]
    SerializationFailed,
    #[error("Deserialization failure")]
    DeserializationFailed,
    #[error("Could not acquire the lock for cache entry")]
    CouldNotAcquireLock,
    #[error("MockDb error")]
    MockDbError,
}

impl StorageError {
    pub fn is_db_not_found(&self) -> bool {
        matches!(self, Self::ValueNotFound(_))
    }
}

/// Domain-level failures of the tax lifecycle. Unlike validation gaps,
/// which degrade to zero-rate lines, these indicate an ordering bug in the
/// surrounding workflow and are raised to the caller.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TaxProcessingError {
    #[error("Missing required field: {field_name}")]
    MissingRequiredField { field_name: &'static str },
    #[error("Cart with id {cart_id} not found")]
    CartNotFound { cart_id: String },
    #[error("Order with id {order_id} not found")]
    OrderNotFound { order_id: String },
    #[error("No tax calculation recorded for cart {cart_id}")]
    TaxCalculationNotFound { cart_id: String },
    #[error("No tax transaction recorded for order {order_id}")]
    TaxTransactionNotFound { order_id: String },
    #[error("Invalid tax lifecycle transition")]
    InvalidLifecycleTransition,
    #[error("Tax provider request failed")]
    TaxProviderRequestFailed,
    #[error("Storage operation failed")]
    StorageOperationFailed,
    #[error("Failed to decode webhook payload")]
    WebhookPayloadDecodingFailed,
    #[error("Could not encode the webhook response")]
    WebhookResponseEncodingFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("Application configuration error")]
    ConfigurationError,
    #[error("Invalid configuration value: {0}")]
    InvalidConfigurationValueError(String),
    #[error("Failed to construct the api client")]
    ApiClientConstructionFailed,
    #[error("No handler registered for event `{0}`")]
    MissingEventHandler(&'static str),
}

pub trait StorageErrorExt<T> {
    /// Maps a storage not-found onto the given domain error, anything else
    /// onto [`TaxProcessingError::StorageOperationFailed`].
    fn to_not_found_response(
        self,
        not_found_response: TaxProcessingError,
    ) -> CustomResult<T, TaxProcessingError>;
}

impl<T> StorageErrorExt<T> for CustomResult<T, StorageError> {
    fn to_not_found_response(
        self,
        not_found_response: TaxProcessingError,
    ) -> CustomResult<T, TaxProcessingError> {
        self.map_err(|err| {
            if err.current_context().is_db_not_found() {
                err.change_context(not_found_response)
            } else {
                err.change_context(TaxProcessingError::StorageOperationFailed)
            }
        })
    }
}
