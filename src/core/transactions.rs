//! Settlement side of the tax lifecycle: a succeeded payment turns the
//! recorded calculation into a tax transaction, a refund reverses it.

use error_stack::ResultExt;
use tracing::instrument;

use crate::{
    connector::stripe_tax::transformers::StripeTaxTransaction,
    consts,
    core::errors::{CustomResult, StorageErrorExt, TaxProcessingError},
    routes::app::AppState,
    types::{api::PaymentIntentEvent, storage::Order, storage::TaxLifecycle},
};

/// Materializes a tax transaction from the calculation recorded on the
/// cart the payment refers to.
///
/// A payment event without a cart reference, or for a cart that never ran
/// a calculation, is an ordering bug in the surrounding workflow and is
/// raised to the caller instead of being swallowed.
#[instrument(skip_all, fields(flow = "create_tax_transaction"))]
pub async fn create_tax_transaction(
    state: &AppState,
    payment_intent: &PaymentIntentEvent,
) -> CustomResult<StripeTaxTransaction, TaxProcessingError> {
    let cart_id = payment_intent
        .metadata
        .get(consts::METADATA_RESOURCE_ID)
        .filter(|value| !value.is_empty())
        .ok_or(TaxProcessingError::MissingRequiredField {
            field_name: "metadata.resource_id",
        })?;

    let cart = state
        .store
        .find_cart_by_id(cart_id)
        .await
        .to_not_found_response(TaxProcessingError::CartNotFound {
            cart_id: cart_id.clone(),
        })?;

    let lifecycle = TaxLifecycle::from_metadata(&cart.metadata);
    let calculation_id = match &lifecycle {
        TaxLifecycle::Calculated { calculation_id } => calculation_id.clone(),
        TaxLifecycle::NoCalculation => {
            return Err(TaxProcessingError::TaxCalculationNotFound {
                cart_id: cart_id.clone(),
            })?
        }
        other => {
            return Err(TaxProcessingError::InvalidLifecycleTransition).attach_printable(format!(
                "cart {cart_id} is already {}",
                other.state_name()
            ))
        }
    };

    let transaction = state
        .connector
        .create_from_calculation(&calculation_id, &payment_intent.id)
        .await
        .change_context(TaxProcessingError::TaxProviderRequestFailed)?;

    let next = lifecycle
        .transition_to(TaxLifecycle::Transacted {
            transaction_id: transaction.id.clone(),
        })
        .change_context(TaxProcessingError::InvalidLifecycleTransition)?;

    let mut metadata = next.metadata_delta();
    metadata.insert(
        consts::METADATA_PAYMENT_INTENT.to_string(),
        payment_intent.id.clone(),
    );
    metadata.insert(
        consts::METADATA_TAX_REFERENCE.to_string(),
        transaction.reference.clone(),
    );
    state
        .store
        .update_cart_metadata(cart_id, metadata)
        .await
        .change_context(TaxProcessingError::StorageOperationFailed)?;

    tracing::info!(
        cart_id,
        transaction_id = %transaction.id,
        "tax transaction created from calculation"
    );
    Ok(transaction)
}

/// Issues a full reversal of the order's tax transaction and records the
/// reversal on the order.
#[instrument(skip_all, fields(flow = "handle_order_refund"))]
pub async fn handle_order_refund(
    state: &AppState,
    order_id: &str,
    refund_id: &str,
) -> CustomResult<Order, TaxProcessingError> {
    let order = state
        .store
        .find_order_by_id(order_id)
        .await
        .to_not_found_response(TaxProcessingError::OrderNotFound {
            order_id: order_id.to_string(),
        })?;

    let lifecycle = TaxLifecycle::from_metadata(&order.metadata);
    let transaction_id = match &lifecycle {
        TaxLifecycle::Transacted { transaction_id } => transaction_id.clone(),
        TaxLifecycle::NoCalculation | TaxLifecycle::Calculated { .. } => {
            return Err(TaxProcessingError::TaxTransactionNotFound {
                order_id: order_id.to_string(),
            })?
        }
        other => {
            return Err(TaxProcessingError::InvalidLifecycleTransition).attach_printable(format!(
                "order {order_id} is already {}",
                other.state_name()
            ))
        }
    };

    let reversal = state
        .connector
        .create_reversal(&transaction_id, refund_id)
        .await
        .change_context(TaxProcessingError::TaxProviderRequestFailed)?;

    let next = lifecycle
        .transition_to(TaxLifecycle::Reversed {
            reversal_id: reversal.id.clone(),
        })
        .change_context(TaxProcessingError::InvalidLifecycleTransition)?;

    let updated_order = state
        .store
        .update_order_metadata(order_id, next.metadata_delta())
        .await
        .change_context(TaxProcessingError::StorageOperationFailed)?;

    tracing::info!(
        order_id,
        reversal_id = %reversal.id,
        refund_id,
        "tax transaction reversed for refund"
    );
    Ok(updated_order)
}
