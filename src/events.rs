//! Explicit event dispatch. Both the webhook receiver and the host event
//! bus resolve handlers through registration tables that are built and
//! validated at startup, so a misconfigured subscription fails the boot
//! instead of surfacing as silently dropped events.

use std::{collections::HashMap, str::FromStr};

use error_stack::ResultExt;
use futures::future::BoxFuture;
use serde::Deserialize;

use crate::{
    core::{
        errors::{ApplicationError, CustomResult, TaxProcessingError},
        transactions,
    },
    routes::app::AppState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum IncomingWebhookEvent {
    #[strum(serialize = "payment_intent.succeeded")]
    PaymentIntentSucceeded,
}

pub type WebhookHandler =
    for<'a> fn(&'a AppState, serde_json::Value) -> BoxFuture<'a, CustomResult<serde_json::Value, TaxProcessingError>>;

/// Webhook event kinds mapped to their handlers. Event types outside the
/// table are rejected at the HTTP boundary, not silently ignored.
pub struct WebhookEventRegistry {
    handlers: HashMap<IncomingWebhookEvent, WebhookHandler>,
}

impl WebhookEventRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<IncomingWebhookEvent, WebhookHandler> = HashMap::new();
        handlers.insert(
            IncomingWebhookEvent::PaymentIntentSucceeded,
            handle_payment_intent_succeeded,
        );
        Self { handlers }
    }

    /// Resolves the handler for a raw event-type string.
    pub fn handler_for(&self, event_type: &str) -> Option<WebhookHandler> {
        let event = IncomingWebhookEvent::from_str(event_type).ok()?;
        self.handlers.get(&event).copied()
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        for required in [IncomingWebhookEvent::PaymentIntentSucceeded] {
            if !self.handlers.contains_key(&required) {
                return Err(ApplicationError::MissingEventHandler(
                    "payment_intent.succeeded",
                ));
            }
        }
        Ok(())
    }
}

impl Default for WebhookEventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_payment_intent_succeeded<'a>(
    state: &'a AppState,
    object: serde_json::Value,
) -> BoxFuture<'a, CustomResult<serde_json::Value, TaxProcessingError>> {
    Box::pin(async move {
        let payment_intent = serde_json::from_value(object)
            .change_context(TaxProcessingError::WebhookPayloadDecodingFailed)?;
        let transaction = transactions::create_tax_transaction(state, &payment_intent).await?;
        serde_json::to_value(transaction)
            .change_context(TaxProcessingError::WebhookResponseEncodingFailed)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum HostEvent {
    #[strum(serialize = "order.refund_created")]
    OrderRefundCreated,
}

/// Payload of the host's `order.refund_created` notification.
#[derive(Clone, Debug, Deserialize)]
pub struct RefundCreatedPayload {
    pub id: String,
    pub refund_id: String,
}

pub type HostEventHandler =
    for<'a> fn(&'a AppState, serde_json::Value) -> BoxFuture<'a, CustomResult<(), TaxProcessingError>>;

/// Dispatch table for notifications consumed from the host event bus.
pub struct EventDispatcher {
    handlers: HashMap<HostEvent, HostEventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let mut handlers: HashMap<HostEvent, HostEventHandler> = HashMap::new();
        handlers.insert(HostEvent::OrderRefundCreated, handle_refund_created);
        Self { handlers }
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        for required in [HostEvent::OrderRefundCreated] {
            if !self.handlers.contains_key(&required) {
                return Err(ApplicationError::MissingEventHandler("order.refund_created"));
            }
        }
        Ok(())
    }

    /// Runs the handler registered for `event_name`. Handler failures are
    /// logged and swallowed so one failed notification cannot halt the
    /// host's dispatch loop or starve other subscribers.
    pub async fn dispatch(&self, state: &AppState, event_name: &str, payload: serde_json::Value) {
        let handler = HostEvent::from_str(event_name)
            .ok()
            .and_then(|event| self.handlers.get(&event).copied());
        match handler {
            Some(handler) => {
                if let Err(error) = handler(state, payload).await {
                    tracing::error!(?error, event = event_name, "event handler failed");
                }
            }
            None => {
                tracing::debug!(event = event_name, "no handler subscribed for event");
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_refund_created<'a>(
    state: &'a AppState,
    payload: serde_json::Value,
) -> BoxFuture<'a, CustomResult<(), TaxProcessingError>> {
    Box::pin(async move {
        let refund: RefundCreatedPayload = serde_json::from_value(payload)
            .change_context(TaxProcessingError::WebhookPayloadDecodingFailed)?;
        transactions::handle_order_refund(state, &refund.id, &refund.refund_id).await?;
        Ok(())
    })
}
