use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use super::app::AppState;
use crate::{
    connector::stripe_tax::transformers::StripeTaxWebhookEvent,
    connector::StripeTax,
    core::errors::TaxProcessingError,
    headers,
};

/// Receives provider webhooks. The body is verified against the signing
/// secret before anything is parsed; unrecognized event types are
/// rejected so misconfigured webhook subscriptions stay visible.
#[instrument(skip_all, fields(flow = "incoming_webhook"))]
pub async fn receive_incoming_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let Some(signature) = req
        .headers()
        .get(headers::STRIPE_SIGNATURE)
        .and_then(|value| value.to_str().ok())
    else {
        return HttpResponse::BadRequest().body("stripe-signature header is missing");
    };

    let secret = &state.conf.stripe_tax.webhook_secret;
    match StripeTax::verify_webhook_source(&body, signature, secret) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("webhook signature mismatch");
            return HttpResponse::BadRequest().body("webhook source verification failed");
        }
        Err(error) => {
            tracing::warn!(?error, "webhook signature could not be verified");
            return HttpResponse::BadRequest().body("webhook source verification failed");
        }
    }

    let event: StripeTaxWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(_) => return HttpResponse::BadRequest().body("failed to decode webhook event body"),
    };

    let Some(handler) = state.webhook_events.handler_for(&event.event_type) else {
        return HttpResponse::BadRequest().body(format!("Event {} not mapped", event.event_type));
    };

    match handler(state.get_ref(), event.data.object).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(error) => {
            tracing::error!(?error, event_type = %event.event_type, "webhook handler failed");
            error_response(&error)
        }
    }
}

fn error_response(error: &error_stack::Report<TaxProcessingError>) -> HttpResponse {
    let message = error.current_context().to_string();
    match error.current_context() {
        TaxProcessingError::MissingRequiredField { .. }
        | TaxProcessingError::WebhookPayloadDecodingFailed => {
            HttpResponse::BadRequest().body(message)
        }
        TaxProcessingError::CartNotFound { .. }
        | TaxProcessingError::OrderNotFound { .. }
        | TaxProcessingError::TaxCalculationNotFound { .. }
        | TaxProcessingError::TaxTransactionNotFound { .. } => {
            HttpResponse::NotFound().body(message)
        }
        _ => HttpResponse::InternalServerError().body(message),
    }
}
