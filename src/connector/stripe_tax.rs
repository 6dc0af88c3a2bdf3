pub mod transformers;

use std::time::Duration;

use error_stack::ResultExt;
use secrecy::{ExposeSecret, Secret};

use crate::{
    configs::settings::StripeTaxConfig,
    consts,
    core::errors::{ApplicationError, ConnectorError, CustomResult},
    headers,
};

use transformers as stripe_tax;

/// Seam between the orchestration core and the remote tax service. The
/// remote service owns idempotency and retry policy; failures surface to
/// the caller unmodified.
#[async_trait::async_trait]
pub trait StripeTaxInterface: Send + Sync {
    async fn fetch_tax_calculation(
        &self,
        address: stripe_tax::StripeTaxAddress,
        currency: &str,
        line_items: Vec<stripe_tax::StripeTaxLineItem>,
        shipping_cost: i64,
    ) -> CustomResult<stripe_tax::StripeTaxCalculation, ConnectorError>;

    async fn create_from_calculation(
        &self,
        calculation_id: &str,
        reference: &str,
    ) -> CustomResult<stripe_tax::StripeTaxTransaction, ConnectorError>;

    async fn create_reversal(
        &self,
        transaction_id: &str,
        refund_reference: &str,
    ) -> CustomResult<stripe_tax::StripeTaxTransaction, ConnectorError>;
}

#[derive(Clone)]
pub struct StripeTax {
    base_url: String,
    api_key: Secret<String>,
    http_client: reqwest::Client,
}

impl StripeTax {
    pub fn new(conf: &StripeTaxConfig) -> CustomResult<Self, ApplicationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(consts::REQUEST_TIME_OUT))
            .build()
            .change_context(ApplicationError::ApiClientConstructionFailed)?;
        Ok(Self {
            base_url: conf.base_url.trim_end_matches('/').to_string(),
            api_key: conf.api_key.clone(),
            http_client,
        })
    }

    async fn execute_post<Req, Res>(&self, path: &str, request: &Req) -> CustomResult<Res, ConnectorError>
    where
        Req: serde::Serialize,
        Res: serde::de::DeserializeOwned,
    {
        let body =
            serde_qs::to_string(request).change_context(ConnectorError::RequestEncodingFailed)?;

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .header(
                headers::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header(headers::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .change_context(ConnectorError::ProcessingStepFailed(None))?;

        let status = response.status();
        let response_body = response
            .bytes()
            .await
            .change_context(ConnectorError::ProcessingStepFailed(None))?;

        if !status.is_success() {
            if let Ok(error_response) =
                serde_json::from_slice::<stripe_tax::StripeTaxErrorResponse>(&response_body)
            {
                tracing::info!(connector_response = ?error_response, status = %status);
            }
            return Err(error_stack::report!(ConnectorError::ProcessingStepFailed(
                Some(response_body)
            )));
        }

        serde_json::from_slice(&response_body)
            .change_context(ConnectorError::ResponseDeserializationFailed)
    }

    /// Checks the `stripe-signature` header against the configured signing
    /// secret. The payload must not be parsed unless this returns true.
    pub fn verify_webhook_source(
        body: &[u8],
        signature_header: &str,
        webhook_secret: &Secret<String>,
    ) -> CustomResult<bool, ConnectorError> {
        let signature = StripeTaxWebhookSignature::parse(signature_header)?;
        let expected_tag = hex::decode(&signature.signature)
            .change_context(ConnectorError::WebhookSourceVerificationFailed)?;

        let key = ring::hmac::Key::new(
            ring::hmac::HMAC_SHA256,
            webhook_secret.expose_secret().as_bytes(),
        );
        let mut signed_payload =
            Vec::with_capacity(signature.timestamp.len() + 1 + body.len());
        signed_payload.extend_from_slice(signature.timestamp.as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(body);

        Ok(ring::hmac::verify(&key, &signed_payload, &expected_tag).is_ok())
    }
}

#[async_trait::async_trait]
impl StripeTaxInterface for StripeTax {
    async fn fetch_tax_calculation(
        &self,
        address: stripe_tax::StripeTaxAddress,
        currency: &str,
        line_items: Vec<stripe_tax::StripeTaxLineItem>,
        shipping_cost: i64,
    ) -> CustomResult<stripe_tax::StripeTaxCalculation, ConnectorError> {
        let connector_req = stripe_tax::StripeTaxCalculationRequest::new(
            address,
            currency,
            line_items,
            shipping_cost,
        );
        self.execute_post("/v1/tax/calculations", &connector_req)
            .await
    }

    async fn create_from_calculation(
        &self,
        calculation_id: &str,
        reference: &str,
    ) -> CustomResult<stripe_tax::StripeTaxTransaction, ConnectorError> {
        let connector_req = stripe_tax::StripeTaxTransactionRequest::new(calculation_id, reference);
        self.execute_post("/v1/tax/transactions/create_from_calculation", &connector_req)
            .await
    }

    async fn create_reversal(
        &self,
        transaction_id: &str,
        refund_reference: &str,
    ) -> CustomResult<stripe_tax::StripeTaxTransaction, ConnectorError> {
        let connector_req =
            stripe_tax::StripeTaxReversalRequest::new(transaction_id, refund_reference);
        self.execute_post("/v1/tax/transactions/create_reversal", &connector_req)
            .await
    }
}

/// Parsed `stripe-signature` header, `t=<timestamp>,v1=<hex hmac>`.
#[derive(Debug)]
pub struct StripeTaxWebhookSignature {
    pub timestamp: String,
    pub signature: String,
}

impl StripeTaxWebhookSignature {
    pub fn parse(header: &str) -> CustomResult<Self, ConnectorError> {
        let mut timestamp = None;
        let mut signature = None;
        for element in header.split(',') {
            match element.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value.to_string()),
                Some(("v1", value)) => signature = Some(value.to_string()),
                _ => {}
            }
        }
        match (timestamp, signature) {
            (Some(timestamp), Some(signature)) => Ok(Self {
                timestamp,
                signature,
            }),
            _ => Err(ConnectorError::WebhookSignatureNotFound)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
        let mut signed_payload = timestamp.as_bytes().to_vec();
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(body);
        hex::encode(ring::hmac::sign(&key, &signed_payload).as_ref())
    }

    #[test]
    fn parses_the_signature_header_elements() {
        let parsed = StripeTaxWebhookSignature::parse("t=1700000000,v1=deadbeef")
            .expect("well formed header should parse");
        assert_eq!(parsed.timestamp, "1700000000");
        assert_eq!(parsed.signature, "deadbeef");

        assert!(StripeTaxWebhookSignature::parse("v1=deadbeef").is_err());
        assert!(StripeTaxWebhookSignature::parse("garbage").is_err());
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let secret = Secret::new("whsec_test123".to_string());
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let header = format!("t=1700000000,v1={}", sign("whsec_test123", "1700000000", body));

        let verified = StripeTax::verify_webhook_source(body, &header, &secret)
            .expect("verification should not error");
        assert!(verified);
    }

    #[test]
    fn rejects_a_tampered_payload_or_wrong_secret() {
        let secret = Secret::new("whsec_test123".to_string());
        let body = br#"{"type":"payment_intent.succeeded"}"#;

        let wrong_secret_header =
            format!("t=1700000000,v1={}", sign("whsec_other", "1700000000", body));
        assert!(!StripeTax::verify_webhook_source(body, &wrong_secret_header, &secret)
            .expect("verification should not error"));

        let valid_header =
            format!("t=1700000000,v1={}", sign("whsec_test123", "1700000000", body));
        let tampered = br#"{"type":"payment_intent.succeeded","amount":1}"#;
        assert!(!StripeTax::verify_webhook_source(tampered, &valid_header, &secret)
            .expect("verification should not error"));
    }
}
