#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use secrecy::Secret;
use stripe_tax::{
    configs::settings::{Server, Settings, StripeTaxConfig},
    connector::stripe_tax::transformers::{
        StripeList, StripeTaxAddress, StripeTaxBreakdownItem, StripeTaxCalculation,
        StripeTaxCalculationLineItem, StripeTaxLineItem, StripeTaxRateDetails,
        StripeTaxShippingCostDetails, StripeTaxTransaction,
    },
    connector::StripeTaxInterface,
    core::errors::{ConnectorError, CustomResult},
    db::{cache::InMemoryCacheStore, MockDb},
    routes::app::AppState,
    types::api::{
        Address, ItemTaxCalculationLine, LineItem, PaymentIntentEvent, Region, ShippingMethod,
        ShippingTaxCalculationLine, TaxCalculationContext,
    },
    types::storage::{Cart, Order},
};

pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";

pub fn settings() -> Settings {
    Settings {
        server: Server::default(),
        stripe_tax: StripeTaxConfig {
            api_key: Secret::new("sk_test_1".to_string()),
            webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
            base_url: "https://api.stripe.com".to_string(),
            cache_ttl_seconds: 3600,
        },
    }
}

/// Connector double recording every remote call it receives.
#[derive(Default)]
pub struct MockStripeTax {
    pub calculation: Mutex<StripeTaxCalculation>,
    pub calculation_calls: AtomicUsize,
    pub transactions: Mutex<Vec<(String, String)>>,
    pub reversals: Mutex<Vec<(String, String)>>,
}

impl MockStripeTax {
    pub fn returning(calculation: StripeTaxCalculation) -> Arc<Self> {
        Arc::new(Self {
            calculation: Mutex::new(calculation),
            ..Self::default()
        })
    }

    pub fn calculation_call_count(&self) -> usize {
        self.calculation_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StripeTaxInterface for MockStripeTax {
    async fn fetch_tax_calculation(
        &self,
        _address: StripeTaxAddress,
        _currency: &str,
        _line_items: Vec<StripeTaxLineItem>,
        _shipping_cost: i64,
    ) -> CustomResult<StripeTaxCalculation, ConnectorError> {
        self.calculation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.calculation.lock().expect("mock lock poisoned").clone())
    }

    async fn create_from_calculation(
        &self,
        calculation_id: &str,
        reference: &str,
    ) -> CustomResult<StripeTaxTransaction, ConnectorError> {
        self.transactions
            .lock()
            .expect("mock lock poisoned")
            .push((calculation_id.to_string(), reference.to_string()));
        Ok(StripeTaxTransaction {
            id: "tax_1".to_string(),
            reference: reference.to_string(),
        })
    }

    async fn create_reversal(
        &self,
        transaction_id: &str,
        refund_reference: &str,
    ) -> CustomResult<StripeTaxTransaction, ConnectorError> {
        self.reversals
            .lock()
            .expect("mock lock poisoned")
            .push((transaction_id.to_string(), refund_reference.to_string()));
        Ok(StripeTaxTransaction {
            id: "tax_rev_1".to_string(),
            reference: refund_reference.to_string(),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MockDb>,
    pub connector: Arc<MockStripeTax>,
}

pub fn test_app(connector: Arc<MockStripeTax>) -> TestApp {
    let store = Arc::new(MockDb::new());
    let state = AppState::new(
        settings(),
        store.clone(),
        Arc::new(InMemoryCacheStore::new()),
        connector.clone(),
    );
    TestApp {
        state,
        store,
        connector,
    }
}

pub fn calculation_for_item(
    calculation_id: &str,
    reference: &str,
    tax_code: &str,
    percentage_decimal: Option<&str>,
) -> StripeTaxCalculation {
    StripeTaxCalculation {
        id: calculation_id.to_string(),
        expires_at: Some(1_700_003_600),
        line_items: StripeList {
            data: vec![StripeTaxCalculationLineItem {
                reference: Some(reference.to_string()),
                tax_code: Some(tax_code.to_string()),
                amount: Some(10),
                amount_tax: None,
                tax_breakdown: percentage_decimal
                    .map(|percentage| {
                        vec![StripeTaxBreakdownItem {
                            amount: None,
                            taxability_reason: Some("standard_rated".to_string()),
                            tax_rate_details: Some(StripeTaxRateDetails {
                                percentage_decimal: Some(percentage.to_string()),
                                ..Default::default()
                            }),
                        }]
                    })
                    .unwrap_or_default(),
            }],
        },
        shipping_cost: None,
    }
}

pub fn with_shipping_breakdown(
    mut calculation: StripeTaxCalculation,
    amount: i64,
    percentage_decimal: &str,
) -> StripeTaxCalculation {
    calculation.shipping_cost = Some(StripeTaxShippingCostDetails {
        amount: Some(amount),
        amount_tax: None,
        tax_breakdown: vec![StripeTaxBreakdownItem {
            amount: None,
            taxability_reason: None,
            tax_rate_details: Some(StripeTaxRateDetails {
                percentage_decimal: Some(percentage_decimal.to_string()),
                ..Default::default()
            }),
        }],
    });
    calculation
}

pub fn michigan_address() -> Address {
    Address {
        address_1: Some("113 Cherry St".to_string()),
        address_2: None,
        city: Some("Ann Arbor".to_string()),
        province: Some("MI".to_string()),
        postal_code: Some("48104".to_string()),
        country_code: Some("US".to_string()),
    }
}

pub fn usd_region() -> Region {
    Region {
        currency_code: "usd".to_string(),
        tax_code: "txcd_99999999".to_string(),
    }
}

pub fn calculation_context(address: Address) -> TaxCalculationContext {
    TaxCalculationContext {
        region: Some(usd_region()),
        shipping_address: Some(address),
        shipping_methods: vec![],
        allocation_map: HashMap::new(),
    }
}

pub fn item_line_1() -> ItemTaxCalculationLine {
    ItemTaxCalculationLine {
        item: LineItem {
            id: "item_1".to_string(),
            cart_id: Some("cart_1".to_string()),
            title: "item_title_1".to_string(),
            unit_price: 10,
            quantity: 1,
            product_id: None,
        },
        rates: vec![],
    }
}

pub fn shipping_line(id: &str, price: i64) -> ShippingTaxCalculationLine {
    ShippingTaxCalculationLine {
        shipping_method: ShippingMethod {
            id: id.to_string(),
            price,
        },
        rates: vec![],
    }
}

pub fn cart_with_metadata(cart_id: &str, metadata: &[(&str, &str)]) -> Cart {
    Cart {
        id: cart_id.to_string(),
        metadata: metadata
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

pub fn order_with_metadata(order_id: &str, metadata: &[(&str, &str)]) -> Order {
    Order {
        id: order_id.to_string(),
        metadata: metadata
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

pub fn payment_intent(id: &str, resource_id: Option<&str>) -> PaymentIntentEvent {
    let mut metadata = HashMap::new();
    if let Some(resource_id) = resource_id {
        metadata.insert("resource_id".to_string(), resource_id.to_string());
    }
    PaymentIntentEvent {
        id: id.to_string(),
        metadata,
    }
}

/// Signs a webhook payload the way the provider does.
pub fn sign_webhook(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed_payload = timestamp.as_bytes().to_vec();
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(body);
    let tag = ring::hmac::sign(&key, &signed_payload);
    format!("t={},v1={}", timestamp, hex::encode(tag.as_ref()))
}
