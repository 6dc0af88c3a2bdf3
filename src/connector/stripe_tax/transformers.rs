use std::collections::HashMap;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::{
    consts,
    core::errors,
    types::api::{Address, ItemTaxCalculationLine, LineAllocation, LineItem},
};

/// Builds the reference string used to correlate a response line item back
/// to its request line item. Correlation is by exact string match.
pub fn build_line_reference(item: &LineItem) -> String {
    format!("{} - {}", item.title, item.id)
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StripeTaxAddress {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl TryFrom<&Address> for StripeTaxAddress {
    type Error = Report<errors::ConnectorError>;
    fn try_from(address: &Address) -> Result<Self, Self::Error> {
        Ok(Self {
            line1: address
                .address_1
                .clone()
                .ok_or(errors::ConnectorError::MissingRequiredField {
                    field_name: "shipping_address.address_1",
                })?,
            line2: address.address_2.clone(),
            city: address
                .city
                .clone()
                .ok_or(errors::ConnectorError::MissingRequiredField {
                    field_name: "shipping_address.city",
                })?,
            state: address
                .province
                .clone()
                .ok_or(errors::ConnectorError::MissingRequiredField {
                    field_name: "shipping_address.province",
                })?,
            postal_code: address.postal_code.clone().ok_or(
                errors::ConnectorError::MissingRequiredField {
                    field_name: "shipping_address.postal_code",
                },
            )?,
            country: address.country_code.clone().ok_or(
                errors::ConnectorError::MissingRequiredField {
                    field_name: "shipping_address.country_code",
                },
            )?,
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StripeTaxLineItem {
    pub amount: i64,
    pub tax_code: String,
    pub reference: String,
}

/// Builds one remote line item per cart line, net of the line's discount
/// allocation, tagged with the region's tax code.
pub fn build_stripe_line_items(
    item_lines: &[ItemTaxCalculationLine],
    allocation_map: &HashMap<String, LineAllocation>,
    tax_code: &str,
) -> Vec<StripeTaxLineItem> {
    item_lines
        .iter()
        .map(|line| {
            let item = &line.item;
            let item_discount = allocation_map
                .get(&item.id)
                .and_then(|allocation| allocation.discount.as_ref())
                .map(|discount| discount.amount)
                .unwrap_or(0);
            StripeTaxLineItem {
                amount: item.unit_price * item.quantity - item_discount,
                tax_code: tax_code.to_string(),
                reference: build_line_reference(item),
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct StripeTaxCustomerDetails {
    pub address: StripeTaxAddress,
    pub address_source: StripeTaxAddressSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StripeTaxAddressSource {
    Shipping,
}

#[derive(Debug, Serialize)]
pub struct StripeTaxShippingCost {
    pub amount: i64,
    pub tax_code: String,
}

#[derive(Debug, Serialize)]
pub struct StripeTaxCalculationRequest {
    pub currency: String,
    pub line_items: Vec<StripeTaxLineItem>,
    pub customer_details: StripeTaxCustomerDetails,
    pub shipping_cost: StripeTaxShippingCost,
    pub expand: Vec<String>,
}

impl StripeTaxCalculationRequest {
    pub fn new(
        address: StripeTaxAddress,
        currency: &str,
        line_items: Vec<StripeTaxLineItem>,
        shipping_cost: i64,
    ) -> Self {
        Self {
            currency: currency.to_lowercase(),
            line_items,
            customer_details: StripeTaxCustomerDetails {
                address,
                address_source: StripeTaxAddressSource::Shipping,
            },
            shipping_cost: StripeTaxShippingCost {
                amount: shipping_cost,
                tax_code: consts::SHIPPING_TAX_CODE.to_string(),
            },
            expand: vec!["line_items.data.tax_breakdown".to_string()],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StripeTaxTransactionRequest {
    pub calculation: String,
    pub reference: String,
    pub expand: Vec<String>,
}

impl StripeTaxTransactionRequest {
    pub fn new(calculation_id: &str, reference: &str) -> Self {
        Self {
            calculation: calculation_id.to_string(),
            reference: reference.to_string(),
            expand: vec!["line_items".to_string()],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StripeTaxReversalMode {
    Full,
}

/// Reversals are always issued in full mode, there is no partial-amount
/// support in this integration.
#[derive(Debug, Serialize)]
pub struct StripeTaxReversalRequest {
    pub mode: StripeTaxReversalMode,
    pub original_transaction: String,
    pub reference: String,
    pub expand: Vec<String>,
}

impl StripeTaxReversalRequest {
    pub fn new(transaction_id: &str, refund_reference: &str) -> Self {
        Self {
            mode: StripeTaxReversalMode::Full,
            original_transaction: transaction_id.to_string(),
            reference: refund_reference.to_string(),
            expand: vec!["line_items".to_string()],
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A remote tax quote, valid until `expires_at` and referenced by id.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxCalculation {
    pub id: String,
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub line_items: StripeList<StripeTaxCalculationLineItem>,
    pub shipping_cost: Option<StripeTaxShippingCostDetails>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxCalculationLineItem {
    pub reference: Option<String>,
    pub tax_code: Option<String>,
    pub amount: Option<i64>,
    pub amount_tax: Option<i64>,
    #[serde(default)]
    pub tax_breakdown: Vec<StripeTaxBreakdownItem>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxShippingCostDetails {
    pub amount: Option<i64>,
    pub amount_tax: Option<i64>,
    #[serde(default)]
    pub tax_breakdown: Vec<StripeTaxBreakdownItem>,
}

impl StripeTaxShippingCostDetails {
    /// Rate of the aggregate shipping line, 0 when Stripe is not
    /// collecting on shipping.
    pub fn percentage(&self) -> f64 {
        self.tax_breakdown
            .first()
            .map(StripeTaxBreakdownItem::percentage)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxBreakdownItem {
    pub amount: Option<i64>,
    pub taxability_reason: Option<String>,
    pub tax_rate_details: Option<StripeTaxRateDetails>,
}

impl StripeTaxBreakdownItem {
    /// Decimal percentage of this breakdown entry. Stripe sends the rate
    /// as a string; anything unparsable counts as not collecting.
    pub fn percentage(&self) -> f64 {
        self.tax_rate_details
            .as_ref()
            .and_then(|details| details.percentage_decimal.as_ref())
            .and_then(|percentage| percentage.parse::<f64>().ok())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxRateDetails {
    pub percentage_decimal: Option<String>,
    pub tax_type: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
}

/// The remote record that a calculation was actually charged.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxTransaction {
    pub id: String,
    pub reference: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxErrorResponse {
    pub error: StripeTaxApiError,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StripeTaxApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

// Webhook envelope. The `object` stays raw until the event type has been
// matched against the handler registry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StripeTaxWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeTaxWebhookData,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StripeTaxWebhookData {
    pub object: serde_json::Value,
}
