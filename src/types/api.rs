//! Transient domain types exchanged with the host checkout pipeline.
//! Nothing here is persisted by this crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-request context a tax-line calculation runs against.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TaxCalculationContext {
    pub region: Option<Region>,
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub shipping_methods: Vec<ShippingMethod>,
    /// Discount allocations keyed by line-item id.
    #[serde(default)]
    pub allocation_map: HashMap<String, LineAllocation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Region {
    /// Lowercase ISO currency code, e.g. `usd`
    pub currency_code: String,
    /// Stripe tax code applied to every item line of the region
    pub tax_code: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Address {
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
}

/// A cart line item together with any pre-existing rate hints.
/// Owned by the cart, read-only here.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ItemTaxCalculationLine {
    pub item: LineItem,
    #[serde(default)]
    pub rates: Vec<TaxRateHint>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LineItem {
    pub id: String,
    pub cart_id: Option<String>,
    pub title: String,
    /// Unit price in the currency's minor unit
    pub unit_price: i64,
    pub quantity: i64,
    pub product_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ShippingTaxCalculationLine {
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub rates: Vec<TaxRateHint>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ShippingMethod {
    pub id: String,
    /// Price in the currency's minor unit
    pub price: i64,
}

/// Rate hint attached to a line by the host's region configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TaxRateHint {
    pub rate: Option<f64>,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LineAllocation {
    pub discount: Option<DiscountAllocation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscountAllocation {
    /// Total discount applied to the line, in the currency's minor unit
    pub amount: i64,
}

/// One computed tax entry, attached to either a cart item or a shipping
/// method and handed back to the host's totals calculator.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TaxLine {
    /// Tax rate as a decimal percentage, e.g. `6.0` for 6%
    pub rate: f64,
    pub name: String,
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_method_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// The `data.object` of a `payment_intent.succeeded` webhook event.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PaymentIntentEvent {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
