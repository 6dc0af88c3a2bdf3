//! Crate-wide constants.

/// API client request timeout (in seconds)
pub const REQUEST_TIME_OUT: u64 = 30;

/// Time a cached tax calculation stays valid (in seconds)
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

pub const STRIPE_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe tax code for shipping, taxed as a single aggregate line
pub const SHIPPING_TAX_CODE: &str = "txcd_92010001";

pub const SALES_TAX_LINE_NAME: &str = "Sales Tax";
pub const SHIPPING_TAX_LINE_NAME: &str = "Shipping Tax";

/// Prefix for cache keys addressing tax calculations by their inputs
pub const TAX_CALCULATION_CACHE_PREFIX: &str = "stripe_tax_api";

// Cart and order metadata keys. The persisted representation of the tax
// lifecycle is a flat key-value map owned by the host platform.
pub const METADATA_TAX_CALCULATION_ID: &str = "taxCalculationId";
pub const METADATA_TAX_TRANSACTION_ID: &str = "taxTransactionId";
pub const METADATA_PAYMENT_INTENT: &str = "paymentIntent";
pub const METADATA_TAX_REFERENCE: &str = "taxReference";
pub const METADATA_REVERSAL_TRANSACTION: &str = "reversalTransaction";

/// Payment-intent metadata key carrying the cart id
pub const METADATA_RESOURCE_ID: &str = "resource_id";
