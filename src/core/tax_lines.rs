//! Checkout-time tax quoting: validation gate, remote line building,
//! cache-or-fetch of the calculation and mapping back into tax lines.

use std::collections::HashMap;

use error_stack::ResultExt;
use serde::Serialize;
use tracing::instrument;

use crate::{
    connector::stripe_tax::transformers::{
        build_line_reference, build_stripe_line_items, StripeTaxAddress, StripeTaxBreakdownItem,
        StripeTaxCalculation, StripeTaxLineItem,
    },
    consts,
    core::errors::{ConnectorError, CustomResult, TaxProcessingError},
    db::cache,
    routes::app::AppState,
    types::{
        api::{
            Address, ItemTaxCalculationLine, Region, ShippingTaxCalculationLine,
            TaxCalculationContext, TaxLine,
        },
        storage::TaxLifecycle,
    },
};

struct ValidatedInputs<'a> {
    region: &'a Region,
    shipping_address: &'a Address,
}

/// Computes one tax line per item line (and per shipping method) for the
/// host's totals pipeline.
///
/// Incomplete inputs are not an error: checkout must proceed, so the gate
/// degrades to zero-rate lines without touching the remote service.
#[instrument(skip_all, fields(flow = "get_tax_lines"))]
pub async fn get_tax_lines(
    state: &AppState,
    item_lines: &[ItemTaxCalculationLine],
    shipping_lines: &[ShippingTaxCalculationLine],
    context: &TaxCalculationContext,
) -> CustomResult<Vec<TaxLine>, TaxProcessingError> {
    let Some(inputs) = validate_items_for_tax_calculation(context, item_lines) else {
        tracing::debug!("tax calculation inputs incomplete, returning zero-rate lines");
        return Ok(get_empty_tax_lines(item_lines));
    };

    let line_items =
        build_stripe_line_items(item_lines, &context.allocation_map, &inputs.region.tax_code);
    let address = StripeTaxAddress::try_from(inputs.shipping_address)
        .change_context(TaxProcessingError::TaxProviderRequestFailed)?;
    let shipping_cost: i64 = context
        .shipping_methods
        .iter()
        .map(|method| method.price)
        .sum();

    let calculation = resolve_tax_calculation(
        state,
        &address,
        &inputs.region.currency_code,
        line_items,
        shipping_cost,
    )
    .await?;

    // The calculation reference is written to the cart that the quoted
    // items belong to. All items of one request share a cart, so the
    // first line's cart id is authoritative. The write is best-effort:
    // a quote is still returned when the reference cannot be recorded.
    if let Some(cart_id) = item_lines
        .first()
        .and_then(|line| line.item.cart_id.as_deref())
    {
        persist_calculation_reference(state, cart_id, &calculation.id).await;
    }

    let mut tax_lines = map_item_tax_lines(item_lines, &calculation)?;
    tax_lines.extend(map_shipping_tax_lines(shipping_lines, &calculation));
    Ok(tax_lines)
}

/// Gate for the remote call. Returns the validated region and address, or
/// `None` when any required piece is missing.
fn validate_items_for_tax_calculation<'a>(
    context: &'a TaxCalculationContext,
    item_lines: &[ItemTaxCalculationLine],
) -> Option<ValidatedInputs<'a>> {
    let region = context.region.as_ref()?;
    let shipping_address = context.shipping_address.as_ref()?;

    let complete = has_value(&shipping_address.postal_code)
        && has_value(&shipping_address.address_1)
        && has_value(&shipping_address.city)
        && has_value(&shipping_address.province)
        && has_value(&shipping_address.country_code)
        && !item_lines.is_empty();

    complete.then_some(ValidatedInputs {
        region,
        shipping_address,
    })
}

fn has_value(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|value| !value.is_empty())
}

/// Degrade-gracefully path: the items' pre-existing rate hints come back
/// as zero-rate lines so downstream totals see a complete, tax-free cart.
fn get_empty_tax_lines(item_lines: &[ItemTaxCalculationLine]) -> Vec<TaxLine> {
    item_lines
        .iter()
        .flat_map(|line| {
            line.rates.iter().map(|rate| TaxLine {
                rate: 0.0,
                name: rate.name.clone(),
                code: rate.code.clone(),
                item_id: Some(line.item.id.clone()),
                shipping_method_id: None,
                metadata: None,
            })
        })
        .collect()
}

#[derive(Serialize)]
struct CalculationFingerprint<'a> {
    #[serde(rename = "addressString")]
    address_string: String,
    #[serde(rename = "lineItems")]
    line_items: &'a [StripeTaxLineItem],
    #[serde(rename = "shippingCost")]
    shipping_cost: i64,
}

/// Cache key derived purely from the calculation inputs. Two carts with
/// the same address, items and shipping cost share an entry.
fn build_cache_key(
    address: &StripeTaxAddress,
    line_items: &[StripeTaxLineItem],
    shipping_cost: i64,
) -> CustomResult<String, TaxProcessingError> {
    let address_string = [
        Some(address.line1.as_str()),
        address.line2.as_deref(),
        Some(address.city.as_str()),
        Some(address.state.as_str()),
        Some(address.postal_code.as_str()),
        Some(address.country.as_str()),
    ]
    .into_iter()
    .map(|field| field.unwrap_or_default())
    .collect::<Vec<_>>()
    .join(" ");

    let fingerprint = serde_json::to_string(&CalculationFingerprint {
        address_string,
        line_items,
        shipping_cost,
    })
    .change_context(TaxProcessingError::TaxProviderRequestFailed)?;

    Ok(format!(
        "{}:{}",
        consts::TAX_CALCULATION_CACHE_PREFIX,
        fingerprint
    ))
}

/// Cache-or-fetch protocol bounding the cost of the remote service: a
/// repeated identical quote within the TTL window is served from cache.
async fn resolve_tax_calculation(
    state: &AppState,
    address: &StripeTaxAddress,
    currency: &str,
    line_items: Vec<StripeTaxLineItem>,
    shipping_cost: i64,
) -> CustomResult<StripeTaxCalculation, TaxProcessingError> {
    let cache_key = build_cache_key(address, &line_items, shipping_cost)?;

    let cached: Option<StripeTaxCalculation> =
        cache::get_and_deserialize_key(state.cache.as_ref(), &cache_key)
            .await
            .change_context(TaxProcessingError::StorageOperationFailed)?;
    if let Some(calculation) = cached {
        tracing::debug!(calculation_id = %calculation.id, "tax calculation served from cache");
        return Ok(calculation);
    }

    let calculation = state
        .connector
        .fetch_tax_calculation(address.clone(), currency, line_items, shipping_cost)
        .await
        .change_context(TaxProcessingError::TaxProviderRequestFailed)?;

    cache::serialize_and_set_key_with_expiry(
        state.cache.as_ref(),
        &cache_key,
        &calculation,
        state.conf.stripe_tax.cache_ttl_seconds,
    )
    .await
    .change_context(TaxProcessingError::StorageOperationFailed)?;

    Ok(calculation)
}

/// Records the calculation id on the cart metadata. Failures are logged
/// and swallowed. Concurrent quotes for the same cart race here with
/// last-write-wins; no per-cart serialization is provided.
async fn persist_calculation_reference(state: &AppState, cart_id: &str, calculation_id: &str) {
    let result = async {
        let cart = state
            .store
            .find_cart_by_id(cart_id)
            .await
            .change_context(TaxProcessingError::StorageOperationFailed)?;
        let next = TaxLifecycle::from_metadata(&cart.metadata)
            .transition_to(TaxLifecycle::Calculated {
                calculation_id: calculation_id.to_string(),
            })
            .change_context(TaxProcessingError::InvalidLifecycleTransition)?;
        state
            .store
            .update_cart_metadata(cart_id, next.metadata_delta())
            .await
            .change_context(TaxProcessingError::StorageOperationFailed)?;
        Ok::<_, error_stack::Report<TaxProcessingError>>(())
    }
    .await;

    if let Err(error) = result {
        tracing::warn!(?error, cart_id, "failed to record tax calculation on cart");
    }
}

fn map_item_tax_lines(
    item_lines: &[ItemTaxCalculationLine],
    calculation: &StripeTaxCalculation,
) -> CustomResult<Vec<TaxLine>, TaxProcessingError> {
    let metadata = calculation_metadata(calculation);
    item_lines
        .iter()
        .map(|line| {
            let reference = build_line_reference(&line.item);
            let response_line = calculation
                .line_items
                .data
                .iter()
                .find(|data| data.reference.as_deref() == Some(reference.as_str()))
                .ok_or(ConnectorError::ResponseHandlingFailed)
                .attach_printable_lazy(|| {
                    format!("no response line item matched reference `{reference}`")
                })
                .change_context(TaxProcessingError::TaxProviderRequestFailed)?;

            let rate = response_line
                .tax_breakdown
                .first()
                .map(StripeTaxBreakdownItem::percentage)
                .unwrap_or_default();

            Ok(TaxLine {
                rate,
                name: consts::SALES_TAX_LINE_NAME.to_string(),
                code: response_line.tax_code.clone(),
                item_id: Some(line.item.id.clone()),
                shipping_method_id: None,
                metadata: Some(metadata.clone()),
            })
        })
        .collect()
}

/// Shipping is quoted as one aggregate line, so every shipping method of
/// the cart carries the same rate from the shipping-cost breakdown.
fn map_shipping_tax_lines(
    shipping_lines: &[ShippingTaxCalculationLine],
    calculation: &StripeTaxCalculation,
) -> Vec<TaxLine> {
    let rate = calculation
        .shipping_cost
        .as_ref()
        .map(|shipping| shipping.percentage())
        .unwrap_or_default();
    let metadata = calculation_metadata(calculation);

    shipping_lines
        .iter()
        .map(|line| TaxLine {
            rate,
            name: consts::SHIPPING_TAX_LINE_NAME.to_string(),
            code: Some(consts::SHIPPING_TAX_CODE.to_string()),
            item_id: None,
            shipping_method_id: Some(line.shipping_method.id.clone()),
            metadata: Some(metadata.clone()),
        })
        .collect()
}

fn calculation_metadata(calculation: &StripeTaxCalculation) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert(
        consts::METADATA_TAX_CALCULATION_ID.to_string(),
        calculation.id.clone(),
    );
    metadata
}
