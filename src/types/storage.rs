//! Storage records owned by the host platform. The tax lifecycle is
//! persisted as flat metadata keys for host compatibility; in memory it is
//! modeled as a tagged state with validated transitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Cart {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid tax lifecycle transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// Lifecycle of a cart or order with respect to tax settlement.
///
/// Transitions must go through [`TaxLifecycle::transition_to`] before the
/// corresponding metadata write. Re-quoting an existing calculation is
/// allowed; everything else moves strictly forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaxLifecycle {
    NoCalculation,
    Calculated { calculation_id: String },
    Transacted { transaction_id: String },
    Reversed { reversal_id: String },
}

impl TaxLifecycle {
    /// Derives the lifecycle state from the persisted metadata map.
    /// Later stages take precedence over earlier ones.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        if let Some(reversal_id) = metadata.get(consts::METADATA_REVERSAL_TRANSACTION) {
            return Self::Reversed {
                reversal_id: reversal_id.clone(),
            };
        }
        if let Some(transaction_id) = metadata.get(consts::METADATA_TAX_TRANSACTION_ID) {
            return Self::Transacted {
                transaction_id: transaction_id.clone(),
            };
        }
        if let Some(calculation_id) = metadata.get(consts::METADATA_TAX_CALCULATION_ID) {
            return Self::Calculated {
                calculation_id: calculation_id.clone(),
            };
        }
        Self::NoCalculation
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            Self::NoCalculation => "no_calculation",
            Self::Calculated { .. } => "calculated",
            Self::Transacted { .. } => "transacted",
            Self::Reversed { .. } => "reversed",
        }
    }

    /// Validates that `next` is reachable from the current state.
    pub fn transition_to(&self, next: Self) -> Result<Self, InvalidTransition> {
        let allowed = matches!(
            (self, &next),
            (Self::NoCalculation, Self::Calculated { .. })
                | (Self::Calculated { .. }, Self::Calculated { .. })
                | (Self::Calculated { .. }, Self::Transacted { .. })
                | (Self::Transacted { .. }, Self::Reversed { .. })
        );
        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self.state_name(),
                to: next.state_name(),
            })
        }
    }

    /// Flat metadata keys this state contributes on a write.
    pub fn metadata_delta(&self) -> HashMap<String, String> {
        let mut delta = HashMap::new();
        match self {
            Self::NoCalculation => {}
            Self::Calculated { calculation_id } => {
                delta.insert(
                    consts::METADATA_TAX_CALCULATION_ID.to_string(),
                    calculation_id.clone(),
                );
            }
            Self::Transacted { transaction_id } => {
                delta.insert(
                    consts::METADATA_TAX_TRANSACTION_ID.to_string(),
                    transaction_id.clone(),
                );
            }
            Self::Reversed { reversal_id } => {
                delta.insert(
                    consts::METADATA_REVERSAL_TRANSACTION.to_string(),
                    reversal_id.clone(),
                );
            }
        }
        delta
    }
}
