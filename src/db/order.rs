use std::collections::HashMap;

use crate::{
    core::errors::{CustomResult, StorageError},
    types::storage::Order,
};

use super::MockDb;

#[async_trait::async_trait]
pub trait OrderInterface {
    async fn find_order_by_id(&self, order_id: &str) -> CustomResult<Order, StorageError>;

    /// Shallow-merge, same contract as the cart metadata update.
    async fn update_order_metadata(
        &self,
        order_id: &str,
        metadata: HashMap<String, String>,
    ) -> CustomResult<Order, StorageError>;
}

#[async_trait::async_trait]
impl OrderInterface for MockDb {
    async fn find_order_by_id(&self, order_id: &str) -> CustomResult<Order, StorageError> {
        let orders = self.orders.lock().await;
        orders
            .iter()
            .find(|order| order.id == order_id)
            .cloned()
            .ok_or_else(|| StorageError::ValueNotFound(format!("order with id {order_id}")).into())
    }

    async fn update_order_metadata(
        &self,
        order_id: &str,
        metadata: HashMap<String, String>,
    ) -> CustomResult<Order, StorageError> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or_else(|| {
                error_stack::Report::new(StorageError::ValueNotFound(format!(
                    "order with id {order_id}"
                )))
            })?;
        order.metadata.extend(metadata);
        Ok(order.clone())
    }
}
