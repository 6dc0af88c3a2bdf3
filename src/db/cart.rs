use std::collections::HashMap;

use crate::{
    core::errors::{CustomResult, StorageError},
    types::storage::Cart,
};

use super::MockDb;

#[async_trait::async_trait]
pub trait CartInterface {
    async fn find_cart_by_id(&self, cart_id: &str) -> CustomResult<Cart, StorageError>;

    /// Shallow-merges `metadata` into the cart's existing metadata, per
    /// host convention. Existing keys not present in the update survive.
    async fn update_cart_metadata(
        &self,
        cart_id: &str,
        metadata: HashMap<String, String>,
    ) -> CustomResult<Cart, StorageError>;
}

#[async_trait::async_trait]
impl CartInterface for MockDb {
    async fn find_cart_by_id(&self, cart_id: &str) -> CustomResult<Cart, StorageError> {
        let carts = self.carts.lock().await;
        carts
            .iter()
            .find(|cart| cart.id == cart_id)
            .cloned()
            .ok_or_else(|| StorageError::ValueNotFound(format!("cart with id {cart_id}")).into())
    }

    async fn update_cart_metadata(
        &self,
        cart_id: &str,
        metadata: HashMap<String, String>,
    ) -> CustomResult<Cart, StorageError> {
        let mut carts = self.carts.lock().await;
        let cart = carts
            .iter_mut()
            .find(|cart| cart.id == cart_id)
            .ok_or_else(|| {
                error_stack::Report::new(StorageError::ValueNotFound(format!(
                    "cart with id {cart_id}"
                )))
            })?;
        cart.metadata.extend(metadata);
        Ok(cart.clone())
    }
}
