pub mod cache;
pub mod cart;
pub mod order;

use std::sync::Arc;

use futures::lock::Mutex;

use crate::types::storage::{Cart, Order};

pub use self::{cache::CacheInterface, cart::CartInterface, order::OrderInterface};

/// Host persistence, seen through the interfaces this crate needs. The
/// real implementations live in the host platform; [`MockDb`] is the
/// in-process stand-in used by tests and the standalone server.
pub trait StorageInterface: Send + Sync + CartInterface + OrderInterface + 'static {}

#[derive(Clone, Default)]
pub struct MockDb {
    pub carts: Arc<Mutex<Vec<Cart>>>,
    pub orders: Arc<Mutex<Vec<Order>>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_cart(&self, cart: Cart) -> Cart {
        let mut carts = self.carts.lock().await;
        carts.push(cart.clone());
        cart
    }

    pub async fn insert_order(&self, order: Order) -> Order {
        let mut orders = self.orders.lock().await;
        orders.push(order.clone());
        order
    }
}

impl StorageInterface for MockDb {}
