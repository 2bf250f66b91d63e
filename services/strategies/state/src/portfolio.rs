//! In-memory holdings and orders
//!
//! Holdings keep a secondary index of open holding ids per symbol, updated on
//! every write, so position scans touch only the holdings they return.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use types::{Holding, Order};
use uuid::Uuid;

use crate::traits::{HoldingStore, OrderStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct InMemoryHoldingStore {
    holdings: DashMap<Uuid, Holding>,
    /// symbol -> open holding ids
    open_index: DashMap<String, HashSet<Uuid>>,
    /// origin order id -> holding id
    by_origin: DashMap<Uuid, Uuid>,
}

impl InMemoryHoldingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn all(&self) -> Vec<Holding> {
        self.holdings.iter().map(|h| h.value().clone()).collect()
    }

    fn index(&self, previous: Option<&Holding>, current: &Holding) {
        if let Some(previous) = previous {
            if previous.is_open() {
                if let Some(mut ids) = self.open_index.get_mut(&previous.symbol) {
                    ids.remove(&previous.id);
                }
            }
        }
        if current.is_open() {
            self.open_index
                .entry(current.symbol.clone())
                .or_default()
                .insert(current.id);
        }
        if let Some(order_id) = current.origin_order_id {
            self.by_origin.insert(order_id, current.id);
        }
    }
}

#[async_trait]
impl HoldingStore for InMemoryHoldingStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Holding>> {
        Ok(self.holdings.get(&id).map(|h| h.clone()))
    }

    async fn insert(&self, holding: Holding) -> StoreResult<()> {
        holding.validate()?;
        if self.holdings.contains_key(&holding.id) {
            return Err(StoreError::Conflict {
                entity: "holding",
                id: holding.id,
            });
        }
        self.index(None, &holding);
        self.holdings.insert(holding.id, holding);
        Ok(())
    }

    async fn update(&self, holding: &Holding) -> StoreResult<()> {
        holding.validate()?;
        let previous = {
            let mut entry = self
                .holdings
                .get_mut(&holding.id)
                .ok_or_else(|| StoreError::not_found("holding", holding.id))?;
            std::mem::replace(entry.value_mut(), holding.clone())
        };
        self.index(Some(&previous), holding);
        Ok(())
    }

    async fn open_by_symbol(&self, symbol: &str) -> StoreResult<Vec<Holding>> {
        let ids: Vec<Uuid> = self
            .open_index
            .get(symbol)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let mut open: Vec<Holding> = ids
            .into_iter()
            .filter_map(|id| self.holdings.get(&id).map(|h| h.clone()))
            .filter(|h| h.is_open())
            .collect();
        open.sort_by_key(|h| h.created_at);
        Ok(open)
    }

    async fn find_by_origin_order(&self, order_id: Uuid) -> StoreResult<Option<Holding>> {
        let Some(id) = self.by_origin.get(&order_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.holdings.get(&id).map(|h| h.clone()))
    }

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Vec<Holding>> {
        let mut holdings: Vec<Holding> = self
            .holdings
            .iter()
            .filter(|h| h.user_id == user_id)
            .map(|h| h.value().clone())
            .collect();
        holdings.sort_by_key(|h| h.created_at);
        Ok(holdings)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, Order>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.iter().map(|o| o.value().clone()).collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn insert(&self, order: Order) -> StoreResult<()> {
        order.validate()?;
        if self.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict {
                entity: "order",
                id: order.id,
            });
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn update(&self, order: &Order) -> StoreResult<()> {
        order.validate()?;
        let mut entry = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::not_found("order", order.id))?;
        *entry = order.clone();
        Ok(())
    }

    async fn open_orders(&self) -> StoreResult<Vec<Order>> {
        let mut open: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.is_open())
            .map(|o| o.value().clone())
            .collect();
        open.sort_by_key(|o| o.created_at);
        Ok(open)
    }

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
