use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use types::TradingPreference;
use uuid::Uuid;

use crate::traits::{PreferenceStore, StoreResult};

/// Preferences keyed by owning user; one preference per user
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    by_user: DashMap<Uuid, TradingPreference>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn upsert(&self, preference: TradingPreference) -> StoreResult<()> {
        preference.validate()?;
        self.by_user.insert(preference.user_id, preference);
        Ok(())
    }

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Option<TradingPreference>> {
        Ok(self.by_user.get(&user_id).map(|p| p.clone()))
    }

    async fn operating_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, TradingPreference>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.by_user.get(id))
            .filter(|p| p.operate)
            .map(|p| (p.user_id, p.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Algorithm, RiskLevel};

    #[tokio::test]
    async fn test_operating_join() {
        let store = InMemoryPreferenceStore::new();
        let active = TradingPreference::new(
            Uuid::new_v4(),
            Algorithm::SwingTrading,
            RiskLevel::Low,
            ["BTCUSDT"],
        );
        let mut paused = TradingPreference::new(
            Uuid::new_v4(),
            Algorithm::Scalping,
            RiskLevel::High,
            ["ETHUSDT"],
        );
        paused.operate = false;
        store.upsert(active.clone()).await.unwrap();
        store.upsert(paused.clone()).await.unwrap();

        let operating = store
            .operating_for_users(&[active.user_id, paused.user_id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(operating.len(), 1);
        assert!(operating.contains_key(&active.user_id));
    }

    #[tokio::test]
    async fn test_invalid_watchlist_rejected() {
        let store = InMemoryPreferenceStore::new();
        let preference = TradingPreference::new(
            Uuid::new_v4(),
            Algorithm::DayTrading,
            RiskLevel::Medium,
            ["BTCEUR"],
        );
        assert!(store.upsert(preference).await.is_err());
    }
}
