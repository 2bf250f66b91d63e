//! In-memory candle series
//!
//! Rows live in a `DashMap` keyed by point id. A per-symbol `BTreeMap` keyed by
//! bucket start indexes the series, so bucket upserts, windows and latest lookups
//! never scan other symbols. Upserts hold the symbol's series entry while they
//! merge, so two writes for one bucket always collapse into a single row.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;
use types::{minute_bucket, CandlePoint};
use uuid::Uuid;

use crate::traits::{CandleStore, StoreError, StoreResult};

const ENTITY: &str = "candle";

#[derive(Debug, Default)]
pub struct InMemoryCandleStore {
    points: DashMap<Uuid, CandlePoint>,
    /// symbol -> bucket start (unix secs) -> point id
    series: DashMap<String, BTreeMap<i64, Uuid>>,
    /// every correlation id merged into a point
    correlations: DashMap<Uuid, Uuid>,
    merges: AtomicU64,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of writes merged into an existing bucket
    pub fn merge_count(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    /// All points for `symbol`, oldest bucket first
    pub fn series(&self, symbol: &str) -> Vec<CandlePoint> {
        let ids: Vec<Uuid> = self
            .series
            .get(symbol)
            .map(|s| s.values().copied().collect())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.points.get(&id).map(|p| p.clone()))
            .collect()
    }
}

fn bucket_key(ts: DateTime<Utc>) -> i64 {
    minute_bucket(ts).0.timestamp()
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<CandlePoint>> {
        Ok(self.points.get(&id).map(|p| p.clone()))
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: Uuid,
    ) -> StoreResult<Option<CandlePoint>> {
        let Some(id) = self.correlations.get(&correlation_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.points.get(&id).map(|p| p.clone()))
    }

    async fn find_in_bucket(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<CandlePoint>> {
        let id = self.series.get(symbol).and_then(|s| {
            s.range(start.timestamp()..end.timestamp())
                .next()
                .map(|(_, id)| *id)
        });
        Ok(id.and_then(|id| self.points.get(&id).map(|p| p.clone())))
    }

    async fn upsert(&self, point: CandlePoint) -> StoreResult<CandlePoint> {
        let key = bucket_key(point.timestamp);
        let mut series = self.series.entry(point.symbol.clone()).or_default();

        let persisted = match series.get(&key).copied() {
            Some(existing_id) => {
                let mut existing = self
                    .points
                    .get_mut(&existing_id)
                    .ok_or_else(|| StoreError::not_found(ENTITY, existing_id))?;
                existing.merge_from(&point);
                self.merges.fetch_add(1, Ordering::Relaxed);
                trace!(symbol = %point.symbol, point_id = %existing_id, "merged into bucket");
                existing.clone()
            }
            None => {
                series.insert(key, point.id);
                self.points.insert(point.id, point.clone());
                trace!(symbol = %point.symbol, point_id = %point.id, "inserted bucket");
                point.clone()
            }
        };
        drop(series);

        self.correlations.insert(point.correlation_id, persisted.id);
        Ok(persisted)
    }

    async fn update(&self, point: &CandlePoint) -> StoreResult<()> {
        let mut existing = self
            .points
            .get_mut(&point.id)
            .ok_or_else(|| StoreError::not_found(ENTITY, point.id))?;
        *existing = point.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<CandlePoint>> {
        let ids: Vec<Uuid> = match self.series.get(symbol) {
            Some(series) => series
                .range(bucket_key(start)..=end.timestamp())
                .rev()
                .map(|(_, id)| *id)
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut points: Vec<CandlePoint> = ids
            .into_iter()
            .filter_map(|id| self.points.get(&id).map(|p| p.clone()))
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .take(limit)
            .collect();
        points.reverse();
        Ok(points)
    }

    async fn latest(&self, symbol: &str) -> StoreResult<Option<CandlePoint>> {
        let id = self
            .series
            .get(symbol)
            .and_then(|s| s.values().next_back().copied());
        Ok(id.and_then(|id| self.points.get(&id).map(|p| p.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn candle(symbol: &str, ts: DateTime<Utc>, close: f64) -> CandlePoint {
        CandlePoint::new(Uuid::new_v4(), symbol, ts, close, close, close, close, 1.0)
    }

    #[tokio::test]
    async fn test_upsert_merges_same_minute() {
        let store = InMemoryCandleStore::new();
        let first = candle("BTCUSDT", base() + Duration::seconds(5), 100.0);
        let second = candle("BTCUSDT", base() + Duration::seconds(40), 101.0);

        let a = store.upsert(first.clone()).await.unwrap();
        let b = store.upsert(second.clone()).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.merge_count(), 1);
        assert_eq!(b.close, 101.0);
        assert_eq!(b.correlation_id, first.correlation_id);

        // Both correlation ids resolve to the merged row
        let by_first = store.find_by_correlation_id(first.correlation_id).await.unwrap();
        let by_second = store.find_by_correlation_id(second.correlation_id).await.unwrap();
        assert_eq!(by_first.unwrap().id, a.id);
        assert_eq!(by_second.unwrap().id, a.id);
    }

    #[tokio::test]
    async fn test_find_in_bucket() {
        let store = InMemoryCandleStore::new();
        let ts = base() + Duration::seconds(30);
        store.upsert(candle("ETHUSDT", ts, 10.0)).await.unwrap();

        let (start, end) = minute_bucket(ts);
        assert!(store
            .find_in_bucket("ETHUSDT", start, end)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_in_bucket("ETHUSDT", end, end + Duration::minutes(1))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_in_bucket("BTCUSDT", start, end)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_window_keeps_most_recent_ascending() {
        let store = InMemoryCandleStore::new();
        for i in 0..10 {
            store
                .upsert(candle("BTCUSDT", base() + Duration::minutes(i), i as f64))
                .await
                .unwrap();
        }
        store
            .upsert(candle("ETHUSDT", base() + Duration::minutes(3), 99.0))
            .await
            .unwrap();

        let end = base() + Duration::minutes(8);
        let window = store
            .window("BTCUSDT", base(), end, 4)
            .await
            .unwrap();
        let closes: Vec<f64> = window.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![5.0, 6.0, 7.0, 8.0]);

        let latest = store.latest("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(latest.close, 9.0);
        assert!(store.latest("SOLUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_row() {
        let store = InMemoryCandleStore::new();
        let mut point = store
            .upsert(candle("BTCUSDT", base(), 1.0))
            .await
            .unwrap();
        point.score = Some(42.0);
        store.update(&point).await.unwrap();
        assert_eq!(
            store.get(point.id).await.unwrap().unwrap().score,
            Some(42.0)
        );

        let missing = candle("BTCUSDT", base(), 1.0);
        assert!(matches!(
            store.update(&missing).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
