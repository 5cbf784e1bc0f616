//! ==============================================================================
//! query.rs - read side: latest, all, summary
//! ==============================================================================
//!
//! purpose:
//!     answers the three read endpoints. `latest` comes from the in-memory
//!     cache; `all` and `summary` come from the store.
//!
//! consistency:
//!     summary runs aggregate(), matching() and distinct_months() on one
//!     Snapshot. queries are not ordered against concurrent ingestion: a
//!     summary may or may not include a reading stored a moment earlier.
//!
//! ==============================================================================

use crate::cache::LatestCache;
use crate::config::QueryConfig;
use crate::domain::{LatestReading, RecentReadings, Summary};
use crate::error::StorageError;
use crate::store::Store;

#[derive(Clone)]
pub struct QueryService {
    cache: LatestCache,
    store: Store,
    limits: QueryConfig,
}

impl QueryService {
    pub fn new(cache: LatestCache, store: Store, limits: QueryConfig) -> Self {
        Self {
            cache,
            store,
            limits,
        }
    }

    /// `None` means nothing has been ingested since startup
    pub async fn latest(&self) -> Option<LatestReading> {
        self.cache.get().await
    }

    /// the most recent readings; `limit` is the raw query-string value
    pub async fn all(&self, limit: Option<&str>) -> Result<RecentReadings, StorageError> {
        let limit = resolve_limit(limit, self.limits);
        Ok(self.store.recent(limit).await?.into())
    }

    pub async fn summary(&self) -> Result<Summary, StorageError> {
        let mut snapshot = self.store.snapshot().await?;
        let stats = snapshot.aggregate().await?;

        let (extreme_records, extreme_months) = match (stats.max_temp, stats.max_humidity) {
            (Some(max_temp), Some(max_humidity)) if stats.rows > 0 => (
                snapshot.matching(max_temp, max_humidity).await?,
                snapshot.distinct_months(max_temp, max_humidity).await?,
            ),
            // empty history
            _ => (Vec::new(), Vec::new()),
        };
        snapshot.finish().await?;

        Ok(Summary {
            max_temp: stats.max_temp,
            min_temp: stats.min_temp,
            avg_temp: round2(stats.avg_temp.unwrap_or(0.0)),
            max_humidity: stats.max_humidity,
            extreme_records,
            extreme_months,
        })
    }
}

/// absent, non-numeric or non-positive → default; too large → max
pub fn resolve_limit(raw: Option<&str>, limits: QueryConfig) -> u32 {
    let default = limits.default_limit.max(1);
    let max = limits.max_limit.max(default);

    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(max).min(max),
        _ => default,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Measurement;

    fn limits() -> QueryConfig {
        QueryConfig {
            default_limit: 50,
            max_limit: 1000,
        }
    }

    async fn service() -> (QueryService, LatestCache, Store) {
        let cache = LatestCache::new();
        let store = Store::in_memory().await.unwrap();
        let svc = QueryService::new(cache.clone(), store.clone(), limits());
        (svc, cache, store)
    }

    fn m(temperature: f64, humidity: f64, light: f64) -> Measurement {
        Measurement {
            temperature,
            humidity,
            light,
        }
    }

    #[test]
    fn limit_resolution() {
        assert_eq!(resolve_limit(None, limits()), 50);
        assert_eq!(resolve_limit(Some("3"), limits()), 3);
        assert_eq!(resolve_limit(Some(" 7 "), limits()), 7);
        assert_eq!(resolve_limit(Some("abc"), limits()), 50);
        assert_eq!(resolve_limit(Some(""), limits()), 50);
        assert_eq!(resolve_limit(Some("0"), limits()), 50);
        assert_eq!(resolve_limit(Some("-4"), limits()), 50);
        assert_eq!(resolve_limit(Some("2.5"), limits()), 50);
        assert_eq!(resolve_limit(Some("5000"), limits()), 1000);
        assert_eq!(resolve_limit(Some("99999999999999"), limits()), 1000);
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(74.0 / 3.0), 24.67);
        assert_eq!(round2(20.0), 20.0);
        assert_eq!(round2(0.004), 0.0);
    }

    #[tokio::test]
    async fn latest_is_none_until_something_arrives() {
        let (svc, cache, _) = service().await;
        assert!(svc.latest().await.is_none());
        cache.record(m(1.0, 2.0, 3.0)).await;
        assert_eq!(svc.latest().await.unwrap().measurement(), m(1.0, 2.0, 3.0));
    }

    #[tokio::test]
    async fn all_counts_what_it_returns() {
        let (svc, _, store) = service().await;
        for i in 0..5 {
            store.append(&m(i as f64, 1.0, 1.0), None).await.unwrap();
        }
        let page = svc.all(Some("3")).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.data.len(), 3);

        let page = svc.all(Some("nope")).await.unwrap();
        assert_eq!(page.count, 5);
    }

    #[tokio::test]
    async fn summary_of_empty_history() {
        let (svc, _, _) = service().await;
        let summary = svc.summary().await.unwrap();
        assert_eq!(summary.max_temp, None);
        assert_eq!(summary.min_temp, None);
        assert_eq!(summary.max_humidity, None);
        assert_eq!(summary.avg_temp, 0.0);
        assert!(summary.extreme_records.is_empty());
        assert!(summary.extreme_months.is_empty());
    }

    #[tokio::test]
    async fn summary_of_single_reading_lists_it_once() {
        let (svc, _, store) = service().await;
        store.append(&m(22.5, 61.0, 300.0), None).await.unwrap();

        let summary = svc.summary().await.unwrap();
        assert_eq!(summary.max_temp, Some(22.5));
        assert_eq!(summary.min_temp, Some(22.5));
        assert_eq!(summary.extreme_records.len(), 1);
        assert_eq!(summary.extreme_months.len(), 1);
    }

    #[tokio::test]
    async fn summary_rounds_average() {
        let (svc, _, store) = service().await;
        for t in [24.0, 25.0, 25.0] {
            store.append(&m(t, 50.0, 1.0), None).await.unwrap();
        }
        assert_eq!(svc.summary().await.unwrap().avg_temp, 24.67);
    }

    #[tokio::test]
    async fn summary_is_stable_without_ingestion() {
        let (svc, _, store) = service().await;
        store.append(&m(20.0, 50.0, 100.0), None).await.unwrap();
        store.append(&m(30.0, 40.0, 100.0), None).await.unwrap();

        let first = svc.summary().await.unwrap();
        let second = svc.summary().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn summary_fails_loudly_when_store_is_down() {
        let (svc, _, store) = service().await;
        store.close().await;
        assert!(svc.summary().await.is_err());
        assert!(svc.all(None).await.is_err());
    }
}
