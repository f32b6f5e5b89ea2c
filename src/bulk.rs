use crate::core::cache::RateCache;
use crate::core::conversion::{ConversionResult, PriceItem, RatePath, convert_for_display};
use std::sync::Arc;
use tracing::debug;

/// Converts lists of prices against one cache snapshot.
#[derive(Clone)]
pub struct BulkConversionService {
    cache: Arc<RateCache>,
}

impl BulkConversionService {
    pub fn new(cache: Arc<RateCache>) -> Self {
        Self { cache }
    }

    /// Converts every item to `target`, preserving input order.
    ///
    /// The snapshot is taken once, so a refresh landing mid-batch cannot mix
    /// rates from two fetches into one result set.
    pub fn calculate_bulk(&self, items: &[PriceItem], target: &str) -> Vec<ConversionResult> {
        let snapshot = self.cache.get();
        let results: Vec<ConversionResult> = items
            .iter()
            .map(|item| {
                convert_for_display(item.amount, &item.currency, target, snapshot.as_deref())
            })
            .collect();

        debug!(
            items = results.len(),
            unconverted = results.iter().filter(|r| !r.is_converted()).count(),
            triangulated = results
                .iter()
                .filter(|r| r.path == Some(RatePath::Triangulated))
                .count(),
            "Bulk conversion completed"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::trigger::Trigger;
    use crate::store::memory::MemoryStore;
    use std::collections::HashMap;

    fn cache_with(base: &str, rates: &[(&str, f64)]) -> Arc<RateCache> {
        let cache = Arc::new(RateCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        ));
        cache.update(
            base,
            rates
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>(),
            Trigger::AppInit,
        );
        cache
    }

    #[test]
    fn test_bulk_preserves_order_and_target() {
        let cache = cache_with("USD", &[("EUR", 0.92), ("GBP", 0.79)]);
        let service = BulkConversionService::new(cache);

        let items = vec![PriceItem::new(100.0, "GBP"), PriceItem::new(50.0, "USD")];
        let results = service.calculate_bulk(&items, "EUR");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].from, "GBP");
        assert_eq!(results[1].from, "USD");
        assert!(results.iter().all(|r| r.to == "EUR" && r.currency == "EUR"));
        assert_eq!(results[0].path, Some(RatePath::Triangulated));
        assert_eq!(results[1].path, Some(RatePath::FromBase));
        assert_eq!(results[1].converted_amount, 50.0 * 0.92);
    }

    #[test]
    fn test_bulk_keeps_unconvertible_rows() {
        let cache = cache_with("USD", &[("EUR", 0.92)]);
        let service = BulkConversionService::new(cache);

        let items = vec![
            PriceItem::new(10.0, "JPY"),
            PriceItem::new(f64::NAN, "USD"),
            PriceItem::new(5.0, "EUR"),
        ];
        let results = service.calculate_bulk(&items, "EUR");

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_converted());
        assert_eq!(results[0].currency, "JPY");
        assert_eq!(results[0].converted_amount, 10.0);
        assert_eq!(results[1].converted_amount, 0.0);
        assert_eq!(results[2].path, Some(RatePath::Identity));
        assert_eq!(results[2].converted_amount, 5.0);
    }

    #[test]
    fn test_bulk_empty_input() {
        let service = BulkConversionService::new(cache_with("USD", &[("EUR", 0.92)]));
        assert!(service.calculate_bulk(&[], "EUR").is_empty());
    }
}
