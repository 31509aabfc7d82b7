use anyhow::Result;
use chrono::NaiveDate;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::holiday::Holiday;

/// date => holiday name. Ordinary days are cached as None so repeat
/// lookups skip the database either way.
static HOLIDAY_CACHE: Lazy<Cache<NaiveDate, Option<String>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(4_096)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

/// Read-through lookup of the declared-holiday name for a date.
pub async fn holiday_name(
    pool: &MySqlPool,
    date: NaiveDate,
) -> Result<Option<String>, sqlx::Error> {
    if let Some(hit) = HOLIDAY_CACHE.get(&date).await {
        return Ok(hit);
    }

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM holidays WHERE date = ?")
        .bind(date)
        .fetch_optional(pool)
        .await?;

    HOLIDAY_CACHE.insert(date, name.clone()).await;
    Ok(name)
}

/// Batch-insert a slice of declared holidays
async fn batch_mark(holidays: &[Holiday]) {
    let futures: Vec<_> = holidays
        .iter()
        .map(|h| HOLIDAY_CACHE.insert(h.date, Some(h.name.clone())))
        .collect();

    // Await all insertions concurrently
    futures::future::join_all(futures).await;
}

/// Load one calendar year of declared holidays into the cache (batched)
pub async fn warmup_holiday_cache(
    pool: &MySqlPool,
    year: i32,
    batch_size: usize,
) -> Result<()> {
    let mut stream = sqlx::query_as::<_, Holiday>(
        r#"
        SELECT date, name
        FROM holidays
        WHERE YEAR(date) = ?
        ORDER BY date
        "#,
    )
    .bind(year)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let holiday: Holiday = row?;
        batch.push(holiday);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_mark(&batch).await;
            batch.clear();
        }
    }

    // Insert any remaining holidays
    if !batch.is_empty() {
        batch_mark(&batch).await;
    }

    log::info!(
        "Holiday cache warmup complete: {} declared holidays in {}",
        total_count,
        year
    );

    Ok(())
}
