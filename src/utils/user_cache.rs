use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// user_id => display name, for decorating document and leave listings
/// without a join per row.
pub static DISPLAY_NAME_CACHE: Lazy<Cache<u64, String>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

pub async fn remember(user_id: u64, display_name: &str) {
    DISPLAY_NAME_CACHE
        .insert(user_id, display_name.to_string())
        .await;
}

/// Cached display name with a database fallback. Unknown users stay `None`
/// and are not cached.
pub async fn display_name(pool: &MySqlPool, user_id: u64) -> Option<String> {
    if let Some(name) = DISPLAY_NAME_CACHE.get(&user_id).await {
        return Some(name);
    }

    let name = sqlx::query_scalar::<_, String>("SELECT display_name FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()?;

    remember(user_id, &name).await;
    Some(name)
}

/// Load recently active users into the in-memory cache (batched).
pub async fn warmup_display_names(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (u64, String)>(
        r#"
        SELECT id, display_name
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let (user_id, name) = row?;
        batch.push((user_id, name));
        total_count += 1;

        if batch.len() >= batch_size {
            flush(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        flush(&batch).await;
    }

    log::info!(
        "Display-name cache warmup complete: {} recent users (last {} days)",
        total_count,
        days
    );

    Ok(())
}

async fn flush(batch: &[(u64, String)]) {
    let futures: Vec<_> = batch
        .iter()
        .map(|(id, name)| DISPLAY_NAME_CACHE.insert(*id, name.clone()))
        .collect();

    futures::future::join_all(futures).await;
}
