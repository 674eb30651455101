use std::time::Duration;

use crate::{functions::ttl_millis, scripts::*, NodeError, Pool};

#[inline]
pub(crate) async fn acquire_lock(
    pool: &dyn Pool,
    key: &str,
    token: &str,
    ttl: Duration,
) -> Result<bool, NodeError> {
    let mut conn = pool.get().await?;

    conn.set_nx(key, token, ttl).await
}

#[inline]
pub(crate) async fn release_lock(
    pool: &dyn Pool,
    key: &str,
    token: &str,
) -> Result<bool, NodeError> {
    let mut conn = pool.get().await?;

    let deleted = conn.eval(&DELETE_IF_VALUE_MATCHES, &[key], &[token]).await?;

    Ok(deleted != 0)
}

#[inline]
pub(crate) async fn touch_lock(
    pool: &dyn Pool,
    key: &str,
    token: &str,
    ttl: Duration,
) -> Result<bool, NodeError> {
    let mut conn = pool.get().await?;

    let ttl = ttl_millis(ttl).to_string();

    let touched = conn.eval(&EXPIRE_IF_VALUE_MATCHES, &[key], &[token, ttl.as_str()]).await?;

    Ok(touched != 0)
}

#[inline]
pub(crate) async fn validate_lock(
    pool: &dyn Pool,
    key: &str,
    token: &str,
) -> Result<bool, NodeError> {
    let mut conn = pool.get().await?;

    Ok(conn.get(key).await?.as_deref() == Some(token))
}
