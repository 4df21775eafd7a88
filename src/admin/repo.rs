use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    trips::repo_types::{Rating, Report, Trip},
};

/// Reports newest first, optionally filtered on the resolved flag.
pub async fn list_reports(
    db: &PgPool,
    resolved: Option<bool>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Report>> {
    let rows = sqlx::query_as::<_, Report>(
        r#"
        SELECT id, trip_id, reporter_id, reported_driver_id, reason, resolved, created_at
          FROM reports
         WHERE ($1::boolean IS NULL OR resolved = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(resolved)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list reports")?;
    Ok(rows)
}

/// Marks a report resolved. Returns `None` when no such report exists;
/// resolving twice is a no-op.
pub async fn resolve_report(db: &PgPool, report_id: Uuid) -> anyhow::Result<Option<Report>> {
    let row = sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports
           SET resolved = TRUE
         WHERE id = $1
        RETURNING id, trip_id, reporter_id, reported_driver_id, reason, resolved, created_at
        "#,
    )
    .bind(report_id)
    .fetch_optional(db)
    .await
    .context("resolve report")?;
    Ok(row)
}

/// Ratings newest first, optionally only those received by one driver.
pub async fn list_ratings(
    db: &PgPool,
    driver_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Rating>> {
    let rows = sqlx::query_as::<_, Rating>(
        r#"
        SELECT id, trip_id, passenger_id, driver_id, stars, comment, created_at
          FROM ratings
         WHERE ($1::uuid IS NULL OR driver_id = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(driver_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list ratings")?;
    Ok(rows)
}

pub async fn list_users(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, name, is_admin, password_hash, created_at
          FROM users
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list users")?;
    Ok(rows)
}

/// Every trip, past ones included, latest departure first.
pub async fn list_trips(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Trip>> {
    let rows = sqlx::query_as::<_, Trip>(
        r#"
        SELECT id, driver_id, origin, destination, departure_time, seats, created_at
          FROM trips
         ORDER BY departure_time DESC
         LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list trips")?;
    Ok(rows)
}

pub async fn set_admin(
    db: &PgPool,
    user_id: Uuid,
    is_admin: bool,
) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
           SET is_admin = $2
         WHERE id = $1
        RETURNING id, email, name, is_admin, password_hash, created_at
        "#,
    )
    .bind(user_id)
    .bind(is_admin)
    .fetch_optional(db)
    .await
    .context("set admin flag")?;
    Ok(row)
}
