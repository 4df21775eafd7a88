use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{JoinedTrip, NewTrip, Trip};

pub async fn create_trip(db: &PgPool, trip: NewTrip) -> anyhow::Result<Trip> {
    let row = sqlx::query_as::<_, Trip>(
        r#"
        INSERT INTO trips (driver_id, origin, destination, departure_time, seats)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, driver_id, origin, destination, departure_time, seats, created_at
        "#,
    )
    .bind(trip.driver_id)
    .bind(trip.origin)
    .bind(trip.destination)
    .bind(trip.departure_time)
    .bind(trip.seats)
    .fetch_one(db)
    .await
    .context("insert trip")?;
    Ok(row)
}

/// Trips departing at or after `now`, soonest first.
pub async fn list_upcoming(
    db: &PgPool,
    now: OffsetDateTime,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Trip>> {
    let rows = sqlx::query_as::<_, Trip>(
        r#"
        SELECT id, driver_id, origin, destination, departure_time, seats, created_at
        FROM trips
        WHERE departure_time >= $1
        ORDER BY departure_time ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(now)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list upcoming trips")?;
    Ok(rows)
}

pub async fn list_by_driver(db: &PgPool, driver_id: Uuid) -> anyhow::Result<Vec<Trip>> {
    let rows = sqlx::query_as::<_, Trip>(
        r#"
        SELECT id, driver_id, origin, destination, departure_time, seats, created_at
        FROM trips
        WHERE driver_id = $1
        ORDER BY departure_time DESC
        "#,
    )
    .bind(driver_id)
    .fetch_all(db)
    .await
    .context("list trips by driver")?;
    Ok(rows)
}

pub async fn list_joined_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<JoinedTrip>> {
    let rows = sqlx::query_as::<_, JoinedTrip>(
        r#"
        SELECT t.id, t.driver_id, t.origin, t.destination, t.departure_time, t.seats,
               t.created_at, tp.joined_at
          FROM trip_passengers tp
          JOIN trips t ON t.id = tp.trip_id
         WHERE tp.user_id = $1
         ORDER BY t.departure_time DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list joined trips")?;
    Ok(rows)
}
