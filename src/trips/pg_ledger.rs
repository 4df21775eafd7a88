use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::ledger::{check_join, check_rating, LedgerError, LedgerStore};
use super::repo_types::{Membership, NewRating, NewReport, Rating, Report, Trip};
use crate::auth::repo_types::User;

#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn storage(e: sqlx::Error, what: &'static str) -> LedgerError {
    LedgerError::StorageUnavailable(anyhow::Error::new(e).context(what))
}

/// Constraint failures on insert are rejections of the request, not outages.
/// The only foreign keys left unchecked by the time we insert are the
/// acting user's.
fn insert_failure(e: sqlx::Error, what: &'static str) -> LedgerError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => LedgerError::AlreadyJoined,
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => LedgerError::UnknownUser,
        e => storage(e, what),
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, LedgerError> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            SELECT id, driver_id, origin, destination, departure_time, seats, created_at
            FROM trips
            WHERE id = $1
            "#,
        )
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| storage(e, "find trip"))?;
        Ok(trip)
    }

    async fn membership_count(&self, trip_id: Uuid) -> Result<i64, LedgerError> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM trip_passengers WHERE trip_id = $1"#)
                .bind(trip_id)
                .fetch_one(&self.db)
                .await
                .map_err(|e| storage(e, "count memberships"))?;
        Ok(count)
    }

    async fn exists_membership(&self, trip_id: Uuid, user_id: Uuid) -> Result<bool, LedgerError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM trip_passengers WHERE trip_id = $1 AND user_id = $2)"#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| storage(e, "check membership"))?;
        Ok(exists)
    }

    async fn join(&self, trip_id: Uuid, user_id: Uuid) -> Result<Membership, LedgerError> {
        let mut tx = self.db.begin().await.map_err(|e| storage(e, "begin tx"))?;

        // The row lock is the per-trip serialization point: concurrent joins
        // on the same trip queue here and each sees the previous commit.
        let seats: Option<i32> =
            sqlx::query_scalar(r#"SELECT seats FROM trips WHERE id = $1 FOR UPDATE"#)
                .bind(trip_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| storage(e, "lock trip"))?;
        let Some(seats) = seats else {
            return Err(LedgerError::TripNotFound);
        };

        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM trip_passengers WHERE trip_id = $1"#)
                .bind(trip_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| storage(e, "count memberships"))?;
        let already_joined: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM trip_passengers WHERE trip_id = $1 AND user_id = $2)"#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage(e, "check membership"))?;

        check_join(count, seats, already_joined)?;

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO trip_passengers (trip_id, user_id)
            VALUES ($1, $2)
            RETURNING id, trip_id, user_id, joined_at
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let e = insert_failure(e, "insert membership");
            if !e.is_retryable() {
                warn!(%trip_id, %user_id, error = %e, "membership insert rejected by constraint");
            }
            e
        })?;

        tx.commit().await.map_err(|e| storage(e, "commit tx"))?;
        info!(%trip_id, %user_id, remaining = i64::from(seats) - count - 1, "passenger joined trip");
        Ok(membership)
    }

    async fn rate(&self, rating: NewRating) -> Result<Rating, LedgerError> {
        let mut tx = self.db.begin().await.map_err(|e| storage(e, "begin tx"))?;

        let is_participant: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM trip_passengers WHERE trip_id = $1 AND user_id = $2)"#,
        )
        .bind(rating.trip_id)
        .bind(rating.passenger_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage(e, "check membership"))?;
        check_rating(is_participant)?;

        let row = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (trip_id, passenger_id, driver_id, stars, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, trip_id, passenger_id, driver_id, stars, comment, created_at
            "#,
        )
        .bind(rating.trip_id)
        .bind(rating.passenger_id)
        .bind(rating.driver_id)
        .bind(rating.stars)
        .bind(rating.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_failure(e, "insert rating"))?;

        tx.commit().await.map_err(|e| storage(e, "commit tx"))?;
        Ok(row)
    }

    async fn report(&self, report: NewReport) -> Result<Report, LedgerError> {
        let row = sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (trip_id, reporter_id, reported_driver_id, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, trip_id, reporter_id, reported_driver_id, reason, resolved, created_at
            "#,
        )
        .bind(report.trip_id)
        .bind(report.reporter_id)
        .bind(report.reported_driver_id)
        .bind(report.reason)
        .fetch_one(&self.db)
        .await
        .map_err(|e| insert_failure(e, "insert report"))?;
        Ok(row)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError> {
        User::find_by_id(&self.db, user_id)
            .await
            .map_err(LedgerError::StorageUnavailable)
    }
}
