//! Seat accounting and participation checks for trips.
//!
//! The policy functions here are pure; a [`LedgerStore`] applies them against
//! persisted state and is responsible for running the join check and insert
//! as one atomic unit per trip.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{Membership, NewRating, NewReport, Rating, Report, Trip};
use crate::auth::repo_types::User;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("trip not found")]
    TripNotFound,
    #[error("no seats available on this trip")]
    CapacityExceeded,
    #[error("already joined this trip")]
    AlreadyJoined,
    #[error("only passengers who joined the trip can rate it")]
    NotAParticipant,
    /// The acting user has no account row, e.g. deleted after the token was issued.
    #[error("user not found")]
    UnknownUser,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),
}

impl LedgerError {
    /// Only storage failures are worth retrying; every other rejection is
    /// deterministic given the current state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageUnavailable(_))
    }
}

/// Join policy. Capacity is checked before duplicates, so a passenger already
/// on a full trip sees `CapacityExceeded`.
pub fn check_join(count: i64, seats: i32, already_joined: bool) -> Result<(), LedgerError> {
    if count >= i64::from(seats) {
        debug!(count, seats, "join rejected: capacity exceeded");
        return Err(LedgerError::CapacityExceeded);
    }
    if already_joined {
        debug!("join rejected: already joined");
        return Err(LedgerError::AlreadyJoined);
    }
    Ok(())
}

pub fn check_rating(is_participant: bool) -> Result<(), LedgerError> {
    if is_participant {
        Ok(())
    } else {
        Err(LedgerError::NotAParticipant)
    }
}

pub fn seats_left(seats: i32, count: i64) -> i64 {
    (i64::from(seats) - count).max(0)
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, LedgerError>;
    async fn membership_count(&self, trip_id: Uuid) -> Result<i64, LedgerError>;
    async fn exists_membership(&self, trip_id: Uuid, user_id: Uuid) -> Result<bool, LedgerError>;
    /// Applies [`check_join`] and inserts the membership atomically with
    /// respect to other joins on the same trip.
    async fn join(&self, trip_id: Uuid, user_id: Uuid) -> Result<Membership, LedgerError>;
    /// Applies [`check_rating`] and inserts the rating.
    async fn rate(&self, rating: NewRating) -> Result<Rating, LedgerError>;
    async fn report(&self, report: NewReport) -> Result<Report, LedgerError>;
    /// Account lookup for the people a trip involves (its driver, mostly).
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError>;
}

/// Remaining seats on a trip, never negative.
pub async fn trip_seats_left(store: &dyn LedgerStore, trip_id: Uuid) -> Result<i64, LedgerError> {
    let trip = store
        .find_trip(trip_id)
        .await?
        .ok_or(LedgerError::TripNotFound)?;
    let count = store.membership_count(trip_id).await?;
    Ok(seats_left(trip.seats, count))
}
