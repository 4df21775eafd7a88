use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Trip offered by a driver.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub seats: i32, // capacity, not validated against zero
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A passenger seat on a trip (`trip_passengers` row).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    pub stars: i32,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub trip_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub reported_driver_id: Uuid,
    pub reason: String,
    pub resolved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Joined trip as listed on the passenger's profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JoinedTrip {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub trip: Trip,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: OffsetDateTime,
    pub seats: i32,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Uuid,
    pub stars: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub trip_id: Option<Uuid>,
    pub reporter_id: Uuid,
    pub reported_driver_id: Uuid,
    pub reason: String,
}
