use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{JoinedTrip, Trip};
use crate::auth::dto::PublicUser;

pub const MIN_REPORT_REASON_LEN: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub origin: String,
    pub destination: String,
    #[serde(with = "time::serde::rfc3339")]
    pub departure_time: OffsetDateTime,
    pub seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct RateTripRequest {
    pub stars: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportTripRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct TripDetails {
    #[serde(flatten)]
    pub trip: Trip,
    /// `None` only if the driver's account is gone.
    pub driver: Option<PublicUser>,
    pub passenger_count: i64,
    pub seats_left: i64,
    pub already_joined: bool,
}

#[derive(Debug, Serialize)]
pub struct SeatsLeft {
    pub trip_id: Uuid,
    pub seats_left: i64,
}

#[derive(Debug, Serialize)]
pub struct MyTrips {
    pub created: Vec<Trip>,
    pub joined: Vec<JoinedTrip>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

/// Trimmed, non-empty text or `None`.
pub fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}
