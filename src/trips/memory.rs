use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ledger::{check_join, check_rating, LedgerError, LedgerStore};
use super::repo_types::{Membership, NewRating, NewReport, Rating, Report, Trip};
use crate::auth::repo_types::User;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    trips: Vec<Trip>,
    memberships: Vec<Membership>,
    ratings: Vec<Rating>,
    reports: Vec<Report>,
}

/// Ledger store kept in process memory. One lock guards every table, so a
/// join's count check and insert cannot interleave with another join.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl MemoryLedgerStore {
    pub async fn insert_user(&self, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@usc.edu.co", name.to_lowercase()),
            name: name.into(),
            is_admin: false,
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().await.users.push(user.clone());
        user
    }

    pub async fn insert_trip(&self, driver_id: Uuid, seats: i32) -> Trip {
        let now = OffsetDateTime::now_utc();
        let trip = Trip {
            id: Uuid::new_v4(),
            driver_id,
            origin: "Campus Pampalinda".into(),
            destination: "Unicentro".into(),
            departure_time: now + time::Duration::hours(2),
            seats,
            created_at: now,
        };
        self.tables.lock().await.trips.push(trip.clone());
        trip
    }

    pub async fn ratings(&self) -> Vec<Rating> {
        self.tables.lock().await.ratings.clone()
    }

    pub async fn reports(&self) -> Vec<Report> {
        self.tables.lock().await.reports.clone()
    }
}

impl Tables {
    fn count(&self, trip_id: Uuid) -> i64 {
        self.memberships
            .iter()
            .filter(|m| m.trip_id == trip_id)
            .count() as i64
    }

    fn exists(&self, trip_id: Uuid, user_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|m| m.trip_id == trip_id && m.user_id == user_id)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.trips.iter().find(|t| t.id == trip_id).cloned())
    }

    async fn membership_count(&self, trip_id: Uuid) -> Result<i64, LedgerError> {
        Ok(self.tables.lock().await.count(trip_id))
    }

    async fn exists_membership(&self, trip_id: Uuid, user_id: Uuid) -> Result<bool, LedgerError> {
        Ok(self.tables.lock().await.exists(trip_id, user_id))
    }

    async fn join(&self, trip_id: Uuid, user_id: Uuid) -> Result<Membership, LedgerError> {
        let mut tables = self.tables.lock().await;
        let seats = tables
            .trips
            .iter()
            .find(|t| t.id == trip_id)
            .map(|t| t.seats)
            .ok_or(LedgerError::TripNotFound)?;
        // yield while holding the guard so racing joins actually contend
        tokio::task::yield_now().await;
        check_join(tables.count(trip_id), seats, tables.exists(trip_id, user_id))?;
        let membership = Membership {
            id: Uuid::new_v4(),
            trip_id,
            user_id,
            joined_at: OffsetDateTime::now_utc(),
        };
        tables.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn rate(&self, rating: NewRating) -> Result<Rating, LedgerError> {
        let mut tables = self.tables.lock().await;
        check_rating(tables.exists(rating.trip_id, rating.passenger_id))?;
        let row = Rating {
            id: Uuid::new_v4(),
            trip_id: rating.trip_id,
            passenger_id: rating.passenger_id,
            driver_id: rating.driver_id,
            stars: rating.stars,
            comment: rating.comment,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.ratings.push(row.clone());
        Ok(row)
    }

    async fn report(&self, report: NewReport) -> Result<Report, LedgerError> {
        let row = Report {
            id: Uuid::new_v4(),
            trip_id: report.trip_id,
            reporter_id: report.reporter_id,
            reported_driver_id: report.reported_driver_id,
            reason: report.reason,
            resolved: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().await.reports.push(row.clone());
        Ok(row)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }
}
