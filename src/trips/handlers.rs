use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, extractors::AuthUser},
    state::AppState,
};

use super::dto::{
    non_blank, CreateTripRequest, MyTrips, Pagination, RateTripRequest, ReportTripRequest,
    SeatsLeft, TripDetails, MIN_REPORT_REASON_LEN,
};
use super::ledger::{seats_left, trip_seats_left, LedgerError};
use super::repo;
use super::repo_types::{Membership, NewRating, NewReport, NewTrip, Rating, Report, Trip};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/seats", get(get_seats_left))
        .route("/me/trips", get(my_trips))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/:id/join", post(join_trip))
        .route("/trips/:id/ratings", post(rate_trip))
        .route("/trips/:id/reports", post(report_trip))
}

fn ledger_rejection(e: LedgerError) -> (StatusCode, String) {
    let status = match &e {
        LedgerError::TripNotFound => StatusCode::NOT_FOUND,
        LedgerError::CapacityExceeded | LedgerError::AlreadyJoined => StatusCode::CONFLICT,
        LedgerError::NotAParticipant => StatusCode::FORBIDDEN,
        LedgerError::UnknownUser => {
            return (StatusCode::UNAUTHORIZED, "User not found".into());
        }
        LedgerError::StorageUnavailable(source) => {
            error!(error = ?source, "ledger storage failure");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage unavailable, try again".into(),
            );
        }
    };
    (status, e.to_string())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = ?e, "trip query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

async fn load_trip(state: &AppState, trip_id: Uuid) -> Result<Trip, (StatusCode, String)> {
    state
        .ledger
        .find_trip(trip_id)
        .await
        .map_err(ledger_rejection)?
        .ok_or_else(|| ledger_rejection(LedgerError::TripNotFound))
}

#[instrument(skip(state, body))]
pub async fn create_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateTripRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Trip>), (StatusCode, String)> {
    let (Some(origin), Some(destination)) = (non_blank(&body.origin), non_blank(&body.destination))
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "origin and destination are required".into(),
        ));
    };
    if body.seats < 0 {
        return Err((StatusCode::BAD_REQUEST, "seats must not be negative".into()));
    }

    let trip = repo::create_trip(
        &state.db,
        NewTrip {
            driver_id: user_id,
            origin,
            destination,
            departure_time: body.departure_time,
            seats: body.seats,
        },
    )
    .await
    .map_err(internal)?;

    info!(trip_id = %trip.id, driver_id = %user_id, seats = trip.seats, "trip created");
    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/trips/{}", trip.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(trip)))
}

#[instrument(skip(state))]
pub async fn list_trips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Trip>>, (StatusCode, String)> {
    let (limit, offset) = p.clamped();
    debug!(%user_id, limit, offset, "listing upcoming trips");
    let trips = repo::list_upcoming(&state.db, OffsetDateTime::now_utc(), limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(trips))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<TripDetails>, (StatusCode, String)> {
    let trip = load_trip(&state, trip_id).await?;
    let passenger_count = state
        .ledger
        .membership_count(trip_id)
        .await
        .map_err(ledger_rejection)?;
    let already_joined = state
        .ledger
        .exists_membership(trip_id, user_id)
        .await
        .map_err(ledger_rejection)?;
    let driver = state
        .ledger
        .find_user(trip.driver_id)
        .await
        .map_err(ledger_rejection)?
        .map(PublicUser::from);
    if driver.is_none() {
        warn!(%trip_id, driver_id = %trip.driver_id, "trip driver has no account");
    }

    Ok(Json(TripDetails {
        seats_left: seats_left(trip.seats, passenger_count),
        trip,
        driver,
        passenger_count,
        already_joined,
    }))
}

#[instrument(skip(state))]
pub async fn get_seats_left(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<SeatsLeft>, (StatusCode, String)> {
    let seats_left = trip_seats_left(state.ledger.as_ref(), trip_id)
        .await
        .map_err(ledger_rejection)?;
    Ok(Json(SeatsLeft { trip_id, seats_left }))
}

#[instrument(skip(state))]
pub async fn join_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Membership>), (StatusCode, String)> {
    match state.ledger.join(trip_id, user_id).await {
        Ok(membership) => Ok((StatusCode::CREATED, Json(membership))),
        Err(e) => {
            warn!(%trip_id, %user_id, error = %e, retryable = e.is_retryable(), "join rejected");
            Err(ledger_rejection(e))
        }
    }
}

#[instrument(skip(state, body))]
pub async fn rate_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<Uuid>,
    Json(body): Json<RateTripRequest>,
) -> Result<(StatusCode, Json<Rating>), (StatusCode, String)> {
    let trip = load_trip(&state, trip_id).await?;
    let rating = NewRating {
        trip_id,
        passenger_id: user_id,
        driver_id: trip.driver_id,
        stars: body.stars,
        comment: body.comment.as_deref().and_then(non_blank),
    };

    match state.ledger.rate(rating).await {
        Ok(row) => {
            info!(%trip_id, %user_id, stars = row.stars, "trip rated");
            Ok((StatusCode::CREATED, Json(row)))
        }
        Err(e) => {
            warn!(%trip_id, %user_id, error = %e, "rating rejected");
            Err(ledger_rejection(e))
        }
    }
}

#[instrument(skip(state, body))]
pub async fn report_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(trip_id): Path<Uuid>,
    Json(body): Json<ReportTripRequest>,
) -> Result<(StatusCode, Json<Report>), (StatusCode, String)> {
    let reason = body.reason.trim();
    if reason.chars().count() < MIN_REPORT_REASON_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("reason must be at least {MIN_REPORT_REASON_LEN} characters"),
        ));
    }

    let trip = load_trip(&state, trip_id).await?;
    let report = state
        .ledger
        .report(NewReport {
            trip_id: Some(trip_id),
            reporter_id: user_id,
            reported_driver_id: trip.driver_id,
            reason: reason.to_string(),
        })
        .await
        .map_err(ledger_rejection)?;

    info!(report_id = %report.id, %trip_id, reporter_id = %user_id, "driver reported");
    Ok((StatusCode::CREATED, Json(report)))
}

#[instrument(skip(state))]
pub async fn my_trips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MyTrips>, (StatusCode, String)> {
    let created = repo::list_by_driver(&state.db, user_id)
        .await
        .map_err(internal)?;
    let joined = repo::list_joined_by_user(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(MyTrips { created, joined }))
}
