use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::is_unique_violation,
        repo_types::User,
        services::{is_valid_email, issue_tokens, validate_registration},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn internal(e: anyhow::Error, what: &'static str) -> (StatusCode, String) {
    error!(error = %e, "{what} failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

/// A concurrent registration can win the race past `find_by_email`; the
/// unique index on `users.email` then rejects our insert.
fn create_user_failure(e: anyhow::Error, email: &str) -> (StatusCode, String) {
    if is_unique_violation(&e) {
        warn!(email, "email already registered (unique index)");
        return (StatusCode::CONFLICT, "Email already registered".into());
    }
    internal(e, "create user")
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    if let Err(reason) = validate_registration(&mut payload, &state.config.institutional_domain) {
        warn!(email = %payload.email, reason, "registration rejected");
        return Err((StatusCode::BAD_REQUEST, reason.into()));
    }

    match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err((StatusCode::CONFLICT, "Email already registered".into()));
        }
        Ok(None) => {}
        Err(e) => return Err(internal(e, "find_by_email")),
    }

    let hash = hash_password(&payload.password).map_err(|e| internal(e, "hash_password"))?;
    let user = match User::create(&state.db, &payload.email, &payload.name, &hash).await {
        Ok(user) => user,
        Err(e) => return Err(create_user_failure(e, &payload.email)),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, user).map_err(|e| internal(e, "jwt sign"))?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => return Err(internal(e, "find_by_email")),
    };

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| internal(e, "verify_password"))?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    let body = issue_tokens(&keys, user).map_err(|e| internal(e, "jwt sign"))?;
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        (StatusCode::UNAUTHORIZED, "Invalid refresh token".to_string())
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(|e| internal(e, "find_by_id"))?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    let body = issue_tokens(&keys, user).map_err(|e| internal(e, "jwt sign"))?;
    Ok(Json(body))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(|e| internal(e, "find_by_id"))?
        .ok_or_else(|| {
            error!(%user_id, "user not found");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })?;

    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_hides_password_hash() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "ana@usc.edu.co".into(),
            name: "Ana".into(),
            is_admin: false,
            password_hash: "$argon2id$secret".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_string(&PublicUser::from(user.clone())).unwrap();
        assert!(json.contains("ana@usc.edu.co"));
        assert!(!json.contains("argon2"));

        let raw = serde_json::to_string(&user).unwrap();
        assert!(!raw.contains("password_hash"));
    }

    #[tokio::test]
    async fn register_rejects_foreign_domain_before_touching_db() {
        let state = AppState::fake();
        let payload = RegisterRequest {
            email: "ana@gmail.com".into(),
            name: "Ana".into(),
            password: "secreto".into(),
            password_confirm: "secreto".into(),
        };
        let err = register(State(state), Json(payload)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn duplicate_email_insert_is_a_conflict() {
        use anyhow::Context;
        use sqlx::error::ErrorKind;

        let dup = Err::<(), _>(crate::test_support::db_error(ErrorKind::UniqueViolation))
            .context("insert user")
            .unwrap_err();
        let (status, message) = create_user_failure(dup, "ana@usc.edu.co");
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Email already registered");

        let (status, _) = create_user_failure(anyhow::anyhow!("pool closed"), "ana@usc.edu.co");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let err = refresh(State(state), Json(RefreshRequest { refresh_token: token }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
