use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::{error, warn};
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenKind};
use super::repo_types::User;
use crate::state::AppState;

/// Authenticated caller, taken from a bearer access token.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = bearer_token(auth).ok_or((
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header".to_string(),
        ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Access token required".to_string(),
            ));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// Authenticated caller whose account carries the admin flag.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = User::find_by_id(&state.db, user_id)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "load admin user failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

        if !user.is_admin {
            warn!(%user_id, "admin route denied");
            return Err((StatusCode::FORBIDDEN, "Administrator only".to_string()));
        }
        Ok(AdminUser(user))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }

    async fn extract(state: &AppState, header: Option<String>) -> Result<Uuid, StatusCode> {
        let mut builder = Request::builder().uri("/api/v1/me");
        if let Some(h) = header {
            builder = builder.header(axum::http::header::AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state)
            .await
            .map(|AuthUser(id)| id)
            .map_err(|(status, _)| status)
    }

    #[tokio::test]
    async fn auth_user_accepts_access_token_only() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();

        let access = keys.sign_access(user_id).unwrap();
        assert_eq!(
            extract(&state, Some(format!("Bearer {access}"))).await,
            Ok(user_id)
        );

        let refresh = keys.sign_refresh(user_id).unwrap();
        assert_eq!(
            extract(&state, Some(format!("Bearer {refresh}"))).await,
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(extract(&state, None).await, Err(StatusCode::UNAUTHORIZED));
        assert_eq!(
            extract(&state, Some("Bearer garbage".into())).await,
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
