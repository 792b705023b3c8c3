use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        repo::{self, Role, User},
        services::{hash_password, is_valid_email, verify_password, AuthUser, JwtKeys},
    },
    error::{ApiError, ApiResult},
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

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    if payload.display_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Display name is required".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered"));
    }

    // A child may be linked to its guardian at registration. Guardians never
    // carry a parent_id.
    let parent_id = match (payload.role, payload.parent_id) {
        (Role::Child, Some(pid)) => {
            let parent = User::find_by_id(&state.db, pid)
                .await?
                .ok_or(ApiError::NotFound("guardian"))?;
            if parent.role != Role::Guardian {
                return Err(ApiError::BadRequest("parent_id must reference a guardian".into()));
            }
            Some(pid)
        }
        (Role::Child, None) => None,
        (Role::Guardian, Some(_)) => {
            return Err(ApiError::BadRequest("guardians cannot have a parent".into()))
        }
        (Role::Guardian, None) => None,
    };

    let hash = hash_password(&payload.password)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut tx,
        &payload.email,
        payload.display_name.trim(),
        &hash,
        payload.role,
        parent_id,
    )
    .await?;
    if let Some(pid) = parent_id {
        repo::link_child(&mut tx, pid, user.id).await?;
    }
    tx.commit().await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::BadRequest("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::BadRequest("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serialization_hides_nothing_sensitive() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "kid@example.com".to_string(),
            display_name: "Kid".to_string(),
            role: Role::Child,
            parent_id: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("kid@example.com"));
        assert!(json.contains("\"role\":\"child\""));
        assert!(!json.contains("password"));
    }
}
