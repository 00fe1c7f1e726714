//! Auth routes.
//!
//! Thin adapters over [`AuthFlow`](crate::flow::AuthFlow): each picks a
//! provider and whether to establish a browser session.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use marketplace_common::{AuthResponse, IdTokenRequest, Provider, SignInRequest, SignUpRequest};

use crate::accounts::{NewAccount, ProviderError};
use crate::auth::cookie::{clear_session_cookie, extract_session_token, session_cookie};
use crate::auth::SessionCredential;
use crate::error::{ApiError, Result};
use crate::flow::FlowOptions;
use crate::models::IdentityClaim;
use crate::phone::normalize_phone;
use crate::AppState;

fn reconciled_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

fn set_session_cookie(state: &AppState, credential: &SessionCredential) -> Result<HeaderMap> {
    let cookie = session_cookie(
        &state.config.session.cookie_name,
        &credential.value,
        credential.max_age.as_secs(),
        state.config.server.is_production(),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

/// Create the platform account, or recover one a failed earlier attempt left behind.
///
/// An existing email is only recovered when the password signs in to it.
async fn password_account(state: &AppState, account: &NewAccount) -> Result<IdentityClaim> {
    match state.accounts.create_account(account).await {
        Ok(claim) => Ok(claim),
        Err(ProviderError::AlreadyExists) => {
            match state.accounts.sign_in(&account.email, &account.password).await {
                Ok(claim) => {
                    tracing::info!("Recovering existing account {} at sign-up", claim.subject_id);
                    Ok(claim)
                }
                Err(ProviderError::Rejected(_)) => Err(ApiError::already_exists(
                    ProviderError::AlreadyExists.to_string(),
                    None,
                )),
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// POST /api/auth/signup - create a password account and its user record
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing));
    }

    let phone_number = normalize_phone(
        &request.phone_number,
        &state.config.phone.default_country_code,
    )?;

    let account = NewAccount {
        email: request.email.trim().to_string(),
        password: request.password.clone(),
        display_name: format!("{} {}", request.first_name.trim(), request.last_name.trim()),
    };
    let claim = IdentityClaim {
        phone_number: Some(phone_number),
        ..password_account(&state, &account).await?
    };

    let reconciliation = state.reconciler.reconcile(&claim, Provider::Password).await?;
    if !reconciliation.created {
        let message = format!("User {} already exists", reconciliation.uid);
        return Err(ApiError::already_exists(message, Some(reconciliation.uid)));
    }

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::reconciled(reconciliation.uid, true)),
    ))
}

/// POST /api/auth/signin - check that a user exists for an email
///
/// The client verifies the password against the identity provider itself.
async fn signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<AuthResponse>> {
    if request.email.trim().is_empty() {
        return Err(ApiError::MissingFields(vec!["email"]));
    }

    let user = state
        .store
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user with this email".to_string()))?;

    Ok(Json(AuthResponse::ok(user.uid)))
}

/// POST /api/auth/google/register - first-time Google registration
async fn google_register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdTokenRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let outcome = state.flow.run(&request.id_token, FlowOptions::google().registration()).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::reconciled(outcome.uid, outcome.created)),
    ))
}

/// POST /api/auth/google/signin - Google sign-in, creating the record if needed
async fn google_signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdTokenRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let outcome = state.flow.run(&request.id_token, FlowOptions::google()).await?;
    Ok((
        reconciled_status(outcome.created),
        Json(AuthResponse::reconciled(outcome.uid, outcome.created)),
    ))
}

/// POST /api/auth/session - reconcile and set the session cookie
///
/// The record's provider comes from the token's sign-in method, defaulting to google.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdTokenRequest>,
) -> Result<Response> {
    let outcome = state.flow.run(&request.id_token, FlowOptions::google().with_session()).await?;
    let credential = outcome
        .session
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Session was not issued".to_string()))?;
    let headers = set_session_cookie(&state, credential)?;

    Ok((
        reconciled_status(outcome.created),
        headers,
        Json(AuthResponse::reconciled(outcome.uid.clone(), outcome.created)),
    )
        .into_response())
}

/// GET /api/auth/session - report the user behind the session cookie
async fn current_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>> {
    let token = extract_session_token(&headers, &state.config.session.cookie_name)
        .ok_or_else(|| ApiError::InvalidToken("No session".to_string()))?;
    let claims = state.sessions.verify_session(&token)?;
    Ok(Json(AuthResponse::ok(claims.sub)))
}

/// POST /api/auth/logout - clear the session cookie
async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    match clear_session_cookie(
        &state.config.session.cookie_name,
        state.config.server.is_production(),
    ) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(e) => tracing::error!("Failed to build logout cookie: {}", e),
    }
    (
        StatusCode::OK,
        headers,
        Json(AuthResponse::message("Logged out")),
    )
        .into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/google/register", post(google_register))
        .route("/api/auth/google/signin", post(google_signin))
        .route("/api/auth/session", post(create_session).get(current_session))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}
