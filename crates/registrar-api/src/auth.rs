//! JWT authentication: registration, login, and the bearer-token extractor.
//!
//! Passwords are argon2-hashed before they reach the store; the stored PHC
//! string is schema-redacted from every read. Tokens are HS256 JWTs whose
//! subject is the user's email.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{StatusCode, header, request::Parts},
  response::IntoResponse,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use registrar_core::{
  models::{EntityModel as _, User},
  record::Filter,
  schema::EntityKind,
  store::RecordStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Token-signing configuration.
#[derive(Clone)]
pub struct AuthConfig {
  /// HMAC secret for HS256 signing.
  pub jwt_secret:     String,
  /// Issued-token lifetime in seconds.
  pub token_ttl_secs: u64,
}

/// JWT claims; `sub` is the user's email.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String,
  pub exp: u64,
}

pub fn issue_token(config: &AuthConfig, email: &str) -> Result<String, ApiError> {
  let claims = Claims {
    sub: email.to_owned(),
    exp: Utc::now().timestamp().max(0) as u64 + config.token_ttl_secs,
  };
  jsonwebtoken::encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
  )
  .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
  jsonwebtoken::decode::<Claims>(
    token,
    &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
    &Validation::default(),
  )
  .map(|data| data.claims)
  .map_err(|_| ApiError::Unauthorized)
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Present in a handler means the request carried a valid bearer token.
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RecordStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header_val = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthorized)?;

    // The historical clients sent the raw token without a scheme; accept
    // both forms.
    let token = header_val.strip_prefix("Bearer ").unwrap_or(header_val);
    Ok(Self(verify_token(&state.auth, token)?))
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:    String,
  pub password: String,
  #[serde(default, alias = "roleId")]
  pub role_id:  Option<Uuid>,
}

/// `POST /register` — body: `{"email": ..., "password": ..., "roleId"?: ...}`.
///
/// Returns 201 with the created user record (password redacted). A
/// duplicate email is a 409 via the store's uniqueness constraint.
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore,
{
  let email = body.email.trim().to_lowercase();
  if !User::is_valid_email(&email) {
    return Err(ApiError::BadRequest(format!("invalid email format: {email:?}")));
  }

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(body.password.as_bytes(), &salt)
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))?
    .to_string();

  let user = User { email, password: hash, role_id: body.role_id };
  let record = state.store.insert(EntityKind::User, user.into_document()?).await?;

  Ok((StatusCode::CREATED, Json(record.to_value())))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub token: String,
}

/// `POST /login` — verifies credentials and returns a signed JWT.
///
/// Every failure mode (unknown email, wrong password, damaged hash) is the
/// same 401, so the endpoint does not leak which accounts exist.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: RecordStore,
{
  let email = body.email.trim().to_lowercase();
  let filter = Filter::Eq { field: "email".to_owned(), value: email.clone().into() };
  let user = state
    .store
    .find(EntityKind::User, &filter)
    .await?
    .into_iter()
    .next()
    .ok_or(ApiError::Unauthorized)?;

  let hash = user
    .body
    .get("password")
    .and_then(|v| v.as_str())
    .ok_or(ApiError::Unauthorized)?;
  let parsed = PasswordHash::new(hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(body.password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)?;

  let token = issue_token(&state.auth, &email)?;
  Ok(Json(TokenResponse { token }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
