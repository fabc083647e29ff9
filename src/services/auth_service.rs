use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEvent},
    dto::auth::{
        Claims, EmailClaims, EmailTokenPurpose, ForgotPasswordRequest, ResetPasswordRequest,
        SignInRequest, SignInResponse, SignUpRequest,
    },
    entity::{Users, enums::Role, users},
    error::{AppError, AppResult},
    mail,
    models::User,
    response::{ApiResponse, Meta},
    services::user_service::phone_numbers_taken,
    state::AppState,
};

pub const ACCESS_TOKEN_MINUTES: i64 = 24 * 60;
pub const VERIFY_TOKEN_MINUTES: i64 = 60;
pub const RESET_TOKEN_MINUTES: i64 = 15;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn expiry(ttl: Duration) -> AppResult<usize> {
    Utc::now()
        .checked_add_signed(ttl)
        .map(|t| t.timestamp() as usize)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))
}

pub fn issue_access_token(user_id: Uuid, role: Role, secret: &str) -> AppResult<String> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: expiry(Duration::minutes(ACCESS_TOKEN_MINUTES))?,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("invalid or expired token".into()))
}

pub fn issue_email_token(
    email: &str,
    purpose: EmailTokenPurpose,
    ttl: Duration,
    secret: &str,
) -> AppResult<String> {
    let claims = EmailClaims {
        email: email.to_string(),
        purpose,
        exp: expiry(ttl)?,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_email_token(
    token: &str,
    purpose: EmailTokenPurpose,
    secret: &str,
) -> AppResult<EmailClaims> {
    let claims = decode::<EmailClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::bad_request("invalid or expired token"))?;

    if claims.purpose != purpose {
        return Err(AppError::bad_request("invalid or expired token"));
    }
    Ok(claims)
}

/// Link mailed on sign-up; it points at the verify-email route under `/api`.
pub fn verification_link(public_url: &str, token: &str) -> String {
    format!(
        "{}/api/auth/verify-email?token={token}",
        public_url.trim_end_matches('/')
    )
}

pub async fn sign_up(state: &AppState, payload: SignUpRequest) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    let SignUpRequest {
        username,
        email,
        password,
        age,
        phone_numbers,
        addresses,
    } = payload;
    let email = email.trim().to_lowercase();

    let exists = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&*state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Email is already taken".into()));
    }
    if phone_numbers_taken(&*state.orm, &phone_numbers, None).await? {
        return Err(AppError::Conflict("Phone number is already taken".into()));
    }

    let password_hash = hash_password(&password)?;
    let token = issue_email_token(
        &email,
        EmailTokenPurpose::Verify,
        Duration::minutes(VERIFY_TOKEN_MINUTES),
        &state.config.jwt_verification_secret,
    )?;

    let txn = state.orm.begin().await?;
    let now = Utc::now().fixed_offset();
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        phone_numbers: Set(serde_json::json!(phone_numbers)),
        addresses: Set(serde_json::json!(addresses)),
        role: Set(Role::User),
        age: Set(age),
        is_email_verified: Set(false),
        is_logged_in: Set(false),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let link = verification_link(&state.config.public_url, &token);
    // The row is only committed once the verification email is out.
    state
        .mailer
        .send(mail::verification_email(&email, &link))
        .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user.id, "user_sign_up", "users"),
    )
    .await;

    Ok(ApiResponse::success(
        "User created, please check your email to verify your account",
        User::from(user),
        Some(Meta::empty()),
    ))
}

pub async fn verify_email(state: &AppState, token: &str) -> AppResult<ApiResponse<serde_json::Value>> {
    let claims = decode_email_token(
        token,
        EmailTokenPurpose::Verify,
        &state.config.jwt_verification_secret,
    )?;

    let result = Users::update_many()
        .col_expr(users::Column::IsEmailVerified, Expr::value(true))
        .col_expr(
            users::Column::UpdatedAt,
            Expr::value(Utc::now().fixed_offset()),
        )
        .filter(users::Column::Email.eq(claims.email.as_str()))
        .filter(users::Column::IsEmailVerified.eq(false))
        .exec(&*state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("User"));
    }

    Ok(ApiResponse::success(
        "Email verified successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn sign_in(
    state: &AppState,
    payload: SignInRequest,
) -> AppResult<ApiResponse<SignInResponse>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let user = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(&*state.orm)
        .await?
        .ok_or_else(|| AppError::bad_request("invalid credentials"))?;

    if user.is_deleted {
        return Err(AppError::NotFound("User"));
    }
    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::bad_request("invalid credentials"));
    }
    if !user.is_email_verified {
        return Err(AppError::bad_request("please verify your email first"));
    }

    let token = issue_access_token(user.id, user.role, &state.config.jwt_secret)?;

    let user_id = user.id;
    let mut active: users::ActiveModel = user.into();
    active.is_logged_in = Set(true);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&*state.orm).await?;

    audit::record(&state.pool, AuditEvent::new(user_id, "user_sign_in", "users")).await;

    Ok(ApiResponse::success(
        "Logged in",
        SignInResponse {
            token: format!("{}{}", state.config.token_prefix, token),
        },
        Some(Meta::empty()),
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    let email = payload.email.trim().to_lowercase();

    let user = Users::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .filter(users::Column::IsDeleted.eq(false))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let token = issue_email_token(
        &user.email,
        EmailTokenPurpose::Reset,
        Duration::minutes(RESET_TOKEN_MINUTES),
        &state.config.jwt_verification_secret,
    )?;
    state
        .mailer
        .send(mail::password_reset_email(&user.email, &token))
        .await?;

    Ok(ApiResponse::success(
        "Password reset token sent to your email",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    let claims = decode_email_token(
        &payload.token,
        EmailTokenPurpose::Reset,
        &state.config.jwt_verification_secret,
    )?;

    let user = Users::find()
        .filter(users::Column::Email.eq(claims.email.as_str()))
        .filter(users::Column::IsDeleted.eq(false))
        .one(&*state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let user_id = user.id;
    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.is_logged_in = Set(false);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&*state.orm).await?;

    audit::record(
        &state.pool,
        AuditEvent::new(user_id, "password_reset", "users"),
    )
    .await;

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trip() {
        let id = Uuid::new_v4();
        let token = issue_access_token(id, Role::Admin, SECRET).unwrap();
        let claims = decode_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn access_token_with_wrong_secret_is_unauthorized() {
        let token = issue_access_token(Uuid::new_v4(), Role::User, SECRET).unwrap();
        let err = decode_access_token(&token, "other").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn verification_link_targets_api_route() {
        assert_eq!(
            verification_link("http://localhost:3000/", "abc"),
            "http://localhost:3000/api/auth/verify-email?token=abc"
        );
    }

    #[test]
    fn expired_email_token_is_rejected() {
        let token = issue_email_token(
            "a@b.io",
            EmailTokenPurpose::Verify,
            Duration::hours(-2),
            SECRET,
        )
        .unwrap();
        assert!(decode_email_token(&token, EmailTokenPurpose::Verify, SECRET).is_err());
    }

    #[test]
    fn email_token_purpose_must_match() {
        let token =
            issue_email_token("a@b.io", EmailTokenPurpose::Reset, Duration::minutes(15), SECRET)
                .unwrap();
        assert!(decode_email_token(&token, EmailTokenPurpose::Verify, SECRET).is_err());
        let claims = decode_email_token(&token, EmailTokenPurpose::Reset, SECRET).unwrap();
        assert_eq!(claims.email, "a@b.io");
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }
}
