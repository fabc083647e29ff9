use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::{Users, enums::Role, users},
    error::AppError,
    policy::Actor,
    services::auth_service::decode_access_token,
    state::AppState,
};

/// Header carrying `TOKEN_PREFIX + jwt`.
pub const ACCESS_TOKEN_HEADER: &str = "accesstoken";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub username: String,
    pub email: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            role: self.role,
        }
    }
}

impl From<users::Model> for AuthUser {
    fn from(user: users::Model) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            username: user.username,
            email: user.email,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACCESS_TOKEN_HEADER)
            .ok_or_else(|| AppError::Unauthorized("please login first".into()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("invalid access token header".into()))?;

        let token = raw
            .strip_prefix(state.config.token_prefix.as_str())
            .ok_or_else(|| AppError::Unauthorized("invalid token prefix".into()))?
            .trim();

        let claims = decode_access_token(token, &state.config.jwt_secret)?;

        let user = Users::find_by_id(claims.sub)
            .filter(users::Column::IsDeleted.eq(false))
            .one(&*state.orm)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user no longer exists".into()))?;

        Ok(user.into())
    }
}
