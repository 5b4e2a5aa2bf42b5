//! Caller identity, as attached by the authentication layer in front of us.
//!
//! Credentials are verified upstream; this service only reads the resulting
//! `x-user-*` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity(pub Identity);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing user id".to_string()))?;
        let user_id = UserId::parse(raw)
            .map_err(|_| ApiError::Unauthorized(format!("malformed user id: {raw}")))?;

        let role = match header(parts, USER_ROLE_HEADER) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        };

        Ok(Identity {
            user_id,
            email: header(parts, USER_EMAIL_HEADER).unwrap_or_default().to_string(),
            name: header(parts, USER_NAME_HEADER).unwrap_or_default().to_string(),
            role,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(ApiError::Forbidden("admin role required".to_string()));
        }
        Ok(AdminIdentity(identity))
    }
}
