use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use bizdesk_core::models::Tenant;
use bizdesk_core::AppError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
    /// Read only
    Viewer,
}

impl UserRole {
    pub fn can_write(&self) -> bool {
        !matches!(self, UserRole::Viewer)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Member => write!(f, "member"),
            UserRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(AppError::Unauthorized(format!("Unknown role '{}'", other))),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub tenant_id: Uuid,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, inserted into request extensions by [`auth_middleware`](super::auth_middleware).
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: UserRole,
    pub tenant: Tenant,
}

impl TenantContext {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This operation requires the admin role".to_string(),
            ))
        }
    }
}

// Extracted from parts so it can sit next to `Multipart` in handler signatures.
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Missing tenant context".to_string(),
                        details: None,
                        error_type: None,
                        code: "MISSING_TENANT_CONTEXT".to_string(),
                        recoverable: false,
                        suggested_action: Some("Check the bearer token".to_string()),
                    }),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("Member".parse::<UserRole>().unwrap(), UserRole::Member);
        assert_eq!("viewer".parse::<UserRole>().unwrap(), UserRole::Viewer);
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_only_viewers_are_read_only() {
        assert!(UserRole::Admin.can_write());
        assert!(UserRole::Member.can_write());
        assert!(!UserRole::Viewer.can_write());
    }

    #[test]
    fn test_role_display_round_trips() {
        for role in [UserRole::Admin, UserRole::Member, UserRole::Viewer] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
    }
}
