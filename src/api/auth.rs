//! Caller identity extractors.
//!
//! Authentication happens upstream: the auth proxy verifies the caller and
//! forwards the result as two headers, [`USER_ID_HEADER`] and
//! [`USER_ROLE_HEADER`]. This module only turns them into an [`AuthUser`]
//! and enforces role gates at the type level.

use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::GatewayError;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified role name.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access to every event.
    Admin,
    /// Plans events and edits their layouts.
    Planner,
    /// Supplier attached to events.
    Vendor,
    /// Invited attendee.
    Guest,
}

impl FromStr for Role {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "planner" => Ok(Self::Planner),
            "vendor" => Ok(Self::Vendor),
            "guest" => Ok(Self::Guest),
            other => Err(GatewayError::Unauthenticated(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Planner => "planner",
            Self::Vendor => "vendor",
            Self::Guest => "guest",
        })
    }
}

/// Authenticated caller.
///
/// ```ignore
/// async fn handler(user: AuthUser) -> Result<impl IntoResponse, GatewayError> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Verified user id.
    pub user_id: String,
    /// Verified role.
    pub role: Role,
}

impl AuthUser {
    /// Returns `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| GatewayError::Unauthenticated("missing caller identity".into()))?;
        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| GatewayError::Unauthenticated("missing caller role".into()))?
            .parse()?;

        Ok(Self {
            user_id: user_id.to_string(),
            role,
        })
    }
}

/// Requires the `planner` role; administrators pass too. Rejects with
/// `403 Forbidden` otherwise.
#[derive(Debug, Clone)]
pub struct RequirePlanner(pub AuthUser);

impl<S: Send + Sync> FromRequestParts<S> for RequirePlanner {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !matches!(user.role, Role::Planner | Role::Admin) {
            tracing::warn!(user_id = %user.user_id, role = %user.role, "planner role required");
            return Err(GatewayError::Forbidden);
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("request build failed");
        };
        request.into_parts().0
    }

    #[tokio::test]
    async fn headers_become_auth_user() {
        let mut p = parts(&[(USER_ID_HEADER, " 42 "), (USER_ROLE_HEADER, "Planner")]);
        let Ok(user) = AuthUser::from_request_parts(&mut p, &()).await else {
            panic!("extraction failed");
        };
        assert_eq!(user.user_id, "42");
        assert_eq!(user.role, Role::Planner);
    }

    #[tokio::test]
    async fn missing_or_unknown_identity_is_unauthenticated() {
        for headers in [
            vec![],
            vec![(USER_ID_HEADER, "42")],
            vec![(USER_ID_HEADER, "  "), (USER_ROLE_HEADER, "planner")],
            vec![(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "root")],
        ] {
            let mut p = parts(&headers);
            let result = AuthUser::from_request_parts(&mut p, &()).await;
            let Err(err) = result else {
                panic!("accepted {headers:?}");
            };
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn planner_gate_admits_planners_and_admins_only() {
        for (role, admitted) in [
            ("planner", true),
            ("admin", true),
            ("vendor", false),
            ("guest", false),
        ] {
            let mut p = parts(&[(USER_ID_HEADER, "1"), (USER_ROLE_HEADER, role)]);
            let result = RequirePlanner::from_request_parts(&mut p, &()).await;
            match result {
                Ok(_) => assert!(admitted, "{role} admitted"),
                Err(err) => {
                    assert!(!admitted, "{role} rejected");
                    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
                }
            }
        }
    }
}
