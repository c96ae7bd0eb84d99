use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
    Extension,
};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// Decides whether an authenticated user may call a route.
/// Routes are keyed `"<METHOD> <matched path>"`, e.g.
/// `"POST /device/api/v1/basics/create"`.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn is_permitted(&self, user: &AuthUser, route: &str) -> bool;
}

/// Allows every authenticated call
#[derive(Debug, Default, Clone)]
pub struct PermitAll;

#[async_trait]
impl PermissionChecker for PermitAll {
    async fn is_permitted(&self, _user: &AuthUser, _route: &str) -> bool {
        true
    }
}

/// Static route -> allowed user types table. Routes without an entry are open.
#[derive(Debug, Default, Clone)]
pub struct RoutePermissions {
    routes: HashMap<String, HashSet<i64>>,
}

impl RoutePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, route: impl Into<String>, user_types: impl IntoIterator<Item = i64>) -> Self {
        self.routes.entry(route.into()).or_default().extend(user_types);
        self
    }
}

#[async_trait]
impl PermissionChecker for RoutePermissions {
    async fn is_permitted(&self, user: &AuthUser, route: &str) -> bool {
        match self.routes.get(route) {
            Some(types) => types.contains(&user.user_type),
            None => true,
        }
    }
}

/// Runs after authentication; refuses with 403 before the handler runs
pub async fn check_permission(
    State(checker): State<Arc<dyn PermissionChecker>>,
    Extension(user): Extension<AuthUser>,
    matched: MatchedPath,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route = format!("{} {}", request.method(), matched.as_str());
    if !checker.is_permitted(&user, &route).await {
        tracing::warn!("User {} denied access to {}", user.id, route);
        return Err(ApiError::forbidden("You are not authorized to access this route"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Platform;

    fn user(user_type: i64) -> AuthUser {
        AuthUser {
            id: 1,
            username: "u".into(),
            user_type,
            platform: Platform::Device,
        }
    }

    #[tokio::test]
    async fn route_table() {
        let permissions = RoutePermissions::new().allow("DELETE /device/api/v1/basics/delete/:id", [2]);

        assert!(!permissions.is_permitted(&user(1), "DELETE /device/api/v1/basics/delete/:id").await);
        assert!(permissions.is_permitted(&user(2), "DELETE /device/api/v1/basics/delete/:id").await);
        assert!(permissions.is_permitted(&user(1), "POST /device/api/v1/basics/list").await);
        assert!(PermitAll.is_permitted(&user(1), "anything").await);
    }
}
