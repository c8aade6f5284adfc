//! Client-side route gating.
//!
//! UI collaborators hold a `ClientAuthState` hydrated from `GET /auth/me` and ask
//! it whether a navigation may proceed. This is UX only; every protected API is
//! still enforced by the server guard.

use super::{
    evaluator::{authorize, has_permission},
    model::{PermissionCheck, Role, User},
};
use url::form_urlencoded::byte_serialize;

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Requirements attached to a navigable route or UI region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    pub path: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<PermissionCheck>,
}

impl RouteRequirement {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    #[must_use]
    pub fn with_permission(mut self, check: PermissionCheck) -> Self {
        self.permissions.push(check);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session hydration still in flight; render a placeholder.
    Pending,
    Allow,
    RedirectToLogin { return_to: String },
    RedirectToUnauthorized,
}

impl RouteDecision {
    /// Target path for redirects, `None` when the route renders. The return
    /// path is form-encoded so its own query string survives the round trip.
    #[must_use]
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Self::RedirectToLogin { return_to } => {
                let next: String = byte_serialize(return_to.as_bytes()).collect();
                Some(format!("{LOGIN_PATH}?next={next}"))
            }
            Self::RedirectToUnauthorized => Some(UNAUTHORIZED_PATH.to_string()),
            Self::Pending | Self::Allow => None,
        }
    }
}

/// Auth snapshot exposed to the UI: `currentUser`, `isAuthenticated`, `isLoading`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientAuthState {
    pub current_user: Option<User>,
    pub is_loading: bool,
}

impl ClientAuthState {
    #[must_use]
    pub fn loading() -> Self {
        Self {
            current_user: None,
            is_loading: true,
        }
    }

    #[must_use]
    pub fn signed_in(user: User) -> Self {
        Self {
            current_user: Some(user),
            is_loading: false,
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_user.as_ref().is_some_and(|user| user.is_active)
    }

    #[must_use]
    pub fn has_permission(&self, action: &str, resource: &str) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|user| has_permission(user, action, resource))
    }

    /// Decide what the router should do for `requirement`.
    #[must_use]
    pub fn guard(&self, requirement: &RouteRequirement) -> RouteDecision {
        if self.is_loading {
            return RouteDecision::Pending;
        }
        let Some(user) = self.current_user.as_ref().filter(|user| user.is_active) else {
            return RouteDecision::RedirectToLogin {
                return_to: requirement.path.clone(),
            };
        };
        if authorize(user, &requirement.roles, &requirement.permissions) {
            RouteDecision::Allow
        } else {
            RouteDecision::RedirectToUnauthorized
        }
    }
}
