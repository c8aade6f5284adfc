//! Authorization model and evaluation.
//!
//! Roles are a fixed set (`admin`, `mandate_member`, `viewer`, `ai_analyst`).
//! Permissions are `(action, resource)` pairs where either side may be `*`,
//! optionally narrowed by conditions such as `mandate_id`.

mod evaluator;
mod model;
pub mod route;

pub use evaluator::{authorize, has_permission, has_permission_on};
pub use model::{Attributes, Permission, PermissionCheck, Role, User, WILDCARD};
pub use route::{ClientAuthState, RouteDecision, RouteRequirement};
