//! Role and permission evaluation.
//!
//! `authorize` is the only decision function; the server guard and the client
//! route guard both call it so the two never drift apart.

use super::model::{Attributes, PermissionCheck, Role, User};

/// Decide whether `user` satisfies the required roles and permissions.
///
/// - `admin` passes every check.
/// - An empty `required_roles` imposes no role constraint, otherwise the user's
///   role must be listed.
/// - An empty `required_permissions` imposes no permission constraint, otherwise
///   every requirement must be granted by at least one of the user's permissions.
#[must_use]
pub fn authorize(
    user: &User,
    required_roles: &[Role],
    required_permissions: &[PermissionCheck],
) -> bool {
    if user.role == Role::Admin {
        return true;
    }

    let role_ok = required_roles.is_empty() || required_roles.contains(&user.role);
    if !role_ok {
        return false;
    }

    required_permissions.iter().all(|required| {
        user.permissions.iter().any(|granted| {
            granted.grants(&required.action, &required.resource, &required.attributes)
        })
    })
}

/// Single permission predicate without resource attributes.
#[must_use]
pub fn has_permission(user: &User, action: &str, resource: &str) -> bool {
    has_permission_on(user, action, resource, &Attributes::new())
}

/// Single permission predicate against a specific resource.
#[must_use]
pub fn has_permission_on(user: &User, action: &str, resource: &str, attributes: &Attributes) -> bool {
    let check = PermissionCheck {
        action: action.to_string(),
        resource: resource.to_string(),
        attributes: attributes.clone(),
    };
    authorize(user, &[], std::slice::from_ref(&check))
}
