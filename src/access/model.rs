//! User, role and permission types shared by the server and client gating paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Wildcard value matching any action or resource.
pub const WILDCARD: &str = "*";

/// Attribute map describing the resource being accessed (e.g. `mandate_id`).
pub type Attributes = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    MandateMember,
    Viewer,
    AiAnalyst,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::MandateMember => "mandate_member",
            Self::Viewer => "viewer",
            Self::AiAnalyst => "ai_analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "mandate_member" => Ok(Self::MandateMember),
            "viewer" => Ok(Self::Viewer),
            "ai_analyst" => Ok(Self::AiAnalyst),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A grant of `action` on `resource`, optionally narrowed by attribute conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: Attributes,
}

impl Permission {
    #[must_use]
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            conditions: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Whether this grant covers `action` on `resource` with the given attributes.
    ///
    /// Every condition key must be present in `attributes` with an equal value;
    /// a missing attribute never satisfies a condition.
    #[must_use]
    pub fn grants(&self, action: &str, resource: &str, attributes: &Attributes) -> bool {
        field_matches(&self.action, action)
            && field_matches(&self.resource, resource)
            && self
                .conditions
                .iter()
                .all(|(key, expected)| attributes.get(key) == Some(expected))
    }
}

fn field_matches(granted: &str, requested: &str) -> bool {
    granted == WILDCARD || granted == requested
}

/// A permission a caller must hold, plus the attributes of the target resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl PermissionCheck {
    #[must_use]
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Immutable user snapshot handed out by the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub mandate_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl User {
    /// Attributes describing this user for condition checks on their own records.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("user_id".to_string(), self.id.to_string());
        if let Some(mandate_id) = &self.mandate_id {
            attributes.insert("mandate_id".to_string(), mandate_id.clone());
        }
        attributes
    }
}
