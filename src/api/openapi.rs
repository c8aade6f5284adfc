use super::{
    guard::{protect, GuardConfig},
    handlers::{
        auth::{self, AuthConfig, RateLimitAction},
        health,
    },
};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Limits do not show up in the document, so defaults are enough here.
    let (_router, openapi) = api_router(&AuthConfig::default()).split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Every auth route sits behind its own guard; `/health` is open.
pub(crate) fn api_router(config: &AuthConfig) -> OpenApiRouter {
    let policy = |action| config.rate_limit_policy(action);

    let login = protect(
        OpenApiRouter::new().routes(routes!(auth::login::login)),
        GuardConfig::new().with_rate_limit(policy(RateLimitAction::Login)),
    );
    let logout = protect(
        OpenApiRouter::new().routes(routes!(auth::session::logout)),
        GuardConfig::new()
            .require_auth()
            .require_csrf()
            .with_rate_limit(policy(RateLimitAction::Logout)),
    );
    let me = protect(
        OpenApiRouter::new().routes(routes!(auth::me::me)),
        GuardConfig::new()
            .require_auth()
            .with_rate_limit(policy(RateLimitAction::Me)),
    );
    let refresh = protect(
        OpenApiRouter::new().routes(routes!(auth::session::refresh)),
        GuardConfig::new()
            .require_csrf()
            .with_rate_limit(policy(RateLimitAction::Refresh)),
    );
    let csrf = protect(
        OpenApiRouter::new().routes(routes!(auth::csrf_token::csrf_token)),
        GuardConfig::new().with_rate_limit(policy(RateLimitAction::Csrf)),
    );

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .merge(login)
        .merge(logout)
        .merge(me)
        .merge(refresh)
        .merge(csrf);

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Sessions, CSRF tokens and the current user".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
