use super::handlers::{authority, citizen, health};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut citizen_tag = Tag::new("citizen");
    citizen_tag.description = Some("Citizen self-registration via phone OTP".to_string());

    let mut authority_tag = Tag::new("authority");
    authority_tag.description =
        Some("Authority signup, email verification and login".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![citizen_tag, authority_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(citizen::send_otp))
        .routes(routes!(citizen::verify_otp))
        .routes(routes!(authority::signup::signup))
        .routes(routes!(authority::verify::verify))
        .routes(routes!(authority::otp::send_otp))
        .routes(routes!(authority::otp::verify_otp))
        .routes(routes!(authority::login::login))
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
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    if let Some(start) = primary.find('<') {
        let name = primary[..start].trim();
        let email = primary[start + 1..].trim_end_matches('>').trim();
        contact.name = (!name.is_empty()).then(|| name.to_string());
        contact.email = (!email.is_empty()).then(|| email.to_string());
    } else {
        contact.name = Some(primary.to_string());
    }
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Roadwatch Team"));
            assert_eq!(contact.email.as_deref(), Some("team@roadwatch.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "citizen"));
        assert!(tags.iter().any(|tag| tag.name == "authority"));
        assert!(spec.paths.paths.contains_key("/citizen/send-otp"));
        assert!(spec.paths.paths.contains_key("/citizen/verify-otp"));
        assert!(spec.paths.paths.contains_key("/authority/signup"));
        assert!(spec.paths.paths.contains_key("/authority/verify"));
        assert!(spec.paths.paths.contains_key("/authority/send-otp"));
        assert!(spec.paths.paths.contains_key("/authority/verify-otp"));
        assert!(spec.paths.paths.contains_key("/authority/login"));
    }
}
