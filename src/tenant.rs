//! Tenant resolution from the recipient address.
//!
//! Reports are forwarded to a shared mailbox using sub-addressing:
//! `developers.mxd+northside@gmail.com` routes to the `northside` clinic.
//! The sanitized tag doubles as the clinic's database name, so the output
//! alphabet is restricted to `[a-z0-9_]` with no further escaping applied
//! downstream.

use crate::error::IngestError;

/// Extracts and sanitizes the clinic identifier from a `To` address.
///
/// Fails when the address carries no `+tag@` pattern; the caller must then
/// reject the whole message without touching storage.
pub fn resolve_tenant(to: &str) -> Result<String, IngestError> {
    let Some(plus) = to.find('+') else {
        return Err(IngestError::TenantResolution(to.to_string()));
    };
    let rest = &to[plus + 1..];
    let Some(at) = rest.find('@') else {
        return Err(IngestError::TenantResolution(to.to_string()));
    };
    let tag = &rest[..at];
    if tag.is_empty() {
        return Err(IngestError::TenantResolution(to.to_string()));
    }
    Ok(sanitize_identifier(tag))
}

/// Lower-cases and maps every character outside `[a-z0-9_]` to `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '_') => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_sub_addressed_recipient() {
        let tenant = resolve_tenant("developers.mxd+SuperTest@gmail.com").unwrap();
        assert_eq!(tenant, "supertest");
    }

    #[test]
    fn sanitizes_tag_to_identifier_alphabet() {
        let tenant = resolve_tenant("inbox+North-Side Clinic@example.com").unwrap();
        assert_eq!(tenant, "north_side_clinic");
        assert!(tenant.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_')));
    }

    #[test]
    fn display_name_wrapper_is_tolerated() {
        let tenant = resolve_tenant("Reports <inbox+westend@example.com>").unwrap();
        assert_eq!(tenant, "westend");
    }

    #[test]
    fn address_without_tag_is_rejected() {
        assert!(matches!(
            resolve_tenant("developers.mxd@gmail.com"),
            Err(IngestError::TenantResolution(_))
        ));
    }

    #[test]
    fn empty_tag_is_rejected() {
        assert!(resolve_tenant("inbox+@example.com").is_err());
    }

    #[test]
    fn plus_after_at_is_rejected() {
        assert!(resolve_tenant("inbox@example.com+tag").is_err());
    }
}
