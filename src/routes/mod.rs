//! Static route tables for the admission gate.
//!
//! Classification is pure and total: every path maps to exactly one class.
//! Paths matching none of the tables fall through as `Public` — the product
//! deny-lists protected areas instead of allow-listing public ones, and that
//! default-allow policy is preserved here on purpose (signed off, see
//! DESIGN.md).

use serde::Serialize;

/// Exact match for `/`, prefix match for everything else.
pub const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/sign-in",
    "/sign-up",
    "/forgot-password",
    "/reset-password",
    "/otp",
    "/unauthorized",
];

/// Application areas requiring an authenticated session (prefix match).
pub const PROTECTED_APP_ROUTES: &[&str] = &["/classroom", "/inbox", "/profile", "/users"];

/// API namespaces requiring a verified credential (prefix match).
pub const PROTECTED_API_ROUTES: &[&str] = &["/api/classroom", "/api/users", "/api/profile"];

/// Public pages that start an authentication flow. An already-authenticated
/// actor landing here is bounced to the app instead of seeing the form again.
pub const AUTH_ENTRY_ROUTES: &[&str] = &[
    "/sign-in",
    "/sign-up",
    "/forgot-password",
    "/reset-password",
    "/otp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteClass {
    Public,
    ProtectedApp,
    ProtectedApi,
}

/// Classify a request path. Public wins over the protected tables, API over
/// app.
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    if is_public(path) {
        return RouteClass::Public;
    }

    if PROTECTED_API_ROUTES
        .iter()
        .any(|route| path.starts_with(route))
    {
        return RouteClass::ProtectedApi;
    }

    if PROTECTED_APP_ROUTES
        .iter()
        .any(|route| path.starts_with(route))
    {
        return RouteClass::ProtectedApp;
    }

    RouteClass::Public
}

/// Whether the path is one of the auth-entry pages (prefix match).
#[must_use]
pub fn is_auth_entry(path: &str) -> bool {
    AUTH_ENTRY_ROUTES.iter().any(|route| path.starts_with(route))
}

fn is_public(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| {
        if *route == "/" {
            path == "/"
        } else {
            path.starts_with(route)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_public_routes() {
        assert_eq!(classify("/"), RouteClass::Public);
        assert_eq!(classify("/sign-in"), RouteClass::Public);
        assert_eq!(classify("/sign-up"), RouteClass::Public);
        assert_eq!(classify("/forgot-password"), RouteClass::Public);
        assert_eq!(classify("/reset-password?token=abc"), RouteClass::Public);
        assert_eq!(classify("/otp"), RouteClass::Public);
        assert_eq!(classify("/unauthorized"), RouteClass::Public);
    }

    #[test]
    fn classify_protected_app_routes() {
        assert_eq!(classify("/classroom"), RouteClass::ProtectedApp);
        assert_eq!(classify("/classroom/7b/settings"), RouteClass::ProtectedApp);
        assert_eq!(classify("/inbox"), RouteClass::ProtectedApp);
        assert_eq!(classify("/profile"), RouteClass::ProtectedApp);
        assert_eq!(classify("/users/42"), RouteClass::ProtectedApp);
    }

    #[test]
    fn classify_protected_api_routes() {
        assert_eq!(classify("/api/classroom"), RouteClass::ProtectedApi);
        assert_eq!(classify("/api/classroom/list"), RouteClass::ProtectedApi);
        assert_eq!(classify("/api/users"), RouteClass::ProtectedApi);
        assert_eq!(classify("/api/profile/avatar"), RouteClass::ProtectedApi);
    }

    #[test]
    fn root_is_exact_match_only() {
        assert_eq!(classify("/"), RouteClass::Public);
        // "/x" is unlisted, not a "/" prefix match
        assert_eq!(classify("/x"), RouteClass::Public);
        assert_eq!(classify("/classrooms-archive"), RouteClass::ProtectedApp);
    }

    #[test]
    fn unlisted_paths_default_to_public() {
        // Default-allow: only the configured prefixes are protected
        assert_eq!(classify("/about"), RouteClass::Public);
        assert_eq!(classify("/api/health"), RouteClass::Public);
        assert_eq!(classify("/calendar"), RouteClass::Public);
    }

    #[test]
    fn classify_is_deterministic() {
        for path in ["/", "/classroom", "/api/users/7", "/whatever", ""] {
            assert_eq!(classify(path), classify(path));
        }
    }

    #[test]
    fn auth_entry_detection() {
        assert!(is_auth_entry("/sign-in"));
        assert!(is_auth_entry("/sign-in?callbackUrl=%2Fclassroom"));
        assert!(is_auth_entry("/otp"));
        assert!(!is_auth_entry("/"));
        assert!(!is_auth_entry("/unauthorized"));
        assert!(!is_auth_entry("/classroom"));
    }
}
