//! Security headers for the JSON API.
//!
//! Almost every response is JSON consumed by the SPA, so the default CSP
//! denies everything. The Redsys redirect page is the one HTML document we
//! serve; its handler sets [`redsys_form_csp`] and the middleware leaves an
//! existing policy alone.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// CSP for plain API responses.
const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'";

/// Redsys hosts the auto-submitting form may post to.
const REDSYS_FORM_ACTIONS: &str = "https://sis.redsys.es https://sis-t.redsys.es:25443";

/// A fresh 128-bit nonce, base64-encoded, for one inline script.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// CSP for the Redsys auto-submit page. Only the nonce'd inline script may
/// run, and the form may only post to Redsys.
#[must_use]
pub fn redsys_form_csp(nonce: &str) -> String {
    format!(
        "default-src 'none'; \
         script-src 'nonce-{nonce}'; \
         style-src 'unsafe-inline'; \
         form-action {REDSYS_FORM_ACTIONS}; \
         base-uri 'none'; \
         frame-ancestors 'none'"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin` (Redsys needs an origin)
/// - `Content-Security-Policy` unless the handler already set one
/// - `Permissions-Policy` allowing only `payment` for self
/// - `Cache-Control: no-store` unless the handler already set caching
/// - `Cross-Origin-Opener-Policy: same-origin`
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if !headers.contains_key(CONTENT_SECURITY_POLICY) {
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(API_CSP));
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "camera=(), geolocation=(), microphone=(), usb=(), payment=(self), \
             interest-cohort=()",
        ),
    );

    // The merchant feed sets its own public caching.
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redsys_csp_allows_only_redsys_posts() {
        let csp = redsys_form_csp("abc123");
        assert!(csp.contains("script-src 'nonce-abc123'"));
        assert!(csp.contains("form-action https://sis.redsys.es https://sis-t.redsys.es:25443"));
        assert!(!csp.contains("'unsafe-eval'"));
    }

    #[test]
    fn test_nonces_differ() {
        let a = generate_nonce();
        assert_eq!(a.len(), 24);
        assert_ne!(a, generate_nonce());
    }

    #[test]
    fn test_api_csp_denies_by_default() {
        assert!(API_CSP.starts_with("default-src 'none'"));
    }
}
