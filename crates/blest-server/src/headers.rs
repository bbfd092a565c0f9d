//! Security response headers.
//!
//! Every response carries a strict set of security headers. Each can be
//! overridden through [`HttpSettings`]; `cors: true` is a shortcut for
//! `access-control-allow-origin: *`.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::config::HttpSettings;

const DEFAULT_CSP: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests";

/// Builds the full response header set from settings.
///
/// Overrides that are not valid HTTP header values are skipped with a
/// warning and the default is kept.
pub fn construct_http_headers(settings: &HttpSettings) -> HeaderMap {
    let access_control_allow_origin = match (&settings.access_control_allow_origin, settings.cors) {
        (Some(origin), _) if !origin.is_empty() => Some(origin.clone()),
        (_, true) => Some("*".to_string()),
        _ => None,
    };

    let pairs: [(&str, &str, &Option<String>); 13] = [
        ("access-control-allow-origin", "", &access_control_allow_origin),
        ("content-security-policy", DEFAULT_CSP, &settings.content_security_policy),
        ("cross-origin-opener-policy", "same-origin", &settings.cross_origin_opener_policy),
        ("cross-origin-resource-policy", "same-origin", &settings.cross_origin_resource_policy),
        ("origin-agent-cluster", "?1", &settings.origin_agent_cluster),
        ("referrer-policy", "no-referrer", &settings.referrer_policy),
        (
            "strict-transport-security",
            "max-age=15552000; includeSubDomains",
            &settings.strict_transport_security,
        ),
        ("x-content-type-options", "nosniff", &settings.x_content_type_options),
        ("x-dns-prefetch-control", "off", &settings.x_dns_prefetch_control),
        ("x-download-options", "noopen", &settings.x_download_options),
        ("x-frame-options", "SAMEORIGIN", &settings.x_frame_options),
        (
            "x-permitted-cross-domain-policies",
            "none",
            &settings.x_permitted_cross_domain_policies,
        ),
        ("x-xss-protection", "0", &settings.x_xss_protection),
    ];

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, default, override_value) in pairs {
        let value = match override_value {
            Some(value) if !value.is_empty() => value.as_str(),
            _ => default,
        };
        let name = HeaderName::from_static(name);
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => {
                warn!(header = %name, "invalid header override, keeping default");
                if let Ok(default) = HeaderValue::from_str(default) {
                    headers.insert(name, default);
                }
            }
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    /// Test: default header set matches the documented values
    #[test]
    fn test_default_headers() {
        let headers = construct_http_headers(&HttpSettings::default());

        assert_eq!(header(&headers, "access-control-allow-origin"), "");
        assert_eq!(header(&headers, "cross-origin-opener-policy"), "same-origin");
        assert_eq!(header(&headers, "cross-origin-resource-policy"), "same-origin");
        assert_eq!(header(&headers, "origin-agent-cluster"), "?1");
        assert_eq!(header(&headers, "referrer-policy"), "no-referrer");
        assert_eq!(
            header(&headers, "strict-transport-security"),
            "max-age=15552000; includeSubDomains"
        );
        assert_eq!(header(&headers, "x-content-type-options"), "nosniff");
        assert_eq!(header(&headers, "x-dns-prefetch-control"), "off");
        assert_eq!(header(&headers, "x-download-options"), "noopen");
        assert_eq!(header(&headers, "x-frame-options"), "SAMEORIGIN");
        assert_eq!(header(&headers, "x-permitted-cross-domain-policies"), "none");
        assert_eq!(header(&headers, "x-xss-protection"), "0");
        assert!(header(&headers, "content-security-policy").starts_with("default-src 'self'"));
    }

    #[test]
    fn test_cors_shortcut_sets_wildcard_origin() {
        let settings = HttpSettings {
            cors: true,
            ..Default::default()
        };
        let headers = construct_http_headers(&settings);
        assert_eq!(header(&headers, "access-control-allow-origin"), "*");
    }

    #[test]
    fn test_explicit_origin_wins_over_cors() {
        let settings = HttpSettings {
            cors: true,
            access_control_allow_origin: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let headers = construct_http_headers(&settings);
        assert_eq!(
            header(&headers, "access-control-allow-origin"),
            "https://example.com"
        );
    }

    #[test]
    fn test_header_overrides_apply() {
        let settings = HttpSettings {
            x_frame_options: Some("DENY".to_string()),
            referrer_policy: Some("origin".to_string()),
            ..Default::default()
        };
        let headers = construct_http_headers(&settings);
        assert_eq!(header(&headers, "x-frame-options"), "DENY");
        assert_eq!(header(&headers, "referrer-policy"), "origin");
        // Untouched headers keep their defaults.
        assert_eq!(header(&headers, "x-download-options"), "noopen");
    }

    #[test]
    fn test_invalid_override_keeps_default() {
        let settings = HttpSettings {
            x_frame_options: Some("bad\nvalue".to_string()),
            ..Default::default()
        };
        let headers = construct_http_headers(&settings);
        assert_eq!(header(&headers, "x-frame-options"), "SAMEORIGIN");
    }
}
