//! CORS policy for the two route shapes this frontend exposes.
//!
//! `/files` (the upload-id collection) and `/files/<id>` (an individual
//! file) advertise different allowed methods and headers, so each gets its
//! own [`CorsLayer`].

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

fn header_list(csv: &str) -> Vec<HeaderName> {
    csv.split(", ").filter_map(|name| name.trim().parse().ok()).collect()
}

fn expose_list(csv: &str) -> Vec<HeaderName> {
    header_list(csv)
}

/// CORS policy for `OPTIONS, POST /files`.
#[must_use]
pub fn collection_cors(allow_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::OPTIONS, Method::POST])
        .allow_headers(header_list("Accept, Authorization, Content-Length, Content-Type, Wago-Wdx-No-Auth-Popup"))
        .expose_headers(expose_list(
            "Content-Length, Content-Type, Location, Www-Authenticate, Wago-Wdx-Auth-Token, \
             Wago-Wdx-Auth-Token-Expiration, Wago-Wdx-Auth-Token-Type",
        ))
}

/// CORS policy for `OPTIONS, HEAD, GET, PUT, PATCH /files/<id>`.
#[must_use]
pub fn item_cors(allow_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::OPTIONS, Method::HEAD, Method::GET, Method::PUT, Method::PATCH])
        .allow_headers(header_list(
            "Accept, Authorization, Content-Length, Content-Type, Wago-Wdx-No-Auth-Popup, Range",
        ))
        .expose_headers(expose_list(
            "Content-Length, Content-Type, Content-Range, Www-Authenticate, Wago-Wdx-Auth-Token, \
             Wago-Wdx-Auth-Token-Expiration, Wago-Wdx-Auth-Token-Type",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_list_parses_the_comma_separated_form() {
        let headers = header_list("Accept, Authorization, Content-Type");
        assert_eq!(headers.len(), 3);
    }
}
