//! Development static file server.
//!
//! Two read-only roots: `static/` at `/` and `dist/` at `/dist`. Files are
//! opened per request, so whatever the pipeline last wrote is what gets
//! served. Only GET and HEAD are answered; unknown paths are 404.

mod server;

pub use server::{bind, serve, shutdown_signal, ServeError, Server};

use crate::config::ProjectConfig;
use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// `Cache-Control` sent in development mode.
pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Build the routing table for `config`.
#[must_use]
pub fn router(config: &ProjectConfig) -> Router {
    let static_files = ServeDir::new(config.static_root()).append_index_html_on_directories(true);
    let dist_files = ServeDir::new(config.dist_root()).append_index_html_on_directories(true);

    let mut router = Router::new();
    match dist_mount(&config.server.dist_prefix) {
        Some(prefix) => router = router.nest_service(&prefix, dist_files),
        None => tracing::warn!(
            prefix = %config.server.dist_prefix,
            "dist prefix must not be the site root; dist is not mounted"
        ),
    }
    let mut router = router.fallback_service(static_files);

    if config.server.dev {
        router = router.layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_CACHE),
        ));
    }

    router.layer(TraceLayer::new_for_http())
}

/// Normalize a mount prefix to `/segment[/segment]`. `None` for the root.
fn dist_mount(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dist_mount() {
        assert_eq!(dist_mount("/dist").as_deref(), Some("/dist"));
        assert_eq!(dist_mount("dist/").as_deref(), Some("/dist"));
        assert_eq!(dist_mount("/assets/dist").as_deref(), Some("/assets/dist"));
        assert_eq!(dist_mount("/"), None);
        assert_eq!(dist_mount(""), None);
    }
}
