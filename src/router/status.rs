//! Public instance information.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::config::Configuration;

/// Public server status (configuration).
pub async fn status(
    State(config): State<Arc<Configuration>>,
) -> Json<Configuration> {
    Json(Configuration::clone(&config))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::router::tests::{json, state};
    use crate::*;

    #[tokio::test]
    async fn test_status_hides_secrets() {
        let state = state();
        let response = make_request(
            None,
            app(state),
            Method::GET,
            "/status.json",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["name"], "empo");
        assert_eq!(body["pagination"]["page_size"], 30);
        assert!(body.get("argon2").is_none());
        assert!(body.get("postgres").is_none());
    }
}
