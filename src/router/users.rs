//! Accounts and profiles.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::middleware::Actor;
use crate::profile::{self, ProfileUpdate};
use crate::router::{PathParams, Valid};
use crate::user::{Profile, PublicProfile};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Register {
    #[validate(
        length(min = 2, max = 15, message = "Username must be 2 to 15 characters long."),
        custom(
            function = "crate::router::validate_username",
            message = "Username must only contain letters, digits, '_' and '-'."
        )
    )]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
    #[validate(length(max = 2000))]
    pub about: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Login {
    #[validate(length(min = 1, max = 15))]
    pub username: String,
    #[validate(length(min = 1, max = 255))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

/// Handler to create user.
pub async fn register(
    State(state): State<AppState>,
    Valid(body): Valid<Register>,
) -> Result<(StatusCode, Json<Credentials>)> {
    let key = profile::register(
        state.store.as_ref(),
        &state.crypto,
        &body.username,
        &body.password,
        body.about,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Credentials {
            username: body.username,
            api_key: key.to_string(),
        }),
    ))
}

/// Handler issuing a fresh API key.
pub async fn login(
    State(state): State<AppState>,
    Valid(body): Valid<Login>,
) -> Result<Json<Credentials>> {
    let key = profile::login(
        state.store.as_ref(),
        &state.crypto,
        &body.username,
        &body.password,
    )
    .await?;

    Ok(Json(Credentials {
        username: body.username,
        api_key: key.to_string(),
    }))
}

pub async fn get(
    State(state): State<AppState>,
    PathParams(username): PathParams<String>,
) -> Result<Json<PublicProfile>> {
    Ok(Json(profile::public(state.store.as_ref(), &username).await?))
}

pub async fn me(
    State(state): State<AppState>,
    Actor(username): Actor,
) -> Result<Json<Profile>> {
    Ok(Json(profile::private(state.store.as_ref(), &username).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Actor(username): Actor,
    Valid(body): Valid<ProfileUpdate>,
) -> Result<Json<Profile>> {
    Ok(Json(profile::update(state.store.as_ref(), &username, body).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::router::tests::{json, register, state};
    use crate::*;

    #[tokio::test]
    async fn test_register_and_login() {
        let state = state();
        let first = register(&state, "pg").await;

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/api/users",
            json!({ "username": "pg", "password": "hunter222" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = make_request(
            None,
            app(state.clone()),
            Method::POST,
            "/api/login",
            json!({ "username": "pg", "password": "hunter22" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let second = json(response).await["apiKey"].as_str().unwrap().to_owned();
        assert_ne!(first, second);

        let response = make_request(
            Some(&first),
            app(state.clone()),
            Method::GET,
            "/api/users/@me",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_username() {
        let state = state();
        let response = make_request(
            None,
            app(state),
            Method::POST,
            "/api/users",
            json!({ "username": "no spaces", "password": "hunter22" })
                .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_profile_read_and_update() {
        let state = state();
        let key = register(&state, "pg").await;

        let response = make_request(
            Some(&key),
            app(state.clone()),
            Method::PATCH,
            "/api/users/@me",
            json!({ "about": "Lisp hacker", "maxvisit": 30 }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["maxvisit"], 30);
        assert_eq!(body["minaway"], 180);
        assert!(body.get("api_key_hash").is_none());

        let response = make_request(
            None,
            app(state.clone()),
            Method::GET,
            "/api/users/pg",
            String::default(),
        )
        .await;
        let body = json(response).await;
        assert_eq!(body["about"], "Lisp hacker");
        assert_eq!(body["karma"], 1);
        assert!(body.get("maxvisit").is_none());

        let response = make_request(
            None,
            app(state),
            Method::GET,
            "/api/users/@me",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
