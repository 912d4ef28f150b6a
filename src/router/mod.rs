//! HTTP surface: the JSON API under `/api` and the listing views.
pub mod comments;
pub mod contributions;
pub mod news;
pub mod status;
pub mod users;

use std::sync::LazyLock;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use regex_lite::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::Result;
use crate::item::{ItemId, Scope};
use crate::vote::{self, Intent};
use crate::{AppState, ServerError};

static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

/// Check that a username only uses letters, digits, `_` and `-`.
pub fn validate_username(
    username: &str,
) -> std::result::Result<(), ValidationError> {
    if USERNAME.as_ref().is_some_and(|re| re.is_match(username)) {
        Ok(())
    } else {
        Err(ValidationError::new("username"))
    }
}

/// JSON body checked with [`Validate`] before reaching the handler.
#[derive(Debug)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Query string rejected as a [`ServerError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct Params<T>(pub T);

/// Path parameters rejected as a [`ServerError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServerError))]
pub struct PathParams<T>(pub T);

/// Strict mutations exposed on the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Vote,
    Unvote,
    Hide,
    Unhide,
}

/// Apply `action` on item `id` of `scope` in one transaction.
pub(crate) async fn mutate(
    state: &AppState,
    actor: &str,
    id: ItemId,
    scope: Scope,
    action: Action,
) -> Result<serde_json::Value> {
    let mut tx = state.store.begin().await?;
    tx.find_item(id)
        .await?
        .filter(|item| scope.admits(item))
        .ok_or_else(|| match scope {
            Scope::Contributions => ServerError::not_found("contribution", id),
            Scope::Comments => ServerError::not_found("comment", id),
        })?;

    let outcome = match action {
        Action::Vote => {
            serde_json::to_value(vote::like(tx.as_mut(), actor, id, Intent::Add).await?)
        },
        Action::Unvote => serde_json::to_value(
            vote::like(tx.as_mut(), actor, id, Intent::Remove).await?,
        ),
        Action::Hide => {
            serde_json::to_value(vote::hide(tx.as_mut(), actor, id, Intent::Add).await?)
        },
        Action::Unhide => serde_json::to_value(
            vote::hide(tx.as_mut(), actor, id, Intent::Remove).await?,
        ),
    }
    .map_err(|err| ServerError::Internal {
        details: "cannot serialize outcome".into(),
        source: Some(Box::new(err)),
    })?;
    tx.commit().await?;

    Ok(outcome)
}

/// JSON API.
pub fn api() -> Router<AppState> {
    Router::new()
        // `POST /api/users` goes to `register`.
        .route("/users", post(users::register))
        // `POST /api/login` goes to `login`.
        .route("/login", post(users::login))
        .route("/users/@me", get(users::me).patch(users::update))
        .route("/users/{username}", get(users::get))
        .route(
            "/contributions",
            get(contributions::list).post(contributions::create),
        )
        .route("/contributions/{id}", get(contributions::get))
        .route(
            "/contributions/{id}/comments",
            get(contributions::comments).post(contributions::comment),
        )
        .route("/contributions/{id}/{action}", put(contributions::mutate))
        .route("/comments", get(comments::list))
        .route(
            "/comments/{id}",
            get(comments::get)
                .patch(comments::update)
                .delete(comments::delete),
        )
        .route("/comments/{id}/replies", post(comments::reply))
        .route("/comments/{id}/{action}", put(comments::mutate))
}
