//! Middlewares for routes.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderName;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::Result;
use crate::{AppState, ServerError, profile};

/// Header carrying the API key.
pub const API_KEY: HeaderName = HeaderName::from_static("api-key");

/// Who sends the request; `None` for anonymous viewers.
#[derive(Clone, Debug, Default)]
pub struct Identity(pub Option<String>);

/// Resolve the `Api-Key` header into an [`Identity`].
///
/// An unknown key is refused, a missing one means anonymous.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let username = match req.headers().get(API_KEY) {
        Some(key) => {
            let key = key.to_str().map_err(|_| ServerError::Unauthorized)?;
            Some(
                profile::authenticate(
                    state.store.as_ref(),
                    &state.crypto,
                    key,
                )
                .await?,
            )
        },
        None => None,
    };

    req.extensions_mut().insert(Identity(username));
    Ok(next.run(req).await)
}

/// Authenticated user, refused with 401 otherwise.
#[derive(Debug)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(|identity| identity.0.clone())
            .map(Actor)
            .ok_or(ServerError::Unauthorized)
    }
}

/// Requesting user, if any.
#[derive(Debug, Default)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts
                .extensions
                .get::<Identity>()
                .and_then(|identity| identity.0.clone()),
        ))
    }
}
