//! Contributions API.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::feed::{self, Discussion};
use crate::item::{ItemId, ItemQuery, ItemView, Order, Scope};
use crate::middleware::{Actor, Viewer};
use crate::router::{Action, Params, PathParams, Valid};
use crate::submission;
use crate::tree::ThreadEntry;
use crate::visibility::Mode;
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Submit {
    #[validate(length(
        min = 1,
        max = 80,
        message = "Title must be 1 to 80 characters long."
    ))]
    pub title: String,
    #[validate(
        url(message = "URL must be valid."),
        length(max = 500, message = "URL must be at most 500 characters long.")
    )]
    pub url: Option<String>,
    #[validate(length(
        max = 2000,
        message = "Text must be at most 2000 characters long."
    ))]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Text must be 1 to 2000 characters long."
    ))]
    pub text: String,
    pub parent: Option<ItemId>,
}

/// Filters of a listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub username: Option<String>,
    pub order_by: Option<Order>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl Listing {
    /// Build `base` filtered for `viewer` and the visibility mode to use.
    pub fn query(
        self,
        base: ItemQuery,
        viewer: Option<&str>,
    ) -> Result<(ItemQuery, Mode)> {
        let mut query = base.order(self.order_by.unwrap_or_default());
        if let Some(username) = self.username {
            query = query.author(username);
        }

        match (self.liked, self.hidden, viewer) {
            (true, true, _) => Err(ServerError::InvalidInput(
                "'liked' and 'hidden' cannot be combined".into(),
            )),
            (true, false, Some(viewer)) => {
                Ok((query.liked_by(viewer), Mode::UnlessHidden))
            },
            (false, true, Some(viewer)) => {
                Ok((query.hidden_by(viewer), Mode::OnlyHidden))
            },
            (true, false, None) | (false, true, None) => {
                Err(ServerError::Unauthorized)
            },
            (false, false, _) => Ok((query, Mode::UnlessHidden)),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Params(listing): Params<Listing>,
) -> Result<Json<Vec<ItemView>>> {
    let (query, mode) =
        listing.query(ItemQuery::contributions(), viewer.as_deref())?;

    Ok(Json(
        feed::all(state.store.as_ref(), &query, viewer.as_deref(), mode)
            .await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Actor(username): Actor,
    Valid(body): Valid<Submit>,
) -> Result<(StatusCode, Json<ItemView>)> {
    let mut tx = state.store.begin().await?;
    let item = submission::submit(
        tx.as_mut(),
        &username,
        &body.title,
        body.url,
        body.text,
    )
    .await?;
    tx.commit().await?;

    let mut view = ItemView::new(item, true);
    view.show = true;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(state): State<AppState>,
    viewer: Viewer,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<ItemView>> {
    let view = feed::item(state.store.as_ref(), id, viewer.as_deref()).await?;
    if view.item.is_comment() {
        return Err(ServerError::not_found("contribution", id));
    }

    Ok(Json(view))
}

/// Thread of a contribution.
pub async fn comments(
    State(state): State<AppState>,
    viewer: Viewer,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<Vec<ThreadEntry>>> {
    let Discussion { comments, .. } =
        feed::discussion(state.store.as_ref(), id, viewer.as_deref()).await?;

    Ok(Json(comments))
}

pub async fn comment(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
    Valid(body): Valid<NewComment>,
) -> Result<(StatusCode, Json<ItemView>)> {
    let mut tx = state.store.begin().await?;
    let item =
        submission::comment(tx.as_mut(), &username, id, body.parent, &body.text)
            .await?;
    tx.commit().await?;

    let mut view = ItemView::new(item, true);
    view.show = true;

    Ok((StatusCode::CREATED, Json(view)))
}

/// `PUT /contributions/{id}/{vote|unvote|hide|unhide}`.
pub async fn mutate(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams((id, action)): PathParams<(ItemId, Action)>,
) -> Result<Json<serde_json::Value>> {
    Ok(Json(
        super::mutate(&state, &username, id, Scope::Contributions, action)
            .await?,
    ))
}
