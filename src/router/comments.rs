//! Comments API.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::feed;
use crate::item::{ItemId, ItemQuery, ItemView, Relation, Scope};
use crate::middleware::{Actor, Viewer};
use crate::router::contributions::Listing;
use crate::router::{Action, Params, PathParams, Valid};
use crate::submission;
use crate::{AppState, ServerError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Text {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Text must be 1 to 2000 characters long."
    ))]
    pub text: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Deleted {
    pub id: ItemId,
    pub removed: usize,
}

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Params(listing): Params<Listing>,
) -> Result<Json<Vec<ItemView>>> {
    let (query, mode) =
        listing.query(ItemQuery::comments(), viewer.as_deref())?;

    Ok(Json(
        feed::all(state.store.as_ref(), &query, viewer.as_deref(), mode)
            .await?,
    ))
}

pub async fn get(
    State(state): State<AppState>,
    viewer: Viewer,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<ItemView>> {
    let view = feed::item(state.store.as_ref(), id, viewer.as_deref()).await?;
    if !view.item.is_comment() {
        return Err(ServerError::not_found("comment", id));
    }

    Ok(Json(view))
}

pub async fn update(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
    Valid(body): Valid<Text>,
) -> Result<Json<ItemView>> {
    let mut tx = state.store.begin().await?;
    let item =
        submission::edit_comment(tx.as_mut(), &username, id, &body.text)
            .await?;
    let liked = tx
        .related(Relation::Likes, id, &username)
        .await?;
    tx.commit().await?;

    let mut view = ItemView::new(item, liked);
    view.show = true;

    Ok(Json(view))
}

pub async fn delete(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<Deleted>> {
    let mut tx = state.store.begin().await?;
    let removed =
        submission::delete_comment(tx.as_mut(), &username, id).await?;
    tx.commit().await?;

    Ok(Json(Deleted { id, removed }))
}

pub async fn reply(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
    Valid(body): Valid<Text>,
) -> Result<(StatusCode, Json<ItemView>)> {
    let mut tx = state.store.begin().await?;
    let item =
        submission::reply(tx.as_mut(), &username, id, &body.text).await?;
    tx.commit().await?;

    let mut view = ItemView::new(item, true);
    view.show = true;

    Ok((StatusCode::CREATED, Json(view)))
}

/// `PUT /comments/{id}/{vote|unvote|hide|unhide}`.
pub async fn mutate(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams((id, action)): PathParams<(ItemId, Action)>,
) -> Result<Json<serde_json::Value>> {
    Ok(Json(
        super::mutate(&state, &username, id, Scope::Comments, action).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::router::tests::{json, register, state, submit};
    use crate::*;

    async fn post_comment(state: &AppState, key: &str, path: String) -> i64 {
        let response = make_request(
            Some(key),
            app(state.clone()),
            Method::POST,
            &path,
            json!({ "text": "well said" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        json(response).await["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_reply_edit_delete() {
        let state = state();
        let pg = register(&state, "pg").await;
        let rtm = register(&state, "rtm").await;
        let id = submit(&state, &pg, "Beating the averages").await;

        let top =
            post_comment(&state, &rtm, format!("/api/contributions/{id}/comments"))
                .await;
        let reply =
            post_comment(&state, &pg, format!("/api/comments/{top}/replies"))
                .await;
        post_comment(&state, &rtm, format!("/api/comments/{reply}/replies"))
            .await;

        let response = make_request(
            Some(&pg),
            app(state.clone()),
            Method::PATCH,
            &format!("/api/comments/{top}"),
            json!({ "text": "mine now" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = make_request(
            Some(&rtm),
            app(state.clone()),
            Method::PATCH,
            &format!("/api/comments/{top}"),
            json!({ "text": "edited" }).to_string(),
        )
        .await;
        assert_eq!(json(response).await["text"], "edited");

        let response = make_request(
            Some(&pg),
            app(state.clone()),
            Method::DELETE,
            &format!("/api/comments/{reply}"),
            String::default(),
        )
        .await;
        assert_eq!(json(response).await["removed"], 2);

        let response = make_request(
            None,
            app(state.clone()),
            Method::GET,
            &format!("/api/contributions/{id}"),
            String::default(),
        )
        .await;
        assert_eq!(json(response).await["comments"], 1);

        let response = make_request(
            None,
            app(state),
            Method::GET,
            &format!("/api/comments/{reply}"),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hidden_comment_cascades_in_thread() {
        let state = state();
        let pg = register(&state, "pg").await;
        let rtm = register(&state, "rtm").await;
        let id = submit(&state, &pg, "On Lisp").await;

        let top =
            post_comment(&state, &pg, format!("/api/contributions/{id}/comments"))
                .await;
        let left =
            post_comment(&state, &pg, format!("/api/comments/{top}/replies"))
                .await;
        let right =
            post_comment(&state, &pg, format!("/api/comments/{top}/replies"))
                .await;
        let below =
            post_comment(&state, &pg, format!("/api/comments/{left}/replies"))
                .await;

        let toggle = |action: &'static str| {
            let app = app(state.clone());
            let key = rtm.clone();
            async move {
                make_request(
                    Some(&key),
                    app,
                    Method::PUT,
                    &format!("/api/comments/{top}/{action}"),
                    String::default(),
                )
                .await
            }
        };
        let thread = || {
            let app = app(state.clone());
            let key = rtm.clone();
            async move {
                let response = make_request(
                    Some(&key),
                    app,
                    Method::GET,
                    &format!("/item?id={id}"),
                    String::default(),
                )
                .await;
                assert_eq!(response.status(), StatusCode::OK);
                json(response).await
            }
        };
        let flags = |thread: &serde_json::Value| -> Vec<(i64, bool)> {
            thread["comments"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| (c["id"].as_i64().unwrap(), c["show"].as_bool().unwrap()))
                .collect()
        };

        assert_eq!(toggle("hide").await.status(), StatusCode::OK);
        let hidden = thread().await;
        assert_eq!(hidden["contribution"]["comments"], 4);
        assert_eq!(
            flags(&hidden),
            vec![(top, false), (left, false), (below, false), (right, false)]
        );

        assert_eq!(toggle("unhide").await.status(), StatusCode::OK);
        let shown = thread().await;
        assert_eq!(shown["contribution"]["comments"], 4);
        assert_eq!(
            flags(&shown),
            vec![(top, true), (left, true), (below, true), (right, true)]
        );
    }

    #[tokio::test]
    async fn test_comment_votes() {
        let state = state();
        let pg = register(&state, "pg").await;
        let rtm = register(&state, "rtm").await;
        let id = submit(&state, &pg, "Hackers and painters").await;
        let comment =
            post_comment(&state, &rtm, format!("/api/contributions/{id}/comments"))
                .await;

        let vote = |key: String, action: &'static str| {
            let app = app(state.clone());
            async move {
                make_request(
                    Some(&key),
                    app,
                    Method::PUT,
                    &format!("/api/comments/{comment}/{action}"),
                    String::default(),
                )
                .await
            }
        };

        let response = vote(pg.clone(), "vote").await;
        assert_eq!(json(response).await["points"], 2);
        assert_eq!(vote(pg, "vote").await.status(), StatusCode::CONFLICT);
        // Authors may take back the vote on their own comment.
        assert_eq!(vote(rtm.clone(), "unvote").await.status(), StatusCode::OK);

        // A contribution is not reachable through the comments API.
        let response = make_request(
            Some(&rtm),
            app(state.clone()),
            Method::PUT,
            &format!("/api/comments/{id}/vote"),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = make_request(
            Some(&rtm),
            app(state),
            Method::GET,
            "/api/comments?liked=true",
            String::default(),
        )
        .await;
        assert!(json(response).await.as_array().unwrap().is_empty());
    }
}
