//! Hacker News style views: ranked pages, threads and toggles.

use axum::extract::{OriginalUri, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::Result;
use crate::feed;
use crate::item::{Format, ItemId, ItemQuery, Order};
use crate::middleware::{Actor, Viewer};
use crate::ranking::PageWindow;
use crate::router::{Params, PathParams};
use crate::visibility::Mode;
use crate::vote::{self, Intent};
use crate::AppState;

/// `?p=` of every listing.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub p: i64,
}

fn first_page() -> i64 {
    1
}

/// `?id=` naming a user or an item.
#[derive(Debug, Deserialize)]
pub struct Id<T> {
    pub id: T,
}

/// Render page `p` of `query`, or redirect to the first one when `p` is
/// lower than 1.
async fn listing(
    state: &AppState,
    uri: &OriginalUri,
    query: ItemQuery,
    viewer: Option<&str>,
    mode: Mode,
    page: i64,
) -> Result<Response> {
    let pagination = &state.config.pagination;
    let Some(window) =
        PageWindow::new(page, pagination.page_size, pagination.legacy_offset)
    else {
        return Ok(Redirect::to(&bare(uri)).into_response());
    };

    let page =
        feed::page(state.store.as_ref(), &query, viewer, mode, window).await?;
    Ok(Json(page).into_response())
}

/// Request path without `p`, other parameters kept.
fn bare(uri: &OriginalUri) -> String {
    let path = uri.path();
    let rest: Vec<&str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("p="))
        .collect();

    if rest.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", rest.join("&"))
    }
}

/// Contributions by score.
async fn news(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions().order(Order::Points);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

async fn newest(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions().order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

/// Text posts.
async fn ask(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions()
        .format(Format::Ask)
        .order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

/// Link posts.
async fn show(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions()
        .format(Format::Show)
        .order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

async fn newcomments(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::comments().order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

/// What the viewer hid.
async fn hidden(
    State(state): State<AppState>,
    uri: OriginalUri,
    Actor(username): Actor,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions()
        .hidden_by(&username)
        .order(Order::Newest);
    listing(&state, &uri, query, Some(&username), Mode::OnlyHidden, page.p)
        .await
}

async fn upvoted(
    State(state): State<AppState>,
    uri: OriginalUri,
    Actor(username): Actor,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions()
        .liked_by(&username)
        .order(Order::Newest);
    listing(&state, &uri, query, Some(&username), Mode::UnlessHidden, page.p)
        .await
}

async fn upvoted_comments(
    State(state): State<AppState>,
    uri: OriginalUri,
    Actor(username): Actor,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::comments()
        .liked_by(&username)
        .order(Order::Newest);
    listing(&state, &uri, query, Some(&username), Mode::UnlessHidden, page.p)
        .await
}

/// Contributions of one user.
async fn submitted(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(user): Params<Id<String>>,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::contributions()
        .author(user.id)
        .order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

/// Comments of one user.
async fn threads(
    State(state): State<AppState>,
    uri: OriginalUri,
    viewer: Viewer,
    Params(user): Params<Id<String>>,
    Params(page): Params<PageQuery>,
) -> Result<Response> {
    let query = ItemQuery::comments().author(user.id).order(Order::Newest);
    listing(&state, &uri, query, viewer.as_deref(), Mode::UnlessHidden, page.p)
        .await
}

/// Contribution with its comment thread.
async fn item(
    State(state): State<AppState>,
    viewer: Viewer,
    Params(item): Params<Id<ItemId>>,
) -> Result<Json<feed::Discussion>> {
    Ok(Json(
        feed::discussion(state.store.as_ref(), item.id, viewer.as_deref())
            .await?,
    ))
}

/// Flip the like of the viewer on any item.
async fn like(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<vote::VoteOutcome>> {
    let mut tx = state.store.begin().await?;
    let outcome = vote::like(tx.as_mut(), &username, id, Intent::Toggle).await?;
    tx.commit().await?;

    Ok(Json(outcome))
}

/// Flip the hide of the viewer on any item.
async fn hide(
    State(state): State<AppState>,
    Actor(username): Actor,
    PathParams(id): PathParams<ItemId>,
) -> Result<Json<vote::HideOutcome>> {
    let mut tx = state.store.begin().await?;
    let outcome = vote::hide(tx.as_mut(), &username, id, Intent::Toggle).await?;
    tx.commit().await?;

    Ok(Json(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/news", get(news))
        .route("/newest", get(newest))
        .route("/ask", get(ask))
        .route("/show", get(show))
        .route("/newcomments", get(newcomments))
        .route("/hidden", get(hidden))
        .route("/upvoted", get(upvoted))
        .route("/upvoted_comments", get(upvoted_comments))
        .route("/submitted", get(submitted))
        .route("/threads", get(threads))
        .route("/item", get(item))
        .route("/like/{id}", post(like))
        .route("/hide/{id}", post(hide))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, header};

    use crate::router::tests::{json, register, state, submit};
    use crate::*;

    async fn get(state: &AppState, key: Option<&str>, path: &str) -> serde_json::Value {
        let response =
            make_request(key, app(state.clone()), Method::GET, path, String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        json(response).await
    }

    #[tokio::test]
    async fn test_page_below_one_redirects() {
        let state = state();

        let response = make_request(
            None,
            app(state.clone()),
            Method::GET,
            "/news?p=0",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/news");

        let response = make_request(
            None,
            app(state),
            Method::GET,
            "/submitted?id=pg&p=-2",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/submitted?id=pg");
    }

    #[tokio::test]
    async fn test_largest_page_is_empty() {
        let state = state();
        let pg = register(&state, "pg").await;
        submit(&state, &pg, "only story").await;

        for path in [
            "/news?p=9223372036854775807",
            "/newest?p=9223372036854775807",
        ] {
            let page = get(&state, None, path).await;
            assert_eq!(page["page"], 9223372036854775807_u64);
            assert_eq!(page["more"], false);
            assert!(page["items"].as_array().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_pages_and_hidden_view() {
        let state = state();
        let pg = register(&state, "pg").await;
        let rtm = register(&state, "rtm").await;

        let mut ids = Vec::new();
        for n in 0..32 {
            ids.push(submit(&state, &pg, &format!("story {n}")).await);
        }

        let first = get(&state, None, "/newest").await;
        assert_eq!(first["page"], 1);
        assert_eq!(first["more"], true);
        assert_eq!(first["items"].as_array().unwrap().len(), 30);
        assert_eq!(first["items"][0]["id"], ids[31]);

        // Legacy offset skips the 31st item.
        let second = get(&state, None, "/newest?p=2").await;
        assert_eq!(second["more"], false);
        assert_eq!(second["items"].as_array().unwrap().len(), 1);
        assert_eq!(second["items"][0]["id"], ids[0]);

        let response = make_request(
            Some(&rtm),
            app(state.clone()),
            Method::POST,
            &format!("/hide/{}", ids[31]),
            String::default(),
        )
        .await;
        assert_eq!(json(response).await["hidden_by_you"], true);

        let page = get(&state, Some(&rtm), "/newest").await;
        assert_eq!(page["items"][0]["id"], ids[30]);
        let page = get(&state, Some(&rtm), "/hidden").await;
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["id"], ids[31]);

        // Toggling again restores the listing.
        make_request(
            Some(&rtm),
            app(state.clone()),
            Method::POST,
            &format!("/hide/{}", ids[31]),
            String::default(),
        )
        .await;
        let page = get(&state, Some(&rtm), "/newest").await;
        assert_eq!(page["items"][0]["id"], ids[31]);
    }

    #[tokio::test]
    async fn test_like_toggle_and_views() {
        let state = state();
        let pg = register(&state, "pg").await;
        let rtm = register(&state, "rtm").await;
        let id = submit(&state, &pg, "Ask: what is karma?").await;

        let like = |key: String| {
            let app = app(state.clone());
            async move {
                let response = make_request(
                    Some(&key),
                    app,
                    Method::POST,
                    &format!("/like/{id}"),
                    String::default(),
                )
                .await;
                json(response).await
            }
        };

        assert_eq!(like(rtm.clone()).await["points"], 2);
        assert_eq!(like(rtm.clone()).await["points"], 1);
        assert_eq!(like(rtm.clone()).await["liked"], true);

        let page = get(&state, Some(&rtm), "/upvoted").await;
        assert_eq!(page["items"][0]["liked"], true);
        let page = get(&state, None, "/ask").await;
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        let page = get(&state, None, "/show").await;
        assert!(page["items"].as_array().unwrap().is_empty());
        let page = get(&state, None, "/submitted?id=pg").await;
        assert_eq!(page["items"][0]["points"], 2);

        let thread = get(&state, None, &format!("/item?id={id}")).await;
        assert_eq!(thread["contribution"]["id"], id);
        assert!(thread["comments"].as_array().unwrap().is_empty());

        let response = make_request(
            None,
            app(state),
            Method::GET,
            "/upvoted",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
