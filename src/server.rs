use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::TweeterError;
use crate::store::TweetStore;
use crate::tweet::{Tweet, TweetId};

/// Body of `POST /tweet`. A non-empty `url` makes an image tweet, a non-empty
/// `id` quotes that tweet, otherwise it is a plain text tweet.
#[derive(Debug, Default, Deserialize)]
pub struct TweetRequest {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TweetResponse {
    pub id: Option<TweetId>,
    pub kind: String,
    pub user: String,
    pub text: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted: Option<Box<TweetResponse>>,
    pub rendered: String,
}

impl From<&Tweet> for TweetResponse {
    fn from(tweet: &Tweet) -> Self {
        Self {
            id: tweet.id(),
            kind: tweet.kind().name().to_string(),
            user: tweet.author().to_string(),
            text: tweet.body().to_string(),
            date: tweet.timestamp().to_rfc3339(),
            url: tweet.url().map(str::to_string),
            quoted: tweet.quoted().map(|quoted| Box::new(TweetResponse::from(quoted.as_ref()))),
            rendered: tweet.render(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub user: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub struct ApiError(TweeterError);

impl From<TweeterError> for ApiError {
    fn from(e: TweeterError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            TweeterError::NotFound(_) | TweeterError::EmptyStore => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = self.0.to_string();
        warn!(%error, code = %status.as_u16(), "request failed");
        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn bad_request(message: String) -> Response {
    warn!(%message, "bad request");
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

fn parse_id(raw: &str) -> Result<TweetId, Response> {
    raw.trim()
        .parse::<TweetId>()
        .map_err(|_| bad_request(format!("'{raw}' is not a tweet id")))
}

pub fn router(store: Arc<TweetStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/tweet", get(last_tweet).post(publish_tweet))
        .route("/tweet/:id", get(tweet_by_id))
        .route("/tweets", get(all_tweets))
        .route("/tweets/:user", get(tweets_by_user))
        .route("/tweets/:user/count", get(count_by_user))
        .route("/search", get(search))
        .layer(cors)
        .with_state(store)
}

async fn last_tweet(State(store): State<Arc<TweetStore>>) -> Result<Json<TweetResponse>, ApiError> {
    let tweet = store.get_last()?;
    Ok(Json(TweetResponse::from(tweet.as_ref())))
}

async fn all_tweets(State(store): State<Arc<TweetStore>>) -> Json<Vec<TweetResponse>> {
    Json(store.get_all().iter().map(|t| TweetResponse::from(t.as_ref())).collect())
}

async fn tweet_by_id(State(store): State<Arc<TweetStore>>, Path(raw): Path<String>) -> Response {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match store.get_by_id(id) {
        Ok(tweet) => Json(TweetResponse::from(tweet.as_ref())).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn tweets_by_user(State(store): State<Arc<TweetStore>>, Path(user): Path<String>) -> Json<Vec<TweetResponse>> {
    Json(store.get_by_user(&user).iter().map(|t| TweetResponse::from(t.as_ref())).collect())
}

async fn count_by_user(State(store): State<Arc<TweetStore>>, Path(user): Path<String>) -> Json<CountResponse> {
    let count = store.count_by_user(&user);
    Json(CountResponse { user, count })
}

async fn publish_tweet(State(store): State<Arc<TweetStore>>, Json(req): Json<TweetRequest>) -> Response {
    let tweet = if !req.url.is_empty() {
        Tweet::image(req.user, req.text, req.url)
    } else if !req.id.is_empty() {
        let quoted = match parse_id(&req.id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match store.get_by_id(quoted) {
            Ok(quoted) => Tweet::quote(req.user, req.text, quoted),
            Err(e) => return ApiError(e).into_response(),
        }
    } else {
        Tweet::text(req.user, req.text)
    };
    // publishing may hit a blocking sink, keep it off the runtime workers
    let published = tokio::task::spawn_blocking(move || {
        store.publish(tweet).and_then(|id| store.get_by_id(id))
    })
    .await;
    let published = match published {
        Ok(published) => published,
        Err(e) => {
            warn!(error = %e, "publish task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            )
                .into_response();
        }
    };
    match published {
        Ok(tweet) => {
            info!(id = ?tweet.id(), user = tweet.author(), kind = tweet.kind().name(), "tweet published over http");
            (StatusCode::CREATED, Json(TweetResponse::from(tweet.as_ref()))).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// Streams matches as newline-delimited JSON while the search runs.
async fn search(State(store): State<Arc<TweetStore>>, Query(params): Query<SearchParams>) -> Response {
    let lines = store.search_containing(params.q).into_stream().map(|tweet| {
        let mut line = serde_json::to_string(&TweetResponse::from(tweet.as_ref()))
            .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        line.push('\n');
        Ok::<_, Infallible>(line)
    });
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

pub async fn serve(store: Arc<TweetStore>, bind: std::net::SocketAddr) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "http api listening");
    axum::serve(listener, router(store)).await?;
    Ok(())
}
