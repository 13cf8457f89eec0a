//! JSON over HTTP front for the engine and the queries
use crate::ad::{Ad, AdError, Bid, NewAd, OwnerId, UpdateAdPayload};
use crate::service::{LoopService, SharedAdEngine, SharedAdQuery};
use anyhow::{format_err, Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr};
use tokio::{runtime::Runtime, sync::oneshot};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedAdEngine,
    pub query: SharedAdQuery,
}

/// An [`AdError`] on its way to becoming an HTTP response
#[derive(Debug)]
pub struct ApiError(AdError);

impl From<AdError> for ApiError {
    fn from(e: AdError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use AdError::*;
        match self.0 {
            NotFound(_) | NoAdsForOwner(_) => StatusCode::NOT_FOUND,
            Unauthorized(_) => StatusCode::FORBIDDEN,
            InvalidStatus(_) | InvalidAmount(_) => StatusCode::BAD_REQUEST,
            AdClosed | SelfBid | DuplicateBid(_) => StatusCode::CONFLICT,
            Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.kind(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Engine and store calls block, keep them off the async workers
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> std::result::Result<T, AdError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AdError::Store(e.into()))?
        .map_err(ApiError::from)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAdRequest {
    owner: OwnerId,
    #[serde(flatten)]
    payload: UpdateAdPayload,
}

#[derive(Deserialize)]
struct OwnerParam {
    owner: OwnerId,
}

async fn create_ad(
    State(state): State<AppState>,
    Json(new_ad): Json<NewAd>,
) -> ApiResult<(StatusCode, Json<Ad>)> {
    let ad = blocking(move || state.engine.create_ad(new_ad)).await?;
    Ok((StatusCode::CREATED, Json(ad)))
}

async fn get_all_ads(State(state): State<AppState>) -> ApiResult<Json<Vec<Ad>>> {
    Ok(Json(blocking(move || state.query.get_all_ads()).await?))
}

async fn get_ad_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ad>> {
    Ok(Json(blocking(move || state.query.get_ad_by_id(&id)).await?))
}

async fn update_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAdRequest>,
) -> ApiResult<Json<Ad>> {
    Ok(Json(
        blocking(move || {
            state
                .engine
                .update_ad(&id, &request.owner, request.payload)
        })
        .await?,
    ))
}

async fn delete_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(OwnerParam { owner }): Query<OwnerParam>,
) -> ApiResult<Json<Ad>> {
    Ok(Json(
        blocking(move || state.engine.delete_ad(&id, &owner)).await?,
    ))
}

async fn bid_on_ad(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(bid): Json<Bid>,
) -> ApiResult<Json<Ad>> {
    Ok(Json(
        blocking(move || state.engine.bid_on_ad(&id, &bid.bidder, bid.amount)).await?,
    ))
}

async fn get_ads_by_owner(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> ApiResult<Json<Vec<Ad>>> {
    Ok(Json(
        blocking(move || state.query.get_ads_by_owner(&owner)).await?,
    ))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ads", get(get_all_ads).post(create_ad))
        .route(
            "/ads/:id",
            get(get_ad_by_id).put(update_ad).delete(delete_ad),
        )
        .route("/ads/:id/bids", post(bid_on_ad))
        .route("/owners/:owner/ads", get(get_ads_by_owner))
        .with_state(state)
}

async fn run_http_server(listen: SocketAddr, state: AppState) -> Result<()> {
    let server = axum::Server::try_bind(&listen)?;
    info!(%listen, "http server listening");
    server.serve(router(state).into_make_service()).await?;

    Ok(())
}

pub struct Ui {
    // cancels all tasks on drop
    _runtime: Runtime,
    // `None` once the server has finished cleanly
    server_rx: Option<oneshot::Receiver<Result<()>>>,
}

impl Ui {
    pub fn new(listen: SocketAddr, state: AppState) -> Result<Self> {
        Self::spawn(async move {
            run_http_server(listen, state)
                .await
                .with_context(|| format!("Failed to run http server on {listen}"))
        })
    }

    /// Run `server` on a fresh runtime, reporting its outcome to `run_iteration`
    pub(crate) fn spawn<F>(server: F) -> Result<Self>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let runtime = Runtime::new()?;

        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            if tx.send(server.await).is_err() {
                debug!("ui dropped before the http server finished");
            }
        });

        Ok(Self {
            _runtime: runtime,
            server_rx: Some(rx),
        })
    }
}

impl LoopService for Ui {
    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(std::time::Duration::from_millis(100));

        let Some(server_rx) = self.server_rx.as_mut() else {
            return Ok(());
        };

        match server_rx.try_recv() {
            Ok(res) => {
                self.server_rx = None;
                if res.is_ok() {
                    info!("http server shut down");
                }
                res
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(format_err!("ui server died without leaving a response?!"))
            }
        }
    }
}
