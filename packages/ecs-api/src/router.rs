//! Matchit routing over the inspection/control surface.

use std::path::PathBuf;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming as IncomingBody};
use hyper::{Method, Request, Response};
use matchit::Router as MatchitRouter;
use parking_lot::Mutex;

use ecs_recorder::RecordingReader;
use ecs_runtime::{PublishedView, Repository};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::handlers;

/// Shared application state: a lock-free published snapshot for read-only
/// inspection (`/stats`, `/types`, `/query` never contend with the tick
/// loop's own mutation of the live repository) and a separate replica
/// repository that `POST /recorder/seek` is the only handler allowed to
/// mutate.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<PublishedView>,
    pub replica: Arc<Mutex<Repository>>,
    pub readers: Arc<Mutex<std::collections::HashMap<PathBuf, RecordingReader>>>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(live: Arc<PublishedView>, replica: Arc<Mutex<Repository>>, config: ApiConfig) -> Self {
        Self { live, replica, readers: Arc::new(Mutex::new(std::collections::HashMap::new())), config: Arc::new(config) }
    }
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    pub fn new(state: AppState) -> Self {
        let mut router = MatchitRouter::new();
        router.insert("/stats", RouteHandler::Stats).expect("valid route");
        router.insert("/types", RouteHandler::Types).expect("valid route");
        router.insert("/query", RouteHandler::Query).expect("valid route");
        router.insert("/recorder/seek", RouteHandler::RecorderSeek).expect("valid route");
        Self { inner: router, state }
    }

    pub async fn route(&self, req: Request<IncomingBody>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        match self.inner.at(&path) {
            Ok(matched) => {
                let handler = *matched.value;
                match handler.dispatch(req, self.state.clone()).await {
                    Ok(resp) => resp,
                    Err(err) => err.into(),
                }
            }
            Err(_) => ApiError::NotFound(format!("no route for {path}")).into(),
        }
    }
}

#[derive(Clone, Copy)]
enum RouteHandler {
    Stats,
    Types,
    Query,
    RecorderSeek,
}

impl RouteHandler {
    async fn dispatch(
        self,
        req: Request<IncomingBody>,
        state: AppState,
    ) -> Result<Response<Full<Bytes>>, ApiError> {
        let method = req.method().clone();
        let timeout = std::time::Duration::from_millis(state.config.response_timeout_ms);
        let work = async move {
            match self {
                RouteHandler::Stats if method == Method::GET => handlers::get_stats(state),
                RouteHandler::Types if method == Method::GET => handlers::get_types(state),
                RouteHandler::Query if method == Method::GET => handlers::get_query(req, state),
                RouteHandler::RecorderSeek if method == Method::POST => {
                    handlers::post_recorder_seek(req, state).await
                }
                _ => Err(ApiError::BadRequest("method not allowed for this route".to_string())),
            }
        };
        tokio::time::timeout(timeout, work).await.unwrap_or(Err(ApiError::Timeout))
    }
}
