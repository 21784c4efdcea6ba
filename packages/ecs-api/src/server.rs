//! Hyper server setup, grounded in the teacher's `in-mem-db-api::server`:
//! a `TcpListener` accept loop, one spawned task per connection, auto
//! HTTP/1-or-2 negotiation via `hyper_util`'s `auto::Builder`.

use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming as IncomingBody};
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use tokio::net::TcpListener;

use crate::router::Router;

pub struct Server {
    router: Arc<Router>,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self { router: Arc::new(router) }
    }

    pub async fn serve(self, addr: std::net::SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "ecs-api listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = Arc::clone(&self.router);

            tokio::task::spawn(async move {
                let builder = ConnectionBuilder::new(TokioExecutor::new());
                if let Err(err) = builder
                    .serve_connection(io, hyper::service::service_fn(move |req| handle(req, router.clone())))
                    .await
                {
                    tracing::warn!(%peer, error = %err, "connection error");
                }
            });
        }
    }
}

async fn handle(
    req: Request<IncomingBody>,
    router: Arc<Router>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    Ok(router.route(req).await)
}
