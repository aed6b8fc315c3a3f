// Per-connection serving
// Admission against the connection cap, then one HTTP/1.1 session per task
// with per-request deadlines

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;

use crate::config::AppState;
use crate::handler;
use crate::http;
use crate::logger;

/// Occupies one slot of the active connection count until dropped
pub struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    /// Claim a slot, or `None` when `limit` slots are already taken
    pub fn acquire(active: &Arc<AtomicUsize>, limit: Option<u64>) -> Option<Self> {
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
            .ok()
            .map(|_| Self {
                active: Arc::clone(active),
            })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Admit an accepted stream and serve it on a spawned task
///
/// Streams over `performance.max_connections` are closed immediately.
pub fn accept_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: &Arc<AppState>,
    active: &Arc<AtomicUsize>,
) {
    let limit = state.config.performance.max_connections;
    let Some(slot) = ConnectionSlot::acquire(active, limit) else {
        logger::log_warning(&format!(
            "Connection limit {} reached, rejecting {peer}",
            limit.unwrap_or_default()
        ));
        return;
    };

    if let Err(e) = stream.set_nodelay(true) {
        logger::log_warning(&format!("Could not disable Nagle for {peer}: {e}"));
    }

    tokio::spawn(serve(stream, peer, Arc::clone(state), slot));
}

/// Run one HTTP/1.1 session
///
/// Each request head must arrive within the header timeout, which also closes
/// idle keep-alive connections. Each request is then bounded by the request
/// timeout and answered with 408 when it runs out. The session as a whole has
/// no deadline, so long keep-alive use and large response bodies are fine.
async fn serve(stream: TcpStream, peer: SocketAddr, state: Arc<AppState>, _slot: ConnectionSlot) {
    let perf = &state.config.performance;

    let service = {
        let state = Arc::clone(&state);
        service_fn(move |req| respond_within_budget(req, Arc::clone(&state), peer))
    };
    let session = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(perf.header_timeout())
        .keep_alive(perf.keep_alive())
        .serve_connection(TokioIo::new(stream), service);

    match session.await {
        Ok(()) => {}
        // Header timeout: idle keep-alive or a stalled client
        Err(err) if err.is_timeout() => {}
        Err(err) => logger::log_connection_error(&err),
    }
}

async fn respond_within_budget(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let budget = state.config.performance.request_timeout();
    let path = req.uri().path().to_string();

    match tokio::time::timeout(budget, handler::handle_request(req, state, Some(peer))).await {
        Ok(response) => response,
        Err(_) => {
            logger::log_warning(&format!(
                "{path} from {peer} exceeded the {}s request timeout",
                budget.as_secs()
            ));
            Ok(http::build_error_response(
                StatusCode::REQUEST_TIMEOUT,
                "Request Timeout",
            ))
        }
    }
}
