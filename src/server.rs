use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, Mode};
use crate::limits::MAX_REQUEST_LINE_LEN;
use crate::observability::{self, op_label};
use crate::protocol::{Request, Response};

/// How long in-flight connections get to finish after shutdown is signalled.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn respond<T: serde::Serialize>(
    result: Result<T, crate::engine::EngineError>,
    ok: fn(T) -> Response,
) -> Response {
    match result {
        Ok(v) => ok(v),
        Err(e) => {
            if e.status_code() >= 500 {
                error!("request failed: {e}");
            }
            Response::from(&e)
        }
    }
}

/// Execute one request against the engine.
pub async fn dispatch(engine: &Engine, req: Request) -> Response {
    match req {
        Request::CreateBooking { booking } => {
            respond(engine.create_booking(booking).await, Response::created)
        }
        Request::UpdateBooking { id, booking } => {
            respond(engine.update_booking(id, booking).await, Response::ok)
        }
        Request::DeleteBooking { id } => {
            respond(engine.delete_booking(id).await, |_| Response::deleted())
        }
        Request::GetBooking { id } => respond(engine.get_booking(id).await, Response::ok),
        Request::ListBookings { kind } => respond(engine.list_bookings(kind).await, Response::ok),
        Request::CustomerBookings { customer_id } => {
            respond(engine.bookings_for_customer(customer_id).await, Response::ok)
        }
        Request::ResourceBookings { kind, resource_id } => {
            respond(engine.bookings_for_resource(kind, resource_id).await, Response::ok)
        }
        Request::Register { entity } => respond(engine.register(entity).await, Response::created),
        Request::GetReference { kind, id } => {
            respond(engine.get_reference(kind, id).await, Response::ok)
        }
        Request::ListReferences { kind } => {
            respond(engine.list_references(kind).await, Response::ok)
        }
        Request::DeleteReference { kind, id } => {
            respond(engine.delete_reference(kind, id).await, |()| Response::deleted())
        }
        Request::Validate { booking, update } => {
            let mode = if update { Mode::Update } else { Mode::Create };
            match engine.validator().validate_and_prepare(&booking, mode).await {
                Ok(v) => Response::ok(json!({ "valid": true, "booking": v.booking() })),
                Err(e) => Response::from(&e),
            }
        }
    }
}

/// Parse, execute and record one request line.
pub async fn handle_line(engine: &Engine, line: &str) -> Response {
    let req: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "400")
                .increment(1);
            return Response::bad_request(format!("invalid request: {e}"));
        }
    };
    let op = op_label(&req);
    let started = Instant::now();
    let resp = dispatch(engine, req).await;
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
    let status = resp.status.to_string();
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    debug!("{op} -> {}", resp.status);
    resp
}

/// Serve one client until it disconnects.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_REQUEST_LINE_LEN));
    while let Some(line) = framed.next().await {
        let resp = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(&engine, &line).await,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Response::bad_request(format!("request line exceeds {MAX_REQUEST_LINE_LEN} bytes"))
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        let out = serde_json::to_string(&resp).map_err(io::Error::other)?;
        framed.send(out).await.map_err(|e| match e {
            LinesCodecError::Io(e) => e,
            other => io::Error::other(other),
        })?;
    }
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

/// Accept loop. Stops accepting when `shutdown` resolves, then waits up to
/// `DRAIN_TIMEOUT` for in-flight connections.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    max_connections: usize,
    shutdown: impl Future<Output = ()>,
) -> io::Result<()> {
    let semaphore = Arc::new(Semaphore::new(max_connections));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = process_connection(socket, engine).await {
                        error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(DRAIN_TIMEOUT);
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }
    Ok(())
}
