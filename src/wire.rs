use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::engine::{describe_conflict, Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::{self, AUTH_FAILURES_TOTAL, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use crate::protocol::{encode_response, parse_request, ProtocolError, Request, Response, TimeWindow};
use crate::tenant::TenantManager;

/// Notifications queued per connection before listener tasks start waiting.
const NOTIFY_BUFFER: usize = 256;

type Lines = Framed<TcpStream, LinesCodec>;

#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Codec(#[from] LinesCodecError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Room listeners of one connection. A room's channel is released on the hub
/// once the forwarding task holding its receiver has stopped.
struct Subscriptions {
    hub: Arc<NotifyHub>,
    tasks: HashMap<RoomId, JoinHandle<()>>,
}

impl Subscriptions {
    fn new(hub: Arc<NotifyHub>) -> Self {
        Self {
            hub,
            tasks: HashMap::new(),
        }
    }

    fn listen(&mut self, room_id: &str, out: &mpsc::Sender<Response>) {
        if self.tasks.contains_key(room_id) {
            return;
        }
        let mut rx = self.hub.subscribe(room_id);
        let tx = out.clone();
        let rid = room_id.to_string();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let note = Response::Notification {
                            room_id: rid.clone(),
                            event,
                        };
                        if tx.send(note).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(room_id = %rid, skipped, "listener lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.tasks.insert(room_id.to_string(), task);
    }

    async fn unlisten(&mut self, room_id: &str) {
        if let Some(task) = self.tasks.remove(room_id) {
            stop_forwarding(&self.hub, room_id, task).await;
        }
    }

    async fn unlisten_all(&mut self) {
        let tasks: Vec<_> = self.tasks.drain().collect();
        for (room_id, task) in tasks {
            stop_forwarding(&self.hub, &room_id, task).await;
        }
    }
}

/// Awaiting an aborted task returns after its future, and the receiver it
/// owns, have been dropped.
async fn stop_forwarding(hub: &NotifyHub, room_id: &str, task: JoinHandle<()>) {
    task.abort();
    let _ = task.await;
    hub.release(room_id);
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let tasks: Vec<_> = self.tasks.drain().collect();
        for (_, task) in &tasks {
            task.abort();
        }
        // Disconnects end up here; release the channels off the dropping task.
        if let Ok(runtime) = Handle::try_current() {
            let hub = self.hub.clone();
            runtime.spawn(async move {
                for (room_id, task) in tasks {
                    let _ = task.await;
                    hub.release(&room_id);
                }
            });
        }
    }
}

/// Serve one client: handshake, then one response per request line, with
/// room notifications interleaved between responses.
pub async fn process_connection(
    socket: TcpStream,
    tenants: Arc<TenantManager>,
    password: String,
) -> Result<(), WireError> {
    let mut lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    let Some((university, engine)) = handshake(&mut lines, &tenants, &password).await? else {
        return Ok(());
    };
    info!(university = %university, "client ready");

    let (notify_tx, mut notify_rx) = mpsc::channel::<Response>(NOTIFY_BUFFER);
    let mut subs = Subscriptions::new(engine.notify.clone());

    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    None => break,
                    Some(Ok(line)) => line,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        send(&mut lines, &Response::error("bad_request", "request line too long")).await?;
                        continue;
                    }
                    Some(Err(e)) => return Err(e.into()),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = match parse_request(&line) {
                    Ok(req) => {
                        let op = observability::op_label(&req);
                        let started = Instant::now();
                        let response = handle_request(&engine, req, &mut subs, &notify_tx).await;
                        let status = if matches!(response, Response::Error { .. }) { "error" } else { "ok" };
                        metrics::counter!(REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
                        metrics::histogram!(REQUEST_DURATION_SECONDS, "op" => op)
                            .record(started.elapsed().as_secs_f64());
                        response
                    }
                    Err(e) => {
                        debug!(error = %e, "unparsable request");
                        Response::error("bad_request", e.to_string())
                    }
                };
                send(&mut lines, &response).await?;
            }
            Some(note) = notify_rx.recv() => {
                send(&mut lines, &note).await?;
            }
        }
    }

    debug!(university = %university, "client disconnected");
    Ok(())
}

async fn send(lines: &mut Lines, response: &Response) -> Result<(), WireError> {
    lines.send(encode_response(response)?).await?;
    Ok(())
}

/// First line must be `hello`. Returns `None` after answering a failed handshake.
async fn handshake(
    lines: &mut Lines,
    tenants: &TenantManager,
    password: &str,
) -> Result<Option<(String, Arc<Engine>)>, WireError> {
    let line = match lines.next().await {
        None => return Ok(None),
        Some(Ok(line)) => line,
        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
            send(lines, &Response::error("bad_request", "request line too long")).await?;
            return Ok(None);
        }
        Some(Err(e)) => return Err(e.into()),
    };

    let (university, given) = match parse_request(&line) {
        Ok(Request::Hello {
            university,
            password,
        }) => (university, password),
        Ok(_) => {
            send(lines, &Response::error("bad_request", "expected hello")).await?;
            return Ok(None);
        }
        Err(e) => {
            send(lines, &Response::error("bad_request", e.to_string())).await?;
            return Ok(None);
        }
    };

    if given != password {
        metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
        warn!(university = %university, "authentication failed");
        send(lines, &Response::error("auth_failed", "password authentication failed")).await?;
        return Ok(None);
    }

    let engine = match tenants.get_or_create(&university) {
        Ok(engine) => engine,
        Err(e) => {
            send(lines, &Response::error("tenant", e.to_string())).await?;
            return Ok(None);
        }
    };
    send(
        lines,
        &Response::Ready {
            university: university.clone(),
        },
    )
    .await?;
    Ok(Some((university, engine)))
}

fn engine_err(e: EngineError) -> Response {
    Response::error(e.code(), e.to_string())
}

async fn handle_request(
    engine: &Engine,
    req: Request,
    subs: &mut Subscriptions,
    notify_tx: &mpsc::Sender<Response>,
) -> Response {
    match req {
        Request::Hello { .. } => Response::error("bad_request", "already authenticated"),
        Request::CreateBooking { booking } => match engine.create_booking(booking).await {
            Ok(booking) => Response::Booking { booking },
            Err(e) => engine_err(e),
        },
        Request::CheckConflict { candidate } => {
            let conflict = engine.check_conflict(&candidate).await;
            let message = conflict.as_ref().map(describe_conflict);
            Response::Conflict { conflict, message }
        }
        Request::OccurrencesOnDate { room_id, date } => Response::Bookings {
            bookings: engine.occurrences_on_date(&room_id, date).await,
        },
        Request::FreeWindows {
            room_id,
            date,
            opens_at,
            closes_at,
            min_duration,
        } => {
            if opens_at >= closes_at {
                return Response::error("bad_request", "opensAt must be before closesAt");
            }
            let opening = Span::between(opens_at, closes_at);
            let windows = engine
                .free_windows(&room_id, date, opening, min_duration)
                .await
                .into_iter()
                .filter_map(TimeWindow::from_span)
                .collect();
            Response::FreeWindows {
                room_id,
                date,
                windows,
            }
        }
        Request::CancelBooking { id } => status_response(engine.cancel_booking(id).await),
        Request::RejectBooking { id } => status_response(engine.reject_booking(id).await),
        Request::ConfirmBooking { id } => status_response(engine.confirm_booking(id).await),
        Request::GetBooking { id } => status_response(engine.get_booking(&id).await),
        Request::ListBookings { user_id } => Response::Bookings {
            bookings: engine.list_bookings(user_id.as_deref()).await,
        },
        Request::ListRooms => Response::Rooms {
            rooms: engine.list_rooms(),
        },
        Request::Listen { room_id } => {
            if engine.get_room(&room_id).is_none() && engine.get_schedule(&room_id).is_none() {
                return engine_err(EngineError::UnknownRoom(room_id));
            }
            subs.listen(&room_id, notify_tx);
            debug!(
                room_id = %room_id,
                listeners = engine.notify.subscriber_count(&room_id),
                "listening"
            );
            Response::Listening { room_id }
        }
        Request::Unlisten { room_id } => {
            subs.unlisten(&room_id).await;
            Response::Unlistened {
                room_id: Some(room_id),
            }
        }
        Request::UnlistenAll => {
            subs.unlisten_all().await;
            Response::Unlistened { room_id: None }
        }
    }
}

fn status_response(result: Result<Booking, EngineError>) -> Response {
    match result {
        Ok(booking) => Response::Booking { booking },
        Err(e) => engine_err(e),
    }
}
