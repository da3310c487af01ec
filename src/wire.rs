use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::engine::{BookingFilter, Engine};
use crate::limits::MAX_LINE_LEN;
use crate::model::{CandidateBooking, UserIdentity};
use crate::observability;
use crate::proto::{
    self, AvailabilityBody, BookingBody, ConfigBody, ErrorBody, EventBody, HealthBody, Payload,
    Request, Response, WatchBody,
};

/// Buffered watch events per connection. A slow reader drops its own
/// pushes, never anyone else's.
const PUSH_BUFFER: usize = 64;

/// Serve one client: read JSON request lines, write JSON response lines,
/// and interleave watch events pushed from the notify hub.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let (push_tx, mut push_rx) = mpsc::channel::<Response>(PUSH_BUFFER);
    let mut watches: HashMap<NaiveDate, JoinHandle<()>> = HashMap::new();

    let result = loop {
        tokio::select! {
            line = framed.next() => {
                let line = match line {
                    None => break Ok(()),
                    Some(Err(e)) => break Err(codec_err(e)),
                    Some(Ok(line)) => line,
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&engine, &line, &push_tx, &mut watches).await;
                if let Err(e) = send_response(&mut framed, &response).await {
                    break Err(e);
                }
            }
            Some(push) = push_rx.recv() => {
                if let Err(e) = send_response(&mut framed, &push).await {
                    break Err(e);
                }
            }
        }
    };

    for handle in watches.into_values() {
        handle.abort();
    }
    result
}

async fn send_response(
    framed: &mut Framed<TcpStream, LinesCodec>,
    response: &Response,
) -> io::Result<()> {
    let text = serde_json::to_string(response).map_err(io::Error::other)?;
    framed.send(text).await.map_err(codec_err)
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line too long")
        }
    }
}

async fn handle_line(
    engine: &Arc<Engine>,
    line: &str,
    push_tx: &mpsc::Sender<Response>,
    watches: &mut HashMap<NaiveDate, JoinHandle<()>>,
) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            debug!("unparsable request: {e}");
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "error")
                .increment(1);
            return Response::Error(ErrorBody::bad_request(format!("cannot parse request: {e}")));
        }
    };

    let op = observability::op_label(&request);
    let start = std::time::Instant::now();
    let response = dispatch(engine, request, push_tx, watches).await;
    let status = match &response {
        Response::Error(_) => "error",
        _ => "ok",
    };
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
    response
}

async fn dispatch(
    engine: &Arc<Engine>,
    request: Request,
    push_tx: &mpsc::Sender<Response>,
    watches: &mut HashMap<NaiveDate, JoinHandle<()>>,
) -> Response {
    match request {
        Request::Availability { date } => match proto::parse_date(&date) {
            Ok(date) => {
                let day = engine.availability(date).await;
                Response::Ok(Payload::Availability(AvailabilityBody::from(&day)))
            }
            Err(e) => Response::Error(e),
        },
        Request::Submit {
            booking_date,
            start_time,
            end_time,
            user_name,
            user_email,
            student_id,
            number_of_players,
            game_id,
            special_requests,
        } => {
            let candidate = match parse_candidate(
                &booking_date,
                &start_time,
                &end_time,
                user_name,
                user_email,
                student_id,
                number_of_players,
                game_id,
                special_requests,
            ) {
                Ok(candidate) => candidate,
                Err(e) => return Response::Error(e),
            };
            match engine.submit_booking(candidate).await {
                Ok(booking) => Response::Ok(Payload::Booking(Box::new(BookingBody::from(&booking)))),
                Err(e) => Response::Error(ErrorBody::from(&e)),
            }
        }
        Request::Cancel { booking_id } => match engine.cancel_booking(booking_id).await {
            Ok(booking) => Response::Ok(Payload::Booking(Box::new(BookingBody::from(&booking)))),
            Err(e) => Response::Error(ErrorBody::from(&e)),
        },
        Request::Get { booking_id } => match engine.get_booking(booking_id).await {
            Ok(booking) => Response::Ok(Payload::Booking(Box::new(BookingBody::from(&booking)))),
            Err(e) => Response::Error(ErrorBody::from(&e)),
        },
        Request::Bookings {
            status,
            date_from,
            date_to,
            student_id,
        } => {
            let filter = match parse_filter(status, date_from, date_to, student_id) {
                Ok(filter) => filter,
                Err(e) => return Response::Error(e),
            };
            let bookings = engine.list_bookings(&filter).await;
            Response::Ok(Payload::Bookings(
                bookings.iter().map(BookingBody::from).collect(),
            ))
        }
        Request::Config => Response::Ok(Payload::Config(ConfigBody::from(engine.config()))),
        Request::Ping => Response::Ok(Payload::Health(HealthBody { status: "healthy" })),
        Request::Watch { date } => match proto::parse_date(&date) {
            Ok(parsed) => {
                let handle = spawn_watch(engine, parsed, push_tx.clone());
                if let Some(old) = watches.insert(parsed, handle) {
                    old.abort();
                }
                Response::Ok(Payload::Watch(WatchBody { date, active: true }))
            }
            Err(e) => Response::Error(e),
        },
        Request::Unwatch { date } => match proto::parse_date(&date) {
            Ok(parsed) => {
                if let Some(handle) = watches.remove(&parsed) {
                    handle.abort();
                }
                Response::Ok(Payload::Watch(WatchBody { date, active: false }))
            }
            Err(e) => Response::Error(e),
        },
    }
}

/// Forward a date's committed events into this connection's push queue.
fn spawn_watch(
    engine: &Arc<Engine>,
    date: NaiveDate,
    push_tx: mpsc::Sender<Response>,
) -> JoinHandle<()> {
    let mut rx = engine.notify.subscribe(date);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let push = Response::Event(EventBody::from(&event));
                    if push_tx.send(push).await.is_err() {
                        break; // connection gone
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("watcher for {date} lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn parse_candidate(
    booking_date: &str,
    start_time: &str,
    end_time: &str,
    user_name: String,
    user_email: String,
    student_id: String,
    number_of_players: u32,
    game_id: Option<u64>,
    special_requests: Option<String>,
) -> Result<CandidateBooking, ErrorBody> {
    Ok(CandidateBooking {
        booking_date: proto::parse_date(booking_date)?,
        start_time: proto::parse_time(start_time)?,
        end_time: proto::parse_time(end_time)?,
        user: UserIdentity {
            name: user_name,
            student_id,
            email: user_email,
        },
        number_of_players,
        game_id,
        special_requests,
    })
}

fn parse_filter(
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    student_id: Option<String>,
) -> Result<BookingFilter, ErrorBody> {
    Ok(BookingFilter {
        status: status.as_deref().map(proto::parse_status).transpose()?,
        date_from: date_from.as_deref().map(proto::parse_date).transpose()?,
        date_to: date_to.as_deref().map(proto::parse_date).transpose()?,
        student_id,
    })
}
