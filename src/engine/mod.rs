mod conflict;
mod error;
mod mutations;
mod queries;
mod quota;
mod slots;

pub use conflict::{annotate_slots, find_conflict};
pub use error::{BookingError, ConfigError};
pub use queries::{BookingFilter, DayAvailability};
pub use quota::{booking_window, remaining_hours, week_bounds};
pub use slots::{generate_slots, is_slot_aligned};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::config::FacilityConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedLedger = Arc<RwLock<LedgerState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine: the facility's ledger plus the decision logic that
/// guards it. All state changes flow through WAL-append + apply.
pub struct Engine {
    config: FacilityConfig,
    /// The grid never changes after startup; generated once from validated
    /// operating hours.
    slot_grid: Vec<TimeSlot>,
    pub(super) ledger: SharedLedger,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply an event directly to the ledger (no locking — caller holds the lock).
fn apply_to_ledger(ledger: &mut LedgerState, event: &Event) {
    match event {
        Event::BookingConfirmed {
            id,
            booking_date,
            start_time,
            end_time,
            user_name,
            student_id,
            user_email,
            number_of_players,
            game_id,
            special_requests,
            created_at,
        } => {
            ledger.insert(Booking {
                id: *id,
                booking_date: *booking_date,
                start_time: *start_time,
                end_time: *end_time,
                user: UserIdentity {
                    name: user_name.clone(),
                    student_id: student_id.clone(),
                    email: user_email.clone(),
                },
                number_of_players: *number_of_players,
                game_id: *game_id,
                special_requests: special_requests.clone(),
                status: BookingStatus::Confirmed,
                created_at: *created_at,
            });
        }
        Event::BookingCancelled { id, .. } => {
            ledger.mark_cancelled(id);
        }
    }
}

impl Engine {
    pub fn new(
        config: FacilityConfig,
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let slot_grid = slots::generate_slots(&config.operating_hours)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut ledger = LedgerState::new();
        for event in &events {
            apply_to_ledger(&mut ledger, event);
        }

        Ok(Self {
            config,
            slot_grid,
            ledger: Arc::new(RwLock::new(ledger)),
            wal_tx,
            notify,
        })
    }

    pub fn config(&self) -> &FacilityConfig {
        &self.config
    }

    pub fn slot_grid(&self) -> &[TimeSlot] {
        &self.slot_grid
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    /// WAL-append + apply + notify in one call — the only way state changes.
    pub(super) async fn persist_and_apply(
        &self,
        ledger: &mut LedgerState,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.wal_append(event).await?;
        apply_to_ledger(ledger, event);
        self.notify.send(event.booking_date(), event);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current ledger. Cancelled bookings are history, not
    /// garbage: each is re-emitted as a confirm/cancel pair.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let events = {
            let guard = self.ledger.read().await;
            let mut events = Vec::with_capacity(guard.booking_count());
            let mut cancelled = Vec::new();
            for booking in guard.iter() {
                events.push(Event::confirmed(booking));
                if booking.status == BookingStatus::Cancelled {
                    cancelled.push(Event::BookingCancelled {
                        id: booking.id,
                        booking_date: booking.booking_date,
                    });
                }
            }
            events.extend(cancelled);
            events
        };

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
