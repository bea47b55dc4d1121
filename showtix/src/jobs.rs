//! Durable background jobs.
//!
//! Deferred work rides a Postgres-backed queue (the `jobs` table) instead of
//! in-process timers, so a scheduled seat release survives restarts and runs
//! exactly once across replicas. [`JobQueue`] enqueues, [`run_job_worker`]
//! polls and executes, and [`run_reminder_sweep`] drives the periodic
//! show-reminder emails that have no per-row trigger.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::JobsConfig;
use crate::db::errors::DbError;
use crate::db::handlers::{Bookings, Jobs, Movies, Repository, Shows, Users};
use crate::db::handlers::users::UserFilter;
use crate::db::models::jobs::{JobCreateDBRequest, JobDBResponse};
use crate::email::EmailService;
use crate::errors::Error;
use crate::types::{BookingId, MovieId};

/// The work a queued job carries.
///
/// Serialized into the row's `payload` column with the tag inline, so a
/// payload alone is enough to reconstruct the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobKind {
    /// Free the seats of an unpaid booking once its hold expires.
    ReleaseBooking { booking_id: BookingId },
    /// Send the booking-confirmed email after payment settles.
    ConfirmationEmail { booking_id: BookingId },
    /// Announce newly added shows for a movie to every user.
    NewShowBroadcast { movie_id: MovieId },
}

impl JobKind {
    /// The `job_type` column value, matching the serde tag.
    pub fn job_type(&self) -> &'static str {
        match self {
            JobKind::ReleaseBooking { .. } => "release_booking",
            JobKind::ConfirmationEmail { .. } => "confirmation_email",
            JobKind::NewShowBroadcast { .. } => "new_show_broadcast",
        }
    }

    fn to_db_request(&self, run_at: DateTime<Utc>) -> Result<JobCreateDBRequest, Error> {
        let payload = serde_json::to_value(self).map_err(|e| Error::Internal {
            operation: format!("serialize job payload: {e}"),
        })?;

        Ok(JobCreateDBRequest {
            job_type: self.job_type().to_string(),
            payload,
            run_at,
        })
    }

    fn from_job(job: &JobDBResponse) -> Result<Self, Error> {
        serde_json::from_value(job.payload.clone()).map_err(|e| Error::Internal {
            operation: format!("parse payload of job {}: {e}", job.id),
        })
    }
}

/// Handle for scheduling jobs, injected through `AppState`.
#[derive(Clone)]
pub struct JobQueue {
    db: PgPool,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Enqueue a job to run as soon as a worker picks it up.
    pub async fn enqueue(&self, kind: &JobKind) -> Result<JobDBResponse, Error> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        enqueue_on(&mut conn, kind, Utc::now()).await
    }

    /// Enqueue a job to run after `delay`.
    pub async fn enqueue_in(&self, kind: &JobKind, delay: Duration) -> Result<JobDBResponse, Error> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        enqueue_on(&mut conn, kind, Utc::now() + delay).await
    }
}

/// Enqueue on an existing connection.
///
/// Used inside transactions to make the job atomic with the data mutation it
/// follows up on: the booking workflow schedules its seat release this way,
/// so a hold can never exist without its release.
pub async fn enqueue_on(conn: &mut PgConnection, kind: &JobKind, run_at: DateTime<Utc>) -> Result<JobDBResponse, Error> {
    let request = kind.to_db_request(run_at)?;
    let job = Jobs::new(conn).enqueue(&request).await?;

    debug!("Enqueued {} job {} to run at {}", job.job_type, job.id, job.run_at);
    Ok(job)
}

/// Polling worker executing due jobs until shutdown.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so any number of these can run
/// against the same database without double-executing a job.
pub async fn run_job_worker(db: PgPool, email: Arc<EmailService>, config: JobsConfig, shutdown: CancellationToken) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Job worker started, polling every {:?}", config.poll_interval);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                match process_due_jobs(&db, &email, &config).await {
                    Ok(0) => debug!("No due jobs"),
                    Ok(count) => debug!("Processed {} jobs", count),
                    Err(e) => warn!("Job poll failed: {}", e),
                }
            }
            _ = shutdown.cancelled() => {
                info!("Job worker received shutdown signal");
                break;
            }
        }
    }
}

/// Claim and execute one batch of due jobs, settling each as completed or
/// failed. Returns how many jobs were claimed.
pub async fn process_due_jobs(db: &PgPool, email: &EmailService, config: &JobsConfig) -> Result<usize, Error> {
    let mut conn = db.acquire().await.map_err(DbError::from)?;
    let jobs = Jobs::new(&mut conn).claim_due(config.claim_batch_size).await?;
    let claimed = jobs.len();

    for job in jobs {
        match execute_job(db, email, &job).await {
            Ok(()) => {
                if let Err(e) = Jobs::new(&mut conn).mark_completed(job.id).await {
                    warn!("Failed to mark job {} completed: {}", job.id, e);
                }
            }
            Err(e) => {
                warn!("Job {} ({}) failed on attempt {}: {}", job.id, job.job_type, job.attempts, e);
                if let Err(e) = Jobs::new(&mut conn)
                    .mark_failed(job.id, &e.to_string(), config.max_attempts, config.retry_delay)
                    .await
                {
                    warn!("Failed to record failure of job {}: {}", job.id, e);
                }
            }
        }
    }

    Ok(claimed)
}

#[instrument(skip_all, fields(job_id = %job.id, job_type = %job.job_type), err)]
async fn execute_job(db: &PgPool, email: &EmailService, job: &JobDBResponse) -> Result<(), Error> {
    match JobKind::from_job(job)? {
        JobKind::ReleaseBooking { booking_id } => release_booking(db, booking_id).await,
        JobKind::ConfirmationEmail { booking_id } => send_confirmation_email(db, email, booking_id).await,
        JobKind::NewShowBroadcast { movie_id } => broadcast_new_show(db, email, movie_id).await,
    }
}

/// Free the seats held by an unpaid booking and delete it.
///
/// Locks the booking row first, then the show row; the webhook's mark-paid
/// update serializes on the same booking row, so a payment landing
/// concurrently either commits first (release no-ops on the paid flag) or
/// waits and finds the booking gone.
pub async fn release_booking(db: &PgPool, booking_id: BookingId) -> Result<(), Error> {
    let mut tx = db.begin().await.map_err(DbError::from)?;

    let Some(booking) = Bookings::new(&mut tx).get_for_update(booking_id).await? else {
        debug!("Booking {} no longer exists, nothing to release", booking_id);
        return Ok(());
    };

    if booking.is_paid {
        debug!("Booking {} was paid, leaving its seats in place", booking_id);
        return Ok(());
    }

    if let Some(show) = Shows::new(&mut tx).get_for_update(booking.show_id).await? {
        let mut occupied = show.occupied_seats.0;
        for seat in &booking.seats {
            occupied.remove(seat);
        }
        Shows::new(&mut tx).set_occupied_seats(show.id, &occupied).await?;
    }

    Bookings::new(&mut tx).delete(booking_id).await?;
    tx.commit().await.map_err(DbError::from)?;

    info!("Released {} seats from expired booking {}", booking.seats.len(), booking_id);
    Ok(())
}

async fn send_confirmation_email(db: &PgPool, email: &EmailService, booking_id: BookingId) -> Result<(), Error> {
    let mut conn = db.acquire().await.map_err(DbError::from)?;

    let booking = Bookings::new(&mut conn)
        .get_by_id(booking_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Booking".to_string(),
            id: booking_id.to_string(),
        })?;
    let show = Shows::new(&mut conn)
        .get_by_id(booking.show_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Show".to_string(),
            id: booking.show_id.to_string(),
        })?;
    let movie = Movies::new(&mut conn)
        .get_by_id(show.movie_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Movie".to_string(),
            id: show.movie_id.to_string(),
        })?;
    let user = Users::new(&mut conn)
        .get_by_id(booking.user_id.clone())
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: booking.user_id.clone(),
        })?;

    email
        .send_booking_confirmation(
            &user.email,
            display_name(&user.name),
            &movie.title,
            &show.start_time,
            &booking.seats,
            &booking.amount,
        )
        .await?;

    info!("Sent booking confirmation for {} to {}", booking_id, user.email);
    Ok(())
}

/// Email every user about newly scheduled shows for a movie.
async fn broadcast_new_show(db: &PgPool, email: &EmailService, movie_id: MovieId) -> Result<(), Error> {
    const PAGE_SIZE: i64 = 500;

    let mut conn = db.acquire().await.map_err(DbError::from)?;

    let movie = Movies::new(&mut conn)
        .get_by_id(movie_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Movie".to_string(),
            id: movie_id.to_string(),
        })?;

    let mut skip = 0;
    let mut notified = 0usize;
    loop {
        let users = Users::new(&mut conn).list(&UserFilter::new(skip, PAGE_SIZE)).await?;
        if users.is_empty() {
            break;
        }
        skip += users.len() as i64;

        for user in users {
            // One bounced address should not starve the rest of the list.
            if let Err(e) = email
                .send_new_show_announcement(&user.email, display_name(&user.name), &movie.title)
                .await
            {
                warn!("Failed to send new-show announcement to {}: {}", user.email, e);
            } else {
                notified += 1;
            }
        }
    }

    info!("Announced new shows for {:?} to {} users", movie.title, notified);
    Ok(())
}

/// Periodic sweep emailing reminders for shows starting soon.
///
/// Each pass covers paid bookings whose show starts within
/// `jobs.reminder_window` from now. With the interval equal to the window,
/// consecutive passes cover adjacent slices of time; a worker restart can
/// repeat reminders for shows still inside the window.
pub async fn run_reminder_sweep(db: PgPool, email: Arc<EmailService>, config: JobsConfig, shutdown: CancellationToken) {
    let mut sweep = tokio::time::interval(config.reminder_interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Reminder sweep started, running every {:?}", config.reminder_interval);

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                match send_due_reminders(&db, &email, &config).await {
                    Ok(0) => debug!("No reminders due"),
                    Ok(count) => info!("Sent {} show reminders", count),
                    Err(e) => warn!("Reminder sweep failed: {}", e),
                }
            }
            _ = shutdown.cancelled() => {
                info!("Reminder sweep received shutdown signal");
                break;
            }
        }
    }
}

/// Send one round of reminders. Returns how many emails went out.
pub async fn send_due_reminders(db: &PgPool, email: &EmailService, config: &JobsConfig) -> Result<usize, Error> {
    let window_end = Utc::now()
        + chrono::Duration::from_std(config.reminder_window).map_err(|e| Error::Internal {
            operation: format!("convert reminder window: {e}"),
        })?;

    let mut conn = db.acquire().await.map_err(DbError::from)?;
    let bookings = Bookings::new(&mut conn).list_upcoming_paid(window_end).await?;
    if bookings.is_empty() {
        return Ok(0);
    }

    let show_ids: HashSet<_> = bookings.iter().map(|b| b.show_id).collect();
    let shows = Shows::new(&mut conn).get_bulk(show_ids.into_iter().collect()).await?;
    let movie_ids: HashSet<_> = shows.values().map(|s| s.movie_id).collect();
    let movies = Movies::new(&mut conn).get_bulk(movie_ids.into_iter().collect()).await?;
    let user_ids: HashSet<_> = bookings.iter().map(|b| b.user_id.clone()).collect();
    let users = Users::new(&mut conn).get_bulk(user_ids.into_iter().collect()).await?;

    let mut sent = 0usize;
    for booking in &bookings {
        let (Some(show), Some(user)) = (shows.get(&booking.show_id), users.get(&booking.user_id)) else {
            warn!("Booking {} references a missing show or user, skipping reminder", booking.id);
            continue;
        };
        let Some(movie) = movies.get(&show.movie_id) else {
            warn!("Show {} references missing movie {}, skipping reminder", show.id, show.movie_id);
            continue;
        };

        match email
            .send_show_reminder(&user.email, display_name(&user.name), &movie.title, &show.start_time, &booking.seats)
            .await
        {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to send reminder for booking {}: {}", booking.id, e),
        }
    }

    Ok(sent)
}

fn display_name(name: &str) -> Option<&str> {
    if name.is_empty() { None } else { Some(name) }
}
