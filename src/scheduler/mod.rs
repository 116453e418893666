//! Persistent job scheduler: promotes due jobs to execution and records
//! every status transition in the durable store before moving on.

pub(crate) mod store;

pub use store::JobStore;

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{Job, JobStatus, SendResult, SmtpCredentials};
use crate::dispatch::EmailDispatcher;

use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Seam between the scheduler and the outbound transport.
///
/// The production implementation builds a dispatcher from the job's stored
/// credentials; tests inject stubs through the same seam.
pub trait JobDispatcher: Send + Sync + 'static {
    fn dispatch(&self, job: Job) -> impl Future<Output = Result<Vec<SendResult>>> + Send;
}

/// Dispatches jobs through the real SMTP executor.
pub struct SmtpJobDispatcher {
    send_delay: f32,
}

impl SmtpJobDispatcher {
    pub fn new(send_delay: f32) -> Self {
        Self { send_delay }
    }
}

impl JobDispatcher for SmtpJobDispatcher {
    fn dispatch(&self, job: Job) -> impl Future<Output = Result<Vec<SendResult>>> + Send {
        let delay = self.send_delay;
        async move {
            let dispatcher = EmailDispatcher::new(job.credentials.clone());
            dispatcher
                .send_many(&job.recipients, &job.subject, &job.message, job.is_html, delay)
                .await
        }
    }
}

struct SchedulerInner<D> {
    store: JobStore,
    dispatcher: D,
    poll_interval: Duration,
    error_backoff: Duration,
    shutdown: tokio::sync::Notify,
}

/// The scheduler service. Owns the durable store and a background polling
/// loop; constructed explicitly and injected into callers so tests can run
/// several independent instances.
pub struct EmailScheduler<D: JobDispatcher> {
    inner: Arc<SchedulerInner<D>>,
    handle: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl EmailScheduler<SmtpJobDispatcher> {
    /// Builds a scheduler wired to the real SMTP executor.
    pub fn with_smtp_dispatch(config: &Config) -> Self {
        Self::new(
            JobStore::new(config.jobs_file.clone()),
            SmtpJobDispatcher::new(config.send_delay),
            config,
        )
    }
}

impl<D: JobDispatcher> EmailScheduler<D> {
    pub fn new(store: JobStore, dispatcher: D, config: &Config) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                dispatcher,
                poll_interval: config.poll_interval,
                error_backoff: config.error_backoff,
                shutdown: tokio::sync::Notify::new(),
            }),
            handle: parking_lot::Mutex::new(None),
        }
    }

    /// Starts the background polling loop. Safe to call once per instance;
    /// subsequent calls are no-ops while the loop is running.
    pub fn start(&self) {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            tracing::warn!(target: "scheduler_task", "Scheduler already running; start ignored.");
            return;
        }

        match self.reconcile_interrupted() {
            Ok(0) => {}
            Ok(n) => {
                tracing::warn!(target: "scheduler_task",
                    "Marked {} job(s) interrupted by a previous crash as failed.", n);
            }
            Err(e) => {
                tracing::error!(target: "scheduler_task", "Startup reconciliation failed: {}", e);
            }
        }

        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move {
            tracing::info!(target: "scheduler_task",
                "Scheduler loop started (poll every {:?}).", inner.poll_interval);
            let mut interval = inner.poll_interval;
            loop {
                tokio::select! {
                    _ = inner.shutdown.notified() => {
                        tracing::info!(target: "scheduler_task", "Scheduler loop stopping.");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match inner.run_due_jobs().await {
                            Ok(executed) => {
                                if executed > 0 {
                                    tracing::info!(target: "scheduler_task",
                                        "Executed {} due job(s).", executed);
                                }
                                interval = inner.poll_interval;
                            }
                            Err(e) => {
                                // Degrade instead of dying; the next pass may succeed.
                                tracing::error!(target: "scheduler_task",
                                    "Scheduler pass failed: {}. Backing off to {:?}.",
                                    e, inner.error_backoff);
                                interval = inner.error_backoff;
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Signals the loop to stop and waits for it to finish. A dispatch in
    /// flight runs to completion first.
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            self.inner.shutdown.notify_one();
            if let Err(e) = handle.await {
                tracing::error!(target: "scheduler_task", "Scheduler task join failed: {}", e);
            }
        }
    }

    /// Creates a pending job and persists it; returns the job id immediately
    /// without waiting for the send time.
    pub fn schedule(
        &self,
        recipients: Vec<String>,
        subject: String,
        message: String,
        send_at: DateTime<Utc>,
        credentials: SmtpCredentials,
        is_html: bool,
    ) -> Result<String> {
        if recipients.is_empty() {
            return Err(AppError::InvalidInput(
                "Recipient list is empty".to_string(),
            ));
        }

        let job_id = generate_job_id();
        let total_count = recipients.len();
        let job = Job {
            id: job_id.clone(),
            recipients,
            subject,
            message,
            is_html,
            scheduled_time: send_at,
            credentials,
            status: JobStatus::Pending,
            created_time: Utc::now(),
            sent_time: None,
            success_count: 0,
            total_count,
            results: Vec::new(),
            error: None,
        };

        let mut jobs = self.inner.store.load()?;
        jobs.push(job);
        self.inner.store.save(&jobs)?;
        tracing::info!(target: "scheduler_task",
            "Scheduled job {} ({} recipient(s), due {}).", job_id, total_count, send_at);
        Ok(job_id)
    }

    /// Returns all jobs, re-read from the store so the view is current even
    /// across process restarts.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        self.inner.store.load()
    }

    /// Cancels a job. Succeeds only while the job is still pending;
    /// anything else is a no-op returning false.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        let mut jobs = self.inner.store.load()?;
        for job in jobs.iter_mut() {
            if job.id == job_id && job.status == JobStatus::Pending {
                job.status = JobStatus::Cancelled;
                self.inner.store.save(&jobs)?;
                tracing::info!(target: "scheduler_task", "Cancelled job {}.", job_id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Drops every job that is no longer pending or sending.
    pub fn clear_completed(&self) -> Result<()> {
        let jobs = self.inner.store.load()?;
        let remaining: Vec<Job> = jobs
            .into_iter()
            .filter(|job| job.status.is_active())
            .collect();
        self.inner.store.save(&remaining)
    }

    /// Runs one polling pass: executes every pending job whose scheduled
    /// time has arrived. Returns the number of jobs executed. The background
    /// loop calls this; tests may drive it directly.
    pub async fn run_due_jobs(&self) -> Result<usize> {
        self.inner.run_due_jobs().await
    }

    /// Flips jobs stranded in `sending` by a crash during dispatch to
    /// `failed`, so operators see a terminal state. Called once on start.
    pub fn reconcile_interrupted(&self) -> Result<usize> {
        let mut jobs = self.inner.store.load()?;
        let mut reconciled = 0usize;
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Sending {
                job.status = JobStatus::Failed;
                job.error =
                    Some("Interrupted by process restart during dispatch; outcome unknown".into());
                job.sent_time = Some(Utc::now());
                reconciled += 1;
            }
        }
        if reconciled > 0 {
            self.inner.store.save(&jobs)?;
        }
        Ok(reconciled)
    }
}

impl<D: JobDispatcher> SchedulerInner<D> {
    async fn run_due_jobs(&self) -> Result<usize> {
        let now = Utc::now();
        let snapshot = self.store.load()?;
        let due_ids: Vec<String> = snapshot
            .iter()
            .filter(|job| job.is_due(now))
            .map(|job| job.id.clone())
            .collect();

        let mut executed = 0usize;
        for job_id in due_ids {
            self.execute_job(&job_id).await?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Executes one due job. The `sending` transition is persisted before
    /// dispatch begins, so a crash mid-send is observable as stuck-in-sending
    /// rather than silently lost.
    async fn execute_job(&self, job_id: &str) -> Result<()> {
        let job = match self.update_job(job_id, |job| {
            job.status = JobStatus::Sending;
        })? {
            Some(job) => job,
            None => {
                // Cancelled or removed between snapshot and execution.
                tracing::debug!(target: "scheduler_task",
                    "Job {} no longer pending; skipping.", job_id);
                return Ok(());
            }
        };

        tracing::info!(target: "scheduler_task",
            "Executing job {} ({} recipient(s)).", job.id, job.total_count);

        match self.dispatcher.dispatch(job).await {
            Ok(results) => {
                let success_count = results.iter().filter(|r| r.success).count();
                self.update_job_unconditional(job_id, |job| {
                    job.status = JobStatus::Completed;
                    job.sent_time = Some(Utc::now());
                    job.success_count = success_count.min(job.total_count);
                    job.results = results.clone();
                })?;
                tracing::info!(target: "scheduler_task",
                    "Job {} completed ({} successful).", job_id, success_count);
            }
            Err(e) => {
                let reason = e.to_string();
                self.update_job_unconditional(job_id, |job| {
                    job.status = JobStatus::Failed;
                    job.sent_time = Some(Utc::now());
                    job.error = Some(reason.clone());
                })?;
                tracing::error!(target: "scheduler_task", "Job {} failed: {}", job_id, e);
            }
        }
        Ok(())
    }

    /// Reload-modify-write for the pending -> sending transition. Returns
    /// the updated job, or None when it is no longer pending.
    fn update_job(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Option<Job>> {
        let mut jobs = self.store.load()?;
        let mut updated = None;
        for job in jobs.iter_mut() {
            if job.id == job_id && job.status == JobStatus::Pending {
                apply(job);
                updated = Some(job.clone());
                break;
            }
        }
        if updated.is_some() {
            self.store.save(&jobs)?;
        }
        Ok(updated)
    }

    /// Reload-modify-write for recording a dispatch outcome on a job that is
    /// currently `sending`.
    fn update_job_unconditional(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut Job),
    ) -> Result<()> {
        let mut jobs = self.store.load()?;
        for job in jobs.iter_mut() {
            if job.id == job_id {
                apply(job);
                break;
            }
        }
        self.store.save(&jobs)
    }
}

/// Short random identifier, eight hex characters.
fn generate_job_id() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    /// Succeeds for every recipient.
    struct StubDispatcher;

    impl JobDispatcher for StubDispatcher {
        fn dispatch(&self, job: Job) -> impl Future<Output = Result<Vec<SendResult>>> + Send {
            async move {
                Ok(job
                    .recipients
                    .iter()
                    .map(|r| SendResult::delivered(r.clone()))
                    .collect())
            }
        }
    }

    /// Fails the whole dispatch.
    struct FailingDispatcher;

    impl JobDispatcher for FailingDispatcher {
        fn dispatch(&self, _job: Job) -> impl Future<Output = Result<Vec<SendResult>>> + Send {
            async move {
                Err(AppError::InvalidInput(
                    "transport exploded".to_string(),
                ))
            }
        }
    }

    fn credentials() -> SmtpCredentials {
        SmtpCredentials {
            host: "smtp.acme.test".into(),
            port: 587,
            email: "sender@acme.test".into(),
            password: "secret".into(),
        }
    }

    fn scheduler_with<D: JobDispatcher>(
        dir: &tempfile::TempDir,
        dispatcher: D,
    ) -> EmailScheduler<D> {
        let config = Config::default();
        EmailScheduler::new(
            JobStore::new(dir.path().join("jobs.json")),
            dispatcher,
            &config,
        )
    }

    #[tokio::test]
    async fn schedule_returns_pending_job_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        let id = scheduler
            .schedule(
                vec!["a@acme.test".into(), "b@acme.test".into()],
                "subject".into(),
                "body".into(),
                Utc::now() + ChronoDuration::hours(1),
                credentials(),
                false,
            )
            .unwrap();

        let jobs = scheduler.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].status, JobStatus::Pending);
        assert_eq!(jobs[0].total_count, 2);
        assert_eq!(jobs[0].success_count, 0);
    }

    #[tokio::test]
    async fn empty_recipient_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        let result = scheduler.schedule(
            vec![],
            "subject".into(),
            "body".into(),
            Utc::now(),
            credentials(),
            false,
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn future_job_stays_pending_until_due() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() + ChronoDuration::hours(1),
                credentials(),
                false,
            )
            .unwrap();

        assert_eq!(scheduler.run_due_jobs().await.unwrap(), 0);
        assert_eq!(scheduler.list_jobs().unwrap()[0].status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn due_job_completes_with_full_results() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        scheduler
            .schedule(
                vec!["a@acme.test".into(), "b@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() - ChronoDuration::seconds(1),
                credentials(),
                false,
            )
            .unwrap();

        assert_eq!(scheduler.run_due_jobs().await.unwrap(), 1);
        let job = &scheduler.list_jobs().unwrap()[0];
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.sent_time.is_some());
        assert_eq!(job.success_count, job.total_count);
        assert_eq!(job.results.len(), 2);
        assert_eq!(job.results[0].recipient, "a@acme.test");
        assert_eq!(job.results[1].recipient, "b@acme.test");
    }

    #[tokio::test]
    async fn dispatch_fault_marks_job_failed_not_crashing() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, FailingDispatcher);
        scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() - ChronoDuration::seconds(1),
                credentials(),
                false,
            )
            .unwrap();

        scheduler.run_due_jobs().await.unwrap();
        let job = &scheduler.list_jobs().unwrap()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("transport exploded"));
        assert_eq!(job.success_count, 0);
    }

    #[tokio::test]
    async fn cancel_succeeds_only_while_pending() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        let id = scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() - ChronoDuration::seconds(1),
                credentials(),
                false,
            )
            .unwrap();

        assert!(scheduler.cancel(&id).unwrap());
        assert_eq!(
            scheduler.list_jobs().unwrap()[0].status,
            JobStatus::Cancelled
        );
        // Terminal: a second cancel is a no-op.
        assert!(!scheduler.cancel(&id).unwrap());
        // Cancelled jobs are not executed.
        assert_eq!(scheduler.run_due_jobs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancel_completed_job_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        let id = scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() - ChronoDuration::seconds(1),
                credentials(),
                false,
            )
            .unwrap();
        scheduler.run_due_jobs().await.unwrap();
        assert!(!scheduler.cancel(&id).unwrap());
        assert_eq!(
            scheduler.list_jobs().unwrap()[0].status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn list_jobs_is_idempotent_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() + ChronoDuration::hours(1),
                credentials(),
                false,
            )
            .unwrap();

        let first = serde_json::to_string(&scheduler.list_jobs().unwrap()).unwrap();
        let second = serde_json::to_string(&scheduler.list_jobs().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn clear_completed_keeps_only_active_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler_with(&dir, StubDispatcher);
        let done = scheduler
            .schedule(
                vec!["a@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() - ChronoDuration::seconds(1),
                credentials(),
                false,
            )
            .unwrap();
        let pending = scheduler
            .schedule(
                vec!["b@acme.test".into()],
                "s".into(),
                "b".into(),
                Utc::now() + ChronoDuration::hours(1),
                credentials(),
                false,
            )
            .unwrap();

        scheduler.run_due_jobs().await.unwrap();
        scheduler.clear_completed().unwrap();
        let jobs = scheduler.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, pending);
        assert_ne!(jobs[0].id, done);
    }

    #[tokio::test]
    async fn interrupted_sending_jobs_reconcile_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path().join("jobs.json"));
        let stuck = Job {
            id: "deadbeef".into(),
            recipients: vec!["a@acme.test".into()],
            subject: "s".into(),
            message: "b".into(),
            is_html: false,
            scheduled_time: Utc::now() - ChronoDuration::hours(1),
            credentials: credentials(),
            status: JobStatus::Sending,
            created_time: Utc::now() - ChronoDuration::hours(2),
            sent_time: None,
            success_count: 0,
            total_count: 1,
            results: vec![],
            error: None,
        };
        store.save(std::slice::from_ref(&stuck)).unwrap();

        let scheduler =
            EmailScheduler::new(store, StubDispatcher, &Config::default());
        assert_eq!(scheduler.reconcile_interrupted().unwrap(), 1);
        let job = &scheduler.list_jobs().unwrap()[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("restart"));
    }

    #[tokio::test]
    async fn background_loop_starts_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let scheduler = EmailScheduler::new(
            JobStore::new(dir.path().join("jobs.json")),
            StubDispatcher,
            &config,
        );
        scheduler.start();
        scheduler.stop().await;
        // A second stop is harmless.
        scheduler.stop().await;
    }
}
