use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::Target;
use crate::monitor::{CheckOutcome, TargetMonitor};
use crate::store::TargetStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub target_id: String,
    pub target_name: String,
    pub interval_secs: u64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub notifications_sent: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub errored_jobs: usize,
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub notifications_sent: u64,
    pub uptime_seconds: u64,
}

struct JobHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

type JobTable = Arc<RwLock<HashMap<String, JobInfo>>>;

/// One independent loop per target: check, persist, sleep the target's
/// interval, repeat until stopped.
pub struct MonitorScheduler {
    monitor: Arc<TargetMonitor>,
    store: Arc<TargetStore>,
    jobs: JobTable, // target_id -> JobInfo
    running_jobs: Mutex<HashMap<String, JobHandle>>,
    config: SchedulerConfig,
    start_time: DateTime<Utc>,
}

impl MonitorScheduler {
    pub fn new(monitor: Arc<TargetMonitor>, store: Arc<TargetStore>, config: SchedulerConfig) -> Self {
        Self {
            monitor,
            store,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            running_jobs: Mutex::new(HashMap::new()),
            config,
            start_time: Utc::now(),
        }
    }

    /// Schedule every target. A target that cannot be scheduled is logged and
    /// skipped; the rest still run. Returns how many were scheduled.
    pub async fn start(&self, targets: Vec<Target>) -> usize {
        let mut scheduled = 0;
        for target in targets {
            let name = target.name.clone();
            match self.schedule_target(target).await {
                Ok(()) => scheduled += 1,
                Err(e) => tracing::error!("Not monitoring '{}': {}", name, e),
            }
        }

        tracing::info!("Monitor scheduler started with {} targets", scheduled);
        scheduled
    }

    pub fn validate_interval(&self, target: &Target) -> Result<()> {
        if target.check_interval < self.config.min_check_interval {
            return Err(AppError::Validation(format!(
                "check interval of {}s for '{}' is below the minimum of {}s",
                target.check_interval, target.name, self.config.min_check_interval
            )));
        }
        Ok(())
    }

    /// Start monitoring `target`, replacing any loop already running for it.
    /// The first check runs immediately.
    pub async fn schedule_target(&self, target: Target) -> Result<()> {
        self.validate_interval(&target)?;
        self.stop_job(&target.id).await;

        let job_info = JobInfo {
            id: Uuid::new_v4(),
            target_id: target.id.clone(),
            target_name: target.name.clone(),
            interval_secs: target.check_interval,
            status: JobStatus::Active,
            created_at: Utc::now(),
            last_run: None,
            next_run: Some(Utc::now()),
            run_count: 0,
            success_count: 0,
            error_count: 0,
            notifications_sent: 0,
            last_error: None,
        };

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(target.id.clone(), job_info);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let target_id = target.id.clone();
        let interval = target.check_interval;
        let handle = tokio::spawn(Self::run_loop(
            Arc::clone(&self.monitor),
            Arc::clone(&self.store),
            Arc::clone(&self.jobs),
            self.config.min_check_interval,
            target,
            stop_rx,
        ));

        {
            let mut running_jobs = self.running_jobs.lock().await;
            running_jobs.insert(target_id.clone(), JobHandle { stop: stop_tx, handle });
        }

        tracing::info!("Scheduled target {} every {}s", target_id, interval);
        Ok(())
    }

    /// Stop the loop for `target_id` and drop its availability history. An
    /// in-flight check is allowed to finish first.
    pub async fn unschedule_target(&self, target_id: &str) -> Result<()> {
        self.stop_job(target_id).await;
        self.monitor.forget(target_id).await;
        Ok(())
    }

    /// Signal the loop and wait, up to the grace period, for it to exit. The
    /// job's bookkeeping is removed only after that.
    async fn stop_job(&self, target_id: &str) {
        let job = {
            let mut running_jobs = self.running_jobs.lock().await;
            running_jobs.remove(target_id)
        };

        if let Some(job) = job {
            let _ = job.stop.send(true);
            tracing::debug!("Stopping monitor loop for target: {}", target_id);

            let abort_handle = job.handle.abort_handle();
            let grace = self.config.shutdown_grace();
            if tokio::time::timeout(grace, job.handle).await.is_err() {
                tracing::warn!("Check for {} still running after {:?}; aborting it", target_id, grace);
                abort_handle.abort();
            }
        }

        {
            let mut jobs = self.jobs.write().await;
            if let Some(job_info) = jobs.remove(target_id) {
                tracing::info!("Unscheduled target {} (job: {})", target_id, job_info.id);
            }
        }
    }

    pub async fn get_job_info(&self, target_id: &str) -> Option<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.get(target_id).cloned()
    }

    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.read().await;
        jobs.values().cloned().collect()
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let jobs = self.jobs.read().await;

        let total_jobs = jobs.len();
        let active_jobs = jobs.values().filter(|j| j.status == JobStatus::Active).count();
        let errored_jobs = jobs.values().filter(|j| j.status == JobStatus::Error).count();

        let completed_runs: u64 = jobs.values().map(|j| j.success_count).sum();
        let failed_runs: u64 = jobs.values().map(|j| j.error_count).sum();
        let notifications_sent: u64 = jobs.values().map(|j| j.notifications_sent).sum();

        let uptime = Utc::now().signed_duration_since(self.start_time);

        SchedulerStats {
            total_jobs,
            active_jobs,
            errored_jobs,
            completed_runs,
            failed_runs,
            notifications_sent,
            uptime_seconds: uptime.num_seconds().max(0) as u64,
        }
    }

    pub async fn is_scheduled(&self, target_id: &str) -> bool {
        let running_jobs = self.running_jobs.lock().await;
        running_jobs
            .get(target_id)
            .is_some_and(|job| !job.handle.is_finished())
    }

    /// Check `target` once outside its schedule and persist the outcome.
    pub async fn run_now(&self, target: &Target) -> Result<CheckOutcome> {
        tracing::info!("Running immediate check for target: {}", target.id);

        let outcome = self.monitor.check_target(target).await;
        Self::record_outcome(&self.jobs, &outcome).await;

        self.store
            .update(&target.id, |stored| outcome.apply_to(stored))
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("target {}", target.id),
            })?;

        Ok(outcome)
    }

    /// Signal every loop to stop, wait up to the grace period for in-flight
    /// checks, then abort whatever is left.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, JobHandle)> = {
            let mut running_jobs = self.running_jobs.lock().await;
            running_jobs.drain().collect()
        };

        for (_, job) in &drained {
            let _ = job.stop.send(true);
        }

        let abort_handles: Vec<_> = drained.iter().map(|(_, job)| job.handle.abort_handle()).collect();
        let handles = drained.into_iter().map(|(_, job)| job.handle);

        let grace = self.config.shutdown_grace();
        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!("Checks still running after {:?}; aborting them", grace);
            for handle in abort_handles {
                handle.abort();
            }
        }

        {
            let mut jobs = self.jobs.write().await;
            for job_info in jobs.values_mut() {
                job_info.status = JobStatus::Stopped;
                job_info.next_run = None;
            }
        }

        tracing::info!("Monitor scheduler shutdown");
    }

    async fn run_loop(
        monitor: Arc<TargetMonitor>,
        store: Arc<TargetStore>,
        jobs: JobTable,
        min_interval: u64,
        mut target: Target,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tracing::debug!("Starting scheduled check for target: {}", target.id);
            let outcome = monitor.check_target(&target).await;
            Self::record_outcome(&jobs, &outcome).await;

            match store.update(&target.id, |stored| outcome.apply_to(stored)).await {
                Ok(Some(stored)) => {
                    // Pick up edits made while running, unless they break the floor
                    if stored.check_interval >= min_interval {
                        target = stored;
                    } else {
                        tracing::warn!(
                            "Ignoring stored interval of {}s for {}; keeping {}s",
                            stored.check_interval,
                            target.id,
                            target.check_interval
                        );
                    }
                }
                Ok(None) => {
                    tracing::info!("Target {} no longer stored; stopping its monitor loop", target.id);
                    Self::mark_stopped(&jobs, &target.id).await;
                    break;
                }
                Err(e) => tracing::error!("Failed to persist check for {}: {}", target.id, e),
            }

            let interval = target.check_interval();
            {
                let mut jobs = jobs.write().await;
                if let Some(job_info) = jobs.get_mut(&target.id) {
                    job_info.interval_secs = target.check_interval;
                    job_info.next_run = chrono::Duration::from_std(interval)
                        .ok()
                        .map(|delay| Utc::now() + delay);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.changed() => break,
            }
        }

        tracing::debug!("Monitor loop for {} exited", target.id);
    }

    async fn record_outcome(jobs: &JobTable, outcome: &CheckOutcome) {
        let mut jobs = jobs.write().await;
        if let Some(job_info) = jobs.get_mut(&outcome.target_id) {
            job_info.last_run = Some(outcome.checked_at);
            job_info.run_count += 1;
            if outcome.notified {
                job_info.notifications_sent += 1;
            }

            if outcome.success() {
                job_info.success_count += 1;
                job_info.last_error = None;
                job_info.status = JobStatus::Active;
            } else {
                job_info.error_count += 1;
                job_info.last_error = outcome.error.clone();
                job_info.status = JobStatus::Error;
            }
        }
    }

    async fn mark_stopped(jobs: &JobTable, target_id: &str) {
        let mut jobs = jobs.write().await;
        if let Some(job_info) = jobs.get_mut(target_id) {
            job_info.status = JobStatus::Stopped;
            job_info.next_run = None;
        }
    }
}
