//! The reconciliation loop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::types::{Deletion, MonitorError, MonitorStatus, TickReport, TorrentReport};
use crate::config::MonitorConfig;
use crate::metrics;
use crate::notify::{NoopNotifier, NotificationEvent, Notifier};
use crate::placer::{FileOperation, FsPlacer, PlacementAction};
use crate::refresh::{LibraryRefresher, NoopRefresher, RefreshError};
use crate::torrent_client::{
    filter_completed_torrents, Torrent, TorrentClient, TorrentClientError,
};

/// Polls the torrent client and materializes completed torrents.
///
/// The monitor owns its backoff and status; both are written only by the
/// loop, and readers observe status through [`Monitor::subscribe`].
pub struct Monitor {
    config: MonitorConfig,
    client: Arc<dyn TorrentClient>,
    placer: FsPlacer,
    refresher: Arc<dyn LibraryRefresher>,
    notifier: Arc<dyn Notifier>,
    backoff: Backoff,
    status_tx: watch::Sender<MonitorStatus>,
}

impl Monitor {
    /// Create a monitor with no refresher and no notifications.
    pub fn new(config: MonitorConfig, client: Arc<dyn TorrentClient>) -> Self {
        let backoff = Backoff::default();
        let status = MonitorStatus {
            category: config.category.clone(),
            dry_run: config.dry_run,
            backoff_secs: backoff.current().as_secs(),
            ..Default::default()
        };
        let (status_tx, _) = watch::channel(status);

        Self {
            config,
            client,
            placer: FsPlacer::with_defaults(),
            refresher: Arc::new(NoopRefresher),
            notifier: Arc::new(NoopNotifier),
            backoff,
            status_tx,
        }
    }

    pub fn with_placer(mut self, placer: FsPlacer) -> Self {
        self.placer = placer;
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn LibraryRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self.status_tx
            .send_modify(|s| s.backoff_secs = self.backoff.current().as_secs());
        self
    }

    /// Receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Run the monitor on a background task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), MonitorError>> {
        tokio::spawn(self.run(cancel))
    }

    /// Log in, then tick every poll interval until cancelled.
    ///
    /// The first tick fires one interval after login. A tick that overruns
    /// the interval delays the next one; ticks never overlap.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), MonitorError> {
        let period = self.config.poll_interval();
        if first_deadline(period).is_none() {
            return Err(self.refuse_interval());
        }

        match self.login_with_retry(&cancel).await {
            Ok(()) => {}
            Err(MonitorError::Cancelled) => {
                info!("Cancelled before login completed");
                self.status_tx.send_modify(|s| s.stopped = true);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let Some(first_tick) = first_deadline(period) else {
            return Err(self.refuse_interval());
        };
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            category = %self.config.category,
            interval = ?period,
            operation = %self.config.operation,
            dry_run = self.config.dry_run,
            "Monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Monitor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let result = self.run_tick(&cancel).await;
                    self.record_tick(&result);
                }
            }
        }

        self.status_tx.send_modify(|s| s.stopped = true);
        info!("Monitor stopped");
        Ok(())
    }

    fn refuse_interval(&self) -> MonitorError {
        let err = MonitorError::InvalidInterval(self.config.poll_interval_secs);
        error!(error = %err, "Refusing to start monitor");
        self.status_tx.send_modify(|s| {
            s.stopped = true;
            s.last_error = Some(err.to_string());
        });
        err
    }

    /// Log in, retrying with backoff until success or cancellation.
    pub async fn login_with_retry(&mut self, cancel: &CancellationToken) -> Result<(), MonitorError> {
        loop {
            self.status_tx.send_modify(|s| s.login_attempts += 1);

            match self.client.login(cancel).await {
                Ok(()) => {
                    metrics::LOGIN_ATTEMPTS.with_label_values(&["ok"]).inc();
                    self.backoff.reset();
                    self.publish_backoff();
                    self.status_tx.send_modify(|s| {
                        s.logged_in = true;
                        s.last_error = None;
                    });
                    info!(client = self.client.name(), "Logged in to torrent client");
                    return Ok(());
                }
                Err(TorrentClientError::Cancelled) => return Err(MonitorError::Cancelled),
                Err(e) => {
                    metrics::LOGIN_ATTEMPTS.with_label_values(&["failed"]).inc();
                    let delay = self.backoff.on_failure();
                    self.publish_backoff();
                    self.status_tx
                        .send_modify(|s| s.last_error = Some(e.to_string()));
                    warn!(error = %e, retry_in = ?delay, "Login failed");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(MonitorError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn record_tick(&mut self, result: &Result<TickReport, MonitorError>) {
        let ok = result.is_ok();
        metrics::TICKS_TOTAL
            .with_label_values(&[metrics::result_label(ok)])
            .inc();

        match result {
            Ok(report) => {
                self.backoff.reset();
                let deleted = report.deleted() as u64;
                self.status_tx.send_modify(|s| {
                    s.ticks_ok += 1;
                    s.last_tick_at = Some(report.started_at);
                    s.last_error = None;
                    s.torrents_deleted += deleted;
                });
            }
            Err(e) => {
                let next = self.backoff.on_failure();
                error!(error = %e, backoff = ?next, "Tick failed");
                self.status_tx.send_modify(|s| {
                    s.ticks_failed += 1;
                    s.last_tick_at = Some(Utc::now());
                    s.last_error = Some(e.to_string());
                });
            }
        }
        self.publish_backoff();
    }

    fn publish_backoff(&self) {
        let secs = self.backoff.current().as_secs();
        metrics::BACKOFF_SECONDS.set(secs as i64);
        self.status_tx.send_modify(|s| s.backoff_secs = secs);
    }

    /// One pass: list, filter, and process every completed torrent.
    ///
    /// Fails only when listing fails or cancellation fires. Per-torrent
    /// failures are recorded in the report.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> Result<TickReport, MonitorError> {
        let started = Instant::now();
        let mut report = TickReport::new();

        debug!(category = %self.config.category, "Polling for completed torrents");
        let all = self
            .client
            .list_all_torrents(cancel)
            .await
            .map_err(|e| match e {
                TorrentClientError::Cancelled => MonitorError::Cancelled,
                other => MonitorError::Listing(other),
            });
        let all = match all {
            Ok(all) => all,
            Err(e) => {
                observe_tick_duration(started, false);
                return Err(e);
            }
        };
        report.torrents_seen = all.len();

        let completed = filter_completed_torrents(all, &self.config.category);
        report.completed = completed.len();
        info!(
            total = report.torrents_seen,
            completed = report.completed,
            category = %self.config.category,
            "Listed torrents"
        );

        let mut refreshed: HashSet<PathBuf> = HashSet::new();
        for torrent in &completed {
            if cancel.is_cancelled() {
                observe_tick_duration(started, false);
                return Err(MonitorError::Cancelled);
            }
            debug!(
                torrent = %torrent.name,
                hash = torrent.short_hash(),
                state = %torrent.state,
                "Completed torrent"
            );
            let torrent_report = self
                .process_torrent(torrent, &mut refreshed, &mut report, cancel)
                .await;
            report.torrents.push(torrent_report);
        }

        observe_tick_duration(started, true);
        Ok(report)
    }

    /// Place every file of one torrent, then refresh and delete as configured.
    async fn process_torrent(
        &self,
        torrent: &Torrent,
        refreshed: &mut HashSet<PathBuf>,
        tick: &mut TickReport,
        cancel: &CancellationToken,
    ) -> TorrentReport {
        let mut report = TorrentReport::new(&torrent.hash, &torrent.name);

        let files = match self.client.files_by_hash(&torrent.hash, cancel).await {
            Ok(files) => files,
            Err(TorrentClientError::Cancelled) => {
                info!(torrent = %torrent.name, "Cancelled while listing torrent files");
                report.all_success = false;
                report.deletion = Deletion::Interrupted;
                return report;
            }
            Err(e) => {
                if matches!(e, TorrentClientError::TorrentNotFound(_)) {
                    warn!(torrent = %torrent.name, "Torrent disappeared before its files were listed");
                } else {
                    error!(torrent = %torrent.name, error = %e, "Failed to list torrent files");
                    self.notify(NotificationEvent::TorrentFailed {
                        torrent: torrent.name.clone(),
                        category: torrent.category.clone(),
                        error: e.to_string(),
                    });
                }
                metrics::TORRENTS_PROCESSED.with_label_values(&["failed"]).inc();
                report.all_success = false;
                report.deletion = Deletion::Kept;
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.files = files.len();

        let mut touched_dirs: Vec<PathBuf> = Vec::new();
        let mut placed = 0usize;
        for file in &files {
            if cancel.is_cancelled() {
                warn!(torrent = %torrent.name, "Cancelled while placing files");
                report.all_success = false;
                report.deletion = Deletion::Interrupted;
                return report;
            }

            let op = self.placer.place_file(&self.config, torrent, file).await;
            self.record_file(torrent, &op, &mut report);

            if let Some(action) = op.action() {
                if action.touched_destination() {
                    placed += 1;
                    if let Some(dir) = op.destination.parent() {
                        if !touched_dirs.iter().any(|d| d == dir) {
                            touched_dirs.push(dir.to_path_buf());
                        }
                    }
                }
            }
        }

        info!(
            torrent = %torrent.name,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            files = report.files,
            "Processed torrent files"
        );
        metrics::TORRENTS_PROCESSED
            .with_label_values(&[metrics::result_label(report.all_success)])
            .inc();

        if report.all_success && placed > 0 && !self.config.dry_run {
            self.notify(NotificationEvent::TorrentProcessed {
                torrent: torrent.name.clone(),
                category: torrent.category.clone(),
                operation: self.config.operation,
                files: placed,
                size: torrent.size,
            });
        }

        if report.processed > 0 && !self.config.dry_run && self.refresher.is_enabled() {
            for dir in touched_dirs {
                if refreshed.contains(&dir) {
                    continue;
                }
                self.refresh(torrent, &dir, tick, cancel).await;
                refreshed.insert(dir);
            }
        }

        report.deletion = self.delete_if_done(torrent, report.all_success, cancel).await;
        report
    }

    fn record_file(&self, torrent: &Torrent, op: &FileOperation, report: &mut TorrentReport) {
        match &op.result {
            Ok(PlacementAction::SkippedIncomplete) => {
                report.skipped += 1;
            }
            Ok(action) => {
                report.processed += 1;
                if action.touched_destination() {
                    metrics::BYTES_PLACED
                        .with_label_values(&[action.as_str()])
                        .inc_by(op.size);
                    info!(
                        action = action.as_str(),
                        source = %op.source.display(),
                        destination = %op.destination.display(),
                        "Placed file"
                    );
                }
            }
            Err(e) => {
                report.failed += 1;
                report.all_success = false;
                error!(
                    torrent = %torrent.name,
                    source = %op.source.display(),
                    error = %e,
                    "Failed to place file"
                );
                self.notify(NotificationEvent::FileFailed {
                    torrent: torrent.name.clone(),
                    category: torrent.category.clone(),
                    file: op.source.display().to_string(),
                    error: e.to_string(),
                });
            }
        }

        let label = op.action().map(|a| a.as_str()).unwrap_or("failed");
        metrics::FILES_TOTAL.with_label_values(&[label]).inc();
    }

    async fn refresh(
        &self,
        torrent: &Torrent,
        dir: &std::path::Path,
        tick: &mut TickReport,
        cancel: &CancellationToken,
    ) {
        tick.refreshed.push(dir.to_path_buf());
        match self.refresher.refresh_directory(dir, cancel).await {
            Ok(()) => {
                metrics::REFRESHES_TOTAL.with_label_values(&["ok"]).inc();
                debug!(refresher = self.refresher.name(), directory = %dir.display(), "Library refreshed");
            }
            Err(RefreshError::Cancelled) => {
                info!(directory = %dir.display(), "Library refresh cancelled");
            }
            Err(e) => {
                tick.refresh_failures += 1;
                metrics::REFRESHES_TOTAL.with_label_values(&["failed"]).inc();
                warn!(
                    refresher = self.refresher.name(),
                    directory = %dir.display(),
                    error = %e,
                    "Library refresh failed"
                );
                self.notify(NotificationEvent::RefreshFailed {
                    torrent: torrent.name.clone(),
                    category: torrent.category.clone(),
                    directory: dir.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn delete_if_done(
        &self,
        torrent: &Torrent,
        all_success: bool,
        cancel: &CancellationToken,
    ) -> Deletion {
        if !self.config.delete_torrent {
            debug!(torrent = %torrent.name, "Torrent deletion disabled");
            return Deletion::Disabled;
        }
        if !all_success {
            info!(torrent = %torrent.name, "Keeping torrent, some files failed");
            return Deletion::Kept;
        }
        if self.config.dry_run {
            info!(
                torrent = %torrent.name,
                delete_files = self.config.delete_files,
                "[dry run] Would delete torrent"
            );
            return Deletion::WouldDelete;
        }

        match self
            .client
            .delete_torrent(&torrent.hash, self.config.delete_files, cancel)
            .await
        {
            Ok(()) => {
                metrics::TORRENTS_DELETED.inc();
                info!(
                    torrent = %torrent.name,
                    delete_files = self.config.delete_files,
                    "Deleted torrent from client"
                );
                self.notify(NotificationEvent::TorrentDeleted {
                    torrent: torrent.name.clone(),
                    category: torrent.category.clone(),
                    delete_files: self.config.delete_files,
                });
                Deletion::Deleted
            }
            Err(TorrentClientError::Cancelled) => {
                info!(torrent = %torrent.name, "Cancelled before torrent was deleted");
                Deletion::Interrupted
            }
            Err(e) => {
                error!(torrent = %torrent.name, error = %e, "Failed to delete torrent");
                self.notify(NotificationEvent::TorrentFailed {
                    torrent: torrent.name.clone(),
                    category: torrent.category.clone(),
                    error: format!("failed to delete torrent: {e}"),
                });
                Deletion::Failed(e.to_string())
            }
        }
    }

    /// Dry runs stay silent.
    fn notify(&self, event: NotificationEvent) {
        if !self.config.dry_run {
            self.notifier.notify(event);
        }
    }
}

/// First tick deadline, or `None` when the period cannot drive a ticker.
fn first_deadline(period: Duration) -> Option<tokio::time::Instant> {
    if period.is_zero() {
        return None;
    }
    let now = tokio::time::Instant::now();
    // The ticker schedules one period past each deadline.
    now.checked_add(period.checked_mul(2)?)?;
    now.checked_add(period)
}

fn observe_tick_duration(started: Instant, ok: bool) {
    metrics::TICK_DURATION
        .with_label_values(&[metrics::result_label(ok)])
        .observe(started.elapsed().as_secs_f64());
}
