//! Daily digest scheduling.
//!
//! One background thread polls a [`DailyTrigger`]. When it fires, the
//! thread runs the digest task once for every [`Subscription`], keyed by
//! email. Subscriptions are read at fire time, so submissions made after the
//! thread started take effect without restarting it.

use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use common::Subscription;
use job_scraper::{Fetcher, FetcherConfig};
use notifier::{Notifier, SmtpSettings, Transport};
use tracing::{error, info, warn};

/// Fires once per day at a fixed local time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTrigger {
    at: NaiveTime,
    next_run: NaiveDateTime,
}

impl DailyTrigger {
    /// First run is today at `at` if that is still ahead of `now`, otherwise tomorrow.
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        Self {
            at,
            next_run: next_occurrence(at, now),
        }
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    /// Returns true when the trigger is due, and advances it past `now`.
    /// Days missed while the process was not polling fire only once.
    pub fn poll(&mut self, now: NaiveDateTime) -> bool {
        if now < self.next_run {
            return false;
        }
        self.next_run = next_occurrence(self.at, now);
        true
    }
}

fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    now.date()
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(at))
        .unwrap_or(NaiveDateTime::MAX)
}

pub type DigestTask = Arc<dyn Fn(&Subscription) + Send + Sync>;

/// Source of the current local time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

type Subscriptions = Arc<RwLock<BTreeMap<String, Subscription>>>;

/// Owns the subscriptions shared with the background thread.
pub struct DigestScheduler {
    subscriptions: Subscriptions,
    started: AtomicBool,
    at: NaiveTime,
    poll_interval: Duration,
    task: DigestTask,
    clock: Clock,
}

impl DigestScheduler {
    pub fn new(at: NaiveTime, poll_interval: Duration, task: DigestTask) -> Self {
        Self::with_clock(at, poll_interval, task, Arc::new(|| Local::now().naive_local()))
    }

    pub fn with_clock(at: NaiveTime, poll_interval: Duration, task: DigestTask, clock: Clock) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(BTreeMap::new())),
            started: AtomicBool::new(false),
            at,
            poll_interval,
            task,
            clock,
        }
    }

    pub fn digest_time(&self) -> NaiveTime {
        self.at
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Subscription registered for `email`, if any.
    #[cfg(test)]
    pub fn subscription(&self, email: &str) -> Option<Subscription> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    /// All subscriptions, ordered by email.
    #[cfg(test)]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        snapshot(&self.subscriptions)
    }

    /// Adds or replaces the subscription for its email and starts the
    /// background thread on first use. Returns true when an existing entry
    /// for that email was replaced.
    pub fn subscribe(&self, subscription: Subscription) -> io::Result<bool> {
        info!(
            "Digest subscription for {}: {} keywords, {} locations",
            subscription.email,
            subscription.criteria.keywords.len(),
            subscription.criteria.locations.len()
        );
        let replaced = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription.email.clone(), subscription)
            .is_some();

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Err(e) = self.spawn() {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(replaced)
    }

    fn spawn(&self) -> io::Result<()> {
        let subscriptions = Arc::clone(&self.subscriptions);
        let task = Arc::clone(&self.task);
        let clock = Arc::clone(&self.clock);
        let at = self.at;
        let poll_interval = self.poll_interval;

        thread::Builder::new()
            .name("digest-scheduler".to_string())
            .spawn(move || {
                let mut trigger = DailyTrigger::new(at, clock());
                info!("Digest scheduler started, next run at {}", trigger.next_run());

                loop {
                    if trigger.poll(clock()) {
                        run_all(&subscriptions, &task);
                        info!("Next digest at {}", trigger.next_run());
                    }
                    thread::sleep(poll_interval);
                }
            })?;
        Ok(())
    }
}

fn snapshot(subscriptions: &Subscriptions) -> Vec<Subscription> {
    subscriptions
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .cloned()
        .collect()
}

/// Runs the task for every subscription. A panicking run is logged and does
/// not stop the others or the scheduler thread. Returns the runs that completed.
fn run_all(subscriptions: &Subscriptions, task: &DigestTask) -> usize {
    let due = snapshot(subscriptions);
    if due.is_empty() {
        warn!("Digest due but no subscription is set");
        return 0;
    }

    let mut completed = 0;
    for sub in &due {
        match panic::catch_unwind(AssertUnwindSafe(|| task(sub))) {
            Ok(()) => completed += 1,
            Err(_) => error!("Digest task for {} panicked", sub.email),
        }
    }
    completed
}

/// Result of one digest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    NoListings,
    Sent(usize),
    Failed(usize),
}

/// Fetches jobs for the subscription and emails them if there are any.
pub fn run_digest<T>(
    fetcher: &Fetcher,
    notifier: &Notifier<T>,
    subscription: &Subscription,
) -> DigestOutcome
where
    T: Transport,
    T::Error: std::fmt::Display,
{
    let jobs = fetcher.fetch(&subscription.criteria);
    if jobs.is_empty() {
        info!("No jobs found for {}, skipping digest", subscription.email);
        return DigestOutcome::NoListings;
    }

    if notifier.send(&subscription.email, &jobs) {
        DigestOutcome::Sent(jobs.len())
    } else {
        error!(
            "Daily digest for {} was not delivered ({} jobs)",
            subscription.email,
            jobs.len()
        );
        DigestOutcome::Failed(jobs.len())
    }
}

/// Production task: a fresh fetcher and SMTP notifier per run.
pub fn smtp_digest_task(fetcher_config: FetcherConfig, smtp: SmtpSettings) -> DigestTask {
    Arc::new(move |subscription: &Subscription| {
        let fetcher = match Fetcher::new(fetcher_config.clone()) {
            Ok(f) => f,
            Err(e) => {
                error!("Cannot build fetcher for daily digest: {}", e);
                return;
            }
        };
        let notifier = match Notifier::smtp(&smtp) {
            Ok(n) => n,
            Err(e) => {
                error!("Cannot build SMTP notifier for daily digest: {}", e);
                return;
            }
        };
        run_digest(&fetcher, &notifier, subscription);
    })
}
