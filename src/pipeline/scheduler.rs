// src/pipeline/scheduler.rs

//! Shared timer loop multiplexing one-shot tasks.
//!
//! All timed work in the process goes through a single loop: each scraper
//! registers a one-shot poll task under its own id, and periodic behavior
//! comes from the task re-registering itself when it fires. The loop keeps
//! pending fire times in a min-heap, sleeps for half the time remaining to
//! the earliest one, and on wake fires everything due within the trigger
//! resolution. Halving the sleep instead of sleeping the full remainder
//! keeps long timers accurate across clock hiccups at the cost of a handful
//! of extra wake-ups per task.
//!
//! Commands (add/remove) interrupt the sleep immediately, so a newly added
//! past-due task fires on the next loop turn even if the loop was idle.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Either};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{AppError, Result};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Handle to the shared timer loop. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
}

enum Command {
    Add {
        id: String,
        delay: Duration,
        job: Job,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        id: String,
    },
}

impl Scheduler {
    /// Spawn the timer loop and return a handle to it.
    ///
    /// `resolution` is the early-fire window: a wake-up runs every task due
    /// within that much of now instead of arming another tiny sleep.
    pub fn start(resolution: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let timer = TimerLoop {
            resolution,
            jobs: HashMap::new(),
            heap: BinaryHeap::new(),
            next_generation: 0,
        };
        tokio::spawn(timer.run(rx));
        Self { commands }
    }

    /// Register a one-shot task to fire after `delay`.
    ///
    /// The id must be free: re-registering a live id is rejected with
    /// [`AppError::Duplicate`] and leaves the existing task untouched. Once
    /// a task fires it is gone and its id may be reused.
    pub async fn add_task<F, Fut>(
        &self,
        id: impl Into<String>,
        delay: Duration,
        job: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let job: Job = Box::new(move || job().boxed());
        let (reply, confirm) = oneshot::channel();
        self.commands
            .send(Command::Add {
                id,
                delay,
                job,
                reply,
            })
            .map_err(|_| AppError::scheduler("timer loop is not running"))?;
        confirm
            .await
            .map_err(|_| AppError::scheduler("timer loop dropped the registration"))?
    }

    /// Drop a pending task. Removing an unknown id is a logged no-op.
    pub fn remove_task(&self, id: &str) {
        let command = Command::Remove { id: id.to_string() };
        if self.commands.send(command).is_err() {
            log::warn!("Timer loop is not running; cannot remove task '{id}'");
        }
    }
}

struct TimerLoop {
    resolution: Duration,
    /// Membership truth: a task exists iff its id maps to a live entry.
    jobs: HashMap<String, Entry>,
    /// Pending fire times; entries whose generation no longer matches the
    /// map are stale and discarded when they surface.
    heap: BinaryHeap<Reverse<(Instant, u64, String)>>,
    next_generation: u64,
}

struct Entry {
    generation: u64,
    job: Job,
}

impl TimerLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            self.fire_due();

            let timer = match self.next_delay() {
                Some(delay) => Either::Left(tokio::time::sleep(delay)),
                None => Either::Right(std::future::pending::<()>()),
            };

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = timer => {}
            }
        }
        log::debug!("Timer loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Add {
                id,
                delay,
                job,
                reply,
            } => {
                let result = self.add(id, delay, job);
                let _ = reply.send(result);
            }
            Command::Remove { id } => {
                if self.jobs.remove(&id).is_some() {
                    log::debug!("Task '{id}' removed");
                } else {
                    log::warn!("No scheduled task '{id}' to remove");
                }
            }
        }
    }

    fn add(&mut self, id: String, delay: Duration, job: Job) -> Result<()> {
        if self.jobs.contains_key(&id) {
            return Err(AppError::duplicate("scheduled task", id));
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let fire_at = Instant::now() + delay;
        log::debug!("Task '{id}' scheduled in {delay:?}");
        self.jobs.insert(id.clone(), Entry { generation, job });
        self.heap.push(Reverse((fire_at, generation, id)));
        Ok(())
    }

    /// Run every task due within the trigger resolution. Each one is
    /// removed first and its job spawned, so the loop never waits on work.
    fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((fire_at, generation, id))) = self.heap.peek().cloned() {
            if !self.is_live(&id, generation) {
                self.heap.pop();
                continue;
            }
            if fire_at.duration_since(now) > self.resolution {
                break;
            }
            self.heap.pop();
            if let Some(entry) = self.jobs.remove(&id) {
                log::debug!("Task '{id}' fired");
                tokio::spawn((entry.job)());
            }
        }
    }

    /// Half the time remaining to the earliest live task, or `None` when
    /// there is nothing pending and the loop should idle.
    fn next_delay(&mut self) -> Option<Duration> {
        let now = Instant::now();
        while let Some(Reverse((fire_at, generation, id))) = self.heap.peek().cloned() {
            if !self.is_live(&id, generation) {
                self.heap.pop();
                continue;
            }
            return Some(rearm_delay(fire_at.duration_since(now)));
        }
        None
    }

    fn is_live(&self, id: &str, generation: u64) -> bool {
        self.jobs
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
    }
}

/// Drift-correcting re-arm: sleep half the remaining time, floored so the
/// loop cannot spin hot right before a deadline.
fn rearm_delay(remaining: Duration) -> Duration {
    const MIN_SLEEP: Duration = Duration::from_millis(10);
    (remaining / 2).max(MIN_SLEEP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::AppError;

    fn counting_job(counter: &Arc<AtomicU32>) -> impl FnOnce() -> BoxFuture<'static, ()> + Send + use<> {
        let counter = counter.clone();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[test]
    fn test_rearm_delay_is_half_remaining() {
        assert_eq!(
            rearm_delay(Duration::from_millis(60_000)),
            Duration::from_millis(30_000)
        );
        assert_eq!(
            rearm_delay(Duration::from_secs(10)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_rearm_delay_has_floor() {
        assert_eq!(rearm_delay(Duration::ZERO), Duration::from_millis(10));
        assert_eq!(
            rearm_delay(Duration::from_millis(3)),
            Duration::from_millis(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_due_task_fires_once() {
        let scheduler = Scheduler::start(Duration::from_millis(500));
        let counter = Arc::new(AtomicU32::new(0));

        scheduler
            .add_task("poll", Duration::ZERO, counting_job(&counter))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // One-shot: nothing further fires.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // The id is free again once the task has fired.
        scheduler
            .add_task("poll", Duration::from_secs(1), counting_job(&counter))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_id_rejected() {
        let scheduler = Scheduler::start(Duration::from_millis(500));
        let counter = Arc::new(AtomicU32::new(0));

        scheduler
            .add_task("poll", Duration::from_secs(60), counting_job(&counter))
            .await
            .unwrap();
        let err = scheduler
            .add_task("poll", Duration::from_secs(1), counting_job(&counter))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));

        // The original registration is untouched: nothing fires at the
        // rejected one-second delay.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_prevents_firing() {
        let scheduler = Scheduler::start(Duration::from_millis(500));
        let counter = Arc::new(AtomicU32::new(0));

        scheduler
            .add_task("poll", Duration::from_secs(2), counting_job(&counter))
            .await
            .unwrap();
        scheduler.remove_task("poll");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Removing an id that does not exist is a no-op.
        scheduler.remove_task("ghost");
    }

    #[tokio::test(start_paused = true)]
    async fn test_re_add_after_remove_uses_new_delay() {
        let scheduler = Scheduler::start(Duration::from_millis(500));
        let counter = Arc::new(AtomicU32::new(0));

        scheduler
            .add_task("poll", Duration::from_secs(1), counting_job(&counter))
            .await
            .unwrap();
        scheduler.remove_task("poll");
        scheduler
            .add_task("poll", Duration::from_secs(60), counting_job(&counter))
            .await
            .unwrap();

        // The stale one-second entry must not fire the re-added task.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(55)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_fire_independently() {
        let scheduler = Scheduler::start(Duration::from_millis(500));
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        scheduler
            .add_task("slow", Duration::from_secs(10), counting_job(&first))
            .await
            .unwrap();
        scheduler
            .add_task("fast", Duration::from_secs(5), counting_job(&second))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }
}
