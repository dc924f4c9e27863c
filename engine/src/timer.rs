use std::{future::Future, pin::Pin, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, Instant},
};
use uuid::Uuid;

use crate::EngineError;

pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A countdown on its own task. Ticks every `min(remaining, TICK_INTERVAL)`
/// with the time left, then fires its terminal callback once. The timer
/// holds no locks; callbacks take whatever they need.
#[derive(Debug)]
pub struct TimerHandle {
    id: Uuid,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stops further ticks and the terminal callback, waking a sleeping tick
    /// immediately. Safe to call any number of times, and a no-op once the
    /// terminal callback has started.
    pub fn cancel(&self) {
        if self.cancel.send_replace(true) {
            return;
        }
        log::debug!("Timer {} cancelled", self.id);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn start<T, E>(wait: Duration, on_tick: T, on_expire: E) -> TimerHandle
where
    T: Fn(Duration) -> BoxFuture<Result<(), EngineError>> + Send + Sync + 'static,
    E: FnOnce() -> BoxFuture<Result<(), EngineError>> + Send + 'static,
{
    let id = Uuid::new_v4();
    let (cancel, mut cancelled) = watch::channel(false);
    let deadline = Instant::now() + wait;
    log::debug!("Timer {id} started for {wait:?}");

    let task = tokio::spawn(async move {
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancelled) => return,
                _ = sleep(left.min(TICK_INTERVAL)) => {}
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || *cancelled.borrow() {
                break;
            }
            if let Err(err) = on_tick(left).await {
                log::warn!("Timer {id} tick failed: {err}");
            }
        }
        if *cancelled.borrow() {
            return;
        }
        log::debug!("Timer {id} expired");
        if let Err(err) = on_expire().await {
            log::error!("Timer {id} expiry failed: {err}");
        }
    });

    TimerHandle { id, cancel, task }
}

/// Resolves once cancellation is requested. Never resolves if the handle was
/// dropped without cancelling.
async fn wait_for_cancel(cancelled: &mut watch::Receiver<bool>) {
    if cancelled.wait_for(|&c| c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
