use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Names one armed timer so a later cancel or elapse can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOperation {
    Start { id: TimerId, millis: u64 },
    Cancel { id: TimerId },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerOutput {
    Elapsed { id: TimerId },
    Cancelled { id: TimerId },
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

/// One-shot timers run by the shell.
#[derive(Capability)]
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Timer<Ev> {
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Timer<Ev>
where
    Ev: Send + 'static,
{
    /// Posts `make_event()` once `after` has passed. Nothing is posted if the
    /// timer is cancelled first.
    pub fn notify_after<F>(&self, id: TimerId, after: Duration, make_event: F)
    where
        F: FnOnce() -> Ev + Send + 'static,
    {
        let millis = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
        let context = self.context.clone();
        self.context.spawn(async move {
            match context
                .request_from_shell(TimerOperation::Start { id, millis })
                .await
            {
                TimerOutput::Elapsed { .. } => context.update_app(make_event()),
                TimerOutput::Cancelled { id } => trace!(timer = %id, "timer cancelled"),
            }
        });
    }

    pub fn cancel(&self, id: TimerId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}
