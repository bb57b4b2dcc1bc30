use std::time::Duration;

use log::{debug, trace};
use tokio::task::JoinHandle;

use crate::{MacLearning, PortHandle, Scheduler, Timestamp};

/// What the table asked for on its last `wait`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NextWake {
    /// Nothing to age; poll again later.
    #[default]
    Idle,
    Immediately,
    At(Timestamp),
}

impl Scheduler for NextWake {
    fn wake_immediately(&mut self) {
        *self = NextWake::Immediately;
    }

    fn wake_at(&mut self, deadline: Timestamp) {
        *self = match *self {
            NextWake::Immediately => NextWake::Immediately,
            NextWake::At(current) if current <= deadline => NextWake::At(current),
            _ => NextWake::At(deadline),
        };
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    /// How long to sleep when the table holds no entries.
    pub idle_poll: Duration,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(1),
        }
    }
}

/// Spawns the task that ages the table: `run` under the write lock, then
/// `wait` under the read lock to decide how long to sleep. Any write through
/// another handle cuts the sleep short, since it may have moved the deadline.
/// `on_revalidate` is called whenever `run` reports changed bindings. Abort
/// the returned handle to stop it.
pub fn spawn_maintenance<P, F>(
    table: MacLearning<P>,
    options: MaintenanceOptions,
    mut on_revalidate: F,
) -> JoinHandle<()>
where
    P: PortHandle + Send + Sync + 'static,
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let changed = table.changed();
        loop {
            if table.write_unobserved().await.run() {
                debug!("learning table changed, revalidating");
                on_revalidate();
            }

            let mut next = NextWake::default();
            let now = {
                let guard = table.read().await;
                guard.wait(&mut next);
                guard.now()
            };
            trace!("next maintenance: {:?}", next);
            let delay = match next {
                NextWake::Immediately => {
                    tokio::task::yield_now().await;
                    continue;
                }
                NextWake::At(deadline) => Duration::from_secs(deadline.saturating_sub(now)),
                NextWake::Idle => options.idle_poll,
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = changed.notified() => trace!("table written, rescheduling"),
            }
        }
    })
}
