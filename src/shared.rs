use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{AddressTable, Clock, PortHandle};

// A learning table that can be shared between multiple owners and accessed concurrently.
// Cloning takes a reference; the table is flushed and freed when the last one drops.
pub struct MacLearning<P: PortHandle> {
    inner: Arc<RwLock<AddressTable<P>>>,
    // Signalled whenever a write handle is released, so the maintenance task
    // re-reads its deadline.
    changed: Arc<Notify>,
}

impl<P: PortHandle> Clone for MacLearning<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            changed: self.changed.clone(),
        }
    }
}

impl<P: PortHandle> From<AddressTable<P>> for MacLearning<P> {
    fn from(table: AddressTable<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
            changed: Arc::new(Notify::new()),
        }
    }
}

impl<P: PortHandle> MacLearning<P> {
    pub fn new(idle_time: u32) -> Self {
        AddressTable::new(idle_time).into()
    }

    pub fn with_clock(idle_time: u32, clock: Arc<dyn Clock>) -> Self {
        AddressTable::with_clock(idle_time, clock).into()
    }

    /// Shared access: lookups and predicates.
    pub async fn read(&self) -> ReadHandle<'_, P> {
        ReadHandle(self.inner.read().await)
    }

    /// Exclusive access: learning, expiry and configuration.
    pub async fn write(&self) -> WriteHandle<'_, P> {
        WriteHandle {
            guard: self.inner.write().await,
            changed: Some(&self.changed),
        }
    }

    // For the maintenance task itself: its own passes must not wake it again.
    pub(crate) async fn write_unobserved(&self) -> WriteHandle<'_, P> {
        WriteHandle {
            guard: self.inner.write().await,
            changed: None,
        }
    }

    /// Completes after the next write handle is released.
    pub(crate) fn changed(&self) -> Arc<Notify> {
        self.changed.clone()
    }

    /// For callers outside the async runtime. Panics if called from within one.
    pub fn blocking_read(&self) -> ReadHandle<'_, P> {
        ReadHandle(self.inner.blocking_read())
    }

    pub fn blocking_write(&self) -> WriteHandle<'_, P> {
        WriteHandle {
            guard: self.inner.blocking_write(),
            changed: Some(&self.changed),
        }
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

pub struct ReadHandle<'a, P: PortHandle>(RwLockReadGuard<'a, AddressTable<P>>);

impl<P: PortHandle> Deref for ReadHandle<'_, P> {
    type Target = AddressTable<P>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct WriteHandle<'a, P: PortHandle> {
    guard: RwLockWriteGuard<'a, AddressTable<P>>,
    changed: Option<&'a Notify>,
}

impl<P: PortHandle> Deref for WriteHandle<'_, P> {
    type Target = AddressTable<P>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<P: PortHandle> DerefMut for WriteHandle<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<P: PortHandle> Drop for WriteHandle<'_, P> {
    fn drop(&mut self) {
        if let Some(changed) = self.changed {
            changed.notify_one();
        }
    }
}
