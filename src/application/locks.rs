//! Lock maps serializing mutations per order, per customer and per business day.

use chrono::NaiveDate;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Exclusive async locks created on demand for each key.
///
/// An entry lives only while somebody holds or awaits it; the last guard to
/// drop removes it from the map.
pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        // The shard guard from `entry` must not live across the await below.
        let slot = self.slots.entry(key.clone()).or_default().clone();
        let guard = match slot.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(?key, "waiting for contended lock");
                slot.lock_owned().await
            }
        };
        KeyGuard {
            key,
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub struct KeyGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // Release first so the map holds the only remaining reference when idle.
        self.guard.take();
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Date-scoped reader/writer gate.
///
/// Order mutations enter shared; closing a day enters exclusive. Like
/// [`KeyedLocks`], a date's entry is dropped once nobody holds or awaits it.
#[derive(Default)]
pub struct DayGate {
    days: Arc<DashMap<NaiveDate, Arc<RwLock<()>>>>,
}

pub type SharedDay = DayGuard<OwnedRwLockReadGuard<()>>;
pub type ExclusiveDay = DayGuard<OwnedRwLockWriteGuard<()>>;

impl DayGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, date: NaiveDate) -> Arc<RwLock<()>> {
        self.days.entry(date).or_default().clone()
    }

    fn wrap<G>(&self, date: NaiveDate, guard: G) -> DayGuard<G> {
        DayGuard {
            date,
            days: Arc::clone(&self.days),
            guard: Some(guard),
        }
    }

    pub async fn shared(&self, date: NaiveDate) -> SharedDay {
        let guard = self.gate(date).read_owned().await;
        self.wrap(date, guard)
    }

    pub async fn exclusive(&self, date: NaiveDate) -> ExclusiveDay {
        let guard = self.gate(date).write_owned().await;
        self.wrap(date, guard)
    }

    /// Dates currently held or awaited.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

pub struct DayGuard<G> {
    date: NaiveDate,
    days: Arc<DashMap<NaiveDate, Arc<RwLock<()>>>>,
    guard: Option<G>,
}

impl<G> Drop for DayGuard<G> {
    fn drop(&mut self) {
        self.guard.take();
        self.days
            .remove_if(&self.date, |_, gate| Arc::strong_count(gate) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_reclaimed_after_release() {
        let locks = KeyedLocks::<u64>::new();
        {
            let _a = locks.lock(1).await;
            let _b = locks.lock(2).await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(7).await;
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(KeyedLocks::<u64>::new());
        let first = locks.lock(3).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(3).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(first);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_day_gate_exclusive_blocks_shared() {
        let gate = DayGate::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let writer = gate.exclusive(date).await;
        let pending = tokio::time::timeout(Duration::from_millis(10), gate.shared(date)).await;
        assert!(pending.is_err());
        drop(writer);
        let _reader = gate.shared(date).await;
        let other = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        let _other_writer = gate.exclusive(other).await;
    }

    #[tokio::test]
    async fn test_day_gate_reclaims_released_dates() {
        let gate = Arc::new(DayGate::new());
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        for day in 1..=30 {
            let d = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
            let _reader = gate.shared(d).await;
        }
        assert!(gate.is_empty());

        let reader = gate.shared(date).await;
        let writer = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _writer = gate.exclusive(date).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(gate.len(), 1);
        drop(reader);
        writer.await.unwrap();
        assert!(gate.is_empty());
    }
}
