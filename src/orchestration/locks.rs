//! Per-entity async locks serializing regeneration of the same entity.

use crate::domain::EntityKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// Registry of one async mutex per entity key. Entries are created on first
/// use and removed when the last holder or waiter lets go.
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<EntityKey, Arc<AsyncMutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<EntityKey, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| {
            warn!("Entity lock registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait for exclusive access to `entity`. Released when the guard drops.
    pub async fn acquire(&self, entity: EntityKey) -> EntityGuard<'_> {
        let lock = self.registry().entry(entity).or_default().clone();
        let guard = lock.lock_owned().await;
        EntityGuard {
            locks: self,
            entity,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.registry().len()
    }
}

/// Exclusive access to one entity.
pub struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    entity: EntityKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Clones are only handed out under the registry lock, so a count of
        // one means nobody holds or waits on this entity.
        let mut registry = self.locks.registry();
        if registry
            .get(&self.entity)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            registry.remove(&self.entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContractId, InstrumentId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_entity_is_serialized() {
        let locks = Arc::new(EntityLocks::new());
        let key = EntityKey::Contract(ContractId::new(1));

        let guard = locks.acquire(key).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let locks = Arc::new(EntityLocks::new());
        let key = EntityKey::Instrument(InstrumentId::new(2));

        let guard = locks.acquire(key).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(key).await;
                locks.tracked()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(waiter.await.unwrap(), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_distinct_entities_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.acquire(EntityKey::Contract(ContractId::new(1))).await;
        let _b = locks
            .acquire(EntityKey::Instrument(InstrumentId::new(1)))
            .await;
        assert_eq!(locks.tracked(), 2);
    }
}
