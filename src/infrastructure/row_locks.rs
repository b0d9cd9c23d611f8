use crate::domain::account::AccountId;
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type RowTable = HashMap<AccountId, Arc<Mutex<()>>>;

fn lock_table(table: &StdMutex<RowTable>) -> MutexGuard<'_, RowTable> {
    // The table is only mutated under short, non-panicking critical sections.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local lock manager handing out one exclusive hold per account id.
///
/// Waiters are queued in arrival order (`tokio::sync::Mutex` is fair), so two
/// units of work contending for the same row are served first come, first served.
/// A row's entry lives only while someone holds or waits for it, so the table
/// stays as small as the set of rows in use.
#[derive(Default)]
pub struct RowLocks {
    rows: Arc<StdMutex<RowTable>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row is free and takes it.
    pub async fn acquire(&self, id: AccountId) -> RowGuard {
        let entry = {
            let mut rows = lock_table(&self.rows);
            RowEntry {
                id,
                row: Arc::clone(rows.entry(id).or_default()),
                rows: Arc::clone(&self.rows),
            }
        };
        let guard = Arc::clone(&entry.row).lock_owned().await;
        RowGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    #[cfg(test)]
    fn tracked_rows(&self) -> usize {
        lock_table(&self.rows).len()
    }
}

/// Interest in one row's table entry. The last one dropped removes the entry.
struct RowEntry {
    id: AccountId,
    row: Arc<Mutex<()>>,
    rows: Arc<StdMutex<RowTable>>,
}

impl Drop for RowEntry {
    fn drop(&mut self) {
        let mut rows = lock_table(&self.rows);
        // The table's reference plus this one.
        if Arc::strong_count(&self.row) == 2
            && rows
                .get(&self.id)
                .is_some_and(|row| Arc::ptr_eq(row, &self.row))
        {
            rows.remove(&self.id);
        }
    }
}

/// Exclusive hold on one account row. Released on drop.
pub struct RowGuard {
    // Field order matters: the mutex is released before the entry is pruned.
    _guard: OwnedMutexGuard<()>,
    _entry: RowEntry,
}

/// The set of holds owned by a single unit of work.
#[derive(Default)]
pub struct HeldRows {
    guards: HashMap<AccountId, RowGuard>,
}

impl HeldRows {
    /// Takes the hold on `id` unless this unit of work already owns it.
    pub async fn hold(&mut self, locks: &RowLocks, id: AccountId) {
        if !self.guards.contains_key(&id) {
            let guard = locks.acquire(id).await;
            self.guards.insert(id, guard);
        }
    }

    pub fn ensure_held(&self, id: AccountId) -> Result<(), StoreError> {
        if self.guards.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::LockNotHeld(id))
        }
    }
}
