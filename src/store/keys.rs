//! Key iterator

use std::sync::Arc;

use crate::engine::KeyCursor;
use crate::error::Result;

use super::binary_store::StoreShared;

/// Forward-only iterator over the keys of a [`BinaryStore`](super::BinaryStore)
///
/// One key is always read ahead. Every step re-checks, under the store
/// lock, that the store still holds the database the iteration started on;
/// once it does not, the read-ahead key is stale and iteration ends.
#[derive(Debug)]
pub struct Keys {
    store: Arc<StoreShared>,

    /// Handle id of the database being scanned
    holder_id: u64,

    cursor: KeyCursor,

    /// Key to hand out on the next call
    pending: Option<Vec<u8>>,
}

enum Step {
    Advanced(Option<Vec<u8>>),
    Detached,
}

impl Keys {
    pub(crate) fn new(
        store: Arc<StoreShared>,
        holder_id: u64,
        cursor: KeyCursor,
        first: Option<Vec<u8>>,
    ) -> Self {
        Self {
            store,
            holder_id,
            cursor,
            pending: first,
        }
    }
}

impl Iterator for Keys {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.pending.take()?;

        let holder_id = self.holder_id;
        let cursor = &mut self.cursor;
        let step = self.store.with_state(|state| -> Result<Step> {
            match state.holder() {
                Some(holder) if holder.id() == holder_id => {
                    let env = holder.environment()?;
                    cursor.advance(&env, holder.database()).map(Step::Advanced)
                }
                _ => Ok(Step::Detached),
            }
        });

        match step {
            Ok(Step::Advanced(next)) => {
                self.pending = next;
                Some(Ok(current))
            }
            Ok(Step::Detached) => {
                tracing::debug!("Store database changed during key iteration, stopping");
                self.cursor.close();
                None
            }
            Err(e) => {
                self.cursor.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for Keys {
    fn drop(&mut self) {
        self.cursor.close();
    }
}
