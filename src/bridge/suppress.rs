//! Swallows the engine events caused by the bridge's own operations.

use std::collections::HashMap;

use crate::engine::PlayerEventKind;

#[derive(Debug, Default)]
pub struct Suppressor {
    pending: HashMap<PlayerEventKind, usize>,
}

impl Suppressor {
    /// Expect one more engine event of each kind that must not be forwarded.
    pub fn suppress(&mut self, kinds: &[PlayerEventKind]) {
        for kind in kinds {
            *self.pending.entry(*kind).or_default() += 1;
        }
    }

    /// Withdraw an expectation after the engine refused the operation.
    pub fn release(&mut self, kinds: &[PlayerEventKind]) {
        for kind in kinds {
            if let Some(count) = self.pending.get_mut(kind) {
                *count -= 1;
                if *count == 0 {
                    self.pending.remove(kind);
                }
            }
        }
    }

    /// Consume one expectation for `kind`. Returns `true` if the event must
    /// be swallowed.
    pub fn take(&mut self, kind: PlayerEventKind) -> bool {
        match self.pending.get_mut(&kind) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.pending.remove(&kind);
                }
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
