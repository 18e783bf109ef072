pub mod permission;
pub mod role;
pub mod sync;

pub use permission::*;
pub use role::*;
pub use sync::*;

/// What a single ensure_* call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub created: usize,
    pub unchanged: usize,
}

impl SyncCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }
}
