use crate::BranchPredictModel;
use std::collections::VecDeque;

/// Predicts taken for branches seen taken recently.
///
/// A branch is inserted when it is taken while absent and removed as soon as
/// it is not taken while present. When full, the entry inserted first is
/// evicted.
#[derive(Debug, Clone)]
pub struct TableModel {
    slots: usize,
    /// resident branch addresses, oldest first
    entries: VecDeque<u64>,
}

impl TableModel {
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            entries: VecDeque::with_capacity(slots),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.entries.contains(&pc)
    }

    /// Resident addresses in insertion order
    pub fn entries(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }
}

impl BranchPredictModel for TableModel {
    fn predict_branch(&mut self, pc: u64, _target: Option<u64>, taken: bool) -> bool {
        let position = self.entries.iter().position(|&entry| entry == pc);
        let result = position.is_some();

        match position {
            None if taken && self.slots > 0 => {
                if self.entries.len() == self.slots {
                    self.entries.pop_front();
                }
                self.entries.push_back(pc);
            }
            Some(index) if !taken => {
                self.entries.remove(index);
            }
            _ => {}
        }

        result
    }
}
