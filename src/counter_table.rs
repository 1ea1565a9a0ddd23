use crate::BranchPredictModel;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CounterEntry {
    counter: u32,
    /// insertion sequence number, smaller is older
    seq: u64,
}

/// Table of saturating counters keyed by branch address.
///
/// Taken branches are allocated with `counter_start` and predicted taken
/// once their counter reaches `counter_max`. A counter decremented to zero
/// frees its slot. When the table is full the oldest allocation is evicted.
///
/// Ages are ranks among the resident entries: the newest entry has age 0 and
/// the oldest has age `len() - 1`.
#[derive(Debug, Clone)]
pub struct CounterTableModel {
    slots: usize,
    counter_start: u32,
    counter_max: u32,
    entries: HashMap<u64, CounterEntry>,
    /// seq -> pc, oldest first
    by_age: BTreeMap<u64, u64>,
    next_seq: u64,
}

impl CounterTableModel {
    pub fn new(slots: usize, counter_start: u32, counter_max: u32) -> Self {
        Self {
            slots,
            counter_start: counter_start.min(counter_max),
            counter_max,
            entries: HashMap::with_capacity(slots),
            by_age: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn counter_max(&self) -> u32 {
        self.counter_max
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counter(&self, pc: u64) -> Option<u32> {
        self.entries.get(&pc).map(|entry| entry.counter)
    }

    /// Age rank of a resident entry, 0 is the newest
    pub fn age(&self, pc: u64) -> Option<usize> {
        let entry = self.entries.get(&pc)?;
        Some(self.by_age.range(entry.seq + 1..).count())
    }

    fn oldest_entry_pc(&self) -> Option<u64> {
        self.by_age.first_key_value().map(|(_, pc)| *pc)
    }

    fn add_entry(&mut self, pc: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            pc,
            CounterEntry {
                counter: self.counter_start,
                seq,
            },
        );
        self.by_age.insert(seq, pc);
    }

    fn remove_entry(&mut self, pc: u64) {
        if let Some(entry) = self.entries.remove(&pc) {
            self.by_age.remove(&entry.seq);
        }
    }
}

impl BranchPredictModel for CounterTableModel {
    fn predict_branch(&mut self, pc: u64, _target: Option<u64>, taken: bool) -> bool {
        let counter_max = self.counter_max;

        if let Some(entry) = self.entries.get_mut(&pc) {
            let result = entry.counter == counter_max;

            if taken {
                entry.counter = entry.counter.saturating_add(1).min(counter_max);
            } else {
                entry.counter = entry.counter.saturating_sub(1);
                if entry.counter == 0 {
                    self.remove_entry(pc);
                }
            }

            result
        } else {
            if taken && self.slots > 0 {
                if self.entries.len() == self.slots {
                    if let Some(oldest) = self.oldest_entry_pc() {
                        self.remove_entry(oldest);
                    }
                }
                self.add_entry(pc);
            }

            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_dense_ages(model: &CounterTableModel, pcs: &[u64]) {
        let mut ages: Vec<usize> = pcs.iter().filter_map(|pc| model.age(*pc)).collect();
        ages.sort();
        assert_eq!(ages, (0..model.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_taken_sequence() {
        let mut model = CounterTableModel::new(4, 2, 3);
        let predictions: Vec<bool> = (0..5)
            .map(|_| model.predict_branch(0x20, Some(0x10), true))
            .collect();
        assert_eq!(predictions, vec![false, false, true, true, true]);
        assert_eq!(model.counter(0x20), Some(3));
    }

    #[test]
    fn test_not_taken_without_entry() {
        let mut model = CounterTableModel::new(4, 2, 3);
        assert!(!model.predict_branch(0x20, Some(0x10), false));
        assert!(model.is_empty());
    }

    #[test]
    fn test_decrement_to_zero_evicts() {
        let mut model = CounterTableModel::new(4, 2, 3);
        model.predict_branch(0x10, None, true);
        model.predict_branch(0x20, None, true);
        model.predict_branch(0x30, None, true);
        assert_eq!(model.age(0x10), Some(2));

        model.predict_branch(0x20, None, false);
        assert_eq!(model.counter(0x20), Some(1));
        model.predict_branch(0x20, None, false);
        assert_eq!(model.counter(0x20), None);

        assert_eq!(model.age(0x10), Some(1));
        assert_eq!(model.age(0x30), Some(0));
        assert_dense_ages(&model, &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn test_full_table_evicts_oldest() {
        let mut model = CounterTableModel::new(2, 2, 3);
        model.predict_branch(0x10, None, true);
        model.predict_branch(0x20, None, true);
        // counter updates do not change age
        model.predict_branch(0x10, None, true);
        model.predict_branch(0x30, None, true);

        assert_eq!(model.counter(0x10), None);
        assert_eq!(model.age(0x20), Some(1));
        assert_eq!(model.age(0x30), Some(0));
        assert_eq!(model.counter(0x30), Some(2));
    }

    #[test]
    fn test_counter_at_type_max_saturates() {
        let mut model = CounterTableModel::new(2, u32::MAX, u32::MAX);
        assert!(!model.predict_branch(0x10, None, true));
        assert!(model.predict_branch(0x10, None, true));
        assert!(model.predict_branch(0x10, None, true));
        assert_eq!(model.counter(0x10), Some(u32::MAX));
    }

    #[test]
    fn test_invariants_hold() {
        let mut model = CounterTableModel::new(4, 2, 3);
        let pcs: Vec<u64> = (0..8).map(|i| 0x100 + i * 4).collect();
        for step in 0..200usize {
            let pc = pcs[(step * 7 + step / 3) % pcs.len()];
            let taken = (step * 5) % 7 < 4;
            model.predict_branch(pc, None, taken);

            assert!(model.len() <= model.slots());
            for pc in &pcs {
                if let Some(counter) = model.counter(*pc) {
                    assert!(counter > 0 && counter <= model.counter_max());
                }
            }
            assert_dense_ages(&model, &pcs);
        }
    }
}
