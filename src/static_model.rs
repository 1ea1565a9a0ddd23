use crate::BranchPredictModel;

/// Backward taken, forward not taken
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticModel;

impl BranchPredictModel for StaticModel {
    fn predict_branch(&mut self, pc: u64, target: Option<u64>, _taken: bool) -> bool {
        // without a target there is no direction to go by
        target.is_some_and(|target| target < pc)
    }
}
