use crate::{
    AnalysisError, BranchInfo, BranchPredictModel, NamedModel, SymbolResolver, calc_branch_info,
    read_trace_lines, validate_models,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

/// Statistics of one predictor model over one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResult {
    /// number of resolved conditional branches and jumps
    pub branches: u64,
    /// number of wrong predictions
    pub mispredict: u64,
    /// number of indirect jumps, not predicted
    pub num_jrs: u64,
    /// number of unconditional jumps, included in `branches`
    pub num_jmps: u64,
    pub num_taken_conditional_branches: u64,
    /// taken, predicted not taken
    pub t_mp: u64,
    /// not taken, predicted taken
    pub nt_mp: u64,
    /// taken, predicted taken
    pub t_p: u64,
    /// not taken, predicted not taken
    pub nt_p: u64,
}

impl ModelResult {
    pub fn mispredict_rate(&self) -> f64 {
        if self.branches == 0 {
            0.0
        } else {
            self.mispredict as f64 / self.branches as f64
        }
    }

    /// branches and jumps including the indirect ones
    pub fn total_branches(&self) -> u64 {
        self.branches + self.num_jrs
    }
}

pub type ModelResults = BTreeMap<String, ModelResult>;

/// Replay the outcomes in order through `model`
pub fn run_branch_model(info: &BranchInfo, model: &mut dyn BranchPredictModel) -> ModelResult {
    let mut result = ModelResult {
        branches: info.branches.len() as u64,
        num_jrs: info.num_jrs,
        num_jmps: info.num_jmps,
        num_taken_conditional_branches: info.num_taken_conditional_branches,
        ..Default::default()
    };

    for outcome in &info.branches {
        let prediction = model.predict_branch(outcome.pc, outcome.target, outcome.taken);
        match (outcome.taken, prediction) {
            (true, true) => result.t_p += 1,
            (true, false) => result.t_mp += 1,
            (false, true) => result.nt_mp += 1,
            (false, false) => result.nt_p += 1,
        }
    }
    result.mispredict = result.t_mp + result.nt_mp;

    result
}

/// Replay the branch outcomes through a fresh instance of every model
pub fn run_branch_models_on_info(info: &BranchInfo, models: &[NamedModel]) -> ModelResults {
    let mut results = ModelResults::new();
    for model in models {
        info!("model: {}", model.name);
        let mut instance = model.model.build();
        results.insert(model.name.clone(), run_branch_model(info, instance.as_mut()));
    }
    results
}

/// Analyse trace lines (header already removed) for the region
/// `[start_pc, stop_pc)`
pub fn simulate_lines<I, S>(
    lines: I,
    start_pc: u64,
    stop_pc: u64,
    models: &[NamedModel],
) -> Result<ModelResults, AnalysisError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_models(models)?;
    let info = calc_branch_info(lines, start_pc, stop_pc);
    Ok(run_branch_models_on_info(&info, models))
}

/// Analyse one trace file, taking the region of interest from the symbols of
/// `exe_path`
pub fn run_branch_models(
    trace_path: &Path,
    exe_path: &Path,
    resolver: &dyn SymbolResolver,
    models: &[NamedModel],
) -> Result<ModelResults, AnalysisError> {
    info!(
        "Running models for {}, {}",
        trace_path.display(),
        exe_path.display()
    );

    let (start_pc, stop_pc) = resolver.resolve(exe_path)?.region(exe_path)?;
    info!("start/stop pc: {:x} {:x}", start_pc, stop_pc);

    let lines = read_trace_lines(trace_path).map_err(|source| AnalysisError::Trace {
        path: trace_path.to_path_buf(),
        source,
    })?;
    simulate_lines(&lines, start_pc, stop_pc, models)
}
