use crate::{BranchType, InstructionEvent, decode_line};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A resolved branch or jump, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchOutcome {
    /// address of the branch instruction
    pub pc: u64,
    /// statically encoded target, `None` if it could not be parsed
    pub target: Option<u64>,
    pub taken: bool,
}

/// Everything the predictor models need from one trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// resolved conditional branches and jumps, ordered as executed
    pub branches: Vec<BranchOutcome>,
    /// indirect jumps, never resolved into `branches`
    pub num_jrs: u64,
    /// unconditional jumps, included in `branches`
    pub num_jmps: u64,
    pub num_taken_conditional_branches: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Outside,
    Inside,
}

#[derive(Debug, Clone, Copy)]
struct PendingBranch {
    pc: u64,
    target: Option<u64>,
    branch_type: BranchType,
}

/// Streams instruction events, collecting branch outcomes while the PC is
/// inside `[start_pc, stop_pc)`.
///
/// Only one branch can wait for its successor at a time. Every event resolves
/// the waiting branch before it may become the new one, so a branch directly
/// followed by another branch is still resolved against that branch's PC.
#[derive(Debug)]
pub struct BranchExtractor {
    start_pc: u64,
    stop_pc: u64,
    region: Region,
    pending: Option<PendingBranch>,
    info: BranchInfo,
}

impl BranchExtractor {
    pub fn new(start_pc: u64, stop_pc: u64) -> Self {
        Self {
            start_pc,
            stop_pc,
            region: Region::Outside,
            pending: None,
            info: BranchInfo::default(),
        }
    }

    pub fn process(&mut self, event: &InstructionEvent) {
        let pc = event.pc;

        if pc == self.start_pc {
            if self.region == Region::Outside {
                info!("Entered the region at 0x{:x}", pc);
            }
            self.region = Region::Inside;
        } else if pc == self.stop_pc && self.region == Region::Inside {
            info!("Left the region at 0x{:x}", pc);
            self.resolve_pending(pc);
            self.region = Region::Outside;
            return;
        }

        if self.region == Region::Outside {
            return;
        }

        self.resolve_pending(pc);

        if event.is_indirect_jump() {
            self.info.num_jrs += 1;
        } else if event.branch_type.has_static_target() {
            let target = event.branch_target();
            if target.is_none() {
                warn!(
                    "Couldn't find target on branch instruction at 0x{:x}: {} {}",
                    pc,
                    event.mnemonic,
                    event.operands.as_deref().unwrap_or("")
                );
            }
            if event.is_jump() {
                self.info.num_jmps += 1;
            }
            // the slot holds one branch, the newest one wins
            self.pending = Some(PendingBranch {
                pc,
                target,
                branch_type: event.branch_type,
            });
        }
    }

    fn resolve_pending(&mut self, pc: u64) {
        if let Some(pending) = self.pending.take() {
            let taken = pending.target == Some(pc);
            self.info.branches.push(BranchOutcome {
                pc: pending.pc,
                target: pending.target,
                taken,
            });
            if pending.branch_type.is_conditional_branch() && taken {
                self.info.num_taken_conditional_branches += 1;
            }
        }
    }

    pub fn finish(self) -> BranchInfo {
        if let Some(pending) = self.pending {
            debug!(
                "Trace ended with unresolved branch at 0x{:x}, dropped",
                pending.pc
            );
        }
        self.info
    }
}

/// Decode trace lines and extract the branch outcomes of the region of
/// interest. Lines that fail to decode are reported and skipped.
pub fn calc_branch_info<I, S>(lines: I, start_pc: u64, stop_pc: u64) -> BranchInfo
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut extractor = BranchExtractor::new(start_pc, stop_pc);
    for line in lines {
        let line = line.as_ref();
        match decode_line(line) {
            Some(event) => extractor.process(&event),
            None => warn!("No match for {:?}", line),
        }
    }
    extractor.finish()
}
