use serde::{Deserialize, Serialize};

/// Kind of control transfer, decided once from the mnemonic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum BranchType {
    /// beq/bne/blt/..., c.beqz/c.bnez
    ConditionalBranch,
    /// jal/j, c.j/c.jal
    Jump,
    /// jr/jalr, c.jr/c.jalr
    IndirectJump,
    /// not a control transfer
    Other,
}

const INDIRECT_JUMPS: [&str; 4] = ["c.jr", "c.jalr", "jalr", "jr"];

impl BranchType {
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        // register-indirect forms share the jump prefixes, check them first
        if INDIRECT_JUMPS.contains(&mnemonic) {
            BranchType::IndirectJump
        } else if mnemonic.starts_with('b') || mnemonic.starts_with("c.b") {
            BranchType::ConditionalBranch
        } else if mnemonic.starts_with('j') || mnemonic.starts_with("c.j") {
            BranchType::Jump
        } else {
            BranchType::Other
        }
    }

    pub fn is_conditional_branch(self) -> bool {
        self == BranchType::ConditionalBranch
    }

    pub fn is_jump(self) -> bool {
        self == BranchType::Jump
    }

    pub fn is_indirect_jump(self) -> bool {
        self == BranchType::IndirectJump
    }

    /// Branches and jumps whose target is encoded in the instruction
    pub fn has_static_target(self) -> bool {
        matches!(self, BranchType::ConditionalBranch | BranchType::Jump)
    }
}

/// Parse the absolute target address out of a disassembled operand list.
///
/// The target is the last operand of `target`, `rd,target` and
/// `rs1,rs2,target` layouts; with more than three operands the third one is
/// used. Returns `None` when the operand is absent or not a hex address.
pub fn extract_branch_target(operands: Option<&str>) -> Option<u64> {
    let args: Vec<&str> = operands?.split(',').collect();
    let target = match args.len() {
        1 => args[0],
        2 => args[1],
        _ => args[2],
    };
    let target = target.trim();
    let digits = target
        .strip_prefix("0x")
        .or_else(|| target.strip_prefix("0X"))
        .unwrap_or(target);
    u64::from_str_radix(digits, 16).ok()
}
