use crate::BranchType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::OnceLock};

// trace line layout, as written by the core tracer:
//   Time  Cycle  PC  Insn  Decoded instruction  Register and memory contents
//      69      1 00100080 0340006f jal     x0,100b4
static INSTR_LINE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn instr_line_pattern() -> &'static Regex {
    INSTR_LINE_PATTERN.get_or_init(|| {
        Regex::new(r"^\s+(\d+)\s+(\d+)\s+([\da-f]+)\s+([\da-f]+)\s+([.\w]+)(?:\s+(\S+))?").unwrap()
    })
}

/// One executed instruction from the trace log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionEvent {
    pub cycle_time: u64,
    pub cycle_count: u64,
    /// program counter
    pub pc: u64,
    /// raw instruction encoding
    pub insn: u32,
    pub mnemonic: String,
    /// comma separated operand list, absent for zero-operand instructions
    pub operands: Option<String>,
    pub branch_type: BranchType,
}

impl InstructionEvent {
    pub fn is_conditional_branch(&self) -> bool {
        self.branch_type.is_conditional_branch()
    }

    pub fn is_jump(&self) -> bool {
        self.branch_type.is_jump()
    }

    pub fn is_indirect_jump(&self) -> bool {
        self.branch_type.is_indirect_jump()
    }

    pub fn branch_target(&self) -> Option<u64> {
        crate::extract_branch_target(self.operands.as_deref())
    }
}

/// Decode one trace line, `None` if it does not look like an executed
/// instruction
pub fn decode_line(line: &str) -> Option<InstructionEvent> {
    let caps = instr_line_pattern().captures(line)?;

    let mnemonic = caps.get(5)?.as_str().to_string();
    Some(InstructionEvent {
        cycle_time: caps.get(1)?.as_str().parse().ok()?,
        cycle_count: caps.get(2)?.as_str().parse().ok()?,
        pc: u64::from_str_radix(caps.get(3)?.as_str(), 16).ok()?,
        insn: u32::from_str_radix(caps.get(4)?.as_str(), 16).ok()?,
        branch_type: BranchType::from_mnemonic(&mnemonic),
        mnemonic,
        operands: caps.get(6).map(|m| m.as_str().to_string()),
    })
}

/// Read a trace log, dropping the header line
pub fn read_trace_lines<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().skip(1).map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_branch_line() {
        let event =
            decode_line("          69          1 00100080 00b50463 beq     x10,x11,100c8  x10:0x00000000")
                .unwrap();
        assert_eq!(event.cycle_time, 69);
        assert_eq!(event.cycle_count, 1);
        assert_eq!(event.pc, 0x100080);
        assert_eq!(event.insn, 0x00b50463);
        assert_eq!(event.mnemonic, "beq");
        assert_eq!(event.operands.as_deref(), Some("x10,x11,100c8"));
        assert_eq!(event.branch_type, BranchType::ConditionalBranch);
        assert_eq!(event.branch_target(), Some(0x100c8));
    }

    #[test]
    fn test_decode_without_operands() {
        let event = decode_line("   100   12 00100090 30200073 mret").unwrap();
        assert_eq!(event.mnemonic, "mret");
        assert_eq!(event.operands, None);
        assert_eq!(event.branch_type, BranchType::Other);

        let event = decode_line("   101   13 00100094 00008082 c.jr x1").unwrap();
        assert!(event.is_indirect_jump());
    }

    #[test]
    fn test_decode_mismatch() {
        assert_eq!(decode_line("Time Cycle PC Insn Decoded instruction"), None);
        assert_eq!(decode_line(""), None);
        // must be indented
        assert_eq!(decode_line("69 1 00100080 0340006f jal x0,100b4"), None);
        assert_eq!(decode_line("   69 1 zz100080 0340006f jal x0,100b4"), None);
    }

    #[test]
    fn test_identical_lines_decode_equal() {
        let line = "   5   2 00000010 fe000ee3 beq x0,x0,c";
        assert_eq!(decode_line(line), decode_line(line));
    }

    #[test]
    fn test_read_trace_lines_skips_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Time Cycle PC Insn Decoded instruction Register and memory contents").unwrap();
        writeln!(file, "   1   1 00000000 00000013 addi x0,x0,0").unwrap();
        writeln!(file, "   2   2 00000004 00000013 addi x0,x0,0").unwrap();
        file.flush().unwrap();

        let lines = read_trace_lines(file.path()).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("00000000"));
    }
}
