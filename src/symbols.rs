use crate::{AnalysisError, SymbolError};
use log::debug;
use object::{Object, ObjectSymbol};
use regex::Regex;
use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::OnceLock,
    time::{Duration, Instant},
};

/// Names of the symbols marking the region of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSymbols {
    pub start: String,
    pub stop: String,
}

impl Default for RegionSymbols {
    fn default() -> Self {
        Self {
            start: "bench_start".to_string(),
            stop: "bench_end".to_string(),
        }
    }
}

/// Addresses found for the region symbols, either may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolBounds {
    pub symbols: RegionSymbols,
    pub start: Option<u64>,
    pub stop: Option<u64>,
}

impl SymbolBounds {
    /// `(start_pc, stop_pc)`, or which boundary is missing
    pub fn region(&self, exe_path: &Path) -> Result<(u64, u64), AnalysisError> {
        let missing = |symbol: &str| AnalysisError::MissingBoundary {
            symbol: symbol.to_string(),
            path: exe_path.to_path_buf(),
        };
        let start = self.start.ok_or_else(|| missing(&self.symbols.start))?;
        let stop = self.stop.ok_or_else(|| missing(&self.symbols.stop))?;
        Ok((start, stop))
    }

    fn record(&mut self, name: &str, address: u64) {
        if name == self.symbols.start {
            self.start = Some(address);
        } else if name == self.symbols.stop {
            self.stop = Some(address);
        }
    }
}

/// Finds the region of interest of a compiled benchmark
pub trait SymbolResolver {
    fn resolve(&self, exe_path: &Path) -> Result<SymbolBounds, SymbolError>;
}

/// Reads the symbol table of the ELF file directly
#[derive(Debug, Clone, Default)]
pub struct ElfSymbolResolver {
    pub symbols: RegionSymbols,
}

impl SymbolResolver for ElfSymbolResolver {
    fn resolve(&self, exe_path: &Path) -> Result<SymbolBounds, SymbolError> {
        let binary_data = std::fs::read(exe_path).map_err(|source| SymbolError::Io {
            path: exe_path.to_path_buf(),
            source,
        })?;
        let file = object::File::parse(&*binary_data).map_err(|source| SymbolError::Object {
            path: exe_path.to_path_buf(),
            source,
        })?;

        let mut bounds = SymbolBounds {
            symbols: self.symbols.clone(),
            ..Default::default()
        };
        for symbol in file.symbols() {
            if let Ok(name) = symbol.name() {
                bounds.record(name, symbol.address());
            }
        }
        Ok(bounds)
    }
}

static NM_SYMBOL_LINE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Parse `nm` output lines of the form `<address> <type> <name>`
pub fn parse_nm_output(output: &str, symbols: &RegionSymbols) -> SymbolBounds {
    let pattern = NM_SYMBOL_LINE_PATTERN
        .get_or_init(|| Regex::new(r"^([a-f\d]+)\s+\w+\s+(\w+)").unwrap());

    let mut bounds = SymbolBounds {
        symbols: symbols.clone(),
        ..Default::default()
    };
    for line in output.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        if let Ok(address) = u64::from_str_radix(&caps[1], 16) {
            bounds.record(&caps[2], address);
        }
    }
    bounds
}

/// Runs an external `nm` and scans its output
#[derive(Debug, Clone)]
pub struct NmSymbolResolver {
    pub tool: String,
    pub timeout: Duration,
    pub symbols: RegionSymbols,
}

impl Default for NmSymbolResolver {
    fn default() -> Self {
        Self {
            tool: "riscv32-unknown-elf-nm".to_string(),
            timeout: Duration::from_secs(30),
            symbols: RegionSymbols::default(),
        }
    }
}

impl SymbolResolver for NmSymbolResolver {
    fn resolve(&self, exe_path: &Path) -> Result<SymbolBounds, SymbolError> {
        let io_error = |source| SymbolError::Io {
            path: PathBuf::from(&self.tool),
            source,
        };

        debug!("Running {} {}", self.tool, exe_path.display());
        let mut child = Command::new(&self.tool)
            .arg(exe_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(io_error)?;

        // drain stdout while waiting so a full pipe cannot stall the tool
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut output = String::new();
            if let Some(mut stdout) = stdout {
                let _ = stdout.read_to_string(&mut output);
            }
            output
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_error)? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SymbolError::Timeout {
                    tool: self.tool.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        };

        if !status.success() {
            return Err(SymbolError::ToolFailed {
                tool: self.tool.clone(),
                status,
            });
        }

        let output = reader.join().unwrap_or_default();
        Ok(parse_nm_output(&output, &self.symbols))
    }
}

/// Region given directly as addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRegion {
    pub start_pc: u64,
    pub stop_pc: u64,
}

impl SymbolResolver for FixedRegion {
    fn resolve(&self, _exe_path: &Path) -> Result<SymbolBounds, SymbolError> {
        Ok(SymbolBounds {
            symbols: RegionSymbols::default(),
            start: Some(self.start_pc),
            stop: Some(self.stop_pc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NM_OUTPUT: &str = "\
00100000 T _start
00100084 T bench_start
         U missing
001000f0 T bench_end
00100200 D some_data
";

    #[test]
    fn test_parse_nm_output() {
        let bounds = parse_nm_output(NM_OUTPUT, &RegionSymbols::default());
        assert_eq!(bounds.start, Some(0x100084));
        assert_eq!(bounds.stop, Some(0x1000f0));
        assert_eq!(
            bounds.region(Path::new("bench")).unwrap(),
            (0x100084, 0x1000f0)
        );
    }

    #[test]
    fn test_custom_symbols() {
        let symbols = RegionSymbols {
            start: "_start".to_string(),
            stop: "some_data".to_string(),
        };
        let bounds = parse_nm_output(NM_OUTPUT, &symbols);
        assert_eq!(bounds.start, Some(0x100000));
        assert_eq!(bounds.stop, Some(0x100200));
    }

    #[test]
    fn test_missing_boundary() {
        let bounds = parse_nm_output("00100084 T bench_start\n", &RegionSymbols::default());
        match bounds.region(Path::new("bench")) {
            Err(AnalysisError::MissingBoundary { symbol, .. }) => assert_eq!(symbol, "bench_end"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nm_tool_not_found() {
        let resolver = NmSymbolResolver {
            tool: "/nonexistent/riscv32-unknown-elf-nm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            resolver.resolve(Path::new("bench")),
            Err(SymbolError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_nm_tool_timeout() {
        // runs `sleep 5`
        let resolver = NmSymbolResolver {
            tool: "sleep".to_string(),
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let start = Instant::now();
        assert!(matches!(
            resolver.resolve(Path::new("5")),
            Err(SymbolError::Timeout { .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_nm_tool_failed() {
        let resolver = NmSymbolResolver {
            tool: "false".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            resolver.resolve(Path::new("bench")),
            Err(SymbolError::ToolFailed { .. })
        ));
    }

    #[test]
    fn test_elf_resolver_rejects_non_elf() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not an elf").unwrap();
        assert!(matches!(
            ElfSymbolResolver::default().resolve(file.path()),
            Err(SymbolError::Object { .. })
        ));
    }

    #[test]
    fn test_fixed_region() {
        let region = FixedRegion {
            start_pc: 0x10,
            stop_pc: 0x20,
        };
        let bounds = region.resolve(Path::new("unused")).unwrap();
        assert_eq!(bounds.region(Path::new("unused")).unwrap(), (0x10, 0x20));
    }
}
