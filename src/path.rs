// embench output folder structure:
// {embench-out}/
// \- {benchmark-name}/
//    |- {benchmark-name}                 (ELF with bench_start/bench_end symbols)
//    \- trace_core_00000000.log          (instruction trace of core 0)

use chrono::Local;
use std::path::{Path, PathBuf};

pub const TRACE_FILE_NAME: &str = "trace_core_00000000.log";

pub fn get_trace_path<P: AsRef<Path>>(benchmark_dir: P) -> PathBuf {
    benchmark_dir.as_ref().join(TRACE_FILE_NAME)
}

pub fn get_elf_path<P: AsRef<Path>>(benchmark_dir: P) -> PathBuf {
    let benchmark_dir = benchmark_dir.as_ref();
    match benchmark_dir.file_name() {
        Some(name) => benchmark_dir.join(name),
        None => benchmark_dir.to_path_buf(),
    }
}

/// Benchmark directories under the embench output root, sorted by name
pub fn list_benchmark_dirs<P: AsRef<Path>>(root: P) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for path in std::fs::read_dir(root)? {
        let path = path?;
        if path.file_type()?.is_dir() {
            paths.push(path.path());
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn get_default_results_path() -> PathBuf {
    PathBuf::from(format!(
        "embench-branch-{}.csv",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}
