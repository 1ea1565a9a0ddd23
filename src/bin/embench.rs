//! Evaluate branch predictor models on every benchmark of an embench run
use branch_analysis::{
    ElfSymbolResolver, NmSymbolResolver, RegionSymbols, SymbolResolver, builtin_models,
    get_default_results_path, get_elf_path, get_trace_path, get_tqdm_style, list_benchmark_dirs,
    load_models, run_branch_models, select_models,
};
use clap::Parser;
use log::error;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the embench output directory, one sub-directory per benchmark
    embench_out_path: PathBuf,

    /// Path to result csv, defaults to a timestamped file name
    #[arg(short, long)]
    output_path: Option<PathBuf>,

    /// Path to a json model registry, defaults to the builtin models
    #[arg(long)]
    models_path: Option<PathBuf>,

    /// Only run these models
    #[arg(short, long)]
    model: Vec<String>,

    /// Symbol marking the start of the region of interest
    #[arg(long, default_value = "bench_start")]
    start_symbol: String,

    /// Symbol marking the end of the region of interest
    #[arg(long, default_value = "bench_end")]
    stop_symbol: String,

    /// Look up symbols with this nm tool instead of reading the ELF directly
    #[arg(long)]
    nm: Option<String>,

    /// Timeout for the nm tool in seconds
    #[arg(long, default_value = "30")]
    nm_timeout: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let models = match &args.models_path {
        Some(path) => load_models(path)?,
        None => builtin_models(),
    };
    let models = select_models(models, &args.model)?;

    let symbols = RegionSymbols {
        start: args.start_symbol.clone(),
        stop: args.stop_symbol.clone(),
    };
    let resolver: Box<dyn SymbolResolver> = match &args.nm {
        Some(tool) => Box::new(NmSymbolResolver {
            tool: tool.clone(),
            timeout: Duration::from_secs(args.nm_timeout),
            symbols,
        }),
        None => Box::new(ElfSymbolResolver { symbols }),
    };

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(get_default_results_path);
    let mut writer = BufWriter::new(File::create(&output_path)?);

    write!(
        writer,
        "benchmark, branches, jmps, jrs, taken conditional branches"
    )?;
    for model in &models {
        write!(
            writer,
            ",{0} t_mp,{0} nt_mp,{0} t_p,{0} nt_p",
            model.name
        )?;
    }
    writeln!(writer)?;

    let benchmark_dirs = list_benchmark_dirs(&args.embench_out_path)?;
    let pbar = indicatif::ProgressBar::new(benchmark_dirs.len() as u64);
    pbar.set_style(get_tqdm_style()?);

    let mut failed = vec![];
    for benchmark_dir in &benchmark_dirs {
        let name = benchmark_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        pbar.set_message(name.clone());

        // each benchmark gets fresh model instances
        let results = match run_branch_models(
            &get_trace_path(benchmark_dir),
            &get_elf_path(benchmark_dir),
            resolver.as_ref(),
            &models,
        ) {
            Ok(results) => results,
            Err(err) => {
                error!("Failure running branch models for {}: {}", name, err);
                failed.push(name);
                pbar.inc(1);
                continue;
            }
        };

        // model independent counts are the same in every result
        if let Some(first) = models.first().and_then(|model| results.get(&model.name)) {
            write!(
                writer,
                "{},{},{},{},{}",
                name,
                first.branches,
                first.num_jmps,
                first.num_jrs,
                first.num_taken_conditional_branches
            )?;
        }
        for model in &models {
            if let Some(result) = results.get(&model.name) {
                write!(
                    writer,
                    ",{},{},{},{}",
                    result.t_mp, result.nt_mp, result.t_p, result.nt_p
                )?;
            }
        }
        writeln!(writer)?;
        writer.flush()?;
        pbar.inc(1);
    }
    pbar.finish();

    println!(
        "Analysed {} of {} benchmarks, result written to {}",
        benchmark_dirs.len() - failed.len(),
        benchmark_dirs.len(),
        output_path.display()
    );
    if !failed.is_empty() {
        println!("Failed: {}", failed.join(", "));
    }

    Ok(())
}
