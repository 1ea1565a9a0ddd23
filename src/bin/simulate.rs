//! Evaluate branch predictor models on one instruction trace
use branch_analysis::{
    ElfSymbolResolver, FixedRegion, NmSymbolResolver, RegionSymbols, SymbolResolver,
    builtin_models, load_models, parse_address, run_branch_models, select_models,
};
use clap::Parser;
use cli_table::{Cell, Table, print_stdout};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to trace file
    #[arg(short, long)]
    trace_path: PathBuf,

    /// Path to the traced executable, used to find the region of interest
    #[arg(short, long)]
    exe_path: PathBuf,

    /// Start of the region of interest, overrides the symbol lookup
    #[arg(long, value_parser = parse_address, requires = "stop")]
    start: Option<u64>,

    /// End of the region of interest, overrides the symbol lookup
    #[arg(long, value_parser = parse_address, requires = "start")]
    stop: Option<u64>,

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

    /// Path to a json model registry, defaults to the builtin models
    #[arg(long)]
    models_path: Option<PathBuf>,

    /// Only run these models
    #[arg(short, long)]
    model: Vec<String>,

    /// Path to result json
    #[arg(short, long)]
    output_path: Option<PathBuf>,
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
    let resolver: Box<dyn SymbolResolver> = match (args.start, args.stop, &args.nm) {
        (Some(start_pc), Some(stop_pc), _) => Box::new(FixedRegion { start_pc, stop_pc }),
        (_, _, Some(tool)) => Box::new(NmSymbolResolver {
            tool: tool.clone(),
            timeout: Duration::from_secs(args.nm_timeout),
            symbols,
        }),
        _ => Box::new(ElfSymbolResolver { symbols }),
    };

    println!(
        "Running {} models for {}",
        models.len(),
        args.trace_path.display()
    );
    let results = run_branch_models(
        &args.trace_path,
        &args.exe_path,
        resolver.as_ref(),
        &models,
    )?;

    let mut table = vec![];
    for model in &models {
        let result = &results[&model.name];
        table.push(vec![
            model.name.as_str().cell(),
            result.branches.cell(),
            result.mispredict.cell(),
            format!("{:.2}", result.mispredict_rate() * 100.0).cell(),
            result.t_mp.cell(),
            result.nt_mp.cell(),
            result.num_jmps.cell(),
            result.num_jrs.cell(),
            result.num_taken_conditional_branches.cell(),
        ]);
    }
    let table = table.table().title(vec![
        "Model".cell(),
        "Branches".cell(),
        "Mispredictions".cell(),
        "Misprediction Rate (%)".cell(),
        "Taken Mispred.".cell(),
        "Not Taken Mispred.".cell(),
        "Jumps".cell(),
        "Indirect Jumps".cell(),
        "Taken Cond. Branches".cell(),
    ]);
    print_stdout(table)?;

    if let Some(result) = models.first().map(|model| &results[&model.name]) {
        println!("Total branches: {}", result.total_branches());
    }

    if let Some(output_path) = &args.output_path {
        std::fs::write(output_path, serde_json::to_vec_pretty(&results)?)?;
        println!("Result written to {}", output_path.display());
    }

    Ok(())
}
