use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser};

use fast_reflection_removal::{
    default_output_path, FileWriter, ProcessResult, ReflectionParams, ReflectionRemover,
};

#[derive(Parser)]
#[command(
    name = "frr",
    about = "Suppress reflections in photographs taken through glass",
    version,
    disable_help_flag = true,
    after_help = "Simple usage: frr <image> <output>\n\n\
                  Higher -h removes reflections more aggressively; values up to 0.13 work well."
)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: {name}_transmission.{ext})
    output: Option<PathBuf>,

    /// Edge threshold (0.0-1.0): gradients weaker than this are treated as reflection
    #[arg(short = 'h', long = "threshold", default_value_t = 0.03)]
    h: f64,

    /// Weight of the first-order term (0.0-1.0)
    #[arg(long, default_value_t = 0.0)]
    lmbd: f64,

    /// Weight of the second-order term (0.0-1.0)
    #[arg(long, default_value_t = 1.0)]
    mu: f64,

    /// Regularizer added to the spectral denominator
    #[arg(long, default_value_t = 1e-8)]
    epsilon: f64,

    /// Write intermediate arrays as PNG files
    #[arg(long)]
    debug: bool,

    /// Directory for debug output
    #[arg(long, default_value = "logs")]
    debug_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let params = ReflectionParams {
        h: cli.h,
        lmbd: cli.lmbd,
        mu: cli.mu,
        epsilon: cli.epsilon,
    };

    let mut remover = match ReflectionRemover::new(params) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if cli.debug {
        match FileWriter::new(&cli.debug_dir) {
            Ok(writer) => remover = remover.with_debug_writer(Arc::new(writer)),
            Err(e) => {
                eprintln!(
                    "Error: Cannot create debug directory {}: {e}",
                    cli.debug_dir.display()
                );
                process::exit(1);
            }
        }
    }

    let input_path = cli.input.as_path();
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", input_path.display());
        process::exit(1);
    }

    if !cli.quiet {
        eprintln!(
            "Removing reflections (h={}, lmbd={}, mu={}, epsilon={})",
            params.h, params.lmbd, params.mu, params.epsilon
        );
        eprintln!();
    }

    let results = if input_path.is_dir() {
        let Some(output_dir) = &cli.output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: frr <input_dir> <output_dir>");
            process::exit(1);
        };
        remover.process_directory(input_path, output_dir)
    } else {
        let output_path = cli
            .output
            .as_deref()
            .map_or_else(|| default_output_path(input_path), Path::to_path_buf);
        vec![remover.process_file(input_path, &output_path)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.quiet, cli.verbose);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, quiet: bool, verbose: bool) {
    let filename = display_name(&result.path);

    if result.success {
        if !quiet {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if verbose && result.success && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
