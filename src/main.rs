use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use symsnap::config::DumpConfig;
use symsnap::loader::{load_image, LoadOptions};
use symsnap::snapshot::{
    read_snapshot, ReportFormat, ReportGenerator, Snapshot, SnapshotDumper, SnapshotStats,
    SnapshotWriter,
};

#[derive(Parser, Debug)]
#[command(name = "symsnap")]
#[command(version = "0.2.0")]
#[command(about = "Dump segments, exports, functions and names into a JSON snapshot", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an image and write its snapshot
    Dump(DumpArgs),
    /// Summarize an existing snapshot file
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
struct DumpArgs {
    image: PathBuf,

    #[arg(short, long, default_value = "snapshot.json")]
    output: PathBuf,

    #[arg(long)]
    no_labels: bool,

    #[arg(long)]
    filter: Option<String>,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    image_base: Option<String>,

    #[arg(long)]
    compact: bool,

    #[arg(long, default_value = "4")]
    indent: usize,

    #[arg(long)]
    text_report: Option<PathBuf>,

    #[arg(long)]
    markdown_report: Option<PathBuf>,

    #[arg(long)]
    no_progress: bool,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    input: PathBuf,

    #[arg(long, default_value = "25")]
    max_items: usize,

    #[arg(long)]
    markdown: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.no_color || !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
    setup_logging(&args.log_level);

    match args.command {
        Command::Dump(dump_args) => handle_dump(dump_args, args.quiet),
        Command::Show(show_args) => handle_show(show_args),
    }
}

fn setup_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn handle_dump(args: DumpArgs, quiet: bool) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    // Compile the filter before touching the image so a bad pattern fails
    // fast.
    let dumper = SnapshotDumper::from_config(&config)?;

    if config.threads > 1 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
        {
            log::debug!("thread pool already initialized: {}", e);
        }
    }

    let start_time = Instant::now();

    if !quiet {
        println!("{} Loading image: {}", "[*]".blue(), args.image.display());
    }

    let options = LoadOptions {
        image_base_override: config.image_base_override,
    };
    let db = match load_image(&args.image, &options) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{} Failed to load image: {}", "[!]".red(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        let image = db.image()?;
        println!(
            "{} {} image, {} {}-bit, base 0x{:x}",
            "[+]".green(),
            image.format.as_str(),
            image.architecture.as_str(),
            image.bitness.as_u32(),
            image.base
        );
    }

    let progress = if config.enable_progress_bars && !quiet {
        Some(spinner("Building snapshot records..."))
    } else {
        None
    };

    let snapshot = match dumper.dump(&db) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if let Some(ref pb) = progress {
                pb.finish_and_clear();
            }
            eprintln!("{} Failed to build snapshot: {}", "[!]".red(), e);
            std::process::exit(1);
        }
    };

    if let Some(ref pb) = progress {
        pb.set_message("Writing snapshot...");
    }

    let writer = SnapshotWriter::new()
        .with_pretty(config.pretty)
        .with_indent(config.indent);
    if let Err(e) = writer.to_file(&snapshot, &config.output_file) {
        if let Some(ref pb) = progress {
            pb.finish_and_clear();
        }
        eprintln!("{} Failed to save snapshot: {}", "[!]".red(), e);
        std::process::exit(1);
    }

    if let Some(ref pb) = progress {
        pb.finish_and_clear();
    }

    if !quiet {
        println!(
            "{} Snapshot saved to: {}",
            "[+]".green(),
            config.output_file.display()
        );
    }

    if let Some(text_path) = &config.text_report {
        let generator = ReportGenerator::new(ReportFormat::Text);
        if let Err(e) = generator.generate_to_file(&snapshot, text_path) {
            eprintln!("{} Failed to save text report: {}", "[!]".red(), e);
        } else if !quiet {
            println!(
                "{} Text report saved to: {}",
                "[+]".green(),
                text_path.display()
            );
        }
    }

    if let Some(md_path) = &config.markdown_report {
        let generator = ReportGenerator::new(ReportFormat::Markdown);
        if let Err(e) = generator.generate_to_file(&snapshot, md_path) {
            eprintln!("{} Failed to save markdown report: {}", "[!]".red(), e);
        } else if !quiet {
            println!(
                "{} Markdown report saved to: {}",
                "[+]".green(),
                md_path.display()
            );
        }
    }

    if !quiet {
        print_snapshot_summary(&snapshot);

        let elapsed = start_time.elapsed();
        println!();
        println!("{}", "=".repeat(50).cyan());
        println!(
            "{} Dump complete in {:.2}s",
            "[+]".green(),
            elapsed.as_secs_f64()
        );
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> anyhow::Result<()> {
    let snapshot = match read_snapshot(&args.input) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("{} Failed to read snapshot: {}", "[!]".red(), e);
            std::process::exit(1);
        }
    };

    let format = if args.markdown {
        ReportFormat::Markdown
    } else {
        ReportFormat::Text
    };
    let report = ReportGenerator::new(format)
        .with_max_items(args.max_items)
        .generate(&snapshot);
    print!("{}", report);

    Ok(())
}

fn print_snapshot_summary(snapshot: &Snapshot) {
    let stats = SnapshotStats::from_snapshot(snapshot);

    println!();
    println!("{}", "Snapshot Summary".cyan().bold());
    println!("{}", "-".repeat(40).cyan());
    for line in stats.summary_lines() {
        println!("  {}", line);
    }
}

fn build_config(args: &DumpArgs) -> anyhow::Result<DumpConfig> {
    let mut config = DumpConfig::new()
        .with_input(args.image.clone())
        .with_output_file(args.output.clone());
    config.pretty = !args.compact;
    config.indent = args.indent;
    config.include_labels = !args.no_labels;
    config.filter = args.filter.clone();
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(base) = &args.image_base {
        config.image_base_override = Some(parse_base(base).map_err(|e| anyhow::anyhow!(e))?);
    }
    config.text_report = args.text_report.clone();
    config.markdown_report = args.markdown_report.clone();
    config.enable_progress_bars = !args.no_progress;
    Ok(config)
}

fn parse_base(value: &str) -> Result<u64, String> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| format!("invalid image base: {}", value))
}

fn spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap();
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base() {
        assert_eq!(parse_base("0x140000000").unwrap(), 0x140000000);
        assert_eq!(parse_base("0X1000").unwrap(), 0x1000);
        assert_eq!(parse_base("4096").unwrap(), 4096);
        assert!(parse_base("xyz").is_err());
    }
}
