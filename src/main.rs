//! dirscope — disk usage analyser.
//!
//! Thin binary entry point: flag parsing and a switch over the core's
//! entry points. All analysis logic lives in the `dirscope-core` crate.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use dirscope_core::model::size::{format_count, format_size};
use dirscope_core::{
    aggregate, analyze, report, summarize, AnalyzeError, AnalyzeOptions, FileTree,
    IgnorePredicate, SortKey, SortSpec,
};

#[derive(Parser, Debug)]
#[command(name = "dirscope", version, about = "Analyse disk usage of the given path")]
struct Args {
    /// Path to analyse (default: current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Print root totals and the largest files instead of the tree
    #[arg(short = 's', long = "summarize")]
    summarize: bool,

    /// List mounted filesystems and exit
    #[arg(short = 'm', long = "mounts")]
    mounts: bool,

    /// Export the analysed tree as a report to FILE
    #[arg(short = 'o', long = "export", value_name = "FILE")]
    export: Option<PathBuf>,

    /// Import a report from FILE instead of scanning
    #[arg(short = 'f', long = "import", value_name = "FILE")]
    import: Option<PathBuf>,

    /// Use the single-threaded analyzer (deterministic order)
    #[arg(long = "sequential")]
    sequential: bool,

    /// Stay on the starting path's filesystem
    #[arg(short = 'x', long = "one-file-system")]
    one_file_system: bool,

    /// Skip entries whose name starts with a dot
    #[arg(short = 'H', long = "ignore-hidden")]
    ignore_hidden: bool,

    /// Absolute path to skip (repeatable)
    #[arg(short = 'I', long = "ignore-path", action = clap::ArgAction::Append)]
    ignore_paths: Vec<PathBuf>,

    /// Regex pattern to skip, matched against full paths (repeatable)
    #[arg(short = 'P', long = "ignore-pattern", action = clap::ArgAction::Append)]
    ignore_patterns: Vec<String>,

    /// File of ignore entries: paths and patterns, one per line
    #[arg(long = "ignore-from", value_name = "FILE")]
    ignore_from: Option<PathBuf>,

    /// Worker threads for the parallel analyzer
    #[arg(short = 't', long = "threads", value_name = "N")]
    threads: Option<usize>,

    /// Child ordering in the printed tree
    #[arg(long = "sort", value_enum, default_value = "size")]
    sort: SortArg,

    /// Sort smallest/oldest/first instead of largest/newest/last
    #[arg(long = "ascending")]
    ascending: bool,

    /// How many of the largest files the summary shows
    #[arg(long = "top", value_name = "N", default_value_t = 10)]
    top: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Size,
    Name,
    Mtime,
    Count,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Size => SortKey::Size,
            SortArg::Name => SortKey::Name,
            SortArg::Mtime => SortKey::MTime,
            SortArg::Count => SortKey::ItemCount,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("dirscope: {err:#}");
        let code = match err.downcast_ref::<AnalyzeError>() {
            Some(AnalyzeError::PathResolution { .. }) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.mounts {
        return print_mounts();
    }

    let sort = SortSpec {
        key: args.sort.into(),
        ascending: args.ascending,
    };

    if let Some(path) = &args.import {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut tree = report::read_tree(BufReader::new(file))
            .with_context(|| format!("importing {}", path.display()))?;
        aggregate::sort_children(&mut tree, sort);
        return finish(&args, tree);
    }

    let predicate = Arc::new(build_predicate(&args)?);
    let opts = AnalyzeOptions {
        sequential: args.sequential,
        worker_count: args.threads,
        ..AnalyzeOptions::default()
    };

    if args.summarize {
        let summary = summarize(&args.path, predicate, &opts, args.top)?;
        print_summary(&summary);
        return Ok(());
    }

    let tree = analyze(&args.path, predicate, &opts, sort)?;
    finish(&args, tree)
}

fn build_predicate(args: &Args) -> anyhow::Result<IgnorePredicate> {
    let mut predicate = IgnorePredicate::new();
    predicate.set_ignore_hidden(args.ignore_hidden);
    predicate.set_cross_device_ok(!args.one_file_system);
    for path in &args.ignore_paths {
        predicate.add_ignore_path(path.clone());
    }
    predicate.add_patterns(args.ignore_patterns.iter().cloned())?;
    if let Some(path) = &args.ignore_from {
        predicate.load_file(path)?;
    }
    Ok(predicate)
}

fn finish(args: &Args, tree: FileTree) -> anyhow::Result<()> {
    if let Some(path) = &args.export {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        report::write_tree(&tree, BufWriter::new(file))
            .with_context(|| format!("exporting {}", path.display()))?;
        return Ok(());
    }
    print_tree(&tree);
    Ok(())
}

/// One line per immediate child of the root, in the configured order.
fn print_tree(tree: &FileTree) {
    let Some(root) = tree.root else {
        return;
    };
    let node = tree.node(root);
    println!(
        "{:>10}  {}{}",
        format_size(node.agg_size),
        tree.full_path_string(root),
        if node.has_errors { "  !" } else { "" },
    );
    for child in tree.children(root) {
        let node = tree.node(child);
        let marker = if node.is_error() {
            "!"
        } else if node.is_dir() {
            "/"
        } else {
            ""
        };
        println!("{:>10}    {}{marker}", format_size(node.agg_size), node.name);
    }
    if tree.incomplete {
        eprintln!("warning: scan was cancelled, totals are partial");
    }
}

fn print_summary(summary: &dirscope_core::AnalysisSummary) {
    println!(
        "{}: {} in {} items{}",
        summary.root_path.display(),
        format_size(summary.total_size),
        format_count(summary.item_count),
        if summary.has_errors {
            format!(" ({} unreadable)", summary.errors_seen)
        } else {
            String::new()
        },
    );
    println!("allocated: {}", format_size(summary.total_allocated));
    if !summary.largest_files.is_empty() {
        println!("largest files:");
        for (path, size) in &summary.largest_files {
            println!("{:>10}  {path}", format_size(*size));
        }
    }
}

fn print_mounts() -> anyhow::Result<()> {
    let devices = dirscope_core::list_mounts()?;
    for dev in devices {
        println!(
            "{:<24} {:<20} {:<8} total {:>10}  free {:>10}",
            dev.name,
            dev.mount_point.display(),
            dev.filesystem_type,
            format_size(dev.total_bytes),
            format_size(dev.free_bytes),
        );
    }
    Ok(())
}
