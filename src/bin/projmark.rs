//! Projmark CLI - Consolidate a project tree into one document for LLMs.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use projmark::builder::{Projmark, ProjmarkResult};
use projmark::errors::{exit_code, ProjmarkError};
use projmark::logging::init_logging;
use projmark::tokens::Encoding;
use projmark::tree::{format_number, format_size, render_tree, RenderOptions};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "projmark")]
#[command(about = "Consolidate a project tree into a single document for LLMs")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the project report
    Report {
        #[command(flatten)]
        scan: ScanArgs,

        /// Report destination [default: ./ref/project_docs_<name>_<timestamp>.md]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip files larger than this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Maximum number of files to include
        #[arg(long)]
        max_files: Option<usize>,

        /// Lines kept per file
        #[arg(long)]
        max_lines: Option<usize>,

        /// Stop including files after this many bytes in total
        #[arg(long)]
        max_total_size: Option<u64>,

        /// Token encoding for the estimate
        #[arg(long, default_value = "cl100k")]
        encoding: EncodingArg,

        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,

        /// Print the report to stdout instead of writing a file
        #[arg(long, conflicts_with_all = ["output", "json"])]
        stdout: bool,
    },

    /// Display the directory structure only
    Tree {
        #[command(flatten)]
        scan: ScanArgs,

        /// Hide line counts, sizes and skip markers
        #[arg(long)]
        no_metadata: bool,
    },

    /// Show the effective exclusion rules
    Rules {
        /// Project root whose config file is consulted
        #[arg(default_value = ".")]
        path: PathBuf,

        /// TOML config file [default: <PATH>/.projmark.toml]
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by the commands that walk a project.
#[derive(Args)]
struct ScanArgs {
    /// Project root to document
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Deepest directory level to expand (root = 0)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Additional directory names to exclude
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    exclude_dirs: Vec<String>,

    /// Additional file names to exclude
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    exclude_files: Vec<String>,

    /// TOML config file [default: <PATH>/.projmark.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore the project's .projmarkignore
    #[arg(long)]
    no_ignore_file: bool,

    /// Descend into symlinked directories
    #[arg(long)]
    follow_symlinks: bool,
}

impl ScanArgs {
    fn builder(self) -> Projmark {
        let mut builder = Projmark::new(self.path)
            .exclude_dirs(self.exclude_dirs)
            .exclude_files(self.exclude_files);
        if let Some(depth) = self.max_depth {
            builder = builder.max_depth(depth);
        }
        if let Some(config) = self.config {
            builder = builder.config_file(config);
        }
        if self.no_ignore_file {
            builder = builder.use_ignore_file(false);
        }
        if self.follow_symlinks {
            builder = builder.follow_symlinks(true);
        }
        builder
    }
}

#[derive(Clone, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
    Heuristic,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
            EncodingArg::Heuristic => Encoding::Heuristic,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let json_output = json_flag(&cli.command);

    // a subscriber can only be missing here if another one was installed
    init_logging(cli.verbose, cli.quiet).ok();

    let result = match cli.command {
        Commands::Report {
            scan,
            output,
            max_file_size,
            max_files,
            max_lines,
            max_total_size,
            encoding,
            json,
            stdout,
        } => {
            let mut builder = scan.builder().encoding(encoding.into());
            if let Some(path) = output {
                builder = builder.output(path);
            }
            if let Some(size) = max_file_size {
                builder = builder.max_file_size(size);
            }
            if let Some(files) = max_files {
                builder = builder.max_files(files);
            }
            if let Some(lines) = max_lines {
                builder = builder.max_lines(lines);
            }
            if let Some(total) = max_total_size {
                builder = builder.max_total_size(total);
            }
            run_report(builder, json, stdout)
        }
        Commands::Tree { scan, no_metadata } => run_tree(scan, no_metadata),
        Commands::Rules { path, config, json } => run_rules(path, config, json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "projmark", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
                code: i32,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
                code: exit_code(&e),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Report { json, .. } => *json,
        Commands::Rules { json, .. } => *json,
        Commands::Tree { .. } => false,
        Commands::Completions { .. } => false,
    }
}

// --- Report command ---

fn run_report(builder: Projmark, json: bool, stdout: bool) -> Result<(), ProjmarkError> {
    if stdout {
        let result = builder.run()?;
        print!("{}", result.render());
        return Ok(());
    }

    let result = builder.write()?;
    if json {
        println!("{}", result.summary_json()?);
    } else {
        print_summary(&result)?;
    }
    Ok(())
}

fn print_summary(result: &ProjmarkResult) -> Result<(), ProjmarkError> {
    let summary = &result.outcome.summary;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if let Some(path) = &result.output {
        writeln!(out, "Wrote {}", path.display())?;
    }
    writeln!(
        out,
        "  included:  {} files ({}, ~{} tokens)",
        format_number(summary.files_included),
        format_size(summary.bytes_read),
        format_number(summary.estimated_tokens)
    )?;
    writeln!(out, "  skipped:   {} files", format_number(summary.total_skipped()))?;
    for (reason, count) in &summary.files_skipped {
        writeln!(out, "    {:28} {}", reason.as_str(), count)?;
    }
    if summary.files_truncated > 0 {
        writeln!(out, "  truncated: {} files", summary.files_truncated)?;
    }
    out.flush()?;
    Ok(())
}

// --- Tree command ---

fn run_tree(scan: ScanArgs, no_metadata: bool) -> Result<(), ProjmarkError> {
    let result = scan.builder().encoding(Encoding::Heuristic).run()?;
    let options = if no_metadata {
        RenderOptions::minimal()
    } else {
        RenderOptions::with_metadata()
    };
    let tree = result.tree();
    print!("{}", render_tree(tree, &options));
    if !no_metadata {
        println!(
            "\n{}, {}",
            count_noun(tree.directory_count(), "directory", "directories"),
            count_noun(tree.file_count(), "file", "files")
        );
    }
    Ok(())
}

fn count_noun(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

// --- Rules command ---

fn run_rules(path: PathBuf, config: Option<PathBuf>, json: bool) -> Result<(), ProjmarkError> {
    let mut builder = Projmark::new(path);
    if let Some(config) = config {
        builder = builder.config_file(config);
    }
    let config = builder.config()?;
    let rules = &config.rules;

    if json {
        let json = serde_json::to_string_pretty(rules)
            .map_err(|e| ProjmarkError::Io(std::io::Error::other(e.to_string())))?;
        println!("{json}");
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let sections = [
        ("Excluded directories", &rules.exclude_dirs),
        ("Excluded files", &rules.exclude_files),
        ("Sensitive name patterns", &rules.sensitive_patterns),
        ("Allowed extensions", &rules.allow_extensions),
        ("Allowed names", &rules.allow_names),
        ("Denied extensions", &rules.deny_extensions),
    ];
    for (title, entries) in sections {
        writeln!(out, "{} ({}):", title, entries.len())?;
        let joined: Vec<&str> = entries.iter().map(String::as_str).collect();
        writeln!(out, "  {}", joined.join(", "))?;
    }
    out.flush()?;
    Ok(())
}
