//! logtree CLI
//!
//! Thin wrapper around logtree-core for command-line usage: feed a log into
//! an in-memory tree, then query or follow it.
//!
//! ## Usage
//!
//! ```bash
//! # Store stdin as raw lines at `app` and print everything back
//! my_app 2>&1 | logtree cat --dn app
//!
//! # Parse klog output, show only warnings and worse
//! logtree cat --dn kube --format klog --min-severity W < kubelet.log
//!
//! # Print entries as they are parsed, as JSON wire messages
//! tail -f app.log | logtree follow --dn app --output json
//!
//! # Follow the kernel log (Linux)
//! logtree kmsg
//! ```

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use logtree_core::{
    Backlog, InvalidLinePolicy, KlogParser, KmsgPipe, LogEntry, LogEntryMessage, LogReader,
    LogTree, LogTreeConfig, LogTreeLayer, ReadOption, Severity, ShortenDictionary,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

/// Read buffer for line-oriented record sources.
const RECORD_BUFFER_SIZE: usize = 64 * 1024;

/// logtree - hierarchical in-memory log aggregation
#[derive(Parser)]
#[command(name = "logtree")]
#[command(version)]
#[command(about = "Hierarchical in-memory log aggregation")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with tree settings (default_quota, stream_buffer_size, raw_line_length)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Entries retained per DN, overriding the config file
    #[arg(long, global = true)]
    quota: Option<usize>,

    /// Longest raw line stored before truncation, overriding the config file
    #[arg(long, global = true)]
    line_length: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest stdin, then print the matching backlog
    Cat {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print matching entries while stdin is ingested
    Follow {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Follow the running kernel's log from /dev/kmsg
    Kmsg {
        /// DN kernel messages are stored at
        #[arg(long, default_value = "kernel")]
        dn: String,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// DN the input is stored at
    #[arg(long, default_value = "stdin")]
    dn: String,

    /// How stdin is interpreted
    #[arg(short, long, value_enum, default_value_t = InputFormat::Raw)]
    format: InputFormat,

    /// What to do with lines that fail to parse as klog
    #[arg(long, value_enum, default_value_t = InvalidLines::Report)]
    invalid: InvalidLines,
}

#[derive(Args)]
struct QueryArgs {
    /// DN to read (default: the root)
    #[arg(long = "read", default_value = "")]
    read_dn: String,

    /// Only entries at exactly this DN, not its subtree
    #[arg(long)]
    exact: bool,

    /// Skip leveled entries less severe than this (I, W, E, F)
    #[arg(long)]
    min_severity: Option<Severity>,

    /// Only raw entries
    #[arg(long)]
    only_raw: bool,

    /// Only leveled entries
    #[arg(long)]
    only_leveled: bool,

    /// Only the newest N matching entries of the backlog
    #[arg(long)]
    last: Option<usize>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output style
    #[arg(short, long, value_enum, default_value_t = OutputMode::Concise)]
    output: OutputMode,

    /// Wrap concise output at this width (0: no limit)
    #[arg(short, long, default_value_t = 0)]
    width: i32,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Unstructured lines
    Raw,
    /// glog/klog formatted lines
    Klog,
    /// /dev/kmsg records, one per line
    Kmsg,
}

#[derive(Clone, Copy, ValueEnum)]
enum InvalidLines {
    Report,
    Raw,
    Drop,
}

impl From<InvalidLines> for InvalidLinePolicy {
    fn from(value: InvalidLines) -> Self {
        match value {
            InvalidLines::Report => InvalidLinePolicy::Report,
            InvalidLines::Raw => InvalidLinePolicy::Raw,
            InvalidLines::Drop => InvalidLinePolicy::Drop,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputMode {
    /// Severity and shortened DN, optionally wrapped
    Concise,
    /// Canonical glog-style rendering with timestamps
    Full,
    /// One JSON wire message per line
    Json,
}

impl QueryArgs {
    fn options(&self, backlog: bool, stream_buffer: Option<usize>) -> Vec<ReadOption> {
        let mut options = Vec::new();
        if !self.exact {
            options.push(ReadOption::WithChildren);
        }
        if backlog {
            options.push(ReadOption::WithBacklog(match self.last {
                Some(n) => Backlog::Count(n),
                None => Backlog::All,
            }));
        }
        if let Some(size) = stream_buffer {
            options.push(ReadOption::WithStream);
            options.push(ReadOption::StreamBuffer(size));
        }
        if let Some(severity) = self.min_severity {
            options.push(ReadOption::LeveledWithMinimumSeverity(severity));
        }
        if self.only_raw {
            options.push(ReadOption::OnlyRaw);
        }
        if self.only_leveled {
            options.push(ReadOption::OnlyLeveled);
        }
        options
    }
}

/// Writes entries to stdout in the selected style.
struct Printer {
    mode: OutputMode,
    width: i32,
    dict: ShortenDictionary,
}

impl Printer {
    fn new(args: &OutputArgs) -> Self {
        Self {
            mode: args.output,
            width: args.width,
            dict: ShortenDictionary::standard(),
        }
    }

    fn print(&self, entry: &LogEntry) -> Result<()> {
        let mut out = io::stdout().lock();
        match self.mode {
            OutputMode::Concise => writeln!(out, "{}", entry.concise(&self.dict, self.width))?,
            OutputMode::Full => writeln!(out, "{entry}")?,
            OutputMode::Json => writeln!(out, "{}", LogEntryMessage::from(entry).to_json()?)?,
        }
        Ok(())
    }
}

/// Presents a line-oriented source one record per read, the way /dev/kmsg
/// does.
struct Records<R> {
    inner: R,
}

impl<R: BufRead> Read for Records<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.inner.fill_buf()?;
        if available.is_empty() {
            return Ok(0);
        }
        let end = available
            .iter()
            .position(|&b| b == b'\n')
            .map_or(available.len(), |pos| pos + 1);
        let n = end.min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.inner.consume(n);
        Ok(n)
    }
}

fn load_config(cli: &Cli) -> Result<LogTreeConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => LogTreeConfig::default(),
    };
    if let Some(quota) = cli.quota {
        config = config.with_default_quota(quota);
    }
    if let Some(length) = cli.line_length {
        config = config.with_raw_line_length(length);
    }
    if config.default_quota == 0 {
        anyhow::bail!("Quota must be at least 1");
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<LogTreeConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn setup_logging(verbosity: u8, tree: &LogTree) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));
    // The CLI's own warnings are kept alongside the logs it ingests.
    let captured = LogTreeLayer::with_prefix(tree.clone(), "logtree")?.with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(stderr)
        .with(captured)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Feed `input` into the tree until it is exhausted.
fn ingest(tree: &LogTree, args: &InputArgs, mut input: impl BufRead) -> Result<()> {
    match args.format {
        InputFormat::Raw => {
            let mut writer = tree.raw_for(&args.dn)?;
            io::copy(&mut input, &mut writer).context("Failed to ingest raw input")?;
            writer.close()?;
        }
        InputFormat::Klog => {
            let logger = tree.leveled_for(&args.dn)?;
            let mut parser = KlogParser::with_policy(logger, args.invalid.into());
            io::copy(&mut input, &mut parser).context("Failed to ingest klog input")?;
            parser.close()?;
        }
        InputFormat::Kmsg => {
            let logger = tree.leveled_for(&args.dn)?;
            KmsgPipe::new(Records { inner: input }, logger, CancellationToken::new())
                .run()
                .context("Failed to ingest kmsg input")?;
        }
    }
    debug!(dn = %args.dn, "Input exhausted");
    Ok(())
}

fn stdin() -> impl BufRead {
    BufReader::with_capacity(RECORD_BUFFER_SIZE, io::stdin())
}

fn print_backlog(reader: &LogReader, printer: &Printer) -> Result<()> {
    for entry in &reader.backlog {
        printer.print(entry)?;
    }
    Ok(())
}

fn report_missed(reader: &LogReader, reported: &mut u64) {
    let missed = reader.missed();
    if missed > *reported {
        warn!(missed = missed - *reported, "Output fell behind, entries dropped");
        *reported = missed;
    }
}

async fn follow(tree: LogTree, input: InputArgs, query: QueryArgs, printer: Printer) -> Result<()> {
    let buffer = tree.config().stream_buffer_size;
    let mut reader = tree.read(&query.read_dn, &query.options(false, Some(buffer)))?;

    let mut ingestion = tokio::task::spawn_blocking({
        let tree = tree.clone();
        move || ingest(&tree, &input, stdin())
    });

    let mut reported = 0;
    loop {
        tokio::select! {
            entry = reader.recv() => {
                match entry {
                    Some(entry) => printer.print(&entry)?,
                    None => break,
                }
                report_missed(&reader, &mut reported);
            }
            done = &mut ingestion => {
                done.context("Ingestion task failed")??;
                while let Some(entry) = reader.try_recv() {
                    printer.print(&entry)?;
                }
                report_missed(&reader, &mut reported);
                break;
            }
        }
    }
    reader.close();
    Ok(())
}

async fn kmsg(tree: LogTree, dn: String, query: QueryArgs, printer: Printer) -> Result<()> {
    if !cfg!(target_os = "linux") {
        anyhow::bail!("/dev/kmsg is only available on Linux");
    }

    let buffer = tree.config().stream_buffer_size;
    let mut reader = tree.read(&query.read_dn, &query.options(false, Some(buffer)))?;
    let cancel = CancellationToken::new();
    let logger = tree.leveled_for(&dn)?;

    #[cfg(target_os = "linux")]
    {
        let pipe = KmsgPipe::open(logger, cancel.clone()).context("Failed to open /dev/kmsg")?;
        // Reads block until the next record, so the pump gets its own thread
        // instead of holding up runtime shutdown.
        std::thread::spawn(move || {
            if let Err(e) = pipe.run() {
                warn!(error = %e, "kmsg pipe stopped");
            }
        });
    }
    #[cfg(not(target_os = "linux"))]
    drop(logger);

    info!(dn = %dn, "Following kernel log");
    let mut reported = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Received shutdown signal");
                break;
            }
            entry = reader.recv() => {
                match entry {
                    Some(entry) => printer.print(&entry)?,
                    None => break,
                }
                report_missed(&reader, &mut reported);
            }
        }
    }
    cancel.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let tree = LogTree::with_config(config);
    setup_logging(cli.verbose, &tree)?;

    match cli.command {
        Commands::Cat {
            input,
            query,
            output,
        } => {
            let printer = Printer::new(&output);
            // Validate the query before consuming any input.
            tree.read(&query.read_dn, &query.options(false, None))?;
            ingest(&tree, &input, stdin())?;
            let reader = tree.read(&query.read_dn, &query.options(true, None))?;
            print_backlog(&reader, &printer)?;
            info!(entries = reader.backlog.len(), "Printed backlog");
        }

        Commands::Follow {
            input,
            query,
            output,
        } => {
            follow(tree, input, query, Printer::new(&output)).await?;
        }

        Commands::Kmsg { dn, query, output } => {
            kmsg(tree, dn, query, Printer::new(&output)).await?;
        }
    }

    Ok(())
}
