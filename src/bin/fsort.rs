use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use fsort::common::reset_sigpipe;
use fsort::sort::{
    EXIT_FAILURE, JobSettings, ModeFlags, Outcome, Settings, SortConfig, parse_key,
    sort_and_output,
};

#[derive(Parser)]
#[command(
    name = "fsort",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sort lines of text files using bounded memory",
    disable_help_flag = true
)]
struct Cli {
    /// Print help
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Ignore leading blanks
    #[arg(short = 'b', long = "ignore-leading-blanks")]
    ignore_leading_blanks: bool,

    /// Compare human readable numbers (e.g., 2K 1G)
    #[arg(short = 'h', long = "human-numeric-sort")]
    human_numeric: bool,

    /// Compare (unknown) < 'JAN' < ... < 'DEC'
    #[arg(short = 'M', long = "month-sort")]
    month_sort: bool,

    /// Compare according to string numerical value
    #[arg(short = 'n', long = "numeric-sort")]
    numeric_sort: bool,

    /// Reverse the result of comparisons
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// Sort via a key; KEYDEF is a single 1-based field number
    #[arg(short = 'k', long = "key", value_name = "KEYDEF")]
    key: Option<String>,

    /// Output only the first of an equal run
    #[arg(short = 'u', long = "unique")]
    unique: bool,

    /// Stabilize sort by disabling last-resort comparison
    #[arg(short = 's', long = "stable")]
    stable: bool,

    /// Check for sorted input; do not sort
    #[arg(short = 'c', long = "check", default_missing_value = "diagnose", num_args = 0..=1, require_equals = true)]
    check: Option<String>,

    /// Like -c, but do not report first bad line
    #[arg(short = 'C')]
    check_quiet: bool,

    /// Write result to FILE instead of standard output
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Use DIR for temporary run files, not the current directory
    #[arg(short = 'T', long = "temporary-directory", value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Change the number of sorts run concurrently to N
    #[arg(long = "parallel", value_name = "N")]
    parallel: Option<usize>,

    /// Lines per sorted run
    #[arg(long = "batch-size", value_name = "N")]
    batch_size: Option<usize>,

    /// Files to sort
    files: Vec<String>,
}

/// Output file created on first write, so `-o` may name an input: every
/// input line has been read into runs before the merge writes anything.
struct LazyFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        LazyFile { path, file: None }
    }

    fn get(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            self.file = Some(BufWriter::new(File::create(&self.path)?));
        }
        match self.file.as_mut() {
            Some(f) => Ok(f),
            None => Err(io::Error::other("output file not open")),
        }
    }
}

impl Write for LazyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.get()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.get()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.get()?.flush()
    }
}

fn build_config(cli: &Cli) -> Result<SortConfig> {
    let mode = ModeFlags {
        numeric: cli.numeric_sort,
        human_numeric: cli.human_numeric,
        month: cli.month_sort,
    }
    .resolve()
    .map_err(anyhow::Error::msg)?;

    let key = match &cli.key {
        Some(spec) => Some(parse_key(spec).map_err(anyhow::Error::msg)?),
        None => None,
    };

    Ok(SortConfig {
        mode,
        reverse: cli.reverse,
        unique: cli.unique,
        ignore_leading_blanks: cli.ignore_leading_blanks,
        key,
        stable: cli.stable,
    })
}

fn run(cli: Cli) -> Result<i32> {
    let config = build_config(&cli)?;

    let (check, quiet) = if cli.check_quiet {
        (true, true)
    } else {
        match cli.check.as_deref() {
            Some("quiet") | Some("silent") => (true, true),
            Some("diagnose") | Some("diagnose-first") => (true, false),
            Some(other) => anyhow::bail!("invalid argument '{}' for '--check'", other),
            None => (false, false),
        }
    };

    let settings = Settings::load().with_overrides(cli.batch_size, cli.parallel);
    let temp_dir = cli.temp_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let job = JobSettings::new(settings, temp_dir);

    let report = match &cli.output {
        Some(path) => {
            let mut out = LazyFile::new(path.clone());
            sort_and_output(&cli.files, &config, &job, check, &mut out)
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::with_capacity(256 * 1024, stdout.lock());
            sort_and_output(&cli.files, &config, &job, check, &mut out)
        }
    };

    match &report.result {
        Ok(Outcome::Disorder(d)) if !quiet => eprintln!("fsort: {}", d),
        Ok(_) => {}
        Err(e) => eprintln!("fsort: {}", e),
    }
    for e in &report.cleanup_errors {
        eprintln!("fsort: {}", e);
    }
    Ok(report.exit_code())
}

fn main() {
    reset_sigpipe();
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fsort: {:#}", e);
            EXIT_FAILURE
        }
    };
    process::exit(code);
}
