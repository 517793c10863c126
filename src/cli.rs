// Command-line front end for Oxipatch.
//
// Subcommands:
//   apply  - apply an IPS/UPS patch to a source file
//   info   - describe a patch without applying it
//   config - print build features and default limits

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::format::PatchFormat;
use crate::io::{self as patch_io, ApplyOptions};
use crate::ips::{self, Record};
use crate::ups;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// IPS and UPS ROM patcher.
#[derive(Parser, Debug)]
#[command(
    name = "oxipatch",
    version,
    about = "IPS/UPS patch applier",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file.
    Apply(ApplyArgs),
    /// Describe a patch without applying it.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Ips,
    Ups,
}

impl From<FormatArg> for PatchFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ips => PatchFormat::Ips,
            FormatArg::Ups => PatchFormat::Ups,
        }
    }
}

#[derive(Args, Debug)]
struct LimitArgs {
    /// Largest patch file accepted (supports K/M/G suffix).
    #[arg(long = "max-patch-size", value_parser = parse_byte_size)]
    max_patch_size: Option<u64>,

    /// Largest source file accepted (supports K/M/G suffix).
    #[arg(long = "max-source-size", value_parser = parse_byte_size)]
    max_source_size: Option<u64>,

    /// Largest output a patch may produce (supports K/M/G suffix).
    #[arg(long = "max-output-size", value_parser = parse_byte_size)]
    max_output_size: Option<u64>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Source file (the unpatched ROM, or the patched one for a UPS reverse).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patch format (default: from extension, then contents).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Check only (apply and verify, do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    #[command(flatten)]
    limits: LimitArgs,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Patch format (default: from extension, then contents).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Source file, to report the exact output size.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Apply,
    Info,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    apply: ApplyOptions,
    patch_file: Option<PathBuf>,
    source_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

fn apply_options(format: Option<FormatArg>, limits: Option<LimitArgs>) -> ApplyOptions {
    let defaults = ApplyOptions::default();
    let limits = limits.unwrap_or(LimitArgs {
        max_patch_size: None,
        max_source_size: None,
        max_output_size: None,
    });
    ApplyOptions {
        format: format.map(PatchFormat::from),
        max_patch_size: limits.max_patch_size.unwrap_or(defaults.max_patch_size),
        max_source_size: limits.max_source_size.unwrap_or(defaults.max_source_size),
        max_output_size: limits.max_output_size.unwrap_or(defaults.max_output_size),
    }
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(3);
    let force = cli.force;
    let json_output = cli.json_output;

    match cli.command {
        Cmd::Apply(args) => Options {
            command: Command::Apply,
            use_stdout: args.stdout,
            force,
            quiet,
            verbose,
            no_output: args.no_output,
            apply: apply_options(args.format, Some(args.limits)),
            patch_file: Some(args.patch),
            source_file: Some(args.source),
            output_file: args.output.or(args.output_pos),
            json_output,
        },
        Cmd::Info(args) => Options {
            command: Command::Info,
            use_stdout: false,
            force,
            quiet,
            verbose,
            no_output: true,
            apply: apply_options(args.format, None),
            patch_file: Some(args.patch),
            source_file: args.source,
            output_file: None,
            json_output,
        },
        Cmd::Config => Options {
            command: Command::Config,
            use_stdout: false,
            force,
            quiet,
            verbose,
            no_output: true,
            apply: ApplyOptions::default(),
            patch_file: None,
            source_file: None,
            output_file: None,
            json_output,
        },
    }
}

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn print_json(value: &serde_json::Value) {
    if let Ok(text) = serde_json::to_string_pretty(value) {
        eprintln!("{text}");
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxipatch version {version} (Rust)");

    let defaults = ApplyOptions::default();
    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FORMATS=IPS,UPS");
    eprintln!("FILE_IO={file_io}");
    eprintln!("MAX_PATCH_SIZE={}", defaults.max_patch_size);
    eprintln!("MAX_SOURCE_SIZE={}", defaults.max_source_size);
    eprintln!("MAX_OUTPUT_SIZE={}", defaults.max_output_size);
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(patch_path), Some(source_path)) = (&opts.patch_file, &opts.source_file) else {
        eprintln!("oxipatch: apply requires a patch and a source file");
        return 1;
    };

    // Write straight to a file: the library handles reading, limits and hashing.
    if !opts.no_output
        && !opts.use_stdout
        && let Some(output_path) = &opts.output_file
    {
        if output_path.exists() && !opts.force {
            eprintln!(
                "oxipatch: output file exists, use -f to overwrite: {}",
                output_path.display()
            );
            return 1;
        }
        return match patch_io::apply_file(patch_path, source_path, output_path, &opts.apply) {
            Ok(stats) => {
                report_apply(opts, stats.format, stats.output_size, stats.output_sha256);
                0
            }
            Err(e) => {
                eprintln!("oxipatch: {e}");
                1
            }
        };
    }

    let result = patch_io::read_limited(patch_path, "patch", opts.apply.max_patch_size)
        .and_then(|patch| {
            let source =
                patch_io::read_limited(source_path, "source", opts.apply.max_source_size)?;
            let format = patch_io::resolve_format(patch_path, &patch, &opts.apply)?;
            let target = patch_io::apply_bytes(format, &patch, &source, &opts.apply)?;
            Ok((format, target))
        });
    let (format, target) = match result {
        Ok(applied) => applied,
        Err(e) => {
            eprintln!("oxipatch: {e}");
            return 1;
        }
    };

    if !opts.no_output {
        let mut out = io::BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
        if let Err(e) = out.write_all(&target).and_then(|()| out.flush()) {
            eprintln!("oxipatch: write error: {e}");
            return 1;
        }
    }
    report_apply(opts, format, target.len() as u64, None);
    0
}

fn report_apply(opts: &Options, format: PatchFormat, output_size: u64, sha256: Option<[u8; 32]>) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!("oxipatch: applied {format} patch, output size: {output_size}");
        if let Some(digest) = sha256 {
            eprintln!("oxipatch: output sha256: {}", hex(&digest));
        }
    }
    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "apply",
            "format": format.to_string(),
            "output_size": output_size,
            "output_sha256": sha256.map(|d| hex(&d)),
        }));
    }
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let Some(patch_path) = &opts.patch_file else {
        eprintln!("oxipatch: info requires a patch file");
        return 1;
    };
    let patch = match patch_io::read_limited(patch_path, "patch", opts.apply.max_patch_size) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("oxipatch: {e}");
            return 1;
        }
    };
    let source_len = match &opts.source_file {
        Some(path) => match std::fs::metadata(path) {
            Ok(meta) => Some(meta.len() as usize),
            Err(e) => {
                eprintln!("oxipatch: source file: {}: {e}", path.display());
                return 1;
            }
        },
        None => None,
    };
    let format = match patch_io::resolve_format(patch_path, &patch, &opts.apply) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("oxipatch: {e}");
            return 1;
        }
    };

    let shown = match format {
        PatchFormat::Ips => print_ips_info(patch_path, &patch, source_len),
        PatchFormat::Ups => print_ups_info(patch_path, &patch, source_len),
    };
    match shown {
        Ok(json) => {
            if opts.json_output {
                print_json(&json);
            }
            0
        }
        Err(e) => {
            eprintln!("oxipatch: {}: {e}", patch_path.display());
            1
        }
    }
}

fn print_ips_info(
    path: &Path,
    patch: &[u8],
    source_len: Option<usize>,
) -> Result<serde_json::Value, crate::PatchError> {
    let plan = ips::plan(patch, source_len.unwrap_or(0))?;
    let (mut copies, mut runs, mut copied, mut filled) = (0usize, 0usize, 0usize, 0usize);
    for record in ips::records(patch)? {
        match record? {
            Record::Copy { data, .. } => {
                copies += 1;
                copied += data.len();
            }
            Record::Rle { len, .. } => {
                runs += 1;
                filled += len;
            }
            Record::End { .. } => {}
        }
    }

    println!("File:                  {}", path.display());
    println!("Format:                IPS");
    println!("Patch size:            {}", patch.len());
    println!("Records:               {}", plan.records);
    println!("  Copy records:        {copies} ({copied} bytes)");
    println!("  RLE records:         {runs} ({filled} bytes)");
    match plan.truncate {
        Some(size) => println!("Explicit target size:  {size}"),
        None => println!("Explicit target size:  none"),
    }
    match source_len {
        Some(_) => println!("Output size:           {}", plan.target_len),
        None => println!("Minimum output size:   {}", plan.target_len),
    }

    Ok(serde_json::json!({
        "command": "info",
        "format": "IPS",
        "patch_size": patch.len(),
        "records": plan.records,
        "copy_records": copies,
        "rle_records": runs,
        "truncate": plan.truncate,
        "output_size": plan.target_len,
    }))
}

fn print_ups_info(
    path: &Path,
    patch: &[u8],
    source_len: Option<usize>,
) -> Result<serde_json::Value, crate::PatchError> {
    let header = ups::Header::parse(patch)?;
    let direction = source_len.map(|len| header.direction(len)).transpose()?;

    println!("File:                  {}", path.display());
    println!("Format:                UPS");
    println!("Patch size:            {}", patch.len());
    println!("Source size:           {}", header.source_len);
    println!("Target size:           {}", header.target_len);
    println!("Source CRC-32:         {:08x}", header.source_crc);
    println!("Target CRC-32:         {:08x}", header.target_crc);
    println!("Patch CRC-32:          {:08x}", header.patch_crc);
    println!("Body offset:           {}", header.body_offset);
    if let Some(direction) = direction {
        println!("Direction:             {direction}");
        println!("Output size:           {}", header.output_len(direction));
    }

    Ok(serde_json::json!({
        "command": "info",
        "format": "UPS",
        "patch_size": patch.len(),
        "source_size": header.source_len,
        "target_size": header.target_len,
        "source_crc32": format!("{:08x}", header.source_crc),
        "target_crc32": format!("{:08x}", header.target_crc),
        "patch_crc32": format!("{:08x}", header.patch_crc),
        "direction": direction.map(|d| d.to_string()),
    }))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
        && !opts.quiet
    {
        log::warn!("-c option overrides output filename: {}", path.display());
    }

    let exit_code = match opts.command {
        Command::Apply => cmd_apply(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
