use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use symscope_core::config::SessionConfig;
use symscope_core::error::{SymscopeError, SymscopeResult};
use symscope_core::process::Process;
use symscope_core::types::{Address, ProcessId};
use symscope_utils::{info, LogLevel, LoggingConfig};

mod procfs;

use procfs::ProcfsProvider;

/// Inspect the memory of a live process through the symscope model.
#[derive(Parser, Debug)]
#[command(name = "symscope")]
#[command(version)]
#[command(about = "Inspect the memory of a live process through the symscope model", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Radix bits per region index level (1, 2, 4, 8 or 16)
    #[arg(long, global = true)]
    region_bits: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List memory regions of a process
    Regions
    {
        /// Process ID (PID) to inspect
        pid: u32,
    },
    /// List the mapped images of a process
    Modules
    {
        /// Process ID (PID) to inspect
        pid: u32,
    },
    /// Find the memory region containing an address
    FindRegion
    {
        /// Process ID (PID) to inspect
        pid: u32,
        /// Address to look up (hex format: 0x1000 or decimal)
        address: Address,
    },
    /// Read memory from a process
    Read
    {
        /// Process ID (PID) to inspect
        pid: u32,
        /// Memory address to read from (hex format: 0x1000 or decimal)
        address: Address,
        /// Number of bytes to read
        #[arg(short, long, default_value_t = 16)]
        length: usize,
    },
    /// Read a null-terminated string from a process
    #[command(name = "string")]
    ReadString
    {
        /// Process ID (PID) to inspect
        pid: u32,
        /// Address of the first character
        address: Address,
        /// Read UTF-16 characters instead of bytes
        #[arg(long, default_value_t = false)]
        wide: bool,
    },
    /// Search readable memory for a byte pattern
    Search
    {
        /// Process ID (PID) to inspect
        pid: u32,
        /// Pattern as hex bytes (`4d5a90`), or text with `--text`
        pattern: String,
        /// Treat the pattern as literal text
        #[arg(long, default_value_t = false)]
        text: bool,
        /// Only report hits at this alignment relative to the start
        #[arg(short, long, default_value_t = 1)]
        alignment: u64,
        /// Start of the searched range
        #[arg(long)]
        start: Option<Address>,
        /// End of the searched range (exclusive)
        #[arg(long)]
        end: Option<Address>,
        /// Stop after this many hits
        #[arg(long, default_value_t = 32)]
        limit: usize,
    },
}

impl Commands
{
    fn pid(&self) -> u32
    {
        match self {
            Commands::Regions { pid }
            | Commands::Modules { pid }
            | Commands::FindRegion { pid, .. }
            | Commands::Read { pid, .. }
            | Commands::ReadString { pid, .. }
            | Commands::Search { pid, .. } => *pid,
        }
    }
}

fn main()
{
    let cli = Cli::parse();

    // Logging reads SYMSCOPE_LOG_FORMAT / SYMSCOPE_LOG_FILE; --log-level wins over RUST_LOG
    let mut logging = LoggingConfig::from_env();
    if let Some(level) = cli.log_level {
        logging = logging.with_level(level);
    }
    if let Err(e) = logging.init() {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn open_process(pid: u32, region_bits: Option<u32>) -> SymscopeResult<Process>
{
    let mut config = SessionConfig::from_env();
    if let Some(bits) = region_bits {
        config = config.with_region_index_bits(bits);
    }

    let pid = ProcessId::from(pid);
    let provider = ProcfsProvider::attach(pid)?;
    info!(%pid, "inspecting process");
    Ok(Process::builder(Arc::new(provider))
        .with_process_id(pid)
        .with_config(config)
        .build())
}

fn run_command(cli: Cli) -> SymscopeResult<()>
{
    let process = open_process(cli.command.pid(), cli.region_bits)?;

    match cli.command {
        Commands::Regions { .. } => {
            let regions = process.memory_regions()?;
            println!("{} memory regions:", regions.len());
            for region in &regions {
                println!(
                    "  {} - {}  {:<4} {:>10}  {}",
                    region.start,
                    region.end,
                    region.permissions,
                    region.size(),
                    region.name.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Commands::Modules { .. } => {
            for module in process.modules()? {
                println!("  {}  {:>10}  {}", module.base(), module.size(), module.name());
            }
            Ok(())
        }
        Commands::FindRegion { address, .. } => {
            match process.find_memory_region(address)? {
                Some(index) => {
                    let regions = process.memory_regions()?;
                    let region = &regions[index];
                    println!(
                        "{} is in region #{} [{}, {}) {} {}",
                        address,
                        index,
                        region.start,
                        region.end,
                        region.permissions,
                        region.name.as_deref().unwrap_or("")
                    );
                }
                None => println!("{} is not in any mapped region", address),
            }
            Ok(())
        }
        Commands::Read { address, length, .. } => {
            let bytes = process.read_memory(address, length)?;
            print_hex_dump(address, &bytes);
            Ok(())
        }
        Commands::ReadString { address, wide, .. } => {
            let text = if wide {
                process.read_wide_string(address)?
            } else {
                process.read_ansi_string(address)?
            };
            println!("{:?}", text);
            Ok(())
        }
        Commands::Search {
            pattern,
            text,
            alignment,
            start,
            end,
            limit,
            ..
        } => {
            let pattern = if text { pattern.into_bytes() } else { parse_hex_pattern(&pattern)? };
            let start = start.unwrap_or(Address::ZERO);
            let end = end.unwrap_or(Address::from(u64::MAX));

            let mut found = 0;
            for hit in process.find_all_patterns(start, end, &pattern, alignment).take(limit) {
                println!("  {}", hit?);
                found += 1;
            }
            println!("{} match(es)", found);
            Ok(())
        }
    }
}

/// Parse `4d5a90` or `4d 5a 90` into bytes
fn parse_hex_pattern(text: &str) -> SymscopeResult<Vec<u8>>
{
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(SymscopeError::InvalidArgument(format!(
            "hex pattern `{text}` has an odd number of digits"
        )));
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| SymscopeError::InvalidArgument(format!("`{text}` is not a hex pattern")))
        })
        .collect()
}

fn print_hex_dump(address: Address, bytes: &[u8])
{
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!("{}  {:<47}  {}", address + (row as u64) * 16, hex.join(" "), ascii);
    }
}
