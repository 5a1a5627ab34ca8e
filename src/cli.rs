//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use ftflasher_flash::{FtdiMode, GpioPins, DEFAULT_DEVICE};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u64
fn parse_hex_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a frequency in Hz, with optional k/M suffix (e.g. "500k", "30M")
pub fn parse_frequency(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000f64),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000f64),
        _ => (s, 1f64),
    };
    let value: f64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("Invalid frequency '{}'", s))?;
    let hz = value * multiplier;
    if !(1.0..=u32::MAX as f64).contains(&hz) {
        return Err(format!("Frequency '{}' out of range", s));
    }
    Ok(hz.round() as u32)
}

/// Default log filter for a `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn parse_mode(s: &str) -> Result<FtdiMode, String> {
    s.parse::<FtdiMode>().map_err(|e| e.to_string())
}

fn parse_pins(s: &str) -> Result<GpioPins, String> {
    s.parse::<GpioPins>().map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "ftflasher")]
#[command(author, version, about = "SPI flash programmer for FTDI USB bridges", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Chip database (JSON file, or directory of .json files) replacing
    /// the built-in one
    #[arg(long, global = true)]
    pub chip_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to reach the flash chip
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Device URL: ftdi://[vendor[:product[:index|:serial]]]/interface, or
    /// dummy://[JEDEC ID] for the emulator
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Bridge mode: sync, async or mpsse
    #[arg(short, long, default_value = "mpsse", value_parser = parse_mode)]
    pub mode: FtdiMode,

    /// SPI clock in Hz (accepts k/M suffixes)
    #[arg(short, long, default_value = "1000000", value_parser = parse_frequency)]
    pub frequency: u32,

    /// Pin assignment (ADBUS bit numbers)
    #[arg(long, default_value = "sck=0,mosi=1,miso=2,cs=3", value_parser = parse_pins)]
    pub gpio: GpioPins,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the flash chip
    ReadId {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read flash contents to file
    Read {
        #[command(flatten)]
        link: LinkArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Flash address to start at (hex, e.g., 0x10000)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Bytes to read (default: to the end of the chip)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write file to flash
    Write {
        #[command(flatten)]
        link: LinkArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Flash address to write at
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Bytes of the input file to skip
        #[arg(long, default_value = "0", value_parser = parse_hex_u64)]
        skip: u64,

        /// Bytes to write (default: the rest of the file)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Don't read back and compare after writing
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase a flash range
    Erase {
        #[command(flatten)]
        link: LinkArgs,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Bytes to erase (default: to the end of the chip)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// List supported chips
    ListChips {
        /// Filter by vendor
        #[arg(long)]
        vendor: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_u32("4096").unwrap(), 4096);
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency("1000000").unwrap(), 1_000_000);
        assert_eq!(parse_frequency("500k").unwrap(), 500_000);
        assert_eq!(parse_frequency("7.5M").unwrap(), 7_500_000);
        assert!(parse_frequency("0").is_err());
        assert!(parse_frequency("fast").is_err());
    }

    #[test]
    fn test_verbosity_sets_log_filter() {
        let verbose = |args: &[&str]| Cli::try_parse_from(args).unwrap().verbose;
        assert_eq!(log_filter(verbose(&["ftflasher", "list-chips"])), "info");
        assert_eq!(log_filter(verbose(&["ftflasher", "-v", "list-chips"])), "debug");
        assert_eq!(log_filter(verbose(&["ftflasher", "list-chips", "-vv"])), "trace");
        assert_eq!(log_filter(5), "trace");
    }

    #[test]
    fn test_read_id_defaults() {
        let cli = Cli::try_parse_from(["ftflasher", "read-id"]).unwrap();
        match cli.command {
            Commands::ReadId { link } => {
                assert_eq!(link.device, DEFAULT_DEVICE);
                assert_eq!(link.mode, FtdiMode::Mpsse);
                assert_eq!(link.frequency, 1_000_000);
                assert_eq!(link.gpio, GpioPins::default());
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_write_options() {
        let cli = Cli::try_parse_from([
            "ftflasher",
            "-v",
            "write",
            "--device",
            "dummy://C84017",
            "--mode",
            "sync",
            "--gpio",
            "sck=4,mosi=5,miso=6,cs=7",
            "--input",
            "fw.bin",
            "--offset",
            "0x10000",
            "--skip",
            "0x200",
            "--no-verify",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Write {
                link,
                offset,
                skip,
                length,
                no_verify,
                ..
            } => {
                assert_eq!(link.mode, FtdiMode::Sync);
                assert_eq!(link.gpio.cs, 7);
                assert_eq!(offset, 0x10000);
                assert_eq!(skip, 0x200);
                assert_eq!(length, None);
                assert!(no_verify);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_bad_pins_rejected() {
        assert!(Cli::try_parse_from(["ftflasher", "read-id", "--gpio", "cs=9"]).is_err());
    }
}
