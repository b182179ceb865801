//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sstflash")]
#[command(version, about = "Programs SST39SF0x0 flash ROMs in the upper memory area", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Programmer to use ("internal" or "dummy")
    #[arg(short, long, default_value = "internal")]
    pub programmer: String,

    /// Override amount of flash memory written, in KiB (even, 2-256).
    /// May be larger or smaller than the file size.
    #[arg(short, long, value_name = "KIB", value_parser = parse_size_override)]
    pub size: Option<u16>,

    /// Destination segment in hex (A000-F800, on a 4K boundary)
    #[arg(value_parser = parse_segment)]
    pub segment: u16,

    /// ROM image file
    pub image: PathBuf,
}

fn parse_segment(raw: &str) -> Result<u16, String> {
    if raw.is_empty() || raw.len() > 4 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("memory address must be 1-4 hex digits".into());
    }

    // Length-checked hex above, cannot fail.
    let seg = u16::from_str_radix(raw, 16).map_err(|e| e.to_string())?;

    if !(0xA000..=0xF800).contains(&seg) || seg % 0x100 != 0 {
        return Err("memory address must be between A000 and F800 and on a 4K boundary".into());
    }

    Ok(seg)
}

fn parse_size_override(raw: &str) -> Result<u16, String> {
    let kib: u16 = raw
        .parse()
        .map_err(|_| String::from("size override must be an integer"))?;

    if !(2..=256).contains(&kib) || kib % 2 != 0 {
        return Err("size override must be a multiple of 2 between 2 and 256".into());
    }

    Ok(kib)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_accepts_the_legal_window() {
        assert_eq!(parse_segment("A000"), Ok(0xA000));
        assert_eq!(parse_segment("C800"), Ok(0xC800));
        assert_eq!(parse_segment("c800"), Ok(0xC800));
        assert_eq!(parse_segment("F800"), Ok(0xF800));
    }

    #[test]
    fn segment_rejects_out_of_range_and_unaligned() {
        assert!(parse_segment("9800").is_err());
        assert!(parse_segment("F900").is_err());
        assert!(parse_segment("C880").is_err());
        assert!(parse_segment("0").is_err());
        assert!(parse_segment("C8000").is_err());
        assert!(parse_segment("C80G").is_err());
        assert!(parse_segment("").is_err());
    }

    #[test]
    fn size_override_bounds() {
        assert_eq!(parse_size_override("2"), Ok(2));
        assert_eq!(parse_size_override("32"), Ok(32));
        assert_eq!(parse_size_override("256"), Ok(256));
        assert!(parse_size_override("0").is_err());
        assert!(parse_size_override("3").is_err());
        assert!(parse_size_override("258").is_err());
        assert!(parse_size_override("abc").is_err());
    }

    #[test]
    fn cli_parses_a_full_command_line() {
        let cli = Cli::try_parse_from(["sstflash", "-s", "32", "D000", "BBIOS.BIN"]).unwrap();
        assert_eq!(cli.segment, 0xD000);
        assert_eq!(cli.size, Some(32));
        assert_eq!(cli.image, PathBuf::from("BBIOS.BIN"));
        assert_eq!(cli.programmer, "internal");
    }
}
