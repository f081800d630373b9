use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, LoaderConfig};

fn parse_u32_with_hex(input: &str) -> Result<u32, String> {
    let s = input.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex value '{input}': {e}"))
    } else {
        s.parse::<u32>()
            .map_err(|e| format!("invalid decimal value '{input}': {e}"))
    }
}

fn parse_usize_with_hex(input: &str) -> Result<usize, String> {
    parse_u32_with_hex(input).map(|v| v as usize)
}

#[derive(Debug, Parser)]
#[command(name = "sicld", version, about = "Relocating loader for SIC/XE object programs")]
pub struct Args {
    /// Object program to load; stdin when absent or `-`.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// TOML file with loader settings; flags below override it.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "capacity", value_parser = parse_usize_with_hex)]
    pub memory_capacity: Option<usize>,

    #[arg(long = "page-size", value_parser = parse_u32_with_hex)]
    pub page_size: Option<u32>,

    #[arg(long = "min-reloc", value_parser = parse_u32_with_hex)]
    pub min_relocation: Option<u32>,

    #[arg(long = "max-reloc", value_parser = parse_u32_with_hex)]
    pub max_relocation: Option<u32>,

    #[arg(long = "load-address", value_parser = parse_u32_with_hex)]
    pub load_address: Option<u32>,

    #[arg(long = "seed")]
    pub seed: Option<u64>,

    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Reads the config file, if any, and lays the command-line overrides
    /// over it.
    ///
    /// # Errors
    /// Returns `ConfigError` when the file cannot be read or parsed.
    pub fn build_config(&self) -> Result<LoaderConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_file(path)?,
            None => LoaderConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut LoaderConfig) {
        if let Some(v) = self.memory_capacity {
            config.memory_capacity = v;
        }
        if let Some(v) = self.page_size {
            config.page_size = v;
        }
        if let Some(v) = self.min_relocation {
            config.min_relocation = v;
        }
        if let Some(v) = self.max_relocation {
            config.max_relocation = v;
        }
        if self.load_address.is_some() {
            config.load_address = self.load_address;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }

    #[must_use]
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref().map_or(true, |p| p.as_os_str() == "-")
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use crate::config::LoaderConfig;
    use clap::Parser;

    #[test]
    fn accepts_hex_and_decimal_overrides() {
        let args = Args::parse_from([
            "sicld",
            "--capacity",
            "0x8000",
            "--page-size",
            "128",
            "--load-address",
            "0X2000",
            "--seed",
            "9",
            "prog.obj",
        ]);
        let config = args.build_config().expect("config");
        assert_eq!(config.memory_capacity, 0x8000);
        assert_eq!(config.page_size, 128);
        assert_eq!(config.load_address, Some(0x2000));
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.min_relocation, LoaderConfig::default().min_relocation);
        assert!(!args.reads_stdin());
    }

    #[test]
    fn dash_or_missing_input_means_stdin() {
        assert!(Args::parse_from(["sicld"]).reads_stdin());
        assert!(Args::parse_from(["sicld", "-"]).reads_stdin());
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(Args::try_parse_from(["sicld", "--page-size", "0xZZ"]).is_err());
        assert!(Args::try_parse_from(["sicld", "--min-reloc", "-1"]).is_err());
    }
}
