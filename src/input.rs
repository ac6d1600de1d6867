//! Provides a means to read, parse and hold configuration options for scans.
use crate::port_strategy::ScanOrder;
use crate::scanner::{ScanConfig, DEFAULT_MAX_CONCURRENT_PROBES};
use crate::target::{Target, ValidationError, LOWEST_PORT_NUMBER, TOP_PORT_NUMBER};
use anyhow::Context;
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Inclusive port bounds as the user typed them. Checked when the
/// [`Target`] is built.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u32,
    pub end: u32,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: u32::from(LOWEST_PORT_NUMBER),
            end: u32::from(TOP_PORT_NUMBER),
        }
    }
}

/// Parses `start-end` or a single port.
#[cfg(not(tarpaulin_include))]
pub fn parse_range(input: &str) -> Result<PortRange, String> {
    let input = input.trim();
    let range_parts: Vec<&str> = input.split('-').map(str::trim).collect();

    let parse = |part: &str, which: &str| {
        part.parse::<u32>()
            .map_err(|_| format!("Invalid {which} port '{part}' in range '{input}'"))
    };

    match range_parts.as_slice() {
        [single] if !single.is_empty() => {
            let port = single
                .parse::<u32>()
                .map_err(|_| format!("Invalid port number '{single}'"))?;
            Ok(PortRange {
                start: port,
                end: port,
            })
        }
        [start, end] => Ok(PortRange {
            start: parse(start, "start")?,
            end: parse(end, "end")?,
        }),
        _ => Err(format!(
            "Invalid range format '{input}'. Expected 'start-end'. Example: 1-1000."
        )),
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "portprobe",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Finds the open TCP ports of one host.
/// Press Ctrl-C during a scan to stop it and keep what was found so far.
pub struct Opts {
    /// The IPv4 or IPv6 address to scan.
    #[arg(short, long, default_value = "")]
    pub address: String,

    /// The inclusive port range to scan. Examples: 1-1000 or 80.
    #[arg(short, long, value_parser = parse_range)]
    pub range: Option<PortRange>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output the open ports, comma separated.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print the whole result, including every probe outcome, as JSON.
    #[arg(long)]
    pub json: bool,

    /// The maximum number of connection attempts in flight at once.
    /// Lowered automatically when the open file limit is too small for it.
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONCURRENT_PROBES)]
    pub batch_size: usize,

    /// The timeout in milliseconds before a port is assumed to be closed.
    #[arg(short, long, default_value = "1500")]
    pub timeout: u32,

    /// The number of tries before a silent port is given up on.
    /// If set to 0, it is corrected to 1.
    #[arg(long, default_value = "1")]
    pub tries: u8,

    /// Milliseconds in-flight probes may take to finish after Ctrl-C.
    #[arg(long, default_value = "500")]
    pub grace: u32,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// The order of scanning to be performed. The "serial" option will
    /// scan ports in ascending order while the "random" option will scan
    /// ports randomly. Results are always reported in ascending order.
    #[arg(long, value_enum, ignore_case = true, default_value = "serial")]
    pub scan_order: ScanOrder,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values found within the user configuration file into the
    /// command line arguments.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            address, greppable, accessible, json, batch_size, timeout, tries, grace, scan_order
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(range, ulimit);
    }

    /// The range to scan; all ports when none was given.
    pub fn port_range(&self) -> PortRange {
        self.range.unwrap_or_default()
    }

    pub fn target(&self) -> Result<Target, ValidationError> {
        let range = self.port_range();
        Target::new(&self.address, range.start, range.end)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            max_concurrent_probes: self.batch_size,
            timeout: Duration::from_millis(u64::from(self.timeout)),
            tries: self.tries,
            grace_period: Duration::from_millis(u64::from(self.grace)),
            order: self.scan_order,
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            address: String::new(),
            range: None,
            greppable: true,
            accessible: false,
            json: false,
            batch_size: 0,
            timeout: 0,
            tries: 0,
            grace: 0,
            ulimit: None,
            scan_order: ScanOrder::Serial,
            no_config: true,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    address: Option<String>,
    range: Option<PortRange>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    json: Option<bool>,
    batch_size: Option<usize>,
    timeout: Option<u32>,
    tries: Option<u8>,
    grace: Option<u32>,
    ulimit: Option<u64>,
    scan_order: Option<ScanOrder>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file yields an empty config.
    ///
    /// # Format
    ///
    /// address = "127.0.0.1"
    /// range = { start = 1, end = 1000 }
    /// batch_size = 500
    /// timeout = 1000
    /// scan_order = "Random"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Config::default());
        };
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("could not read {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", config_path.display()))
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".portprobe.toml");
    Some(config_path)
}
