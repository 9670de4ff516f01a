//! Command-line surface.
//!
//! Flags override the layered configuration file and environment; see
//! [`crate::config`].

use crate::config::{BusBackend, ProbeConfig, RunMode, DEFAULT_CONFIG_PATH};
use crate::error::AppResult;
use clap::{ArgGroup, Parser, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    author,
    version,
    about = "Automated four-terminal resistance probing of wafer test structures",
    arg_required_else_help = true
)]
#[command(group(ArgGroup::new("mode").args(["dry_run", "measure"])))]
/// Command-line flags.
pub struct Cli {
    /// Visit every structure without contacting or writing results
    #[arg(long)]
    pub dry_run: bool,

    /// Contact each structure and record measurements
    #[arg(short, long)]
    pub measure: bool,

    /// Wafer number (required to measure)
    #[arg(short, long)]
    pub wafer: Option<u32>,

    /// Die number (required to measure)
    #[arg(short, long)]
    pub die: Option<u32>,

    /// Structure coordinate table
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub coordinates: Option<PathBuf>,

    /// Result file [default: <timestamp>_wafer<W>_die<D>.csv]
    #[arg(short, long, alias = "output-file", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Replace an existing result file
    #[arg(long)]
    pub output_overwrite: bool,

    /// Append to an existing result file
    #[arg(long)]
    pub output_append: bool,

    /// Only visit structures matching the filter
    #[arg(long)]
    pub filter: bool,

    /// Filter expression over the table columns. Combine terms with `&&`,
    /// `||` and `!` (not `and`/`or`), e.g.
    /// 'structure in ["LW300", "LW600"] && (block == 4 || material == "Ag_Cl")'
    #[arg(long)]
    pub filter_string: Option<String>,

    /// Sort the selected structures by these columns
    #[arg(long, value_delimiter = ',')]
    pub order_by: Vec<String>,

    /// Table row of the structure the probes start on
    #[arg(long)]
    pub home: Option<usize>,

    /// Start at this position of the filtered, ordered sequence (the `index`
    /// column of a previous run's results)
    #[arg(long)]
    pub offset: Option<usize>,

    /// Use the in-process simulated instrument bus
    #[arg(long)]
    pub simulated: bool,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

impl Cli {
    /// Layered configuration with these flags applied on top.
    pub fn load_config(&self) -> AppResult<ProbeConfig> {
        let mut config = ProbeConfig::load_from(&self.config)?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Overwrite `config` with every flag that was given.
    pub fn apply(&self, config: &mut ProbeConfig) {
        let run = &mut config.run;
        if self.measure {
            run.mode = RunMode::Measure;
        } else if self.dry_run {
            run.mode = RunMode::Dry;
        }
        if self.wafer.is_some() {
            run.wafer = self.wafer;
        }
        if self.die.is_some() {
            run.die = self.die;
        }
        if let Some(path) = &self.coordinates {
            run.coordinates = path.clone();
        }
        if self.output.is_some() {
            run.output = self.output.clone();
        }
        run.output_overwrite |= self.output_overwrite;
        run.output_append |= self.output_append;
        run.filter |= self.filter;
        if self.filter_string.is_some() {
            run.filter_string = self.filter_string.clone();
        }
        if !self.order_by.is_empty() {
            run.order_by = self.order_by.clone();
        }
        if let Some(home) = self.home {
            run.home_index = home;
        }
        if let Some(offset) = self.offset {
            run.offset = offset;
        }
        if self.simulated {
            config.bus.backend = BusBackend::Simulated;
        }
    }
}
