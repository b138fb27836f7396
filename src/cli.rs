use crate::blizzard::Region;
use clap::{Parser, ValueEnum};

/// Import PvP leaderboards and entrant profiles into PostgreSQL.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,

    /// Restrict the run to these regions (overrides `REGIONS`)
    #[arg(long = "region")]
    pub regions: Vec<Region>,

    /// Skip the catalog import (realms, classes, specs, talents, achievements)
    #[arg(long)]
    pub skip_catalog: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}
