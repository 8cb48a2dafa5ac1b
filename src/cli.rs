use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "statuswatch", version, about = "Grid service status monitor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one fetch round now and exit.
    Fetch {
        /// Analyses to run; empty or `all` selects every registered analysis.
        analyses: Vec<String>,
    },
    /// Run the periodic fetch driver until interrupted.
    Run {
        /// Analyses to drive; empty or `all` selects every registered analysis.
        analyses: Vec<String>,
    },
    /// Print the current status rollup per category.
    Status,
}
