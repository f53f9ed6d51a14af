use crate::address::Address;
use crate::config::{Config, Limits};
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;

pub const USAGE: &str = "Usage: get-successors [path to binary] [address of instruction]";

const ENGINE_LIMITS: &str = "\
Registers and memory are not modeled. A conditional branch may go either way. \
An indirect jump or call, or a return from the entry frame, only reaches the code \
references rizin recorded for it; an instruction without any has no successor.";

/// Find the concrete successors of an instruction by symbolic execution.
#[derive(Parser, Debug)]
#[command(name = "get-successors", version, after_help = ENGINE_LIMITS)]
pub struct Args {
    /// Path to the executable to analyze
    pub program: PathBuf,

    /// Hexadecimal address of the instruction
    pub address: Address,

    /// Restrict execution to the paths listed in FILE (text or .json)
    #[arg(long, value_name = "FILE")]
    pub paths: Option<PathBuf>,

    /// Successor values solved per hit of ADDRESS
    #[arg(
        long,
        env = "SUCC_MAX_SOLVES",
        default_value_t = 5,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_solves: usize,

    /// Successor values solved per completed path
    #[arg(
        long,
        env = "SUCC_DIRECTED_MAX_SOLVES",
        default_value_t = 1,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub directed_max_solves: usize,

    /// Instructions a single state may retire
    #[arg(long, env = "SUCC_MAX_DEPTH", default_value_t = Limits::default().max_depth)]
    pub max_depth: usize,

    /// States created over the whole run
    #[arg(long, env = "SUCC_MAX_STATES", default_value_t = Limits::default().max_states)]
    pub max_states: usize,

    /// Log every retired instruction pointer (trace level)
    #[arg(long)]
    pub trace_rip: bool,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, env = "SUCC_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Args {
    pub fn config(&self) -> Config {
        Config {
            undirected_max_solves: self.max_solves,
            directed_max_solves: self.directed_max_solves,
            limits: Limits {
                max_depth: self.max_depth,
                max_states: self.max_states,
                ..Limits::default()
            },
            trace_rip: self.trace_rip,
        }
    }
}
