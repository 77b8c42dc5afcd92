//! Command line interface

use std::path::PathBuf;

use clap::Parser;

use crate::capture::{CaptureConfig, CaptureSource};

#[derive(Debug, Parser)]
#[command(
    name = "kafka-shark",
    version,
    about = "Pair Kafka requests with their responses from a live tshark capture",
    after_help = "Arguments after `--` are passed to tshark after `-l -T pdml`.\n\
                  Without them tshark runs with `-o kafka.tcp.ports:9092`."
)]
pub struct Cli {
    /// tshark executable
    #[arg(long, value_name = "PATH", default_value = "tshark")]
    pub tshark: PathBuf,

    /// Replay saved PDML output instead of running tshark
    #[arg(long, value_name = "FILE")]
    pub pdml_file: Option<PathBuf>,

    /// Print log entries to stdout instead of running the dashboard
    #[arg(long)]
    pub headless: bool,

    /// Print each entry as one JSON object per line (headless mode)
    #[arg(long, requires = "headless")]
    pub json: bool,

    /// Log and skip packets missing frame information instead of exiting
    #[arg(long)]
    pub skip_malformed: bool,

    /// Write logs to this file while the dashboard owns the terminal
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Extra tshark arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TSHARK_ARGS")]
    pub tshark_args: Vec<String>,
}

impl Cli {
    pub fn capture_source(&self) -> CaptureSource {
        match &self.pdml_file {
            Some(path) => CaptureSource::File(path.clone()),
            None => CaptureSource::Tshark(CaptureConfig {
                tshark: self.tshark.clone(),
                args: self.tshark_args.clone(),
            }),
        }
    }
}
