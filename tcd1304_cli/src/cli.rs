use crate::{output::Output, serial::SerialConf, session::SessionConf};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lists connected serial devices
    List,
    /// Lists supported firmware profiles and their exposure limits
    Profiles,
    /// Shows the timing and command an exposure request resolves to, no device needed
    Timing(TimingConf),
    /// Get readings from spectrometer
    Read(ReadConf),
    /// Get readings from a simulated spectrometer
    Simulate(SimulateConf),
}

#[derive(Args)]
pub struct TimingConf {
    #[clap(flatten)]
    pub session: SessionConf,
}

#[derive(Args)]
pub struct ReadConf {
    /// Amount of spectra captured, more than one keeps the device in continuous mode
    #[clap(short = 'n', long, value_parser, default_value = "1")]
    pub count: usize,

    #[clap(flatten)]
    pub output: Output,

    #[clap(flatten)]
    pub session: SessionConf,

    #[clap(flatten)]
    pub serial: SerialConf,
}

#[derive(Args)]
pub struct SimulateConf {
    /// Amount of spectra captured
    #[clap(short = 'n', long, value_parser, default_value = "1")]
    pub count: usize,

    /// Delay in milliseconds before the simulated device answers, on top of the frame time
    #[clap(long, value_parser, default_value = "0")]
    pub latency: u64,

    #[clap(flatten)]
    pub output: Output,

    #[clap(flatten)]
    pub session: SessionConf,
}
