mod cli;
mod output;
mod serial;
mod session;

use clap::Parser;
use simple_eyre::{eyre::eyre, Result};
use std::{io::Write, time::Duration};
use strum::IntoEnumIterator;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use cli::*;
use output::Output;
use tcd1304::{
    transport::simulated::{SimulatedTransport, SimulatorOptions},
    AcquisitionSession, AcquisitionWorker, CommandPacket, Event, FirmwareProfile, TimingInfo,
    TimingRequest, Transport,
};

fn main() -> Result<()> {
    simple_eyre::install()?;
    let cli = Cli::parse();
    env_logger::init();

    match &cli.command {
        Commands::List => list_serial(),
        Commands::Profiles => list_profiles(),
        Commands::Timing(conf) => show_timing(conf),
        Commands::Read(conf) => {
            let settings = conf.session.settings()?;
            let request = settings.timing;
            let session = conf.serial.open_session(settings)?;
            acquire(session, request, conf.count, &conf.output)
        }
        Commands::Simulate(conf) => {
            let settings = conf.session.settings()?;
            let options = SimulatorOptions {
                latency: Duration::from_millis(conf.latency),
                pace: true,
                ..Default::default()
            };
            let request = settings.timing;
            let device =
                SimulatedTransport::with_options(settings.protocol, settings.firmware, options);
            acquire(device.open_session(settings)?, request, conf.count, &conf.output)
        }
    }
}

/// Returns std::io::Write stream with coloring enabled if program is run interactively
fn get_stdout() -> StandardStream {
    StandardStream::stdout(if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

fn list_serial() -> Result<()> {
    let mut stdout = get_stdout();
    let paths = serialport::available_ports()?;
    if paths.is_empty() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
        writeln!(&mut stdout, "No connected serial ports found.")?;
    } else {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(&mut stdout, "Connected serial ports:")?;
    }
    stdout.reset()?;
    paths.iter().for_each(|p| println!("{}", p.port_name));

    Ok(())
}

fn list_profiles() -> Result<()> {
    let mut stdout = get_stdout();
    for profile in FirmwareProfile::iter() {
        let limits = profile.exposure_limits();
        stdout.set_color(ColorSpec::new().set_bold(true))?;
        write!(&mut stdout, "{:<16}", profile.name())?;
        stdout.reset()?;
        writeln!(
            &mut stdout,
            "{}, exposure {}µs to {:.3}s",
            profile.description(),
            limits.min_seconds * 1e6,
            limits.max_seconds
        )?;
    }
    Ok(())
}

fn show_timing(conf: &TimingConf) -> Result<()> {
    let settings = conf.session.settings()?;
    let config = settings.validate()?;
    println!("{}", settings.firmware.description());
    println!(
        "Exposure: {:.3}ms requested, {:.3}ms achieved",
        settings.timing.exposure_seconds * 1e3,
        config.exposure_seconds * 1e3
    );
    println!("{}", TimingInfo::new(&config, settings.firmware));
    println!(
        "Command ({}): {}",
        settings.protocol,
        CommandPacket::encode(&config, settings.protocol)
    );
    Ok(())
}

/// Collects `count` spectra, streaming when more than one is asked for
fn acquire<T: Transport + Send + 'static>(
    session: AcquisitionSession<T>,
    mut request: TimingRequest,
    count: usize,
    output: &Output,
) -> Result<()> {
    let profile = session.profile();
    let mut worker = AcquisitionWorker::spawn(session)?;
    request.continuous = count > 1;
    worker.configure(request)?;

    let mut stdout = std::io::stdout().lock();
    let mut received = 0;
    while received < count {
        match worker.blocking_next_event() {
            Some(Event::Configured(config)) => {
                log::info!("{}", TimingInfo::new(&config, profile))
            }
            Some(Event::Spectrum(spectrum)) => {
                output.write_spectrum(&mut stdout, &spectrum)?;
                received += 1;
            }
            Some(Event::Rejected(violation)) => return Err(eyre!("Invalid timing: {}", violation)),
            Some(Event::Failed(e)) => return Err(e.into()),
            Some(Event::Stopped) | Some(Event::Reset) => {}
            None => return Err(eyre!("Acquisition stopped unexpectedly")),
        }
    }
    worker.stop()?;
    worker.shutdown()?;
    Ok(())
}
