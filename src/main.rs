//! # tonewave
//!
//! Play a sine tone on the default output device and retune it over HTTP:
//!
//! ```text
//! curl -X POST localhost:8080/setFrequency -d '{"frequency": 220}'
//! ```

#[macro_use]
extern crate clap;
#[macro_use]
extern crate slog;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{App, Arg, ArgMatches};
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;
use tonewave::{AudioOutput, Config, ControlServer, IndexPage, Oscillator, SampleStreamer};

/// How often the control loop checks whether streaming is still alive.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    let matches = App::new("tonewave")
        .version(crate_version!())
        .about("Stream a sine tone whose frequency is set over HTTP")
        .arg(
            Arg::with_name("CONFIG")
                .long("config")
                .short("c")
                .help("TOML config file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ADDRESS")
                .long("address")
                .help("Address for the control server, e.g. 0.0.0.0:8080")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("SAMPLE_RATE")
                .long("sample-rate")
                .help("Samples per second")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FREQUENCY")
                .long("frequency")
                .help("Initial frequency in Hz")
                .allow_hyphen_values(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BUFFER_SIZE")
                .long("buffer-size")
                .help("Samples per buffer handed to the device")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("q")
                .short("q")
                .conflicts_with("v")
                .help("Only log errors"),
        )
        .get_matches();

    let level = match (matches.is_present("q"), matches.occurrences_of("v")) {
        (true, _) => Severity::Error,
        (false, 0) => Severity::Info,
        (false, 1) => Severity::Debug,
        _ => Severity::Trace,
    };

    let mut builder = TerminalLoggerBuilder::new();
    builder.level(level);
    builder.destination(Destination::Stderr);
    let logger = builder
        .build()
        .map_err(|e| anyhow!("failed to build logger: {}", e))?;
    let _guard = slog_scope::set_global_logger(logger);

    let config = load_config(&matches)?;
    run(config)
}

/// Defaults, then the config file, then command line flags.
fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.value_of("CONFIG") {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config file {}", path))?,
        None => Config::default(),
    };

    if let Some(address) = matches.value_of("ADDRESS") {
        config.address = address.to_string();
    }
    if let Some(rate) = matches.value_of("SAMPLE_RATE") {
        config.sample_rate = rate.parse().context("invalid --sample-rate")?;
    }
    if let Some(frequency) = matches.value_of("FREQUENCY") {
        config.frequency = frequency.parse().context("invalid --frequency")?;
    }
    if let Some(size) = matches.value_of("BUFFER_SIZE") {
        config.buffer_size = size.parse().context("invalid --buffer-size")?;
    }

    config.validate()?;
    Ok(config)
}

fn run(config: Config) -> anyhow::Result<()> {
    let log = slog_scope::logger();

    let oscillator = Arc::new(Oscillator::new(config.frequency, config.sample_rate));

    let (output, player) = AudioOutput::open(config.sample_rate, config.queue_depth)
        .context("failed to open audio output")?;
    info!(log, "audio output ready";
        "device" => output.device_name(),
        "sample_rate" => output.sample_rate(),
        "channels" => output.channels(),
        "format" => ?output.sample_format());

    let server = ControlServer::bind(
        &config.address,
        Arc::clone(&oscillator),
        IndexPage::from_config(config.index_page.clone()),
    )?;

    let streamer = SampleStreamer::new(Arc::clone(&oscillator), config.buffer_size)
        .spawn(player)
        .context("failed to start streaming thread")?;
    info!(log, "streaming"; "frequency" => config.frequency, "buffer_size" => config.buffer_size);

    // The control server is only useful while audio is flowing.
    let served = server.run_while(POLL_INTERVAL, || !streamer.is_finished());

    streamer.stop();
    let streamed = streamer.join();
    drop(output);

    served.context("control server failed")?;
    streamed.context("audio streaming failed")?;
    Ok(())
}
