//! Audio device sink backed by cpal.
//!
//! cpal pulls samples from a callback on its own thread, while the streamer
//! pushes whole buffers. The two meet at a bounded channel: [`Player::write`]
//! blocks while the channel is full, and the device callback drains it
//! without ever blocking, writing mid-scale silence if it runs dry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Sample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use dasp_sample::FromSample;
use parking_lot::Mutex;
use slog::Logger;

use crate::encoding::SILENCE_U8;
use crate::error::{Error, Result};
use crate::sink::{send_blocking, AudioSink};

type StreamFault = Arc<Mutex<Option<String>>>;

/// Owns the running device stream. Dropping it stops playback, after which
/// the paired [`Player`] reports [`Error::SinkClosed`].
pub struct AudioOutput {
    _stream: cpal::Stream,
    device_name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl AudioOutput {
    /// Open the default output device at exactly `sample_rate`.
    ///
    /// `queue_depth` is the number of buffers that may wait between the
    /// player and the device.
    pub fn open(sample_rate: u32, queue_depth: usize) -> Result<(AudioOutput, Player)> {
        let logger = slog_scope::logger().new(o!("component" => "output"));

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let supported = choose_config(device.supported_output_configs()?, sample_rate)
            .ok_or(Error::UnsupportedConfig { sample_rate })?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        info!(logger, "opening output device";
            "device" => device_name.as_str(),
            "sample_rate" => config.sample_rate.0,
            "channels" => config.channels,
            "format" => ?sample_format);

        let (sender, receiver) = bounded(queue_depth);
        let underruns = Arc::new(AtomicU64::new(0));
        let fault: StreamFault = Arc::new(Mutex::new(None));

        let feed = Feed::new(receiver, Arc::clone(&underruns));
        let stream = match sample_format {
            SampleFormat::U8 => build_stream::<u8>(&device, &config, feed, &fault, &logger)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, feed, &fault, &logger)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, feed, &fault, &logger)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, feed, &fault, &logger)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, feed, &fault, &logger)?,
            SampleFormat::F64 => build_stream::<f64>(&device, &config, feed, &fault, &logger)?,
            other => return Err(Error::UnsupportedFormat(format!("{:?}", other))),
        };
        stream.play()?;

        let output = AudioOutput {
            _stream: stream,
            device_name,
            config,
            sample_format,
        };
        let player = Player {
            sender,
            fault,
            underruns,
            reported_underruns: 0,
            logger,
        };
        Ok((output, player))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }
}

/// Blocking writer half of the device sink. Safe to move to the streaming thread.
pub struct Player {
    sender: Sender<Vec<u8>>,
    fault: StreamFault,
    underruns: Arc<AtomicU64>,
    reported_underruns: u64,
    logger: Logger,
}

impl AudioSink for Player {
    fn write(&mut self, buffer: &[u8], running: &AtomicBool) -> Result<()> {
        let underruns = self.underruns.load(Ordering::Relaxed);
        if underruns != self.reported_underruns {
            warn!(self.logger, "device ran out of samples";
                "underruns" => underruns - self.reported_underruns,
                "total" => underruns);
            self.reported_underruns = underruns;
        }

        // A faulted stream stops draining, so the fault is rechecked while
        // the write waits for room.
        let fault = &self.fault;
        send_blocking(&self.sender, buffer, running, || {
            fault.lock().clone().map(Error::StreamError)
        })
    }
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::U8
            | SampleFormat::I16
            | SampleFormat::U16
            | SampleFormat::I32
            | SampleFormat::F32
            | SampleFormat::F64
    )
}

/// Pick a configuration running at exactly `sample_rate`, mono if possible,
/// otherwise the one with the fewest channels.
fn choose_config<I>(ranges: I, sample_rate: u32) -> Option<SupportedStreamConfig>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let rate = SampleRate(sample_rate);
    ranges
        .into_iter()
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| range.channels() > 0 && is_supported_format(range.sample_format()))
        .min_by_key(|range| range.channels())
        .map(|range| range.with_sample_rate(rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut feed: Feed,
    fault: &StreamFault,
    logger: &Logger,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<u8>,
{
    let channels = config.channels as usize;
    let fault = Arc::clone(fault);
    let logger = logger.clone();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| feed.write_frames(data, channels),
        move |err| {
            error!(logger, "an error occurred on stream"; "error" => %err);
            *fault.lock() = Some(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

/// Device-side cursor over the buffers sent by the player.
struct Feed {
    receiver: Receiver<Vec<u8>>,
    current: Vec<u8>,
    position: usize,
    underruns: Arc<AtomicU64>,
}

impl Feed {
    fn new(receiver: Receiver<Vec<u8>>, underruns: Arc<AtomicU64>) -> Self {
        Self {
            receiver,
            current: Vec::new(),
            position: 0,
            underruns,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.position >= self.current.len() {
            self.current = self.receiver.try_recv().ok()?;
            self.position = 0;
        }
        let byte = self.current.get(self.position).copied();
        self.position += 1;
        byte
    }

    /// Write one mono sample per frame, duplicated across the frame's channels.
    fn write_frames<T>(&mut self, output: &mut [T], channels: usize)
    where
        T: Sample + FromSample<u8>,
    {
        let mut starved = false;
        for frame in output.chunks_mut(channels) {
            let byte = self.next_byte().unwrap_or_else(|| {
                starved = true;
                SILENCE_U8
            });
            let value = T::from_sample(byte);
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
        if starved {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}
