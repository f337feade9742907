//! Background loop pulling samples from the oscillator into fixed-size buffers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use slog::Logger;

use crate::encoding::{encode_u8, SILENCE_U8};
use crate::error::{Error, Result};
use crate::oscillator::Oscillator;
use crate::sink::AudioSink;

pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Log buffer count every this many buffers at trace level.
const TRACE_EVERY: u64 = 64;

pub struct SampleStreamer {
    oscillator: Arc<Oscillator>,
    buffer_size: usize,
    running: Arc<AtomicBool>,
    logger: Logger,
}

impl SampleStreamer {
    pub fn new(oscillator: Arc<Oscillator>, buffer_size: usize) -> Self {
        Self {
            oscillator,
            buffer_size,
            running: Arc::new(AtomicBool::new(true)),
            logger: slog_scope::logger().new(o!("component" => "streamer")),
        }
    }

    /// Fill `buffer` with one encoded sample per slot, in slot order.
    ///
    /// The oscillator lock is taken once per sample, so frequency updates
    /// interleave freely with a fill in progress.
    pub fn fill(&self, buffer: &mut [u8]) {
        for slot in buffer.iter_mut() {
            *slot = encode_u8(self.oscillator.next_sample());
        }
    }

    /// Stream until stopped or until the sink fails.
    ///
    /// A sink failure is fatal to streaming and is returned, unless a stop was
    /// requested in the meantime. A stop also releases a write blocked on the
    /// sink.
    pub fn run<S: AudioSink>(&self, sink: &mut S) -> Result<()> {
        let mut buffer = vec![SILENCE_U8; self.buffer_size];
        let mut written: u64 = 0;

        debug!(self.logger, "streaming started";
            "buffer_size" => self.buffer_size,
            "sample_rate" => self.oscillator.sample_rate());

        while self.running.load(Ordering::Acquire) {
            self.fill(&mut buffer);
            if let Err(e) = sink.write(&buffer, &self.running) {
                if !self.running.load(Ordering::Acquire) {
                    break;
                }
                error!(self.logger, "sink write failed, streaming stops";
                    "error" => %e, "buffers" => written);
                return Err(e);
            }
            written += 1;
            if written % TRACE_EVERY == 0 {
                trace!(self.logger, "buffers written"; "buffers" => written);
            }
        }

        debug!(self.logger, "streaming stopped"; "buffers" => written);
        Ok(())
    }

    /// Move the loop onto its own thread.
    pub fn spawn<S>(self, mut sink: S) -> Result<StreamerHandle>
    where
        S: AudioSink + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        let thread = thread::Builder::new()
            .name("sample-streamer".to_string())
            .spawn(move || self.run(&mut sink))?;
        Ok(StreamerHandle { running, thread })
    }
}

pub struct StreamerHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<Result<()>>,
}

impl StreamerHandle {
    /// Ask the loop to exit. A write waiting on the sink is abandoned.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| Error::StreamError("streaming thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{ChannelSink, MemorySink};
    use std::time::{Duration, Instant};

    fn reference_bytes(frequency: f64, sample_rate: u32, count: usize) -> Vec<u8> {
        let osc = Oscillator::new(frequency, sample_rate);
        (0..count).map(|_| encode_u8(osc.next_sample())).collect()
    }

    #[test]
    fn test_buffers_are_contiguous_and_ordered() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        let streamer = SampleStreamer::new(Arc::clone(&osc), 256);
        let mut sink = MemorySink::failing_after(4);

        let result = streamer.run(&mut sink);
        assert!(matches!(result, Err(Error::SinkClosed)));

        // The fifth buffer was filled before the failing write.
        assert_eq!(sink.buffers.len(), 4);
        assert!(sink.buffers.iter().all(|b| b.len() == 256));
        let streamed: Vec<u8> = sink.buffers.concat();
        assert_eq!(streamed, reference_bytes(440.0, 44100, 4 * 256));
    }

    #[test]
    fn test_first_buffer_starts_mid_scale() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        let streamer = SampleStreamer::new(osc, 8);
        let mut buffer = [0u8; 8];
        streamer.fill(&mut buffer);
        assert_eq!(buffer[0], SILENCE_U8);
        assert!(buffer.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_zero_frequency_streams_constant_value() {
        let osc = Arc::new(Oscillator::new(0.0, 8000));
        let streamer = SampleStreamer::new(osc, 64);
        let mut buffer = [0u8; 64];
        streamer.fill(&mut buffer);
        assert!(buffer.iter().all(|&b| b == SILENCE_U8));
    }

    #[test]
    fn test_frequency_change_applies_between_buffers() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        let streamer = SampleStreamer::new(Arc::clone(&osc), 32);
        let mut buffer = [0u8; 32];
        streamer.fill(&mut buffer);
        let phase = osc.phase();

        osc.set_frequency(220.0);
        streamer.fill(&mut buffer);
        let expected = (phase + 32.0 * 220.0 / 44100.0).fract();
        assert!((osc.phase() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_spawned_streamer_stops_on_request() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        let (sink, receiver) = ChannelSink::new(1);
        let handle = SampleStreamer::new(osc, 128).spawn(sink).unwrap();

        let first = receiver.recv().unwrap();
        let second = receiver.recv().unwrap();
        assert_eq!(first.len(), 128);
        assert_eq!(
            [first, second].concat(),
            reference_bytes(440.0, 44100, 256)
        );

        handle.stop();
        drop(receiver);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_stop_releases_write_blocked_on_full_sink() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        // Nobody drains the channel, so the second write blocks.
        let (sink, _receiver) = ChannelSink::new(1);
        let handle = SampleStreamer::new(osc, 64).spawn(sink).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        handle.stop();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished(), "streamer still blocked after stop");
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_spawned_streamer_reports_sink_failure() {
        let osc = Arc::new(Oscillator::new(440.0, 44100));
        let handle = SampleStreamer::new(osc, 16)
            .spawn(MemorySink::failing_after(0))
            .unwrap();
        assert!(matches!(handle.join(), Err(Error::SinkClosed)));
    }
}
