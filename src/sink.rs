//! The seam between the streamer and whatever consumes encoded audio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};

use crate::error::{Error, Result};

/// How often a blocked write wakes up to look for faults and stop requests.
const WAKE_INTERVAL: Duration = Duration::from_millis(20);

/// Consumer of encoded mono buffers.
///
/// `write` blocks until the sink has accepted the whole buffer; that wait is
/// what paces the streamer. It gives up with [`Error::Interrupted`] once
/// `running` is cleared. Any other error means the sink can no longer make
/// progress.
pub trait AudioSink {
    fn write(&mut self, buffer: &[u8], running: &AtomicBool) -> Result<()>;
}

/// Push `buffer` into a bounded channel, waking every [`WAKE_INTERVAL`] to
/// check `fault` and `running` while the channel is full.
pub(crate) fn send_blocking<F>(
    sender: &Sender<Vec<u8>>,
    buffer: &[u8],
    running: &AtomicBool,
    mut fault: F,
) -> Result<()>
where
    F: FnMut() -> Option<Error>,
{
    let mut pending = buffer.to_vec();
    loop {
        if let Some(e) = fault() {
            return Err(e);
        }
        if !running.load(Ordering::Acquire) {
            return Err(Error::Interrupted);
        }
        match sender.send_timeout(pending, WAKE_INTERVAL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(buffer)) => pending = buffer,
            Err(SendTimeoutError::Disconnected(_)) => return Err(Error::SinkClosed),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ChannelSink, MemorySink};
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memory_sink_fails_after_limit() {
        let running = AtomicBool::new(true);
        let mut sink = MemorySink::failing_after(2);
        assert!(sink.write(&[1, 2], &running).is_ok());
        assert!(sink.write(&[3, 4], &running).is_ok());
        assert!(matches!(sink.write(&[5, 6], &running), Err(Error::SinkClosed)));
        assert_eq!(sink.buffers, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let running = AtomicBool::new(true);
        let (mut sink, receiver) = ChannelSink::new(1);
        sink.write(&[7], &running).unwrap();
        assert_eq!(receiver.recv().unwrap(), vec![7]);
        drop(receiver);
        assert!(matches!(sink.write(&[8], &running), Err(Error::SinkClosed)));
    }

    #[test]
    fn test_blocked_send_gives_up_when_stopped() {
        let (sender, _receiver) = bounded(1);
        sender.send(vec![1]).unwrap();
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let writer = thread::spawn(move || send_blocking(&sender, &[2], &flag, || None));
        thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Release);

        assert!(matches!(writer.join().unwrap(), Err(Error::Interrupted)));
    }

    #[test]
    fn test_fault_wins_over_stop() {
        let (sender, _receiver) = bounded(1);
        let running = AtomicBool::new(false);
        let result = send_blocking(&sender, &[1], &running, || {
            Some(Error::StreamError("gone".to_string()))
        });
        assert!(matches!(result, Err(Error::StreamError(_))));
    }
}
