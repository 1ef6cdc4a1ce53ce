//! Telemetry pacing.

use crate::consts::TELEMETRY_PERIOD_MS;
use crate::hal::FrameSink;
use crate::protocol::ascii::format_telemetry_line;
use crate::protocol::frame::encode_frame;
use crate::protocol::messages::{MessageType, TelemetryPayload};

/// Emits a telemetry record every `period_ms`.
///
/// Frames carry an 8 bit sequence number that starts at zero and wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TelemetryPacer {
    period_ms: u32,
    last_tx_ms: u32,
    seq: u8,
    sent: u32,
}

impl Default for TelemetryPacer {
    fn default() -> Self {
        Self::new(TELEMETRY_PERIOD_MS)
    }
}

impl TelemetryPacer {
    /// Creates a pacer whose first emission is due at `period_ms`.
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_tx_ms: 0,
            seq: 0,
            sent: 0,
        }
    }

    /// Whether a full period has passed since the last emission.
    pub fn should_send(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_tx_ms) >= self.period_ms
    }

    /// Sends `payload` as one binary `TELEMETRY` frame.
    pub fn send<S: FrameSink>(&mut self, payload: &TelemetryPayload, now_ms: u32, sink: &mut S) {
        match encode_frame(MessageType::Telemetry.into(), self.seq, &payload.to_bytes()) {
            Ok(frame) => sink.write_frame(&frame),
            Err(_e) => error!("telemetry encode failed: {}", _e),
        }
        self.seq = self.seq.wrapping_add(1);
        self.mark_sent(now_ms);
    }

    /// Sends `payload` as an ASCII `T` line.
    pub fn send_line<S: FrameSink>(&mut self, payload: &TelemetryPayload, now_ms: u32, sink: &mut S) {
        sink.write_frame(format_telemetry_line(payload).as_bytes());
        self.mark_sent(now_ms);
    }

    fn mark_sent(&mut self, now_ms: u32) {
        self.last_tx_ms = now_ms;
        self.sent = self.sent.wrapping_add(1);
        trace!("telemetry sent at {}", now_ms);
    }

    /// Sequence number the next binary frame will carry.
    pub fn next_seq(&self) -> u8 {
        self.seq
    }

    /// Records emitted so far, wrapping.
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FaultFlags;
    use crate::protocol::frame::FrameParser;

    #[derive(Debug, Default)]
    struct Capture {
        frames: Vec<Vec<u8>>,
    }

    impl FrameSink for Capture {
        fn write_frame(&mut self, frame: &[u8]) {
            self.frames.push(frame.to_vec());
        }
    }

    #[test]
    fn test_pacing() {
        let mut pacer = TelemetryPacer::default();
        let mut sink = Capture::default();
        let mut sent_at = Vec::new();
        for now in 1..=1000 {
            if pacer.should_send(now) {
                pacer.send(&TelemetryPayload::default(), now, &mut sink);
                sent_at.push(now);
            }
        }
        assert_eq!(sent_at.len(), 20);
        assert_eq!(sent_at[0], 50);
        assert!(sent_at.windows(2).all(|w| w[1] - w[0] == 50));
        assert_eq!(pacer.sent(), 20);
        assert_eq!(pacer.next_seq(), 20);
    }

    #[test]
    fn test_frame_contents() {
        let mut pacer = TelemetryPacer::default();
        let mut sink = Capture::default();
        let payload = TelemetryPayload {
            left_duty: 120,
            right_duty: -120,
            bus_mv: 11_100,
            faults: FaultFlags::THERMAL_WARNING,
            age_ms: 3,
        };
        pacer.send(&payload, 50, &mut sink);

        let mut parser = FrameParser::new();
        let complete = sink.frames[0].iter().filter(|&&b| parser.feed(b)).count();
        assert_eq!(complete, 1);
        let frame = parser.frame();
        assert_eq!(frame.message_type(), Some(MessageType::Telemetry));
        assert_eq!(frame.seq, 0);
        assert_eq!(TelemetryPayload::from_bytes(frame.payload()), Ok(payload));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut pacer = TelemetryPacer::new(1);
        let mut sink = Capture::default();
        for now in 1..=257 {
            pacer.send(&TelemetryPayload::default(), now, &mut sink);
        }
        assert_eq!(pacer.next_seq(), 1);
        assert_eq!(sink.frames[255][4], 255);
        assert_eq!(sink.frames[256][4], 0);
    }

    #[test]
    fn test_ascii_line() {
        let mut pacer = TelemetryPacer::default();
        let mut sink = Capture::default();
        pacer.send_line(&TelemetryPayload::default(), 50, &mut sink);
        assert_eq!(sink.frames[0], b"T 0 0 0 0 0\n");
        assert!(!pacer.should_send(99));
        assert!(pacer.should_send(100));
        assert_eq!(pacer.next_seq(), 0);
    }

    #[test]
    fn test_timer_wrap() {
        let mut pacer = TelemetryPacer::default();
        let mut sink = Capture::default();
        pacer.send(&TelemetryPayload::default(), u32::MAX - 10, &mut sink);
        assert!(!pacer.should_send(20));
        assert!(pacer.should_send(39));
    }
}
