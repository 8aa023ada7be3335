//! Traffic and error counters

/// Counters of sent/received packets and bytes
///
/// Counters wrap on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statistics {
    /// Packets successfully encoded
    pub packets_sent: u32,
    /// Packets successfully decoded
    pub packets_received: u32,
    /// CRC failures reported by the embedding system
    pub crc_errors: u32,
    /// Framing failures reported by the embedding system
    pub frame_errors: u32,
    /// Link failures reported by the embedding system
    pub link_errors: u32,
    /// Encoded frame bytes, header and CRC included
    pub bytes_sent: u32,
    /// Received wire bytes
    pub bytes_received: u32,
}

impl Statistics {
    /// Record one sent frame of `bytes` wire bytes
    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent = self.packets_sent.wrapping_add(1);
        self.bytes_sent = self.bytes_sent.wrapping_add(bytes as u32);
    }

    /// Record one received frame of `bytes` wire bytes
    pub fn record_received(&mut self, bytes: usize) {
        self.packets_received = self.packets_received.wrapping_add(1);
        self.bytes_received = self.bytes_received.wrapping_add(bytes as u32);
    }

    /// Record a CRC failure
    pub fn record_crc_error(&mut self) {
        self.crc_errors = self.crc_errors.wrapping_add(1);
    }

    /// Record a framing failure
    pub fn record_frame_error(&mut self) {
        self.frame_errors = self.frame_errors.wrapping_add(1);
    }

    /// Record a link failure
    pub fn record_link_error(&mut self) {
        self.link_errors = self.link_errors.wrapping_add(1);
    }

    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Statistics::default();
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sent {} packets ({} bytes), received {} packets ({} bytes), errors crc={} frame={} link={}",
            self.packets_sent,
            self.bytes_sent,
            self.packets_received,
            self.bytes_received,
            self.crc_errors,
            self.frame_errors,
            self.link_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_and_reset() {
        let mut stats = Statistics::default();
        stats.record_sent(20);
        stats.record_received(20);
        stats.record_crc_error();
        stats.record_frame_error();
        stats.record_link_error();

        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.bytes_sent, 20);
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.bytes_received, 20);
        assert_eq!((stats.crc_errors, stats.frame_errors, stats.link_errors), (1, 1, 1));

        stats.reset();
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_counters_wrap() {
        let mut stats = Statistics {
            packets_sent: u32::MAX,
            ..Default::default()
        };
        stats.record_sent(1);
        assert_eq!(stats.packets_sent, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let mut stats = Statistics::default();
        stats.record_sent(9);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"bytes_sent\":9"));
        let back: Statistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
