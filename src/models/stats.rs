use serde::Serialize;
use std::time::{Duration, Instant};

use crate::models::packet::Protocol;

/// Width of the packets-per-second sampling window
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Running statistics for the current capture
#[derive(Debug, Clone)]
pub struct CaptureStats {
    /// Total number of packets ingested
    pub total_packets: u64,

    /// Packets classified as TCP
    pub tcp_packets: u64,

    /// Packets classified as UDP
    pub udp_packets: u64,

    /// Packets classified as ICMP
    pub icmp_packets: u64,

    /// Packets per second measured over the last complete window
    pub packet_rate: u64,

    /// `total_packets` when the current window opened
    last_total_snapshot: u64,

    /// When the current window opened
    last_snapshot_time: Instant,
}

/// Point-in-time copy of the counters, taken for status reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_packets: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub icmp_packets: u64,
    pub other_packets: u64,
    pub packet_rate: u64,
}

impl CaptureStats {
    /// Empty statistics whose first rate window opens at `start`
    pub fn started_at(start: Instant) -> Self {
        Self {
            total_packets: 0,
            tcp_packets: 0,
            udp_packets: 0,
            icmp_packets: 0,
            packet_rate: 0,
            last_total_snapshot: 0,
            last_snapshot_time: start,
        }
    }

    /// Count one packet observed at `now`
    pub fn record(&mut self, protocol: Protocol, now: Instant) {
        self.total_packets += 1;
        match protocol {
            Protocol::Tcp => self.tcp_packets += 1,
            Protocol::Udp => self.udp_packets += 1,
            Protocol::Icmp => self.icmp_packets += 1,
            Protocol::Other => {}
        }

        // Only roll the window when traffic arrives; idle periods keep the last rate.
        if now.saturating_duration_since(self.last_snapshot_time) >= RATE_WINDOW {
            self.packet_rate = self.total_packets - self.last_total_snapshot;
            self.last_total_snapshot = self.total_packets;
            self.last_snapshot_time = now;
        }
    }

    /// Packets that were neither TCP, UDP nor ICMP
    pub fn other_packets(&self) -> u64 {
        self.total_packets - self.tcp_packets - self.udp_packets - self.icmp_packets
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_packets: self.total_packets,
            tcp_packets: self.tcp_packets,
            udp_packets: self.udp_packets,
            icmp_packets: self.icmp_packets,
            other_packets: self.other_packets(),
            packet_rate: self.packet_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn each_packet_lands_in_exactly_one_bucket() {
        let start = Instant::now();
        let mut stats = CaptureStats::started_at(start);

        stats.record(Protocol::Tcp, start);
        stats.record(Protocol::Udp, start);
        stats.record(Protocol::Icmp, start);
        stats.record(Protocol::Other, start);
        stats.record(Protocol::Tcp, start);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_packets, 5);
        assert_eq!(snapshot.tcp_packets, 2);
        assert_eq!(snapshot.udp_packets, 1);
        assert_eq!(snapshot.icmp_packets, 1);
        assert_eq!(snapshot.other_packets, 1);
        assert_eq!(
            snapshot.total_packets,
            snapshot.tcp_packets + snapshot.udp_packets + snapshot.icmp_packets + snapshot.other_packets
        );
    }

    #[test]
    fn rate_steps_once_per_window() {
        let start = Instant::now();
        let mut stats = CaptureStats::started_at(start);

        for i in 1..100 {
            stats.record(Protocol::Udp, at(start, i * 10));
            assert_eq!(stats.packet_rate, 0, "no window has closed yet");
        }

        // The hundredth packet arrives exactly on the boundary.
        stats.record(Protocol::Udp, at(start, 1000));
        assert_eq!(stats.total_packets, 100);
        assert_eq!(stats.packet_rate, 100);

        // Two idle seconds: nothing recomputes the rate.
        assert_eq!(stats.snapshot().packet_rate, 100);

        // Traffic resumes after the idle gap: one packet in the new window.
        stats.record(Protocol::Udp, at(start, 3500));
        assert_eq!(stats.packet_rate, 1);

        // Within the same window the rate holds.
        stats.record(Protocol::Udp, at(start, 3900));
        assert_eq!(stats.packet_rate, 1);
    }

    #[test]
    fn rate_ignores_clock_going_backwards() {
        let start = Instant::now() + Duration::from_secs(5);
        let mut stats = CaptureStats::started_at(start);

        stats.record(Protocol::Tcp, start - Duration::from_secs(2));
        assert_eq!(stats.packet_rate, 0);
        assert_eq!(stats.total_packets, 1);
    }
}
