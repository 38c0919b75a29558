use std::fmt;
use std::io;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::models::stats::StatsSnapshot;

/// Everything the status line shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub stats: StatsSnapshot,
    pub paused: bool,
    pub filter: String,
}

impl StatusReport {
    pub fn state_label(&self) -> &'static str {
        if self.paused {
            "PAUSED"
        } else {
            "RUNNING"
        }
    }

    /// Write the status line, colouring the labels when `out` supports it
    pub fn write_to<W: WriteColor>(&self, out: &mut W) -> io::Result<()> {
        let stats = &self.stats;
        let fields: [(&str, Option<Color>, String); 7] = [
            ("TOTAL:", None, stats.total_packets.to_string()),
            ("TCP:", Some(Color::Cyan), stats.tcp_packets.to_string()),
            ("UDP:", Some(Color::Green), stats.udp_packets.to_string()),
            ("ICMP:", Some(Color::Yellow), stats.icmp_packets.to_string()),
            ("PPS:", Some(Color::Magenta), stats.packet_rate.to_string()),
            ("FILTER:", None, self.filter.clone()),
            ("STATE:", None, self.state_label().to_string()),
        ];

        for (i, (label, color, value)) in fields.iter().enumerate() {
            if i > 0 {
                write!(out, " | ")?;
            }
            // Only the counters carry colour and weight; filter and state stay plain.
            if i < 5 {
                out.set_color(ColorSpec::new().set_bold(color.is_none()).set_fg(*color))?;
                write!(out, "{}", label)?;
                out.reset()?;
            } else {
                write!(out, "{}", label)?;
            }
            write!(out, " {}", value)?;
        }
        writeln!(out)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TOTAL: {} | TCP: {} | UDP: {} | ICMP: {} | PPS: {} | FILTER: {} | STATE: {}",
            self.stats.total_packets,
            self.stats.tcp_packets,
            self.stats.udp_packets,
            self.stats.icmp_packets,
            self.stats.packet_rate,
            self.filter,
            self.state_label()
        )
    }
}
