use std::fmt;

/// Number of fields the provider emits for every packet
pub const FIELD_COUNT: usize = 7;

/// Transport classification of a captured packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    /// Classify a lowercase protocol stack string such as `eth:ethertype:ip:tcp`.
    ///
    /// The first match wins in the order tcp, udp, icmp.
    pub fn classify(protocol_stack: &str) -> Self {
        if protocol_stack.contains("tcp") {
            Protocol::Tcp
        } else if protocol_stack.contains("udp") {
            Protocol::Udp
        } else if protocol_stack.contains("icmp") {
            Protocol::Icmp
        } else {
            Protocol::Other
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// One packet as reported by the capture provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// Source host address
    pub source: String,

    /// Destination host address
    pub destination: String,

    /// TCP source, TCP destination, UDP source, UDP destination. Empty when absent.
    pub transport_ports: [String; 4],

    /// Lowercased layered protocol names, e.g. `eth:ethertype:ip:udp:dns`
    pub protocol_stack: String,
}

impl PacketRecord {
    /// Parse one provider line.
    ///
    /// Returns `None` for partial lines with fewer than [`FIELD_COUNT`] fields.
    pub fn parse(line: &str, separator: char) -> Option<Self> {
        let mut fields = line.trim().split(separator);
        let mut next = || fields.next().map(str::to_string);

        let source = next()?;
        let destination = next()?;
        let transport_ports = [next()?, next()?, next()?, next()?];
        let protocol_stack = next()?.to_lowercase();

        Some(Self {
            source,
            destination,
            transport_ports,
            protocol_stack,
        })
    }

    /// Transport classification of this packet
    pub fn protocol(&self) -> Protocol {
        Protocol::classify(&self.protocol_stack)
    }

    /// Human label shown next to the addresses
    pub fn label(&self) -> String {
        match self.protocol() {
            Protocol::Other => self.protocol_stack.to_uppercase(),
            known => known.to_string(),
        }
    }

    /// Render the console line for this packet
    pub fn summary_line(&self) -> String {
        format!("{:>15} -> {:<15}  {}", self.source, self.destination, self.label())
    }
}
