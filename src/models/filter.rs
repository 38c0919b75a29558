use std::fmt;

use crate::models::packet::PacketRecord;

/// Expression shown while no filter is active
pub const MATCH_ALL: &str = "ALL";

/// Predicate selected by a display filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// Every packet matches
    All,

    /// Protocol stack contains `tcp`, `udp` or `icmp`
    Protocol(String),

    /// Any of the four transport port fields equals the value
    Port(String),

    /// Source or destination address equals the value
    Host(String),

    /// Unrecognised expression; nothing is hidden
    Passthrough,
}

/// The active display filter. Only affects rendering, never statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFilter {
    /// Expression as shown in status reports (upper-cased)
    expression: String,

    /// Rule parsed from the expression
    rule: FilterRule,
}

impl Default for DisplayFilter {
    fn default() -> Self {
        Self {
            expression: MATCH_ALL.to_string(),
            rule: FilterRule::All,
        }
    }
}

impl DisplayFilter {
    /// Parse a filter expression once, so matching does no string work per packet
    /// beyond the comparison itself.
    pub fn parse(expression: &str) -> Self {
        let normalized = expression.to_lowercase();

        let rule = if normalized.eq_ignore_ascii_case(MATCH_ALL) {
            FilterRule::All
        } else if matches!(normalized.as_str(), "tcp" | "udp" | "icmp") {
            FilterRule::Protocol(normalized.clone())
        } else if let Some(rest) = normalized.strip_prefix("port ") {
            // A missing token compares against the empty string.
            FilterRule::Port(first_token(rest))
        } else if let Some(rest) = normalized.strip_prefix("host ") {
            FilterRule::Host(first_token(rest))
        } else {
            FilterRule::Passthrough
        };

        Self {
            expression: expression.to_uppercase(),
            rule,
        }
    }

    pub fn rule(&self) -> &FilterRule {
        &self.rule
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Decide whether `packet` should be rendered
    pub fn matches(&self, packet: &PacketRecord) -> bool {
        match &self.rule {
            FilterRule::All | FilterRule::Passthrough => true,
            FilterRule::Protocol(name) => packet.protocol_stack.contains(name.as_str()),
            FilterRule::Port(port) => packet.transport_ports.iter().any(|p| p == port),
            FilterRule::Host(host) => packet.source == *host || packet.destination == *host,
        }
    }
}

impl fmt::Display for DisplayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn first_token(rest: &str) -> String {
    rest.split_whitespace().next().unwrap_or_default().to_string()
}
