use crate::tcp::wrap32::Wrap32;

/// Per-connection tunables. `Default` gives the standard values; tests pin
/// `fixed_isn` to make sequence numbers predictable.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Initial retransmission timeout in milliseconds
    pub rt_timeout_ms: u64,
    /// Capacity of the outbound stream
    pub send_capacity: usize,
    /// Capacity of the inbound (reassembled) stream
    pub recv_capacity: usize,
    /// Initial sequence number, or `None` to draw one at random
    pub fixed_isn: Option<Wrap32>,
}

impl TcpConfig {
    /// Largest payload carried by a single segment
    pub const MAX_PAYLOAD_SIZE: usize = 1000;
    /// Default capacity of either stream
    pub const DEFAULT_CAPACITY: usize = 64000;
    /// Default initial retransmission timeout
    pub const TIMEOUT_DEFAULT_MS: u64 = 1000;
    /// Consecutive retransmissions after which a connection is given up on
    pub const MAX_RETX_ATTEMPTS: u64 = 8;

    /// The ISN to use: the pinned one, or a fresh random draw
    pub fn isn(&self) -> Wrap32 {
        self.fixed_isn.unwrap_or_else(Wrap32::random)
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            rt_timeout_ms: Self::TIMEOUT_DEFAULT_MS,
            send_capacity: Self::DEFAULT_CAPACITY,
            recv_capacity: Self::DEFAULT_CAPACITY,
            fixed_isn: None,
        }
    }
}
