use bitflags::bitflags;

use crate::tcp::wrap32::Wrap32;

bitflags! {
    // Bit positions [ CWR, ECE, URG, ACK, PSH, RST, SYN, FIN ]
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct TcpFlags: u8 {
        const CWR = 1 << 7;
        const ECE = 1 << 6;
        const URG = 1 << 5;
        const ACK = 1 << 4;
        const PSH = 1 << 3;
        const RST = 1 << 2;
        const SYN = 1 << 1;
        const FIN = 1 << 0;
    }
}

/// One message from sender to receiver: a position on the sequence circle,
/// control flags, and a slice of the outbound stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpSegment {
    pub seq_no: Wrap32,
    pub flags: TcpFlags,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    /// How much sequence space this segment occupies.
    /// SYN and FIN each take one number in addition to the payload.
    pub fn sequence_length(&self) -> u64 {
        self.syn() as u64 + self.payload.len() as u64 + self.fin() as u64
    }

    pub fn syn(&self) -> bool {
        self.flags.contains(TcpFlags::SYN)
    }

    pub fn fin(&self) -> bool {
        self.flags.contains(TcpFlags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags.contains(TcpFlags::RST)
    }
}

/// The receiver's report back to the sender: the cumulative ack (absent
/// until a SYN has fixed the zero point), the flow-control window, and
/// the reset latch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckReport {
    pub ack_no: Option<Wrap32>,
    pub window: u16,
    pub rst: bool,
}

// -- Unit tests --
