use std::collections::VecDeque;

use tracing::debug;

use crate::config::TcpConfig;
use crate::tcp::byte_stream::ByteStream;
use crate::tcp::segment::{AckReport, TcpFlags, TcpSegment};
use crate::tcp::wrap32::Wrap32;

/// The outbound half of a connection.
///
/// Reads from its input stream, cuts segments to fit the peer's window,
/// and retransmits the earliest outstanding segment on timeout with
/// exponential back-off. Time only advances through `tick`.
#[derive(Debug)]
pub struct TcpSender {
    input: ByteStream,
    isn: Wrap32,
    sent_syn: bool,
    sent_fin: bool,
    outstanding: VecDeque<TcpSegment>, // Sent but not yet fully acknowledged
    rto_initial_ms: u64,
    rto_ms: u64,
    timer_armed: bool,
    consecutive_retransmissions: u64,
    elapsed_ms: u64, // Time accrued toward the current timeout
    next_seqno: u64,
    ack_seqno: u64, // Highest cumulative ack from the peer
    peer_window: u16,
    in_flight: u64,
}

impl TcpSender {
    pub fn new(input: ByteStream, isn: Wrap32, rto_initial_ms: u64) -> Self {
        TcpSender {
            input,
            isn,
            sent_syn: false,
            sent_fin: false,
            outstanding: VecDeque::new(),
            rto_initial_ms,
            rto_ms: rto_initial_ms,
            timer_armed: false,
            consecutive_retransmissions: 0,
            elapsed_ms: 0,
            next_seqno: 0,
            ack_seqno: 0,
            // Before the first report arrives, probe with a one-byte window
            peer_window: 1,
            in_flight: 0,
        }
    }

    pub fn with_config(input: ByteStream, config: &TcpConfig) -> Self {
        TcpSender::new(input, config.isn(), config.rt_timeout_ms)
    }

    /// Cut as many segments as the peer's window allows and hand each to
    /// `transmit`. The SYN goes out alone with whatever payload and FIN
    /// fit beside it; afterwards the stream is segmented greedily.
    pub fn push<F>(&mut self, mut transmit: F)
    where
        F: FnMut(&TcpSegment),
    {
        if self.sent_fin {
            return;
        }
        // A closed window is probed as if it were one byte wide
        let window = if self.peer_window > 0 {
            self.peer_window as u64
        } else {
            1
        };

        if !self.sent_syn {
            let mut seg = TcpSegment {
                seq_no: self.isn,
                flags: TcpFlags::SYN,
                payload: Vec::new(),
            };
            if self.input.has_error() {
                seg.flags |= TcpFlags::RST;
            }
            self.next_seqno += 1;
            if self.input.bytes_buffered() > 0 && self.ack_seqno + window > self.next_seqno {
                let room = (window - (self.next_seqno - self.ack_seqno)) as usize;
                let size = TcpConfig::MAX_PAYLOAD_SIZE
                    .min(room)
                    .min(self.input.bytes_buffered());
                seg.payload = self.input.read_bytes(size);
                self.next_seqno += seg.payload.len() as u64;
            }
            if self.input.is_finished() && self.ack_seqno + window > self.next_seqno {
                seg.flags |= TcpFlags::FIN;
                self.sent_fin = true;
                self.next_seqno += 1;
            }
            transmit(&seg);
            self.sent_syn = true;
            self.in_flight += seg.sequence_length();
            self.outstanding.push_back(seg);
            if !self.timer_armed {
                self.timer_armed = true;
                self.elapsed_ms = 0;
            }
            return;
        }

        // A finished stream with window room left gets a bare FIN
        if self.input.is_finished() && self.ack_seqno + window > self.next_seqno {
            let mut seg = TcpSegment {
                seq_no: Wrap32::wrap(self.next_seqno, self.isn),
                flags: TcpFlags::FIN,
                payload: Vec::new(),
            };
            if self.input.has_error() {
                seg.flags |= TcpFlags::RST;
            }
            transmit(&seg);
            self.in_flight += seg.sequence_length();
            self.outstanding.push_back(seg);
            self.sent_fin = true;
            self.next_seqno += 1;
            if !self.timer_armed {
                self.timer_armed = true;
                self.elapsed_ms = 0;
            }
        }

        while self.input.bytes_buffered() > 0 && self.ack_seqno + window > self.next_seqno {
            let room = (window - (self.next_seqno - self.ack_seqno)) as usize;
            let size = TcpConfig::MAX_PAYLOAD_SIZE
                .min(room)
                .min(self.input.bytes_buffered());
            let mut seg = TcpSegment {
                seq_no: Wrap32::wrap(self.next_seqno, self.isn),
                flags: TcpFlags::empty(),
                payload: self.input.read_bytes(size),
            };
            if self.input.has_error() {
                seg.flags |= TcpFlags::RST;
            }
            self.next_seqno += seg.sequence_length();
            // The FIN rides along if the stream just drained and it fits
            if self.input.is_finished() && self.ack_seqno + window > self.next_seqno {
                seg.flags |= TcpFlags::FIN;
                self.sent_fin = true;
                self.next_seqno += 1;
            }
            transmit(&seg);
            self.in_flight += seg.sequence_length();
            self.outstanding.push_back(seg);
            if !self.timer_armed {
                self.timer_armed = true;
                self.elapsed_ms = 0;
            }
        }
    }

    /// An empty segment at the next sequence number, for acks and probes
    pub fn empty_segment(&self) -> TcpSegment {
        let mut flags = TcpFlags::empty();
        if self.input.has_error() {
            flags |= TcpFlags::RST;
        }
        TcpSegment {
            seq_no: Wrap32::wrap(self.next_seqno, self.isn),
            flags,
            payload: Vec::new(),
        }
    }

    /// Process an ack/window report from the peer's receiver.
    ///
    /// Only segments covered in full leave the outstanding queue; an ack
    /// that advances into the middle of a segment changes the window but
    /// leaves the segment in flight and the timer running.
    pub fn receive(&mut self, report: AckReport) {
        if report.rst {
            debug!("peer reset, erroring outbound stream");
            self.input.set_error();
            return;
        }
        let abs_ack = match report.ack_no {
            Some(ack_no) => ack_no.unwrap(self.isn, self.next_seqno),
            None => {
                self.peer_window = report.window;
                return;
            }
        };
        // Acks for sequence numbers never sent are ignored
        if abs_ack > self.next_seqno {
            return;
        }
        if abs_ack >= self.ack_seqno {
            self.ack_seqno = abs_ack;
            self.peer_window = report.window;
        }
        while let Some(front) = self.outstanding.front() {
            let seg_len = front.sequence_length();
            let seg_start = front.seq_no.unwrap(self.isn, self.next_seqno);
            if abs_ack < seg_start + seg_len {
                return;
            }
            self.outstanding.pop_front();
            self.in_flight -= seg_len;
            self.rto_ms = self.rto_initial_ms;
            self.consecutive_retransmissions = 0;
            self.elapsed_ms = 0;
        }
        self.timer_armed = !self.outstanding.is_empty();
    }

    /// Account for `ms_since_last_tick` milliseconds of elapsed time,
    /// retransmitting the earliest outstanding segment on expiry.
    pub fn tick<F>(&mut self, ms_since_last_tick: u64, mut transmit: F)
    where
        F: FnMut(&TcpSegment),
    {
        if !self.timer_armed {
            return;
        }
        self.elapsed_ms += ms_since_last_tick;
        if self.elapsed_ms >= self.rto_ms {
            if let Some(front) = self.outstanding.front() {
                debug!(
                    "retransmit after {} ms, {} consecutive so far",
                    self.rto_ms, self.consecutive_retransmissions
                );
                transmit(front);
                self.elapsed_ms = 0;
                // A closed peer window means the probe is expected to go
                // unanswered; don't back off for it
                if self.peer_window > 0 {
                    self.consecutive_retransmissions += 1;
                    self.rto_ms *= 2;
                }
            }
        }
    }

    /// Sequence numbers sent but not yet fully acknowledged
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.in_flight
    }

    /// Retransmissions since the last fully acknowledged segment
    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    /// The outbound stream the application writes into
    pub fn input(&self) -> &ByteStream {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ByteStream {
        &mut self.input
    }
}

// -- Unit tests --
