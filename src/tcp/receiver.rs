use tracing::debug;

use crate::tcp::byte_stream::ByteStream;
use crate::tcp::reassembler::Reassembler;
use crate::tcp::segment::{AckReport, TcpSegment};
use crate::tcp::wrap32::Wrap32;

/// The inbound half of a connection: turns arriving segments into
/// reassembler insertions and reports ack/window state back to the peer.
#[derive(Debug)]
pub struct TcpReceiver {
    reassembler: Reassembler,
    zero_point: Option<Wrap32>,
}

impl TcpReceiver {
    pub fn new(reassembler: Reassembler) -> Self {
        TcpReceiver {
            reassembler,
            zero_point: None,
        }
    }

    /// Process one segment from the peer.
    ///
    /// Segments that arrive before a SYN has fixed the zero point are
    /// dropped, as is any non-SYN segment claiming the SYN's own slot.
    pub fn receive(&mut self, seg: TcpSegment) {
        if seg.rst() {
            debug!("received RST, stream errored");
            self.reassembler.output_mut().set_error();
        }
        if seg.syn() {
            // The first SYN fixes the zero point; later ones only carry data
            if self.zero_point.is_none() {
                self.zero_point = Some(seg.seq_no);
            }
            let fin = seg.fin();
            self.reassembler.insert(0, seg.payload, fin);
        } else if let Some(zero_point) = self.zero_point {
            let checkpoint = self.reassembler.output().bytes_pushed();
            let abs_seq = seg.seq_no.unwrap(zero_point, checkpoint);
            if abs_seq == 0 {
                return;
            }
            // Stream index: sequence numbers count the SYN, stream bytes don't
            let first_index = abs_seq - 1;
            let fin = seg.fin();
            self.reassembler.insert(first_index, seg.payload, fin);
        }
    }

    /// The report for the peer: cumulative ack, window, and error state
    pub fn send(&self) -> AckReport {
        let available = self.reassembler.output().available_capacity();
        let window = available.min(65535) as u16;

        let ack_no = self.zero_point.map(|zero_point| {
            let pushed = self.reassembler.output().bytes_pushed();
            let fin_acked = self.reassembler.output().is_closed() as u64;
            Wrap32::wrap(pushed + 1 + fin_acked, zero_point)
        });

        AckReport {
            ack_no,
            window,
            rst: self.reassembler.output().has_error(),
        }
    }

    /// The reassembled inbound stream
    pub fn output(&self) -> &ByteStream {
        self.reassembler.output()
    }

    pub fn output_mut(&mut self) -> &mut ByteStream {
        self.reassembler.output_mut()
    }

    /// Bytes held for reassembly, not yet contiguous
    pub fn bytes_pending(&self) -> u64 {
        self.reassembler.bytes_pending()
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::segment::TcpFlags;

    fn create_receiver(capacity: usize) -> TcpReceiver {
        TcpReceiver::new(Reassembler::new(ByteStream::new(capacity)))
    }

    fn make_seg(seq_no: u32, flags: TcpFlags, payload: &[u8]) -> TcpSegment {
        TcpSegment {
            seq_no: Wrap32::new(seq_no),
            flags,
            payload: payload.to_vec(),
        }
    }

    // -- Test ack generation --

    #[test]
    fn test_no_ack_before_syn() {
        let receiver = create_receiver(4000);
        let report = receiver.send();
        assert_eq!(report.ack_no, None);
        assert_eq!(report.window, 4000);
        assert!(!report.rst);
    }

    #[test]
    fn test_syn_acked_with_one_seq_no() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(5, TcpFlags::SYN, b""));
        let report = receiver.send();
        assert_eq!(report.ack_no, Some(Wrap32::new(6)));
    }

    #[test]
    fn test_syn_near_wraparound() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(u32::MAX, TcpFlags::SYN, b""));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(0)));
    }

    #[test]
    fn test_data_advances_ack() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(100, TcpFlags::SYN, b""));
        receiver.receive(make_seg(101, TcpFlags::empty(), b"abcd"));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(105)));
        assert_eq!(receiver.output().bytes_pushed(), 4);
    }

    #[test]
    fn test_syn_with_payload_and_fin_acks_both_flags() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(7, TcpFlags::SYN | TcpFlags::FIN, b"ab"));
        // SYN + 2 bytes + FIN: ack covers all four sequence numbers
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(11)));
        assert!(receiver.output().is_closed());
    }

    #[test]
    fn test_syn_and_fin_alone_ack_two_seq_nos() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(200, TcpFlags::SYN | TcpFlags::FIN, b""));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(202)));
        assert!(receiver.output().is_finished());
    }

    // -- Test window --

    #[test]
    fn test_window_clamped_to_u16() {
        let receiver = create_receiver(100_000);
        assert_eq!(receiver.send().window, 65535);
    }

    #[test]
    fn test_window_shrinks_with_buffered_bytes() {
        let mut receiver = create_receiver(16);
        receiver.receive(make_seg(0, TcpFlags::SYN, b""));
        receiver.receive(make_seg(1, TcpFlags::empty(), b"0123456789"));
        assert_eq!(receiver.send().window, 6);

        // Popping frees window space
        receiver.output_mut().read_bytes(10);
        assert_eq!(receiver.send().window, 16);
    }

    // -- Test out-of-order segments --

    #[test]
    fn test_gap_holds_ack_back() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(0, TcpFlags::SYN, b""));
        receiver.receive(make_seg(5, TcpFlags::empty(), b"efgh"));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(1)));
        assert_eq!(receiver.bytes_pending(), 4);

        receiver.receive(make_seg(1, TcpFlags::empty(), b"abcd"));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(9)));
        assert_eq!(receiver.bytes_pending(), 0);
        assert_eq!(receiver.output_mut().read_bytes(8), b"abcdefgh");
    }

    #[test]
    fn test_fin_out_of_order_defers_close() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(0, TcpFlags::SYN, b""));
        receiver.receive(make_seg(3, TcpFlags::FIN, b"cd"));
        assert!(!receiver.output().is_closed());
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(1)));

        receiver.receive(make_seg(1, TcpFlags::empty(), b"ab"));
        assert!(receiver.output().is_closed());
        // 4 bytes + SYN + FIN
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(6)));
    }

    // -- Test garbage handling --

    #[test]
    fn test_segment_before_syn_is_dropped() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(10, TcpFlags::empty(), b"abcd"));
        assert_eq!(receiver.send().ack_no, None);
        assert_eq!(receiver.output().bytes_pushed(), 0);
        assert_eq!(receiver.bytes_pending(), 0);
    }

    #[test]
    fn test_non_syn_segment_at_zero_point_is_dropped() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(50, TcpFlags::SYN, b""));
        // Claims the SYN's own sequence number without the flag
        receiver.receive(make_seg(50, TcpFlags::empty(), b"junk"));
        assert_eq!(receiver.output().bytes_pushed(), 0);
        assert_eq!(receiver.bytes_pending(), 0);
    }

    #[test]
    fn test_first_syn_fixes_zero_point() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(10, TcpFlags::SYN, b""));
        receiver.receive(make_seg(99, TcpFlags::SYN, b""));
        assert_eq!(receiver.send().ack_no, Some(Wrap32::new(11)));
    }

    // -- Test reset --

    #[test]
    fn test_rst_sets_error() {
        let mut receiver = create_receiver(4000);
        receiver.receive(make_seg(0, TcpFlags::SYN, b""));
        assert!(!receiver.send().rst);

        receiver.receive(make_seg(1, TcpFlags::RST, b""));
        assert!(receiver.output().has_error());
        assert!(receiver.send().rst);
    }
}
