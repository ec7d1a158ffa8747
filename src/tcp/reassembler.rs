use crate::tcp::byte_stream::ByteStream;
use std::collections::BTreeMap;
use std::io;
use std::io::Read;

/// Accepts ranges of a byte stream in any order and writes the longest
/// contiguous prefix into a `ByteStream`.
///
/// Ranges are clipped to the stream's acceptance window before being
/// stored, so the space pending reassembly never exceeds the output
/// stream's spare capacity.
#[derive(Debug)]
pub struct Reassembler {
    segments: BTreeMap<u64, Box<[u8]>>, // Out-of-order segments. key = start index
    output: ByteStream,                 // The assembled ByteStream, ready to be read
    next_byte_idx: u64,                 // The next byte index expected to write
    last_byte_idx: Option<u64>,         // The index one past the final byte, if known
    last_recvd: bool,                   // Has the closing range been seen?
}

impl Reassembler {
    /// New `Reassembler` with the provided `ByteStream` as output
    pub fn new(output: ByteStream) -> Self {
        Reassembler {
            segments: BTreeMap::new(),
            output,
            next_byte_idx: 0,
            last_byte_idx: None,
            last_recvd: false,
        }
    }

    /// Insert a range of the stream starting at `first_index`.
    /// `is_last` marks the range as containing the final byte.
    pub fn insert(&mut self, first_index: u64, data: impl Into<Box<[u8]>>, is_last: bool) {
        if self.output.is_closed() {
            return;
        }
        let data: Box<[u8]> = data.into();

        if is_last {
            self.last_recvd = true;
            self.last_byte_idx = Some(first_index + data.len() as u64);
        }

        // An empty closing range with nothing pending ends the stream at
        // once, wherever its index points.
        if is_last && data.is_empty() && self.segments.is_empty() {
            self.output.close();
            return;
        }

        self.insert_buffer(first_index, &data);
        self.write_output();

        if self.is_done() {
            self.output.close();
        }
    }

    /// The total number of bytes pending reassembly in the buffer
    pub fn bytes_pending(&self) -> u64 {
        self.segments.values().map(|segment| segment.len() as u64).sum()
    }

    /// The underlying `ByteStream` output
    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }

    /// The index of the next byte to be written to the output
    pub fn next_byte_idx(&self) -> u64 {
        self.next_byte_idx
    }

    /// Insert data into the buffer, merging overlapping segments
    fn insert_buffer(&mut self, first_index: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let last_idx = first_index + data.len() as u64;

        // Ignore the segment if it's entirely before the next expected byte
        if last_idx <= self.next_byte_idx {
            return;
        }

        // Clip to the acceptance window
        let start = first_index.max(self.next_byte_idx);
        let end = last_idx.min(self.next_byte_idx + self.output.available_capacity() as u64);

        if start >= end {
            return; // No capacity to buffer
        }

        // The effective slice of data that fits within [start, end)
        let offset = (start - first_index) as usize;
        let window = &data[offset..(end - first_index) as usize];
        let mut merged = window.to_vec();
        let mut m_start = start;
        let m_end = end;

        let overlapping_segments = self.find_overlapping_segments(m_start, m_end);

        // Merge all overlapping segments with the new segment
        for (seg_start, seg_data) in overlapping_segments {
            self.segments.remove(&seg_start);

            let seg_end = seg_start + seg_data.len() as u64;

            if seg_end <= m_end {
                // Fully contained within [m_start, m_end)
                m_start = m_start.min(seg_start);

                let insert_idx = (seg_start - m_start) as usize;
                let req_len = (m_end - m_start) as usize;

                if merged.len() < req_len {
                    merged.resize(req_len, 0);
                }

                // Overlay the existing segment data onto merged data
                merged[insert_idx..(insert_idx + seg_data.len())].copy_from_slice(&seg_data);
            } else {
                // Partial overlap: seg_end > m_end
                m_start = m_start.min(seg_start);

                let overlap_len = (m_end - seg_start) as usize;
                let insert_idx = (seg_start - m_start) as usize;
                let req_len = (m_end - m_start) as usize;

                if merged.len() < req_len {
                    merged.resize(req_len, 0);
                }

                // Overlay only the overlapping part onto merged data
                merged[insert_idx..(insert_idx + overlap_len)]
                    .copy_from_slice(&seg_data[..overlap_len]);

                // Preserve the non-overlapping tail as its own segment
                let rem_data = seg_data[overlap_len..].to_vec();
                self.segments.insert(m_end, rem_data.into_boxed_slice());
            }
        }

        // Overlay the new incoming data into merged data
        let new_idx = (start - m_start) as usize;
        merged[new_idx..(new_idx + window.len())].copy_from_slice(window);

        // Insert merged segment back into the BTreeMap
        self.segments.insert(m_start, merged.into_boxed_slice());
    }

    fn find_overlapping_segments(&self, start: u64, end: u64) -> Vec<(u64, Box<[u8]>)> {
        self.segments
            .range(..end)
            .filter_map(|(&seg_start, seg_data)| {
                let seg_end = seg_start + seg_data.len() as u64;
                if seg_end > start {
                    Some((seg_start, seg_data.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Write contiguous data from the buffer to the output `ByteStream`
    fn write_output(&mut self) {
        while let Some(data) = self.segments.remove(&self.next_byte_idx) {
            // Clipping at insert keeps every pending span inside the
            // acceptance window, so the whole span fits.
            let written = self.output.push(&data);
            debug_assert_eq!(written, data.len());
            self.next_byte_idx += data.len() as u64;
        }
    }

    /// Check if all the data up to the final byte has been written out
    fn is_done(&self) -> bool {
        if self.last_recvd && self.segments.is_empty() {
            if let Some(last_idx) = self.last_byte_idx {
                if self.next_byte_idx >= last_idx {
                    return true;
                }
            }
        }
        false
    }
}

impl Read for Reassembler {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}
