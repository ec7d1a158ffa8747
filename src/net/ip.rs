use std::net::Ipv4Addr;

use bitflags::bitflags;

use crate::net::errors::ParseError;

pub const IP_HEADER_LEN: usize = 20;
pub const PROTOCOL_TCP: u8 = 6;

bitflags! {
    // Bit positions [ RF, DF, MF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 ]
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct IpFlags: u16 {
        const RF = 1 << 15; // Reserved Flag
        const DF = 1 << 14; // Don't Fragment
        const MF = 1 << 13; // More Fragments
    }
}

impl IpFlags {
    /// Pack the flags and fragment offset into a single u16
    pub fn pack(self, frag_offset: u16) -> u16 {
        self.bits() | (frag_offset & 0x1fff)
    }

    /// Unpack the flags and fragment offset from a single u16
    pub fn unpack(bits: u16) -> (Self, u16) {
        let top3 = Self::from_bits_truncate(bits & 0xe000);
        let bottom13 = bits & 0x1fff;
        (top3, bottom13)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IpHeader {
    pub version: u8, // Always 4 for IPv4
    pub ihl: u8,     // Always 5 since we carry no options
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags: IpFlags,   // 3 bits, part of u16
    pub frag_offset: u16, // 13 bits, part of u16
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

impl IpHeader {
    /// Serialize an `IpHeader` into a byte array of size 20.
    /// The checksum field is recomputed from the serialized bytes.
    pub fn to_bytes(&self) -> [u8; IP_HEADER_LEN] {
        let mut buf = [0u8; IP_HEADER_LEN];
        buf[0] = (self.version << 4) | self.ihl;
        buf[1] = self.tos;
        buf[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        let flags = self.flags.pack(self.frag_offset);
        buf[6..8].copy_from_slice(&flags.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        // Checksum bytes stay 0 while the sum is taken
        buf[12..16].copy_from_slice(&self.src_ip.octets());
        buf[16..20].copy_from_slice(&self.dst_ip.octets());

        let checksum = Self::checksum(&buf);
        buf[10..12].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Parse a byte array into an `IpHeader`.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < IP_HEADER_LEN {
            return Err(ParseError::Truncated {
                expected: IP_HEADER_LEN,
                actual: buf.len(),
            });
        }

        if Self::checksum(&buf[0..IP_HEADER_LEN]) != 0 {
            return Err(ParseError::BadChecksum("IP".to_string()));
        }

        let version = buf[0] >> 4;
        let ihl = buf[0] & 0x0f;
        if version != 4 {
            return Err(ParseError::Unsupported("ip version".to_string()));
        }
        if ihl != 5 {
            return Err(ParseError::Unsupported("ip header length".to_string()));
        }
        let tos = buf[1];
        let total_len = u16::from_be_bytes([buf[2], buf[3]]);
        let id = u16::from_be_bytes([buf[4], buf[5]]);
        let combo_flags = u16::from_be_bytes([buf[6], buf[7]]);
        let (flags, frag_offset) = IpFlags::unpack(combo_flags);
        let ttl = buf[8];
        let protocol = buf[9];
        let checksum = u16::from_be_bytes([buf[10], buf[11]]);
        let src_ip = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
        let dst_ip = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);

        Ok(IpHeader {
            version,
            ihl,
            tos,
            total_len,
            id,
            flags,
            frag_offset,
            ttl,
            protocol,
            checksum,
            src_ip,
            dst_ip,
        })
    }

    /// Compute the checksum for an `IpHeader` (Ipv4).
    /// Wiki: https://en.wikipedia.org/wiki/IPv4_header_checksum.
    pub fn checksum(data: &[u8]) -> u16 {
        // Sum every 2 bytes as a 16-bit value
        let sum: u32 = data
            .chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]) as u32)
            .sum();

        // Fold the carry bits; twice covers any u32 sum
        let folded = (sum & 0xffff) + (sum >> 16);
        let folded = (folded & 0xffff) + (folded >> 16);
        !(folded as u16)
    }
}

impl Default for IpHeader {
    /// A template for outgoing TCP datagrams: fill in the addresses,
    /// total length and payload.
    fn default() -> Self {
        IpHeader {
            version: 4,
            ihl: 5,
            tos: 0,
            total_len: IP_HEADER_LEN as u16,
            id: 0,
            flags: IpFlags::DF,
            frag_offset: 0,
            ttl: 64,
            protocol: PROTOCOL_TCP,
            checksum: 0,
            src_ip: Ipv4Addr::new(0, 0, 0, 0),
            dst_ip: Ipv4Addr::new(0, 0, 0, 0),
        }
    }
}

/// An IPv4 datagram: header plus opaque payload. The link layer routes
/// these without looking inside the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InternetDatagram {
    pub header: IpHeader,
    pub payload: Vec<u8>,
}

impl InternetDatagram {
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, payload: Vec<u8>) -> Self {
        let header = IpHeader {
            total_len: (IP_HEADER_LEN + payload.len()) as u16,
            src_ip,
            dst_ip,
            ..IpHeader::default()
        };
        InternetDatagram { header, payload }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(IP_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a datagram, taking exactly `total_len` bytes from the buffer.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = IpHeader::parse(data)?;
        let total_len = header.total_len as usize;
        if total_len < IP_HEADER_LEN {
            return Err(ParseError::Unsupported("ip total length".to_string()));
        }
        if data.len() < total_len {
            return Err(ParseError::Truncated {
                expected: total_len,
                actual: data.len(),
            });
        }
        Ok(InternetDatagram {
            header,
            payload: data[IP_HEADER_LEN..total_len].to_vec(),
        })
    }
}

// -- Unit tests --
