use std::fmt;

use crate::net::errors::ParseError;

pub const ETHERNET_HEADER_LEN: usize = 14;

/// EtherType for IPv4 payloads.
pub const TYPE_IPV4: u16 = 0x0800;

/// EtherType for ARP payloads.
pub const TYPE_ARP: u16 = 0x0806;

/// Destination address that every host on the link accepts.
pub const ETHERNET_BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// The 14 byte header on every link layer frame.
///
/// `frame_type` selects the payload format: [`TYPE_IPV4`] or [`TYPE_ARP`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EthernetHeader {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub frame_type: u16,
}

impl EthernetHeader {
    /// Serialize an `EthernetHeader` into a byte array of size 14.
    pub fn to_bytes(&self) -> [u8; ETHERNET_HEADER_LEN] {
        let mut buf = [0u8; ETHERNET_HEADER_LEN];
        buf[0..6].copy_from_slice(&self.dst.0);
        buf[6..12].copy_from_slice(&self.src.0);
        buf[12..14].copy_from_slice(&self.frame_type.to_be_bytes());
        buf
    }

    /// Parse a header from the front of a buffer.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(ParseError::Truncated {
                expected: ETHERNET_HEADER_LEN,
                actual: data.len(),
            });
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&data[0..6]);
        src.copy_from_slice(&data[6..12]);
        Ok(EthernetHeader {
            dst: EthernetAddress(dst),
            src: EthernetAddress(src),
            frame_type: u16::from_be_bytes([data[12], data[13]]),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = EthernetHeader::parse(data)?;
        Ok(EthernetFrame {
            header,
            payload: data[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }
}

// -- Unit tests --
