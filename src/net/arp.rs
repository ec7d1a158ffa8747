use std::net::Ipv4Addr;

use crate::net::errors::ParseError;
use crate::net::ethernet::EthernetAddress;

pub const OPCODE_REQUEST: u16 = 1;
pub const OPCODE_REPLY: u16 = 2;
pub const ARP_MESSAGE_LEN: usize = 28;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;
const HLEN_ETHERNET: u8 = 6;
const PLEN_IPV4: u8 = 4;

/// An ARP message mapping IPv4 addresses to link layer addresses.
///
/// Only the Ethernet/IPv4 flavor is accepted. A request leaves
/// `target_ethernet_address` zeroed; the reply fills it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_ethernet_address: EthernetAddress,
    pub sender_ip_address: Ipv4Addr,
    pub target_ethernet_address: EthernetAddress,
    pub target_ip_address: Ipv4Addr,
}

impl ArpMessage {
    /// Serialize an `ArpMessage` into a byte array of size 28.
    pub fn to_bytes(&self) -> [u8; ARP_MESSAGE_LEN] {
        let mut buf = [0u8; ARP_MESSAGE_LEN];
        buf[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        buf[4] = HLEN_ETHERNET;
        buf[5] = PLEN_IPV4;
        buf[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_ethernet_address.0);
        buf[14..18].copy_from_slice(&self.sender_ip_address.octets());
        buf[18..24].copy_from_slice(&self.target_ethernet_address.0);
        buf[24..28].copy_from_slice(&self.target_ip_address.octets());
        buf
    }

    /// Parse a message, rejecting any flavor other than Ethernet/IPv4
    /// and any opcode other than request or reply.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ARP_MESSAGE_LEN {
            return Err(ParseError::Truncated {
                expected: ARP_MESSAGE_LEN,
                actual: data.len(),
            });
        }
        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        if htype != HTYPE_ETHERNET || data[4] != HLEN_ETHERNET {
            return Err(ParseError::Unsupported("arp hardware type".to_string()));
        }
        if ptype != PTYPE_IPV4 || data[5] != PLEN_IPV4 {
            return Err(ParseError::Unsupported("arp protocol type".to_string()));
        }
        let opcode = u16::from_be_bytes([data[6], data[7]]);
        if opcode != OPCODE_REQUEST && opcode != OPCODE_REPLY {
            return Err(ParseError::Unsupported("arp opcode".to_string()));
        }
        let mut sender_eth = [0u8; 6];
        let mut target_eth = [0u8; 6];
        sender_eth.copy_from_slice(&data[8..14]);
        target_eth.copy_from_slice(&data[18..24]);
        Ok(ArpMessage {
            opcode,
            sender_ethernet_address: EthernetAddress(sender_eth),
            sender_ip_address: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_ethernet_address: EthernetAddress(target_eth),
            target_ip_address: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }
}

// -- Unit tests --
