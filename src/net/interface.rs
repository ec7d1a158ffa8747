use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;

use tracing::debug;

use crate::net::arp::{ArpMessage, OPCODE_REPLY, OPCODE_REQUEST};
use crate::net::ethernet::{
    EthernetAddress, EthernetFrame, EthernetHeader, ETHERNET_BROADCAST, TYPE_ARP, TYPE_IPV4,
};
use crate::net::ip::InternetDatagram;

/// How long a learned IP to Ethernet mapping stays usable.
pub const ARP_ENTRY_TTL_MS: u64 = 30_000;

/// How long an ARP request may go unanswered before it is sent again.
pub const ARP_RETRY_MS: u64 = 5_000;

/// Where outgoing frames go. A real driver hands frames to the NIC;
/// tests capture them or loop them back into another interface.
pub trait FramePort {
    fn transmit(&mut self, frame: EthernetFrame);
}

struct ArpEntry {
    eth: EthernetAddress,
    learned_at: u64,
}

/// A network interface that connects an IP layer to an Ethernet link.
///
/// Outgoing datagrams are addressed to a next hop IP and held back until
/// ARP discovers the hop's Ethernet address. Incoming frames are filtered
/// by destination address, parsed, and queued for the IP layer to pop.
///
/// Time is driven externally through [`NetworkInterface::tick`].
pub struct NetworkInterface {
    name: String,
    port: Rc<RefCell<dyn FramePort>>,
    ethernet_address: EthernetAddress,
    ip_address: Ipv4Addr,
    arp_cache: BTreeMap<Ipv4Addr, ArpEntry>,
    pending_requests: BTreeMap<Ipv4Addr, u64>,
    pending_datagrams: VecDeque<(Ipv4Addr, InternetDatagram)>,
    received: VecDeque<InternetDatagram>,
    time_ms: u64,
}

impl NetworkInterface {
    pub fn new(
        name: &str,
        port: Rc<RefCell<dyn FramePort>>,
        ethernet_address: EthernetAddress,
        ip_address: Ipv4Addr,
    ) -> Self {
        NetworkInterface {
            name: name.to_string(),
            port,
            ethernet_address,
            ip_address,
            arp_cache: BTreeMap::new(),
            pending_requests: BTreeMap::new(),
            pending_datagrams: VecDeque::new(),
            received: VecDeque::new(),
            time_ms: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ethernet_address(&self) -> EthernetAddress {
        self.ethernet_address
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip_address
    }

    /// Send a datagram towards `next_hop`, which must be on this link.
    ///
    /// With a fresh ARP mapping the frame goes out immediately. Otherwise
    /// the datagram waits in a queue while a single request per hop is in
    /// flight. While waiting, a second datagram with the same hop, source
    /// and destination addresses is taken for a duplicate and dropped.
    pub fn send_datagram(&mut self, dgram: InternetDatagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_cache.get(&next_hop) {
            if self.time_ms - entry.learned_at < ARP_ENTRY_TTL_MS {
                self.transmit_frame(entry.eth, TYPE_IPV4, dgram.to_bytes());
                return;
            }
        }

        if !self.pending_requests.contains_key(&next_hop) {
            debug!("{}: sending arp request for {}", self.name, next_hop);
            self.transmit_arp(OPCODE_REQUEST, ETHERNET_BROADCAST, EthernetAddress([0u8; 6]), next_hop);
            self.pending_requests.insert(next_hop, self.time_ms);
            self.pending_datagrams.push_back((next_hop, dgram));
            return;
        }

        let already_queued = self.pending_datagrams.iter().any(|(hop, queued)| {
            *hop == next_hop
                && queued.header.src_ip == dgram.header.src_ip
                && queued.header.dst_ip == dgram.header.dst_ip
        });
        if !already_queued {
            self.pending_datagrams.push_back((next_hop, dgram));
        }
    }

    /// Accept a frame from the link.
    ///
    /// Frames for other hosts are ignored. IPv4 payloads that parse are
    /// queued for [`NetworkInterface::pop_datagram`]; ARP payloads update
    /// the cache and may trigger a reply. Anything malformed is dropped.
    pub fn recv_frame(&mut self, frame: EthernetFrame) {
        if frame.header.dst != ETHERNET_BROADCAST && frame.header.dst != self.ethernet_address {
            return;
        }
        match frame.header.frame_type {
            TYPE_IPV4 => match InternetDatagram::parse(&frame.payload) {
                Ok(dgram) => self.received.push_back(dgram),
                Err(err) => debug!("{}: dropping ipv4 frame: {}", self.name, err),
            },
            TYPE_ARP => match ArpMessage::parse(&frame.payload) {
                Ok(msg) => self.recv_arp(msg),
                Err(err) => debug!("{}: dropping arp frame: {}", self.name, err),
            },
            other => debug!("{}: dropping frame with unknown type {:#06x}", self.name, other),
        }
    }

    fn recv_arp(&mut self, msg: ArpMessage) {
        // Answer before learning so the reply precedes any flushed traffic
        if msg.opcode == OPCODE_REQUEST && msg.target_ip_address == self.ip_address {
            self.transmit_arp(
                OPCODE_REPLY,
                msg.sender_ethernet_address,
                msg.sender_ethernet_address,
                msg.sender_ip_address,
            );
        }

        debug!(
            "{}: learned that {} is at {}",
            self.name, msg.sender_ip_address, msg.sender_ethernet_address
        );
        self.arp_cache.insert(
            msg.sender_ip_address,
            ArpEntry { eth: msg.sender_ethernet_address, learned_at: self.time_ms },
        );

        // Flush datagrams waiting on this hop in arrival order. The fresh
        // cache entry makes each re-entrant send transmit immediately.
        let mut i = 0;
        while i < self.pending_datagrams.len() {
            if self.pending_datagrams[i].0 == msg.sender_ip_address {
                if let Some((hop, dgram)) = self.pending_datagrams.remove(i) {
                    self.send_datagram(dgram, hop);
                }
            } else {
                i += 1;
            }
        }
        self.pending_requests.remove(&msg.sender_ip_address);
    }

    /// Advance time. Expires stale cache entries and repeats unanswered
    /// ARP requests.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.time_ms += ms_since_last_tick;
        let now = self.time_ms;

        self.arp_cache.retain(|_, entry| now - entry.learned_at < ARP_ENTRY_TTL_MS);

        let overdue: Vec<Ipv4Addr> = self
            .pending_requests
            .iter()
            .filter(|(_, requested_at)| now - **requested_at >= ARP_RETRY_MS)
            .map(|(ip, _)| *ip)
            .collect();
        for ip in overdue {
            debug!("{}: retrying arp request for {}", self.name, ip);
            self.transmit_arp(OPCODE_REQUEST, ETHERNET_BROADCAST, EthernetAddress([0u8; 6]), ip);
            self.pending_requests.insert(ip, now);
        }
    }

    /// Take the next datagram received for the IP layer, if any.
    pub fn pop_datagram(&mut self) -> Option<InternetDatagram> {
        self.received.pop_front()
    }

    fn transmit_frame(&self, dst: EthernetAddress, frame_type: u16, payload: Vec<u8>) {
        let frame = EthernetFrame {
            header: EthernetHeader { dst, src: self.ethernet_address, frame_type },
            payload,
        };
        self.port.borrow_mut().transmit(frame);
    }

    fn transmit_arp(
        &self,
        opcode: u16,
        dst: EthernetAddress,
        target_eth: EthernetAddress,
        target_ip: Ipv4Addr,
    ) {
        let msg = ArpMessage {
            opcode,
            sender_ethernet_address: self.ethernet_address,
            sender_ip_address: self.ip_address,
            target_ethernet_address: target_eth,
            target_ip_address: target_ip,
        };
        self.transmit_frame(dst, TYPE_ARP, msg.to_bytes().to_vec());
    }
}

// -- Unit tests --
