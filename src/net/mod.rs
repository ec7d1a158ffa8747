pub mod arp;
pub mod errors;
pub mod ethernet;
pub mod interface;
pub mod ip;

// -- Re-export structs for more concise usage

pub use arp::ArpMessage;
pub use errors::ParseError;
pub use ethernet::{EthernetAddress, EthernetFrame, EthernetHeader};
pub use interface::{FramePort, NetworkInterface};
pub use ip::{InternetDatagram, IpHeader};
