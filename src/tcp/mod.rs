pub mod byte_stream;
pub mod reassembler;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod wrap32;

// -- Re-export structs for more concise usage

pub use byte_stream::ByteStream;
pub use reassembler::Reassembler;
pub use receiver::TcpReceiver;
pub use segment::{AckReport, TcpFlags, TcpSegment};
pub use sender::TcpSender;
pub use wrap32::Wrap32;
