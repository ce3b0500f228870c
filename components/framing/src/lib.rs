pub mod gzip;
pub mod mirror;
pub mod packet;
pub mod reader;
pub mod sum;
pub mod tee;

pub use gzip::GzipFrameReader;
pub use mirror::{MirrorLevel, MirrorWriter};
pub use packet::{encode_packet, InstanceFilter, Packet, PACKET_PREFIX_LEN, PREAMBLE, PROTO_V1, PROTO_V2};
pub use reader::{FrameReader, FramingError};
pub use sum::sum1071;
pub use tee::TeeReader;
