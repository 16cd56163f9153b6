//! Network output: the UDP link and the tracking packet sender.

pub mod sender;
pub mod udp;

pub use sender::{
    format_hand_packet, format_tracking_packet, PacketSink, SenderConfig, TrackingSample,
    TrackingSender,
};
pub use udp::{LinkStatus, UdpLink};
