//! Per-frame view: IPv4 header fields, the transport variant and a borrowed
//! slice of the L7 payload. Views live for one capture-loop iteration only.

use smoltcp::wire::{Icmpv4Packet, IpProtocol, Ipv4Address, Ipv4Packet, TcpPacket, UdpPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
    Icmp { icmp_type: u8, icmp_code: u8 },
    Other,
}

#[derive(Debug)]
pub struct ParsedPacket<'a> {
    pub ip_src: Ipv4Address,
    pub ip_dst: Ipv4Address,
    pub ip_id: u16,
    pub ip_tos: u8,
    pub ip_ttl: u8,
    pub ip_proto: u8,
    pub transport: Transport,
    pub payload: &'a [u8],
}

impl ParsedPacket<'_> {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Parses a captured frame past its link-layer header.
///
/// The payload slice covers IP total length minus IP and transport headers;
/// ICMP and unknown transports carry no payload. Any malformed header makes
/// the whole parse fail, and the caller forwards the frame untouched.
pub fn parse(frame: &[u8], link_header_len: usize) -> Result<ParsedPacket<'_>, smoltcp::Error> {
    let ip_buf = frame
        .get(link_header_len..)
        .ok_or(smoltcp::Error::Truncated)?;
    let ipv4 = Ipv4Packet::new_checked(ip_buf)?;

    let mut packet = ParsedPacket {
        ip_src: ipv4.src_addr(),
        ip_dst: ipv4.dst_addr(),
        ip_id: ipv4.ident(),
        ip_tos: ipv4.dscp() << 2 | ipv4.ecn(),
        ip_ttl: ipv4.hop_limit(),
        ip_proto: ipv4.protocol().into(),
        transport: Transport::Other,
        payload: &[],
    };

    match ipv4.protocol() {
        IpProtocol::Tcp => {
            let tcp = TcpPacket::new_checked(ipv4.payload())?;
            packet.transport = Transport::Tcp {
                src_port: tcp.src_port(),
                dst_port: tcp.dst_port(),
            };
            packet.payload = tcp.payload();
        }
        IpProtocol::Udp => {
            let udp = UdpPacket::new_checked(ipv4.payload())?;
            packet.transport = Transport::Udp {
                src_port: udp.src_port(),
                dst_port: udp.dst_port(),
            };
            packet.payload = udp.payload();
        }
        IpProtocol::Icmp => {
            let icmp = Icmpv4Packet::new_checked(ipv4.payload())?;
            packet.transport = Transport::Icmp {
                icmp_type: icmp.msg_type().into(),
                icmp_code: icmp.msg_code(),
            };
        }
        _ => {}
    }

    Ok(packet)
}
