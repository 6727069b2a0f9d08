//! Transport sinks and link-layer frame composition.
//!
//! SNMP traffic goes through a connected UDP socket; TLS records are injected
//! as raw Ethernet/IPv4/TCP frames through a live capture handle. Every sink
//! is owned by exactly one pacing loop and dropped when that loop exits.

use crate::errors::Error;
use crate::tls::TlsRecord;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use pnet::util::MacAddr;
use pnet_packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::tcp::{self, MutableTcpPacket};

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

const ETHERNET_HEADER_LEN: usize = 14;
const IPV4_HEADER_LEN: usize = 20;
const TCP_HEADER_LEN: usize = 20;

const IP_TTL: u8 = 64;
const TCP_SRC_PORT: u16 = 12345;
const TCP_SEQ: u32 = 1_105_024_978;
const TCP_WINDOW: u16 = 14600;

/// Injected frames never go through ARP, so the destination MAC is fixed,
/// and interfaces without a hardware address get a fixed source.
pub const DST_MAC: MacAddr = MacAddr(0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD);
const FALLBACK_SRC_MAC: MacAddr = MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);

/// Accepts pre-serialized bytes and transmits them. Send failures are
/// per-packet and non-fatal to the owning loop.
pub trait TransportSink: Send {
    fn send(&mut self, packet: &[u8]) -> io::Result<()>;
}

/// Connected UDP endpoint.
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    pub fn open(dest: SocketAddr) -> Result<UdpSink, Error> {
        let bind_addr = if dest.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .and_then(|s| s.connect(dest).map(|_| s))
            .map_err(|e| Error::TransportOpen(format!("{dest}: {e}")))?;
        Ok(UdpSink { socket })
    }
}

impl TransportSink for UdpSink {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.socket.send(packet).map(|_| ())
    }
}

/// Live capture handle used to inject raw Ethernet frames.
pub struct WireSink {
    handle: pcap::Capture<pcap::Active>,
}

impl WireSink {
    pub fn open(iface: &str) -> Result<WireSink, Error> {
        let handle = pcap::Capture::from_device(iface)
            .and_then(|c| c.open())
            .map_err(|e| Error::TransportOpen(format!("{iface}: {e}")))?;
        Ok(WireSink { handle })
    }
}

impl TransportSink for WireSink {
    fn send(&mut self, packet: &[u8]) -> io::Result<()> {
        self.handle
            .sendpacket(packet)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// Source MAC and first IPv4 address of the named interface.
pub fn interface_ipv4(name: &str) -> Result<(MacAddr, Ipv4Addr), Error> {
    let iface = datalink::interfaces()
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| Error::TransportOpen(format!("no such interface: {name}")))?;
    let mac = iface.mac.unwrap_or(FALLBACK_SRC_MAC);
    let ip = iface
        .ips
        .iter()
        .find_map(|net| match net {
            IpNetwork::V4(net) => Some(net.ip()),
            _ => None,
        })
        .ok_or_else(|| Error::TransportOpen(format!("no IPv4 address on interface {name}")))?;
    Ok((mac, ip))
}

/// Addressing for synthesized frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameAddrs {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub dst_port: u16,
}

fn setup_ethernet(buf: &mut [u8], addrs: &FrameAddrs) -> Option<()> {
    let mut eth = MutableEthernetPacket::new(buf)?;
    eth.set_source(addrs.src_mac);
    eth.set_destination(addrs.dst_mac);
    eth.set_ethertype(EtherTypes::Ipv4);
    Some(())
}

fn setup_ipv4(buf: &mut [u8], addrs: &FrameAddrs) -> Option<()> {
    let len = buf.len();
    let mut ip = MutableIpv4Packet::new(buf)?;
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(len as u16);
    ip.set_ttl(IP_TTL);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
    ip.set_source(addrs.src_ip);
    ip.set_destination(addrs.dst_ip);
    ip.set_checksum(ipv4::checksum(&ip.to_immutable()));
    Some(())
}

fn setup_tcp(buf: &mut [u8], addrs: &FrameAddrs, payload: &[u8]) -> Option<()> {
    let mut tcp = MutableTcpPacket::new(buf)?;
    tcp.set_source(TCP_SRC_PORT);
    tcp.set_destination(addrs.dst_port);
    tcp.set_sequence(TCP_SEQ);
    tcp.set_data_offset(5);
    tcp.set_window(TCP_WINDOW);
    tcp.set_payload(payload);
    tcp.set_checksum(tcp::ipv4_checksum(
        &tcp.to_immutable(),
        &addrs.src_ip,
        &addrs.dst_ip,
    ));
    Some(())
}

/// One Ethernet/IPv4/TCP frame carrying the record as its payload, with
/// lengths and checksums filled in. Built once per loop, then resent as-is.
pub fn tcp_frame(record: &TlsRecord, addrs: &FrameAddrs) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::new();
    record.prepend_to(&mut payload);
    let total = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len();
    let mut buf = vec![0u8; total];
    let too_small = || Error::Encoding("frame buffer too small for headers".to_string());
    setup_ethernet(&mut buf, addrs).ok_or_else(too_small)?;
    setup_ipv4(&mut buf[ETHERNET_HEADER_LEN..], addrs).ok_or_else(too_small)?;
    setup_tcp(
        &mut buf[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..],
        addrs,
        &payload,
    )
    .ok_or_else(too_small)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ethernet::EthernetPacket;
    use pnet_packet::ip::IpNextHeaderProtocols;
    use pnet_packet::ipv4::Ipv4Packet;
    use pnet_packet::tcp::TcpPacket;
    use pnet_packet::Packet;

    fn addrs() -> FrameAddrs {
        FrameAddrs {
            src_mac: FALLBACK_SRC_MAC,
            dst_mac: DST_MAC,
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            dst_ip: Ipv4Addr::new(10, 0, 0, 2),
            dst_port: 443,
        }
    }

    #[test]
    fn frame_carries_the_record_under_tcp() {
        let record = TlsRecord::build(22);
        let frame = tcp_frame(&record, &addrs()).unwrap();

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
        assert_eq!(eth.get_destination(), DST_MAC);

        let ip = Ipv4Packet::new(eth.payload()).unwrap();
        assert_eq!(ip.get_version(), 4);
        assert_eq!(ip.get_ttl(), IP_TTL);
        assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Tcp);
        assert_eq!(ip.get_source(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.get_total_length() as usize, frame.len() - ETHERNET_HEADER_LEN);

        let tcp = TcpPacket::new(ip.payload()).unwrap();
        assert_eq!(tcp.get_source(), TCP_SRC_PORT);
        assert_eq!(tcp.get_destination(), 443);
        assert_eq!(tcp.get_sequence(), TCP_SEQ);
        assert_eq!(tcp.get_window(), TCP_WINDOW);
        assert_eq!(tcp.payload(), record.serialize());
    }

    #[test]
    fn empty_payload_records_still_frame() {
        let record = TlsRecord::build(20);
        let frame = tcp_frame(&record, &addrs()).unwrap();
        assert_eq!(
            frame.len(),
            ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + TCP_HEADER_LEN + 5
        );
    }
}
