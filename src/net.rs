use anyhow::{Context, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use crate::config::DmxConfig;
use crate::payload::{ControlFrame, UNIVERSE_SIZE};
use crate::traits::DmxSource;

pub const ARTNET_PORT: u16 = 6454;

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const MIN_PROTOCOL_VERSION: u16 = 14;
const ARTDMX_HEADER_LEN: usize = 18;

/// How long a blocking read waits before the receive loop checks for shutdown.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ArtDmx {
    pub sequence: u8,
    /// 15-bit port address (Net << 8 | SubUni)
    pub universe: u16,
    pub frame: ControlFrame,
}

pub fn create_artnet_socket(bind: Ipv4Addr, port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    // Several consoles/visualisers commonly share the Art-Net port on one host
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;

    let addr = SocketAddrV4::new(bind, port);
    socket
        .bind(&addr.into())
        .with_context(|| format!("Failed to bind Art-Net socket on {}", addr))?;

    socket.set_read_timeout(Some(RECV_TIMEOUT))?;

    Ok(socket.into())
}

/// Parse an ArtDmx packet. Returns None for anything else (other opcodes,
/// old protocol versions, truncated data). Short universes are zero-padded.
pub fn parse_artdmx(data: &[u8]) -> Option<ArtDmx> {
    if data.len() < ARTDMX_HEADER_LEN || &data[..8] != ARTNET_ID {
        return None;
    }

    if LittleEndian::read_u16(&data[8..10]) != OP_DMX {
        return None;
    }

    if BigEndian::read_u16(&data[10..12]) < MIN_PROTOCOL_VERSION {
        return None;
    }

    let sequence = data[12];
    let sub_uni = data[14] as u16;
    let net = (data[15] & 0x7F) as u16;
    let universe = (net << 8) | sub_uni;

    let length = BigEndian::read_u16(&data[16..18]) as usize;
    if !(2..=UNIVERSE_SIZE).contains(&length) {
        return None;
    }

    let levels = data.get(ARTDMX_HEADER_LEN..ARTDMX_HEADER_LEN + length)?;
    let mut frame = [0u8; UNIVERSE_SIZE];
    frame[..length].copy_from_slice(levels);

    Some(ArtDmx {
        sequence,
        universe,
        frame,
    })
}

/// Art-Net listener subscribed to a single universe.
pub struct ArtNetReceiver {
    socket: UdpSocket,
    universe: u16,
}

impl ArtNetReceiver {
    pub fn bind(config: &DmxConfig) -> Result<Self> {
        let socket = create_artnet_socket(config.bind, config.port)?;
        log::info!(
            "Listening for Art-Net universe {} on {}:{}",
            config.universe,
            config.bind,
            config.port
        );
        Ok(ArtNetReceiver {
            socket,
            universe: config.universe,
        })
    }
}

impl DmxSource for ArtNetReceiver {
    fn recv_frame(&mut self) -> Result<Option<(ControlFrame, Instant)>> {
        let mut buf = [0u8; 1024];

        match self.socket.recv_from(&mut buf) {
            Ok((size, _)) => {
                let arrival = Instant::now();
                match parse_artdmx(&buf[..size]) {
                    Some(packet) if packet.universe == self.universe => Ok(Some((packet.frame, arrival))),
                    _ => Ok(None),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
