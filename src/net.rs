// Criação e configuração de sockets de baixo nível
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::{ConnectError, ProbeError};

/// Buffer de recepção de cada sonda (cabeçalho IP + ICMP + payload)
pub const REPLY_BUFFER_LEN: usize = 1024;

/// Canal por onde as sondas saem e as respostas chegam.
pub trait Transport {
    /// Prazo aplicado à próxima escrita e à próxima leitura.
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()>;
    fn send(&mut self, packet: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Transport for Socket {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }

    fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        Socket::send(self, packet)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Socket ICMP RAW conectado a um único destino.
///
/// O socket é fechado quando a `Connection` sai de escopo.
pub struct Connection {
    socket: Socket,
    peer: Ipv4Addr,
}

impl Connection {
    /// Resolve `destination` e conecta um socket RAW/ICMP a ele em até `timeout`.
    pub fn open(destination: &str, timeout: Duration) -> Result<Self, ConnectError> {
        let peer = resolve_ipv4(destination)?;

        // Domain::IPV4 -> AF_INET
        // Type::RAW -> SOCK_RAW (exige root ou CAP_NET_RAW)
        // Protocol::ICMPV4 -> IPPROTO_ICMP
        let socket = Socket::new(
            Domain::IPV4,
            Type::from(libc::SOCK_RAW),
            Some(Protocol::ICMPV4),
        )
        .map_err(|e| match e.raw_os_error() {
            Some(libc::EPERM) | Some(libc::EACCES) => ConnectError::PermissionDenied(e),
            _ => ConnectError::Socket(e),
        })?;

        // Porta 0 é ignorada para ICMP
        let addr = SockAddr::from(SocketAddrV4::new(peer, 0));
        socket.connect_timeout(&addr, timeout).map_err(|e| {
            if is_timeout(&e) {
                ConnectError::Timeout(timeout)
            } else {
                ConnectError::Connect(e)
            }
        })?;

        log::debug!("socket RAW conectado a {peer}");
        Ok(Self { socket, peer })
    }

    /// Endereço IPv4 resolvido do destino.
    pub fn peer(&self) -> Ipv4Addr {
        self.peer
    }
}

impl Transport for Connection {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.socket.set_deadline(timeout)
    }

    fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        Transport::send(&mut self.socket, packet)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Transport::recv(&mut self.socket, buf)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        log::debug!("fechando socket RAW para {}", self.peer);
    }
}

fn resolve_ipv4(destination: &str) -> Result<Ipv4Addr, ConnectError> {
    // Literais IPv4 não passam pelo resolvedor
    if let Ok(ip) = destination.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = (destination, 0)
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            destination: destination.to_string(),
            source,
        })?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ConnectError::NoIpv4Address(destination.to_string()))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Resposta recebida por `send_and_await`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    /// Bytes lidos no buffer
    pub len: usize,
    pub rtt: Duration,
}

/// Envia `packet` e bloqueia numa única leitura até chegar resposta ou
/// o prazo `timeout` vencer.
pub fn send_and_await<T: Transport + ?Sized>(
    transport: &mut T,
    packet: &[u8],
    timeout: Duration,
    buf: &mut [u8],
) -> Result<Echo, ProbeError> {
    transport.set_deadline(timeout).map_err(ProbeError::Write)?;

    // Marca o instante do envio para calcular o RTT depois
    let t0 = Instant::now();

    match transport.send(packet) {
        Ok(n) if n == packet.len() => {}
        Ok(n) => {
            return Err(ProbeError::Write(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("enviados {n} de {} bytes", packet.len()),
            )));
        }
        Err(e) if is_timeout(&e) => return Err(ProbeError::Timeout(timeout)),
        Err(e) => return Err(ProbeError::Write(e)),
    }

    let len = match transport.recv(buf) {
        Ok(n) => n,
        Err(e) if is_timeout(&e) => return Err(ProbeError::Timeout(timeout)),
        Err(e) => return Err(ProbeError::Read(e)),
    };

    Ok(Echo {
        len,
        rtt: t0.elapsed(),
    })
}
