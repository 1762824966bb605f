use std::{error, fmt, io, time::Duration};

/// Falhas ao abrir a conexão ICMP. Todas são fatais para o programa.
#[derive(Debug)]
pub enum ConnectError {
    /// Nome do destino não pôde ser resolvido
    Resolve { destination: String, source: io::Error },
    /// O destino resolveu, mas sem nenhum endereço IPv4
    NoIpv4Address(String),
    /// Sem privilégio para abrir socket RAW (EPERM/EACCES)
    PermissionDenied(io::Error),
    /// Outra falha na criação do socket
    Socket(io::Error),
    /// connect() não terminou dentro do timeout
    Timeout(Duration),
    Connect(io::Error),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve { destination, .. } => {
                write!(f, "não foi possível resolver o destino '{destination}'")
            }
            Self::NoIpv4Address(destination) => {
                write!(f, "o destino '{destination}' não possui endereço IPv4")
            }
            Self::PermissionDenied(_) => {
                write!(f, "permissão negada ao criar socket RAW (execute como root)")
            }
            Self::Socket(_) => write!(f, "falha ao criar socket RAW"),
            Self::Timeout(timeout) => {
                write!(f, "tempo esgotado ao conectar ({} ms)", timeout.as_millis())
            }
            Self::Connect(_) => write!(f, "falha ao conectar ao destino"),
        }
    }
}

impl error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Resolve { source, .. } => Some(source),
            Self::PermissionDenied(e) | Self::Socket(e) | Self::Connect(e) => Some(e),
            Self::NoIpv4Address(_) | Self::Timeout(_) => None,
        }
    }
}

/// Falha na montagem do pacote. Não deveria ocorrer com uma `Config` válida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    PayloadTooLarge { size: usize, max: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload de {size} bytes excede o máximo de {max} bytes")
            }
        }
    }
}

impl error::Error for PacketError {}

/// Falhas de uma sonda individual. Interrompem o loop, mas não o processo.
#[derive(Debug)]
pub enum ProbeError {
    /// Nenhuma resposta dentro do prazo
    Timeout(Duration),
    Write(io::Error),
    Read(io::Error),
    /// Resposta curta demais para conter um cabeçalho IPv4
    Truncated(usize),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(timeout) => {
                write!(f, "esgotado o tempo limite do pedido ({} ms)", timeout.as_millis())
            }
            Self::Write(e) => write!(f, "falha ao enviar: {e}"),
            Self::Read(e) => write!(f, "erro na leitura: {e}"),
            Self::Truncated(len) => write!(f, "resposta truncada ({len} bytes)"),
        }
    }
}

impl error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Write(e) | Self::Read(e) => Some(e),
            Self::Timeout(_) | Self::Truncated(_) => None,
        }
    }
}
