use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::args::Config;
use crate::error::ProbeError;
use crate::icmp;
use crate::net::{self, REPLY_BUFFER_LEN, Transport};

/// Pausa entre sondas bem-sucedidas
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Menor resposta aproveitável: um cabeçalho IPv4 sem opções
const MIN_REPLY_LEN: usize = 20;

/// Dados extraídos de uma resposta (cabeçalho IP + ICMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub sequence: u16,
    pub source: [u8; 4],
    pub ttl: u8,
    pub rtt: Duration,
}

impl ProbeResult {
    /// Lê origem (bytes 12..16) e TTL (byte 8) do cabeçalho IPv4 da resposta.
    pub fn parse(reply: &[u8], sequence: u16, rtt: Duration) -> Result<Self, ProbeError> {
        if reply.len() < MIN_REPLY_LEN {
            return Err(ProbeError::Truncated(reply.len()));
        }

        // O tipo ICMP fica logo após o cabeçalho IP (IHL em palavras de 32 bits)
        let ihl = (reply[0] & 0x0F) as usize * 4;
        if let Some(&icmp_type) = reply.get(ihl) {
            if icmp_type != icmp::ECHO_REPLY {
                log::debug!("icmp_seq={sequence}: resposta com tipo ICMP {icmp_type}");
            }
        }

        Ok(Self {
            sequence,
            source: [reply[12], reply[13], reply[14], reply[15]],
            ttl: reply[8],
            rtt,
        })
    }
}

/// Linha de resultado de uma sonda.
///
/// Imprime o número de sequência real; a ferramenta antiga mostrava sempre
/// `icmp_seq=0`.
pub fn report_line(result: &ProbeResult, peer: Ipv4Addr) -> String {
    let [a, b, c, d] = result.source;
    format!(
        "{a}.{b}.{c}.{d} bytes from {peer}: icmp_seq={} ttl={} time={} ms",
        result.sequence,
        result.ttl,
        result.rtt.as_millis()
    )
}

/// Como terminou o loop de sondas.
#[derive(Debug, Default)]
pub struct Outcome {
    pub sent: u64,
    pub replies: u64,
    /// Erro que interrompeu o loop, se houve
    pub aborted: Option<ProbeError>,
}

/// Conduz o loop de sondas sobre um `Transport` já conectado.
pub struct Prober<'a, T> {
    config: &'a Config,
    transport: T,
    peer: Ipv4Addr,
    interval: Duration,
}

impl<'a, T: Transport> Prober<'a, T> {
    pub fn new(config: &'a Config, transport: T, peer: Ipv4Addr) -> Self {
        Self {
            config,
            transport,
            peer,
            interval: PROBE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Cabeçalho impresso antes das sondas.
    pub fn write_header<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "PING {} ({}): {} data bytes",
            self.config.destination, self.peer, self.config.payload_size
        )?;
        Ok(())
    }

    /// Envia `count` Echo Requests, um por vez.
    ///
    /// Erros de uma sonda são registrados e encerram o loop sem falhar;
    /// erros de montagem do pacote ou de escrita em `out` são propagados.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        let mut buf = [0u8; REPLY_BUFFER_LEN];

        for i in 0..self.config.count {
            // Identifier e sequence acompanham o índice (com wrap em 16 bits)
            let seq = i as u16;
            let pkt = icmp::build_echo_request(seq, self.config.payload_size)
                .context("Falha ao montar o Echo Request")?;

            outcome.sent += 1;
            let probe = net::send_and_await(&mut self.transport, &pkt, self.config.timeout, &mut buf)
                .and_then(|echo| ProbeResult::parse(&buf[..echo.len], seq, echo.rtt));

            let result = match probe {
                Ok(result) => result,
                Err(e) => {
                    if e.is_timeout() {
                        log::warn!("icmp_seq={seq}: {e}");
                    } else {
                        log::error!("icmp_seq={seq}: {e}");
                    }
                    outcome.aborted = Some(e);
                    break;
                }
            };

            writeln!(out, "{}", report_line(&result, self.peer))?;
            outcome.replies += 1;

            // Não dorme depois da última sonda
            if i + 1 < self.config.count {
                std::thread::sleep(self.interval);
            }
        }

        Ok(outcome)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} enviados, {} respostas", self.sent, self.replies)?;
        if let Some(e) = &self.aborted {
            write!(f, " (interrompido: {e})")?;
        }
        Ok(())
    }
}
