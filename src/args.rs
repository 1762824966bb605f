use anyhow::{Result, bail};
use clap::Parser;
use std::time::Duration;

use crate::icmp::MAX_PAYLOAD;

pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_PAYLOAD_SIZE: usize = 54;

/// Envia Echo Requests ICMP para um destino e mede o tempo de resposta.
/// Requer privilégios de root (ou CAP_NET_RAW) para abrir o socket RAW.
#[derive(Parser, Debug)]
#[command(name = "pingrs", version, about)]
pub struct PingArgs {
    /// Tempo limite de cada sonda, em milissegundos
    #[arg(short = 't', value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Bytes de payload após o cabeçalho ICMP de 8 bytes
    #[arg(short = 'l', value_name = "BYTES", default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub size: usize,

    /// Número de pedidos (0 não envia nenhum)
    #[arg(short = 'c', value_name = "COUNT", default_value_t = 0)]
    pub count: u64,

    /// Nome ou endereço IPv4 do destino
    pub destination: String,
}

/// Configuração da execução. Montada uma vez e só lida depois.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub timeout: Duration,
    pub payload_size: usize,
    pub count: u64,
    pub destination: String,
}

impl Config {
    pub fn from_args(args: PingArgs) -> Result<Self> {
        if args.timeout <= 0 {
            bail!("timeout deve ser positivo (recebido {} ms)", args.timeout);
        }
        if args.size > MAX_PAYLOAD {
            bail!("payload de {} bytes excede o máximo de {MAX_PAYLOAD}", args.size);
        }

        Ok(Self {
            timeout: Duration::from_millis(args.timeout as u64),
            payload_size: args.size,
            count: args.count,
            destination: args.destination,
        })
    }
}

pub fn parse() -> Result<Config> {
    Config::from_args(PingArgs::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> Result<Config> {
        let args = PingArgs::try_parse_from(argv)?;
        Config::from_args(args)
    }

    #[test]
    fn defaults() {
        let cfg = config(&["pingrs", "10.0.0.1"]).unwrap();
        assert_eq!(cfg.timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.payload_size, 54);
        assert_eq!(cfg.count, 0);
        assert_eq!(cfg.destination, "10.0.0.1");
    }

    #[test]
    fn flags_before_destination() {
        let cfg = config(&["pingrs", "-t", "500", "-l", "32", "-c", "3", "example.com"]).unwrap();
        assert_eq!(cfg.timeout, Duration::from_millis(500));
        assert_eq!(cfg.payload_size, 32);
        assert_eq!(cfg.count, 3);
        assert_eq!(cfg.destination, "example.com");
    }

    #[test]
    fn missing_destination_is_an_error() {
        assert!(config(&["pingrs", "-c", "1"]).is_err());
    }

    #[test]
    fn non_positive_timeout_is_rejected() {
        assert!(config(&["pingrs", "-t", "0", "h"]).is_err());
        assert!(config(&["pingrs", "-t", "-5", "h"]).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let too_big = (MAX_PAYLOAD + 1).to_string();
        assert!(config(&["pingrs", "-l", &too_big, "h"]).is_err());
        let max = MAX_PAYLOAD.to_string();
        assert!(config(&["pingrs", "-l", &max, "h"]).is_ok());
    }
}
