// Tratamento de erros ergonômico
use anyhow::{Context, Result};

use std::io::{self, Write};

// Módulos locais
mod args;
mod error;
mod icmp;
mod net;
mod prober;

use net::Connection;
use prober::Prober;

/// Programa principal: envia Echo Requests e aguarda Echo Replies.
/// Requer root (ou CAP_NET_RAW) para abrir o socket RAW.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Configuração imutável, passada adiante por referência
    let config = args::parse()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "timeout: {}; size: {}; count: {};",
        config.timeout.as_millis(),
        config.payload_size,
        config.count
    )?;

    // Falha de conexão é fatal: sem socket não há sonda possível
    let conn = Connection::open(&config.destination, config.timeout)
        .with_context(|| format!("Falha ao conectar em {}", config.destination))?;
    let peer = conn.peer();
    writeln!(out, "{peer}")?;

    // O socket é fechado quando o Prober sai de escopo, em qualquer caminho
    let mut prober = Prober::new(&config, conn, peer);
    prober.write_header(&mut out)?;
    let outcome = prober.run(&mut out)?;
    out.flush()?;

    log::debug!("{outcome}");
    Ok(())
}
