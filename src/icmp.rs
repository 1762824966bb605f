use crate::error::PacketError;

/// Tamanho do cabeçalho ICMP Echo
pub const ICMP_HEADER_LEN: usize = 8;

pub const ECHO_REQUEST: u8 = 8;
pub const ECHO_REPLY: u8 = 0;

/// Maior payload que cabe num datagrama IPv4 (65535 - 20 de IP - 8 de ICMP)
pub const MAX_PAYLOAD: usize = 65535 - 20 - ICMP_HEADER_LEN;

/// Mensagem ICMP Echo (RFC 792).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoPacket {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl EchoPacket {
    /// Echo Request com checksum zerado e payload preenchido com zeros.
    pub fn request(identifier: u16, sequence: u16, payload_size: usize) -> Self {
        Self {
            icmp_type: ECHO_REQUEST,
            code: 0,
            checksum: 0,
            identifier,
            sequence,
            payload: vec![0; payload_size],
        }
    }

    /// Serializa em big-endian: type, code, checksum, identifier, sequence, payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut pkt = Vec::with_capacity(ICMP_HEADER_LEN + self.payload.len());
        pkt.push(self.icmp_type);
        pkt.push(self.code);
        pkt.extend_from_slice(&self.checksum.to_be_bytes());
        pkt.extend_from_slice(&self.identifier.to_be_bytes());
        pkt.extend_from_slice(&self.sequence.to_be_bytes());
        pkt.extend_from_slice(&self.payload);
        Ok(pkt)
    }
}

/// Monta o Echo Request serializado com o checksum ainda zerado.
///
/// Identifier e sequence recebem o mesmo valor, o índice da sonda.
pub fn build_packet(sequence: u16, payload_size: usize) -> Result<Vec<u8>, PacketError> {
    EchoPacket::request(sequence, sequence, payload_size).to_bytes()
}

/// Checksum da Internet (RFC 1071).
///
/// Soma palavras de 16 bits big-endian num acumulador de 32 bits; um byte
/// final ímpar entra como byte alto de uma palavra com zero. O vai-um é
/// dobrado de volta até os 16 bits altos zerarem e o resultado é o
/// complemento de um.
pub fn checksum(mut data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    while data.len() >= 2 {
        sum = sum.wrapping_add(u16::from_be_bytes([data[0], data[1]]) as u32);
        data = &data[2..];
    }
    if let [last] = data {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Escreve o checksum (big-endian) nos bytes 2 e 3 do pacote.
///
/// # Panics
/// Se `packet` tiver menos que 4 bytes.
pub fn patch_checksum(packet: &mut [u8], csum: u16) {
    packet[2..4].copy_from_slice(&csum.to_be_bytes());
}

/// Monta um pacote ICMPv4 Echo Request (type=8, code=0) pronto para envio.
pub fn build_echo_request(sequence: u16, payload_size: usize) -> Result<Vec<u8>, PacketError> {
    let mut pkt = build_packet(sequence, payload_size)?;
    let csum = checksum(&pkt);
    patch_checksum(&mut pkt, csum);
    Ok(pkt)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Implementação de referência direta da RFC 1071, seção 4.1
    fn reference_checksum(data: &[u8]) -> u16 {
        let mut sum: u64 = 0;
        for chunk in data.chunks(2) {
            let hi = chunk[0] as u64;
            let lo = chunk.get(1).copied().unwrap_or(0) as u64;
            sum += (hi << 8) | lo;
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !(sum as u16)
    }

    #[test]
    fn checksum_of_zeros_is_ffff() {
        assert_eq!(checksum(&[0u8; 20]), 0xFFFF);
    }

    #[test]
    fn checksum_of_ones_folds_to_zero() {
        assert_eq!(checksum(&[0xFFu8; 20]), 0);
    }

    #[test]
    fn checksum_rfc1071_example() {
        // Exemplo numérico da RFC 1071, seção 3: soma 0xddf2, checksum 0x220d
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), 0x220d);
    }

    #[test]
    fn checksum_matches_reference() {
        let mut data = Vec::new();
        for len in 0..300usize {
            assert_eq!(checksum(&data), reference_checksum(&data), "len={len}");
            data.push((len as u8).wrapping_mul(37).wrapping_add(11));
        }
    }

    #[test]
    fn odd_trailing_byte_is_high_byte() {
        assert_eq!(checksum(&[0xAB]), !0xAB00);
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), !(0x1234u16 + 0x5600));
    }

    #[test]
    fn carry_is_folded_until_upper_bits_clear() {
        // 0xFFFF + 0x0001 = 0x10000 -> 0x0001, complemento 0xFFFE
        assert_eq!(checksum(&[0xFF, 0xFF, 0x00, 0x01]), 0xFFFE);
    }

    #[test]
    fn echo_header_example_self_verifies() {
        let mut pkt = [0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];
        let csum = checksum(&pkt);
        assert_eq!(csum, 0xF7FD);
        patch_checksum(&mut pkt, csum);
        assert_eq!(&pkt[2..4], &[0xF7, 0xFD]);
        assert_eq!(checksum(&pkt), 0x0000);
    }

    #[test]
    fn patched_packets_self_verify() {
        for (seq, size) in [(0u16, 0usize), (1, 54), (7, 55), (0xBEEF, 1), (300, 1400)] {
            let pkt = build_echo_request(seq, size).unwrap();
            assert_eq!(checksum(&pkt), 0, "seq={seq} size={size}");
        }
    }

    #[test]
    fn build_packet_layout() {
        for (seq, size) in [(0u16, 0usize), (1, 54), (0x1234, 3)] {
            let pkt = build_packet(seq, size).unwrap();
            assert_eq!(pkt.len(), ICMP_HEADER_LEN + size);
            assert_eq!(&pkt[0..2], &[ECHO_REQUEST, 0]);
            assert_eq!(&pkt[2..4], &[0, 0]);
            assert_eq!(&pkt[4..6], &seq.to_be_bytes());
            assert_eq!(&pkt[6..8], &seq.to_be_bytes());
            assert!(pkt[ICMP_HEADER_LEN..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn build_packet_rejects_oversized_payload() {
        assert!(build_packet(0, MAX_PAYLOAD).is_ok());
        assert_eq!(
            build_packet(0, MAX_PAYLOAD + 1),
            Err(PacketError::PayloadTooLarge {
                size: MAX_PAYLOAD + 1,
                max: MAX_PAYLOAD,
            })
        );
    }

    #[test]
    fn patch_checksum_is_idempotent() {
        let mut once = build_packet(5, 10).unwrap();
        let csum = checksum(&once);
        patch_checksum(&mut once, csum);
        let mut twice = once.clone();
        patch_checksum(&mut twice, csum);
        assert_eq!(once, twice);
    }

    #[test]
    fn to_bytes_keeps_field_order() {
        let pkt = EchoPacket {
            icmp_type: ECHO_REPLY,
            code: 0,
            checksum: 0xA1B2,
            identifier: 0xC3D4,
            sequence: 0xE5F6,
            payload: vec![1, 2, 3],
        };
        assert_eq!(
            pkt.to_bytes().unwrap(),
            vec![0, 0, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 1, 2, 3]
        );
    }
}
