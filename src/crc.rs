//! CRC-16/CCITT-FALSE.
//!
//! Polynomial `0x1021`, initial value `0xFFFF`, MSB first, no reflection and no
//! final XOR. Frames carry it over the header and payload, never the SOF.

/// Initial CRC register value.
pub const CRC_INIT: u16 = 0xFFFF;

const CRC_POLY: u16 = 0x1021;

/// Folds a single byte into a running CRC.
pub fn crc_ccitt_update(crc: u16, data: &u8) -> u16 {
    let mut crc = crc ^ (u16::from(*data) << 8);
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ CRC_POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Computes the CRC of a whole buffer.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INIT, crc_ccitt_update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16_ccitt_false(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_empty_is_init() {
        assert_eq!(crc16_ccitt_false(&[]), CRC_INIT);
    }

    #[test]
    fn test_incremental_matches_bulk() {
        let data = [0x01, 0x01, 0x07, 0x06, 0x00, 0x40, 0x00, 0x40, 0x02, 0x00];
        let (head, tail) = data.split_at(4);
        let crc = tail
            .iter()
            .fold(crc16_ccitt_false(head), crc_ccitt_update);
        assert_eq!(crc, crc16_ccitt_false(&data));
    }
}
