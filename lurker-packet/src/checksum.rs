//! Internet checksum (RFC 1071) helpers for forged IPv4 and TCP headers

/// Ones'-complement sum of 16-bit big-endian words, complemented
///
/// An odd trailing byte is padded with a zero low byte.
///
/// ```
/// use lurker_packet::checksum::internet_checksum;
///
/// let header = [0x45, 0x00, 0x00, 0x3c];
/// let sum = internet_checksum(&header);
/// assert_ne!(sum, 0);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(accumulate(0, data))
}

/// Checksum of a TCP/UDP segment over the IPv4 pseudo-header
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    let mut sum = accumulate(0, src_ip);
    sum = accumulate(sum, dst_ip);
    sum += protocol as u32;
    sum += data.len() as u32;
    !fold(accumulate(sum, data))
}

/// Whether `data` (checksum field included) sums to the all-ones value
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}

fn accumulate(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }
    sum
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_ipv4_header() {
        // 10.0.0.1 -> 10.0.0.2, TCP, total length 40, DF, TTL 64
        let header = [
            0x45, 0x00, 0x00, 0x28, 0x00, 0x00, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00, 0x0a, 0x00,
            0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
        ];
        assert_eq!(internet_checksum(&header), 0x26ce);
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        assert_eq!(internet_checksum(&[0x01]), !0x0100);
    }

    #[test]
    fn test_checksum_complement_identity() {
        let data = vec![0x12, 0x34, 0x56, 0x78];
        let checksum = internet_checksum(&data);

        let mut with_checksum = data;
        with_checksum.extend_from_slice(&checksum.to_be_bytes());
        assert!(validate_checksum(&with_checksum));
    }

    #[test]
    fn test_transport_checksum_validates_with_pseudo_header() {
        let src = [192, 168, 1, 1];
        let dst = [192, 168, 1, 2];
        let mut segment = vec![0x9c, 0x40, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01];
        let sum = transport_checksum(&src, &dst, 6, &segment);

        segment.extend_from_slice(&sum.to_be_bytes());
        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&src);
        pseudo.extend_from_slice(&dst);
        pseudo.extend_from_slice(&[0, 6, 0, 8]);
        pseudo.extend_from_slice(&segment);
        assert!(validate_checksum(&pseudo));
    }
}
