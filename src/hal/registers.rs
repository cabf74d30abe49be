//! Register name to address resolution for T-series devices.
//!
//! Covers the register families a stream configuration refers to by name:
//! analog inputs, DACs, digital lines and the stream-out markers.

/// Address of the `STREAM_OUT0` scan-list marker. Slot `n` is `4800 + n`.
pub const STREAM_OUT_BASE_ADDRESS: u32 = 4800;

/// Number of stream-out slots a device provides.
pub const STREAM_OUT_SLOTS: u8 = 4;

/// Scan-list marker for stream-out slot `slot`.
pub fn stream_out_address(slot: u8) -> u32 {
    STREAM_OUT_BASE_ADDRESS + u32::from(slot)
}

/// Whether `address` is a stream-out marker rather than an input.
pub fn is_stream_out_address(address: u32) -> bool {
    (STREAM_OUT_BASE_ADDRESS..STREAM_OUT_BASE_ADDRESS + u32::from(STREAM_OUT_SLOTS))
        .contains(&address)
}

/// Resolve a register name to its address.
///
/// Returns `None` for names outside the supported families.
pub fn address_of(name: &str) -> Option<u32> {
    let name = name.trim().to_uppercase();
    let (prefix, index) = split_indexed(&name)?;
    match prefix {
        "AIN" if index < 255 => Some(index * 2),
        "DAC" if index < 2 => Some(1000 + index * 2),
        "FIO" if index < 8 => Some(2000 + index),
        "EIO" if index < 8 => Some(2008 + index),
        "CIO" if index < 4 => Some(2016 + index),
        "MIO" if index < 3 => Some(2020 + index),
        "STREAM_OUT" if index < u32::from(STREAM_OUT_SLOTS) => {
            Some(STREAM_OUT_BASE_ADDRESS + index)
        }
        _ => None,
    }
}

fn split_indexed(name: &str) -> Option<(&str, u32)> {
    let digits_at = name.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = name.split_at(digits_at);
    let index = digits.parse().ok()?;
    Some((prefix, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_addresses() {
        assert_eq!(address_of("AIN0"), Some(0));
        assert_eq!(address_of("AIN2"), Some(4));
        assert_eq!(address_of("dac0"), Some(1000));
        assert_eq!(address_of("DAC1"), Some(1002));
        assert_eq!(address_of("FIO3"), Some(2003));
        assert_eq!(address_of("STREAM_OUT1"), Some(4801));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(address_of("AIN"), None);
        assert_eq!(address_of("DAC7"), None);
        assert_eq!(address_of("TEMPERATURE0X"), None);
        assert_eq!(address_of(""), None);
    }

    #[test]
    fn test_stream_out_markers() {
        assert_eq!(stream_out_address(0), 4800);
        assert_eq!(stream_out_address(3), 4803);
        assert!(is_stream_out_address(4802));
        assert!(!is_stream_out_address(4804));
        assert!(!is_stream_out_address(4));
    }
}
