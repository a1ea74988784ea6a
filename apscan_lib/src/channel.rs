/** ------------------------------------------------------------
 * Channel / frequency conversion for the 2.4 and 5 GHz bands.
 * Frequencies are in kHz, the unit NDIS reports DS config in.
 * ------------------------------------------------------------- */
use std::fmt;

/**
 * Band type
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Band {
    Band2_4GHz,
    Band5GHz,
    Unknown,
}

impl Band {
    pub fn from_channel(channel: u32) -> Band {
        match channel {
            1..=14 => Band::Band2_4GHz,
            36.. => Band::Band5GHz,
            _ => Band::Unknown,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Band2_4GHz => f.pad("2.4 GHz"),
            Band::Band5GHz => f.pad("5 GHz"),
            Band::Unknown => f.pad("unknown"),
        }
    }
}

/**
 * Convert a frequency in kHz to its 802.11 channel number.
 *
 * Returns 0 for frequencies outside the 2.4 and 5 GHz bands.
 */
pub fn frequency_to_channel(frequency_khz: u32) -> u32 {
    match frequency_khz {
        2_400_001..=2_483_999 => (frequency_khz - 2_407_000) / 5_000,
        2_484_000..=2_495_000 => 14,
        5_000_001..=5_899_999 => (frequency_khz - 5_000_000) / 5_000,
        _ => 0,
    }
}

/**
 * Convert a channel number to its center frequency in kHz.
 *
 * Returns 0 for channels that belong to neither band.
 */
pub fn channel_to_frequency(channel: u32) -> u32 {
    match channel {
        1..=13 => channel * 5_000 + 2_407_000,
        14 => 2_484_000,
        36.. => channel * 5_000 + 5_000_000,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_channels() {
        assert_eq!(frequency_to_channel(2_412_000), 1);
        assert_eq!(frequency_to_channel(2_437_000), 6);
        assert_eq!(frequency_to_channel(2_472_000), 13);
        assert_eq!(frequency_to_channel(2_484_500), 14);
        assert_eq!(frequency_to_channel(5_180_000), 36);
        assert_eq!(frequency_to_channel(5_825_000), 165);
    }

    #[test]
    fn out_of_band_is_unknown() {
        assert_eq!(frequency_to_channel(0), 0);
        assert_eq!(frequency_to_channel(2_400_000), 0);
        assert_eq!(frequency_to_channel(2_495_001), 0);
        assert_eq!(frequency_to_channel(5_000_000), 0);
        assert_eq!(frequency_to_channel(5_900_000), 0);
        assert_eq!(frequency_to_channel(6_115_000), 0);
    }

    #[test]
    fn inverse_mapping() {
        assert_eq!(channel_to_frequency(1), 2_412_000);
        assert_eq!(channel_to_frequency(14), 2_484_000);
        assert_eq!(channel_to_frequency(36), 5_180_000);
        assert_eq!(channel_to_frequency(0), 0);
        assert_eq!(channel_to_frequency(20), 0);
    }

    #[test]
    fn band_of_channel() {
        assert_eq!(Band::from_channel(6), Band::Band2_4GHz);
        assert_eq!(Band::from_channel(149), Band::Band5GHz);
        assert_eq!(Band::from_channel(0), Band::Unknown);
    }

    proptest! {
        #[test]
        fn channel_is_monotonic_in_2_4_ghz(freq in 2_400_001u32..2_483_999) {
            let step = (freq + 5_000).min(2_483_999);
            prop_assert!(frequency_to_channel(freq) <= frequency_to_channel(step));
        }

        #[test]
        fn aligned_frequencies_round_trip(channel in prop_oneof![1u32..=14, 36u32..=177]) {
            let freq = channel_to_frequency(channel);
            prop_assert_eq!(frequency_to_channel(freq), channel);
            prop_assert_eq!(channel_to_frequency(frequency_to_channel(freq)), freq);
        }
    }
}
