use std::ops::BitOr;

/// Capability flags advertised to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SupportedFeatures(u32);

impl SupportedFeatures {
    pub const PAUSE: Self = Self(1);
    pub const VOLUME_SET: Self = Self(1 << 2);
    pub const VOLUME_MUTE: Self = Self(1 << 3);
    pub const PREVIOUS_TRACK: Self = Self(1 << 4);
    pub const NEXT_TRACK: Self = Self(1 << 5);
    pub const TURN_ON: Self = Self(1 << 7);
    pub const TURN_OFF: Self = Self(1 << 8);
    pub const PLAY_MEDIA: Self = Self(1 << 9);
    pub const VOLUME_STEP: Self = Self(1 << 10);
    pub const SELECT_SOURCE: Self = Self(1 << 11);
    pub const PLAY: Self = Self(1 << 14);

    /// Everything a TV supports without wake-on-LAN
    pub const BASE: Self = Self(
        Self::PAUSE.0
            | Self::VOLUME_STEP.0
            | Self::VOLUME_MUTE.0
            | Self::PREVIOUS_TRACK.0
            | Self::NEXT_TRACK.0
            | Self::TURN_OFF.0
            | Self::PLAY.0
            | Self::PLAY_MEDIA.0
            | Self::VOLUME_SET.0
            | Self::SELECT_SOURCE.0,
    );

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SupportedFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_excludes_turn_on() {
        assert!(SupportedFeatures::BASE.contains(SupportedFeatures::TURN_OFF));
        assert!(SupportedFeatures::BASE.contains(SupportedFeatures::SELECT_SOURCE));
        assert!(!SupportedFeatures::BASE.contains(SupportedFeatures::TURN_ON));

        let with_wake = SupportedFeatures::BASE | SupportedFeatures::TURN_ON;
        assert!(with_wake.contains(SupportedFeatures::TURN_ON));
        assert!(with_wake.contains(SupportedFeatures::BASE));
    }
}
