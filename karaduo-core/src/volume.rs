//! Focus-based volume selection.
//!
//! Pure target-volume selectors: no ramping, no state. Any smoothing is a
//! presentation-layer concern.

use crate::manifest::TimingHints;

/// Target vocal volume for the current focus state.
///
/// An active override forces the unfocused level regardless of position (the
/// manual mute/solo escape hatch). With focus control disabled the focused
/// level always applies.
#[must_use]
pub fn vocal_volume(hints: &TimingHints, focused: bool, override_active: bool) -> f32 {
    if override_active {
        return hints.vocal_volume_unfocused;
    }
    if hints.use_focus_volume_control {
        if focused {
            hints.vocal_volume_focused
        } else {
            hints.vocal_volume_unfocused
        }
    } else {
        hints.vocal_volume_focused
    }
}

/// Target instrumental volume for the current focus state. The instrumental
/// track has no override.
#[must_use]
pub fn instrumental_volume(hints: &TimingHints, focused: bool) -> f32 {
    if hints.use_focus_volume_control {
        if focused {
            hints.instrumental_volume_focused
        } else {
            hints.instrumental_volume_unfocused
        }
    } else {
        hints.instrumental_volume_focused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> TimingHints {
        TimingHints {
            vocal_volume_focused: 0.0,
            vocal_volume_unfocused: 1.0,
            instrumental_volume_focused: 0.8,
            instrumental_volume_unfocused: 0.5,
            use_focus_volume_control: true,
            ..TimingHints::default()
        }
    }

    #[test]
    fn test_vocal_focus_rule() {
        let hints = hints();
        // Inside a segment the vocal stem ducks to the focused level
        assert_eq!(vocal_volume(&hints, true, false), 0.0);
        // Outside any segment it comes back up
        assert!((vocal_volume(&hints, false, false) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_vocal_override_wins_regardless_of_focus() {
        let hints = hints();
        assert!((vocal_volume(&hints, true, true) - 1.0).abs() < f32::EPSILON);
        assert!((vocal_volume(&hints, false, true) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_focus_control_disabled_pins_focused_level() {
        let mut hints = hints();
        hints.use_focus_volume_control = false;
        assert_eq!(vocal_volume(&hints, false, false), 0.0);
        assert!((instrumental_volume(&hints, false) - 0.8).abs() < f32::EPSILON);
        // Override still applies with focus control disabled
        assert!((vocal_volume(&hints, false, true) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_instrumental_focus_rule() {
        let hints = hints();
        assert!((instrumental_volume(&hints, true) - 0.8).abs() < f32::EPSILON);
        assert!((instrumental_volume(&hints, false) - 0.5).abs() < f32::EPSILON);
    }
}
