//! Timeline position mapping and the elapsed-time label.

use crate::foundation::core::{Fps, FrameIndex};

/// Map a click at `x_px` on a timeline `width_px` wide to a frame index:
/// `floor(x / width * total_frames)`, clamped to the valid range.
pub fn click_to_frame(x_px: f64, width_px: f64, total_frames: u64) -> FrameIndex {
    if total_frames == 0 || width_px <= 0.0 {
        return FrameIndex(0);
    }
    let frac = (x_px / width_px).clamp(0.0, 1.0);
    let idx = (frac * total_frames as f64).floor() as u64;
    FrameIndex(idx.min(total_frames - 1))
}

/// `SS:FF` elapsed-time label: seconds (mod 60) and the frame within the
/// current second.
pub fn format_timecode(frame: FrameIndex, fps: Fps) -> String {
    let per_sec = (fps.as_f64().round() as u64).max(1);
    let seconds = (frame.0 / per_sec) % 60;
    let frames = frame.0 % per_sec;
    format!("{seconds:02}:{frames:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_click_maps_to_middle_frame() {
        assert_eq!(click_to_frame(450.0, 900.0, 240), FrameIndex(120));
    }

    #[test]
    fn edges_stay_in_range() {
        assert_eq!(click_to_frame(0.0, 900.0, 240), FrameIndex(0));
        assert_eq!(click_to_frame(900.0, 900.0, 240), FrameIndex(239));
        assert_eq!(click_to_frame(-10.0, 900.0, 240), FrameIndex(0));
        assert_eq!(click_to_frame(1500.0, 900.0, 240), FrameIndex(239));
    }

    #[test]
    fn degenerate_timeline_maps_to_frame_0() {
        assert_eq!(click_to_frame(10.0, 0.0, 240), FrameIndex(0));
        assert_eq!(click_to_frame(10.0, 900.0, 0), FrameIndex(0));
    }

    #[test]
    fn timecode_counts_seconds_and_frames() {
        let fps = Fps { num: 24, den: 1 };
        assert_eq!(format_timecode(FrameIndex(0), fps), "00:00");
        assert_eq!(format_timecode(FrameIndex(23), fps), "00:23");
        assert_eq!(format_timecode(FrameIndex(24), fps), "01:00");
        assert_eq!(format_timecode(FrameIndex(239), fps), "09:23");
    }
}
