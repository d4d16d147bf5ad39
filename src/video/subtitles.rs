use crate::scene::ReadyScene;

/// Format a second offset as an SRT timestamp, zero-padded `HH:MM:SS,mmm`.
pub fn format_timestamp(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02},000", hours, minutes, seconds)
}

/// Build the SRT track: one entry per scene (image-less scenes included),
/// entry i covering [i*D, (i+1)*D) with the scene's narration as its text.
pub fn build_srt(scenes: &[ReadyScene], scene_duration_secs: u64) -> String {
    let mut srt = String::new();
    for (i, scene) in scenes.iter().enumerate() {
        let start = i as u64 * scene_duration_secs;
        let end = (i as u64 + 1) * scene_duration_secs;
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(start),
            format_timestamp(end),
            scene.narration
        ));
    }
    srt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(narration: &str) -> ReadyScene {
        ReadyScene {
            narration: narration.to_string(),
            image: None,
        }
    }

    #[test]
    fn timestamps_are_zero_padded() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(5), "00:00:05,000");
        assert_eq!(format_timestamp(65), "00:01:05,000");
        assert_eq!(format_timestamp(3600 + 7 * 60 + 9), "01:07:09,000");
    }

    #[test]
    fn entries_tile_the_timeline() {
        let scenes = [scene("first"), scene("second"), scene("third")];
        let srt = build_srt(&scenes, 5);

        let expected = "1\n00:00:00,000 --> 00:00:05,000\nfirst\n\n\
                        2\n00:00:05,000 --> 00:00:10,000\nsecond\n\n\
                        3\n00:00:10,000 --> 00:00:15,000\nthird\n\n";
        assert_eq!(srt, expected);
    }

    #[test]
    fn one_entry_per_scene_even_without_images() {
        let scenes = [scene("a"), scene("b")];
        let srt = build_srt(&scenes, 5);
        assert_eq!(srt.matches(" --> ").count(), 2);
    }
}
