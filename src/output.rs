use std::fmt::Write as _;

use crate::Transcript;

/// Render transcript as time-ranged lines: `[start - end] text`, one per unit,
/// each terminated by a newline. This is the form published for summarization.
pub fn assemble(transcript: &Transcript) -> String {
    transcript.units.iter().fold(String::new(), |mut acc, unit| {
        let _ = writeln!(acc, "[{} - {}] {}", to_fixed2(unit.start), to_fixed2(unit.end), unit.text);
        acc
    })
}

/// Two-decimal formatting that rounds exact ties away from zero.
///
/// `{:.2}` rounds ties to even (`0.125` gives `0.12`); published transcripts
/// use `0.13`. A binary double sits exactly halfway between two hundredths
/// only when it is an odd multiple of 1/8, so only those take the manual path.
pub fn to_fixed2(x: f64) -> String {
    if x == 0.0 {
        return "0.00".to_string();
    }

    let eighths = x.abs() * 8.0;
    if eighths.fract() == 0.0 && eighths < 9.0e15 && (eighths as u64) % 2 == 1 {
        let hundredths = (25 * eighths as u64 + 1) / 2;
        let sign = if x < 0.0 { "-" } else { "" };
        return format!("{sign}{}.{:02}", hundredths / 100, hundredths % 100);
    }

    format!("{x:.2}")
}

/// Render transcript as plain text (one unit per line, no timestamps)
pub fn render_text(transcript: &Transcript) -> String {
    transcript
        .units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(transcript: &Transcript) -> String {
    serde_json::to_string_pretty(transcript).unwrap_or_else(|_| "{}".to_string())
}

/// Render transcript as SubRip subtitles
pub fn render_srt(transcript: &Transcript) -> String {
    transcript
        .units
        .iter()
        .enumerate()
        .map(|(i, u)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(u.start),
                srt_timestamp(u.end),
                u.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = (total_ms / 1000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptionUnit;

    fn sample_transcript() -> Transcript {
        Transcript {
            video_id: "test123".to_string(),
            language: "en".to_string(),
            units: vec![CaptionUnit::new("Hello world", 0.0, 1.5), CaptionUnit::new("This is a test", 1.5, 2.0)],
        }
    }

    #[test]
    fn test_assemble_single_unit() {
        let t = Transcript {
            units: vec![CaptionUnit {
                text: "hi".to_string(),
                start: 1.5,
                end: 3.25,
            }],
            ..sample_transcript()
        };
        assert_eq!(assemble(&t), "[1.50 - 3.25] hi\n");
    }

    #[test]
    fn test_assemble_rounds_ties_up() {
        let t = Transcript {
            units: vec![CaptionUnit {
                text: "hi".to_string(),
                start: 0.125,
                end: 2.625,
            }],
            ..sample_transcript()
        };
        assert_eq!(assemble(&t), "[0.13 - 2.63] hi\n");
    }

    #[test]
    fn test_to_fixed2() {
        assert_eq!(to_fixed2(0.0), "0.00");
        assert_eq!(to_fixed2(-0.0), "0.00");
        assert_eq!(to_fixed2(12.375), "12.38");
        assert_eq!(to_fixed2(0.375), "0.38");
        assert_eq!(to_fixed2(-0.125), "-0.13");
        assert_eq!(to_fixed2(1.005), "1.00");
        assert_eq!(to_fixed2(2.5), "2.50");
        assert_eq!(to_fixed2(59.999), "60.00");
        assert_eq!(to_fixed2(3.14159), "3.14");
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let t = sample_transcript();
        let first = assemble(&t);
        assert_eq!(first, assemble(&t));
        assert_eq!(first, "[0.00 - 1.50] Hello world\n[1.50 - 3.50] This is a test\n");
    }

    #[test]
    fn test_assemble_preserves_source_order() {
        let t = Transcript {
            units: vec![CaptionUnit::new("later", 5.0, 1.0), CaptionUnit::new("earlier", 1.0, 1.0)],
            ..sample_transcript()
        };
        assert_eq!(assemble(&t), "[5.00 - 6.00] later\n[1.00 - 2.00] earlier\n");
    }

    #[test]
    fn test_assemble_empty() {
        let t = Transcript::empty("empty", "en");
        assert_eq!(assemble(&t), "");
    }

    #[test]
    fn test_render_text() {
        let t = sample_transcript();
        assert_eq!(render_text(&t), "Hello world\nThis is a test");
    }

    #[test]
    fn test_render_json_contains_units() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&sample_transcript())).unwrap();
        assert_eq!(json["video_id"], "test123");
        assert_eq!(json["units"][1]["text"], "This is a test");
    }

    #[test]
    fn test_render_srt() {
        let t = sample_transcript();
        assert_eq!(
            render_srt(&t),
            "1\n00:00:00,000 --> 00:00:01,500\nHello world\n\n2\n00:00:01,500 --> 00:00:03,500\nThis is a test\n"
        );
    }

    #[test]
    fn test_srt_timestamp_hours() {
        assert_eq!(srt_timestamp(3723.042), "01:02:03,042");
    }
}
