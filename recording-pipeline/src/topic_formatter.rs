//! Topic formatting variants for upload metadata templates (§4.9.6 step 4,
//! SPEC_FULL.md §B). Renders a recording's topic list into a fragment that
//! title/description templates can interpolate.

use crate::domain::recording::TopicTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicFormat {
    Numbered,
    Bullet,
    Dash,
    Comma,
    Inline,
}

impl std::str::FromStr for TopicFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "numbered" => TopicFormat::Numbered,
            "bullet" => TopicFormat::Bullet,
            "dash" => TopicFormat::Dash,
            "comma" => TopicFormat::Comma,
            "inline" => TopicFormat::Inline,
            other => return Err(format!("unknown topic format: {other}")),
        })
    }
}

fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Render topics-with-timestamps per `format`. Falls back to the plain topic
/// string list (no timestamps) when `with_timestamps` is false or the
/// timestamp list is empty.
pub fn format_topics(
    main_topics: &[String],
    topics_with_timestamps: Option<&[TopicTimestamp]>,
    format: TopicFormat,
    with_timestamps: bool,
) -> String {
    let lines: Vec<String> = if with_timestamps {
        match topics_with_timestamps {
            Some(topics) if !topics.is_empty() => topics
                .iter()
                .map(|t| format!("{} [{}]", t.topic, format_timestamp(t.timestamp_seconds)))
                .collect(),
            _ => main_topics.to_vec(),
        }
    } else {
        main_topics.to_vec()
    };

    if lines.is_empty() {
        return String::new();
    }

    match format {
        TopicFormat::Numbered => lines
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t))
            .collect::<Vec<_>>()
            .join("\n"),
        TopicFormat::Bullet => lines
            .iter()
            .map(|t| format!("\u{2022} {t}"))
            .collect::<Vec<_>>()
            .join("\n"),
        TopicFormat::Dash => lines
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n"),
        TopicFormat::Comma => lines.join(", "),
        TopicFormat::Inline => lines.join(" | "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Vec<TopicTimestamp> {
        vec![
            TopicTimestamp { topic: "Intro".into(), timestamp_seconds: 0.0 },
            TopicTimestamp { topic: "Q&A".into(), timestamp_seconds: 3725.0 },
        ]
    }

    #[test]
    fn numbered_with_timestamps() {
        let out = format_topics(&[], Some(&topics()), TopicFormat::Numbered, true);
        assert_eq!(out, "1. Intro [00:00]\n2. Q&A [01:02:05]");
    }

    #[test]
    fn comma_without_timestamps_uses_main_topics() {
        let main = vec!["Intro".to_string(), "Q&A".to_string()];
        let out = format_topics(&main, Some(&topics()), TopicFormat::Comma, false);
        assert_eq!(out, "Intro, Q&A");
    }

    #[test]
    fn empty_topics_render_empty_string() {
        let out = format_topics(&[], None, TopicFormat::Bullet, true);
        assert_eq!(out, "");
    }
}
