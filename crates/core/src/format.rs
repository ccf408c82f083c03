use std::collections::BTreeMap;

use crate::{
    sentiment::{SentimentOutcome, SentimentSummary},
    types::{Comment, ScrapeStats, Video},
};

/// Format seconds as MM:SS, or H:MM:SS past an hour
pub fn format_duration_secs(seconds: u64) -> String {
    let (hours, mins, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// First `max` characters, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

pub fn format_videos_readable(videos: &[Video]) -> String {
    let mut output = String::new();
    for (i, video) in videos.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, video.title));
        output.push_str(&format!(
            "   {} | {} views | {} likes | {} | {}\n",
            video.channel,
            video.views,
            video.likes,
            format_duration_secs(video.duration),
            video.upload_date.format("%Y-%m-%d %H:%M UTC")
        ));
        output.push_str(&format!("   {}\n", video.url));
    }
    output
}

pub fn format_comments_readable(comments: &[Comment]) -> String {
    let mut output = String::new();
    for comment in comments {
        let marker = if comment.is_reply { "  ↳" } else { "•" };
        output.push_str(&format!(
            "{} {} ({} likes): {}\n",
            marker,
            comment.author,
            comment.likes,
            preview(&comment.text, 200)
        ));
    }
    output
}

pub fn format_stats_readable(stats: &ScrapeStats) -> String {
    let mut output = String::new();
    output.push_str(&format!("## Run {}\n\n", stats.run_id));
    output.push_str(&format!(
        "**Videos:** {} found, {} processed | **Comments:** {} kept, {} filtered\n",
        stats.videos_found, stats.videos_processed, stats.comments_extracted, stats.comments_filtered
    ));
    if let Some(elapsed) = stats.elapsed_seconds() {
        output.push_str(&format!("**Elapsed:** {:.1}s\n", elapsed));
    }
    if !stats.errors.is_empty() {
        output.push_str("\n## Errors\n\n");
        for error in &stats.errors {
            output.push_str(&format!("• {}\n", error));
        }
    }
    output
}

pub fn format_summary_readable(summary: &SentimentSummary) -> String {
    if summary.total == 0 {
        return "No classified comments\n".to_string();
    }
    let mut output = String::new();
    output.push_str(&format!("## Sentiment ({} comments)\n\n", summary.total));
    output.push_str(&format!(
        "• positive: {} ({:.1}%)\n",
        summary.positive_count, summary.positive_pct
    ));
    output.push_str(&format!(
        "• negative: {} ({:.1}%)\n",
        summary.negative_count, summary.negative_pct
    ));
    output.push_str(&format!(
        "• neutral:  {} ({:.1}%)\n",
        summary.neutral_count, summary.neutral_pct
    ));
    output.push_str(&format!(
        "\n**Avg score:** {:.2} | **Avg confidence:** {:.2}\n",
        summary.avg_score, summary.avg_confidence
    ));
    output
}

pub fn format_outcomes_readable(outcomes: &[SentimentOutcome]) -> String {
    let mut output = String::new();
    for outcome in outcomes {
        let label = outcome
            .sentiment
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unlabeled".to_string());
        output.push_str(&format!(
            "[{}] {} (score {:.2}, confidence {:.2}): {}\n",
            outcome.provenance,
            label,
            outcome.score,
            outcome.confidence,
            preview(&outcome.text, 80)
        ));
    }
    output
}

pub fn format_tally_readable(tally: &BTreeMap<String, usize>) -> String {
    if tally.is_empty() {
        return "No party mentions\n".to_string();
    }
    let mut rows: Vec<_> = tally.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1));
    let mut output = String::from("## Mentions\n\n");
    for (label, count) in rows {
        output.push_str(&format!("• {}: {}\n", label, count));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::aggregate;
    use crate::sentiment::{Provenance, Sentiment};

    #[test]
    fn durations() {
        assert_eq!(format_duration_secs(59), "00:59");
        assert_eq!(format_duration_secs(61), "01:01");
        assert_eq!(format_duration_secs(3_725), "1:02:05");
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("señor", 3), "señ…");
        assert_eq!(preview("sí", 3), "sí");
    }

    #[test]
    fn summary_lists_each_class() {
        let outcomes = vec![SentimentOutcome {
            text: "me encanta".to_string(),
            sentiment: Some(Sentiment::Positive),
            score: 0.8,
            confidence: 0.75,
            provenance: Provenance::Local,
        }];
        let readable = format_summary_readable(&aggregate(&outcomes));
        assert!(readable.contains("1 comments"));
        assert!(readable.contains("positive: 1 (100.0%)"));
        assert!(format_outcomes_readable(&outcomes).starts_with("[local] positive"));
        assert_eq!(
            format_summary_readable(&SentimentSummary::default()),
            "No classified comments\n"
        );
    }

    #[test]
    fn tally_is_sorted_by_count() {
        let tally = BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 3)]);
        let readable = format_tally_readable(&tally);
        assert!(readable.find("B: 3").unwrap() < readable.find("A: 1").unwrap());
    }
}
