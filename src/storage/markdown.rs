//! Markdown wire formats for transcripts and notes
//!
//! Transcript log line: `[MM:SS] **<speaker>**: <content>` where MM:SS
//! is floor(timestamp_start) as zero-padded minutes:seconds. Notes
//! document: `# Notes — <title>` followed by Summary, Decisions, and
//! Action Items sections. Both formats round-trip through the parsers
//! below; sub-second timestamp precision is lost by design.

use super::TranscriptEntry;
use crate::notes::{ActionItem, MeetingNotes};

/// Seconds to a zero-padded `MM:SS` bucket
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// One transcript log line, newline-terminated
pub fn transcript_line(entry: &TranscriptEntry) -> String {
    let speaker = entry.speaker.as_deref().unwrap_or("Unknown");
    format!(
        "[{}] **{}**: {}\n",
        format_timestamp(entry.timestamp_start),
        speaker,
        entry.content
    )
}

/// Header written when a transcript log is created
pub fn transcript_header(title: &str) -> String {
    format!("# Transcript — {}\n\n", title)
}

/// Re-parse a transcript log into its ordered entry sequence.
/// Lines that do not match the entry layout (the header, blanks) are
/// skipped. Parsed timestamps carry second precision.
pub fn parse_transcript(markdown: &str) -> Vec<TranscriptEntry> {
    markdown.lines().filter_map(parse_transcript_line).collect()
}

fn parse_transcript_line(line: &str) -> Option<TranscriptEntry> {
    let rest = line.strip_prefix('[')?;
    let (stamp, rest) = rest.split_once("] ")?;

    let (minutes, seconds) = stamp.split_once(':')?;
    if minutes.len() != 2 || seconds.len() != 2 {
        return None;
    }
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;

    let rest = rest.strip_prefix("**")?;
    let (speaker, content) = rest.split_once("**: ")?;
    if speaker.is_empty() || content.is_empty() {
        return None;
    }

    let timestamp = (minutes * 60 + seconds) as f64;
    Some(TranscriptEntry {
        speaker: Some(speaker.to_string()),
        content: content.to_string(),
        timestamp_start: timestamp,
        timestamp_end: timestamp,
    })
}

/// Render the notes document for a meeting
pub fn notes_document(title: &str, notes: &MeetingNotes) -> String {
    let mut decision_lines = notes
        .decisions
        .iter()
        .map(|decision| format!("- {}", decision))
        .collect::<Vec<_>>()
        .join("\n");
    if decision_lines.is_empty() {
        decision_lines.push_str("- None");
    }

    let mut action_item_lines = notes
        .action_items
        .iter()
        .map(action_item_line)
        .collect::<Vec<_>>()
        .join("\n");
    if action_item_lines.is_empty() {
        action_item_lines.push_str("- [ ] None");
    }

    format!(
        "# Notes — {}\n\n## Summary\n{}\n\n## Decisions\n{}\n\n## Action Items\n{}\n",
        title, notes.summary, decision_lines, action_item_lines
    )
}

fn action_item_line(item: &ActionItem) -> String {
    let mut line = format!("- [ ] {}", item.task);
    if let Some(assignee) = &item.assignee {
        line.push_str(&format!(" — {}", assignee));
    }
    if let Some(due_date) = &item.due_date {
        line.push_str(&format!(" (due: {})", due_date));
    }
    line
}

/// Parse a notes document back into its structured form
pub fn parse_notes(markdown: &str) -> MeetingNotes {
    #[derive(PartialEq)]
    enum Section {
        None,
        Summary,
        Decisions,
        ActionItems,
    }

    let mut section = Section::None;
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut decisions = Vec::new();
    let mut action_items = Vec::new();

    for line in markdown.lines() {
        match line {
            "## Summary" => section = Section::Summary,
            "## Decisions" => section = Section::Decisions,
            "## Action Items" => section = Section::ActionItems,
            _ if line.starts_with("# ") => {}
            _ => match section {
                Section::Summary => summary_lines.push(line),
                Section::Decisions => {
                    let cleaned = line.trim_start_matches('-').trim();
                    if !cleaned.is_empty() && cleaned != "None" {
                        decisions.push(cleaned.to_string());
                    }
                }
                Section::ActionItems => {
                    if let Some(item) = parse_action_item(line) {
                        action_items.push(item);
                    }
                }
                Section::None => {}
            },
        }
    }

    MeetingNotes {
        summary: summary_lines.join("\n").trim().to_string(),
        decisions,
        action_items,
    }
}

fn parse_action_item(line: &str) -> Option<ActionItem> {
    let text = line
        .trim()
        .strip_prefix("- [ ] ")
        .or_else(|| line.trim().strip_prefix("- [x] "))?;

    if text == "None" {
        return None;
    }

    let (text, due_date) = match text.find("(due: ") {
        Some(open) => {
            let close = text[open..].find(')').map(|i| open + i)?;
            let due = text[open + "(due: ".len()..close].trim().to_string();
            let mut remaining = String::new();
            remaining.push_str(&text[..open]);
            remaining.push_str(&text[close + 1..]);
            (remaining.trim().to_string(), Some(due))
        }
        None => (text.to_string(), None),
    };

    let (task, assignee) = match text.split_once(" — ") {
        Some((task, assignee)) => (task.trim().to_string(), Some(assignee.trim().to_string())),
        None => (text.trim().to_string(), None),
    };

    Some(ActionItem {
        task,
        assignee,
        due_date,
    })
}

/// Lowercase a title into a folder-name slug
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_buckets_floor_to_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(0.8), "00:00");
        assert_eq!(format_timestamp(61.2), "01:01");
        assert_eq!(format_timestamp(600.0), "10:00");
    }

    #[test]
    fn transcript_line_formats_speaker_and_bucket() {
        let entry = TranscriptEntry {
            speaker: Some("Me".to_string()),
            content: "Hello".to_string(),
            timestamp_start: 0.0,
            timestamp_end: 0.8,
        };
        assert_eq!(transcript_line(&entry), "[00:00] **Me**: Hello\n");
    }

    #[test]
    fn transcript_line_defaults_unknown_speaker() {
        let entry = TranscriptEntry {
            speaker: None,
            content: "mystery voice".to_string(),
            timestamp_start: 75.0,
            timestamp_end: 76.0,
        };
        assert_eq!(
            transcript_line(&entry),
            "[01:15] **Unknown**: mystery voice\n"
        );
    }

    #[test]
    fn parse_skips_header_and_blank_lines() {
        let log = "# Transcript — Standup\n\n[00:03] **Me**: Good morning\n[00:05] **Others**: Morning\n";
        let entries = parse_transcript(log);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].speaker.as_deref(), Some("Me"));
        assert_eq!(entries[0].content, "Good morning");
        assert_eq!(entries[0].timestamp_start, 3.0);
        assert_eq!(entries[1].timestamp_start, 5.0);
    }

    #[test]
    fn transcript_round_trips_at_second_precision() {
        let entries = vec![
            TranscriptEntry {
                speaker: Some("Me".to_string()),
                content: "First point".to_string(),
                timestamp_start: 12.7,
                timestamp_end: 14.1,
            },
            TranscriptEntry {
                speaker: None,
                content: "A reply: with punctuation".to_string(),
                timestamp_start: 65.2,
                timestamp_end: 66.0,
            },
        ];

        let log: String = entries.iter().map(transcript_line).collect();
        let parsed = parse_transcript(&log);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].content, "First point");
        assert_eq!(parsed[0].timestamp_start, 12.0);
        // None speaker is persisted and re-parsed as the Unknown literal
        assert_eq!(parsed[1].speaker.as_deref(), Some("Unknown"));
        assert_eq!(parsed[1].content, "A reply: with punctuation");
        assert_eq!(parsed[1].timestamp_start, 65.0);
    }

    #[test]
    fn notes_document_layout() {
        let notes = MeetingNotes {
            summary: "We agreed on the plan.".to_string(),
            decisions: vec!["Ship v2 next week".to_string()],
            action_items: vec![
                ActionItem {
                    task: "Write release notes".to_string(),
                    assignee: Some("Dana".to_string()),
                    due_date: Some("Friday".to_string()),
                },
                ActionItem {
                    task: "Book retro".to_string(),
                    assignee: None,
                    due_date: None,
                },
            ],
        };

        let doc = notes_document("Planning", &notes);
        assert_eq!(
            doc,
            "# Notes — Planning\n\n## Summary\nWe agreed on the plan.\n\n## Decisions\n- Ship v2 next week\n\n## Action Items\n- [ ] Write release notes — Dana (due: Friday)\n- [ ] Book retro\n"
        );
    }

    #[test]
    fn empty_notes_sections_render_none_placeholders() {
        let notes = MeetingNotes {
            summary: "Quiet meeting.".to_string(),
            decisions: vec![],
            action_items: vec![],
        };

        let doc = notes_document("Sync", &notes);
        assert!(doc.contains("## Decisions\n- None\n"));
        assert!(doc.contains("## Action Items\n- [ ] None\n"));
    }

    #[test]
    fn notes_round_trip() {
        let notes = MeetingNotes {
            summary: "Two paragraphs.\n\nOf summary.".to_string(),
            decisions: vec!["Use the new API".to_string(), "Defer the rename".to_string()],
            action_items: vec![ActionItem {
                task: "Draft migration doc".to_string(),
                assignee: Some("Sam".to_string()),
                due_date: Some("2025-07-01".to_string()),
            }],
        };

        let parsed = parse_notes(&notes_document("Arch review", &notes));
        assert_eq!(parsed, notes);
    }

    #[test]
    fn none_placeholders_parse_to_empty_lists() {
        let doc = "# Notes — Sync\n\n## Summary\nNothing much.\n\n## Decisions\n- None\n\n## Action Items\n- [ ] None\n";
        let parsed = parse_notes(doc);

        assert_eq!(parsed.summary, "Nothing much.");
        assert!(parsed.decisions.is_empty());
        assert!(parsed.action_items.is_empty());
    }

    #[test]
    fn slugify_collapses_symbol_runs() {
        assert_eq!(slugify("Weekly Standup"), "weekly-standup");
        assert_eq!(slugify("Q3 — Planning!!"), "q3-planning");
        assert_eq!(slugify("---"), "");
    }
}
