//! Emotional summary prompt and normalization.
//!
//! The model is asked for exactly three labeled sections but in practice
//! returns them with inconsistent casing, stray bullets, reordered labels
//! or missing entirely. `normalize` coerces whatever came back into a fixed
//! `Emotion` / `Solution` / `Motivation` structure with a reassuring
//! default for any section the model dropped, so the client always renders
//! three non-empty sections.

use serde::Serialize;

const LABELS: [&str; 3] = ["Emotion", "Solution", "Motivation"];

const EMOTION_DEFAULT: &str =
    "Your recent entries reflect a mix of feelings, and every one of them is valid.";
const SOLUTION_DEFAULT: &str =
    "Keep writing a little each day; small, steady reflection is its own kind of care.";
const MOTIVATION_DEFAULT: &str = "You're stronger than you think.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedSummary {
    pub emotion: String,
    pub solution: String,
    pub motivation: String,
}

impl NormalizedSummary {
    /// Reassembles the canonical three-section text, fixed order regardless
    /// of how the model ordered its output.
    pub fn to_text(&self) -> String {
        format!(
            "Emotion:\n{}\n\nSolution:\n{}\n\nMotivation:\n{}",
            self.emotion, self.solution, self.motivation
        )
    }
}

pub fn build_prompt(entries: &[String]) -> String {
    let bullets = entries
        .iter()
        .map(|content| format!("- {content}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a kind and empathetic mental health assistant. A user has written {} journal entries.

Your job is to analyze and return a short, human-friendly response in the following format:

Emotion:
<emotional summary in 2-3 lines addressing the user gently>

Solution:
<personalized suggestions or gentle self-help tips in 2-3 lines>

Motivation:
<short, encouraging closing line (e.g., "You're stronger than you think.")>

Only output the response in that structure - no extra explanation.

Journals:
{}"#,
        entries.len(),
        bullets
    )
}

/// Position of `label` followed by a colon, matched ASCII-case-insensitively
/// at the start of a line (leading bullets/whitespace allowed). Returns
/// (label start, text start after the colon).
///
/// All offsets are byte indices into `raw` itself; no case-folded copy is
/// indexed, since lowercasing can change UTF-8 lengths and shift every
/// subsequent offset.
fn find_label(raw: &str, label: &str) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for line in raw.split_inclusive('\n') {
        let content = line
            .char_indices()
            .find(|&(_, c)| !c.is_whitespace() && !matches!(c, '-' | '*' | '•' | '#'))
            .map(|(i, _)| i);

        if let Some(offset) = content {
            let rest = line[offset..].as_bytes();
            if rest.len() > label.len()
                && rest[label.len()] == b':'
                && rest[..label.len()].eq_ignore_ascii_case(label.as_bytes())
            {
                let pos = line_start + offset;
                return Some((pos, pos + label.len() + 1));
            }
        }
        line_start += line.len();
    }
    None
}

/// Strips leading list markers per line and collapses 3+ newlines to 2.
fn tidy(text: &str) -> String {
    let stripped = text
        .lines()
        .map(|line| {
            line.trim_start()
                .trim_start_matches(['-', '*', '•'])
                .trim_start()
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(stripped.len());
    let mut newlines = 0;
    for c in stripped.trim().chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Extracts one section: text after the label up to the next recognized
/// label or end of string.
fn extract_section(raw: &str, label: &str) -> Option<String> {
    let (_, text_start) = find_label(raw, label)?;

    let end = LABELS
        .iter()
        .filter(|&&other| other != label)
        .filter_map(|other| find_label(&raw[text_start..], other))
        .map(|(start, _)| text_start + start)
        .min()
        .unwrap_or(raw.len());

    let section = tidy(&raw[text_start..end]);
    (!section.is_empty()).then_some(section)
}

pub fn normalize(raw: &str) -> NormalizedSummary {
    NormalizedSummary {
        emotion: extract_section(raw, "Emotion").unwrap_or_else(|| EMOTION_DEFAULT.into()),
        solution: extract_section(raw, "Solution").unwrap_or_else(|| SOLUTION_DEFAULT.into()),
        motivation: extract_section(raw, "Motivation")
            .unwrap_or_else(|| MOTIVATION_DEFAULT.into()),
    }
}
