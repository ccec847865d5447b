use std::fmt;

use similar::{Algorithm, ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineTag {
    Context,
    Added,
    Removed,
}

impl LineTag {
    pub fn prefix(self) -> char {
        match self {
            LineTag::Context => ' ',
            LineTag::Added => '+',
            LineTag::Removed => '-',
        }
    }

    /// The tag the same line carries when the inputs are swapped.
    pub fn inverse(self) -> Self {
        match self {
            LineTag::Context => LineTag::Context,
            LineTag::Added => LineTag::Removed,
            LineTag::Removed => LineTag::Added,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: LineTag,
    pub content: String,
}

/// Line-by-line comparison of two buffers, in original line order.
///
/// Empty when the buffers have the same lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffRecord {
    lines: Vec<DiffLine>,
}

impl DiffRecord {
    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.with_tag(LineTag::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.with_tag(LineTag::Removed)
    }

    fn with_tag(&self, tag: LineTag) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |line| line.tag == tag)
            .map(|line| line.content.as_str())
    }
}

impl fmt::Display for DiffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}{}", line.tag.prefix(), line.content)?;
        }
        Ok(())
    }
}

/// What comparing a job's previous and current capture produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// There is no earlier capture to compare against.
    NoBaseline,
    /// Both captures have the same lines.
    Identical,
    Changed(DiffRecord),
}

/// LCS line diff of `previous` against `current`.
pub fn diff_lines(previous: &str, current: &str) -> DiffRecord {
    let old: Vec<&str> = previous.lines().collect();
    let new: Vec<&str> = current.lines().collect();
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_slices(&old, &new);

    let mut changed = false;
    let lines: Vec<DiffLine> = diff
        .iter_all_changes()
        .map(|change| {
            let tag = match change.tag() {
                ChangeTag::Equal => LineTag::Context,
                ChangeTag::Insert => LineTag::Added,
                ChangeTag::Delete => LineTag::Removed,
            };
            changed |= tag != LineTag::Context;
            DiffLine {
                tag,
                content: change.value().to_string(),
            }
        })
        .collect();

    if changed {
        DiffRecord { lines }
    } else {
        DiffRecord::default()
    }
}

pub fn compare(previous: Option<&str>, current: &str) -> DiffOutcome {
    let Some(previous) = previous else {
        return DiffOutcome::NoBaseline;
    };
    let record = diff_lines(previous, current);
    if record.is_empty() {
        DiffOutcome::Identical
    } else {
        DiffOutcome::Changed(record)
    }
}

/// Hunked unified diff text with `---`/`+++` headers and three context lines.
///
/// Empty when the buffers have the same lines.
pub fn unified_text(previous: &str, current: &str) -> String {
    if diff_lines(previous, current).is_empty() {
        return String::new();
    }
    TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_lines(previous, current)
        .unified_diff()
        .context_radius(3)
        .header("previous", "current")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_newline_does_not_count_as_change() {
        assert!(diff_lines("a\nb", "a\nb\n").is_empty());
    }

    #[test]
    fn unified_text_has_headers_and_hunk() {
        let text = unified_text("a\nb\nc\n", "a\nx\nc\n");
        assert!(text.starts_with("--- previous\n+++ current\n"));
        assert!(text.contains("@@"));
        assert!(text.contains("-b\n"));
        assert!(text.contains("+x\n"));
    }
}
