use crate::ConfigurationError;

/// Half-open byte range `[start, end)` of one occurrence in the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchMatch {
    pub start: usize,
    pub end: usize,
}

impl SearchMatch {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<(usize, usize)> for SearchMatch {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// Finds every non-overlapping occurrence of `term`, scanning left to right.
///
/// Case-sensitive and literal. After a hit the scan resumes at its end, so
/// `"aaaa"` / `"aa"` yields two matches, not three.
pub fn find_matches(text: &str, term: &str) -> Result<Vec<SearchMatch>, ConfigurationError> {
    if term.is_empty() {
        return Err(ConfigurationError::EmptySearchTerm);
    }
    let mut matches = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(term) {
        let start = cursor + offset;
        let end = start + term.len();
        matches.push(SearchMatch { start, end });
        cursor = end;
    }
    Ok(matches)
}

/// Computed matches plus a navigation cursor over them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSession {
    term: String,
    matches: Vec<SearchMatch>,
    cursor: Option<usize>,
}

impl SearchSession {
    /// Searches `text` and selects the first match, if any.
    pub fn new(text: &str, term: &str) -> Result<Self, ConfigurationError> {
        let matches = find_matches(text, term)?;
        let cursor = if matches.is_empty() { None } else { Some(0) };
        Ok(Self {
            term: term.to_string(),
            matches,
            cursor,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Index of the selected match.
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<SearchMatch> {
        self.cursor.map(|idx| self.matches[idx])
    }

    /// Moves to the following match; stays on the last one at the end.
    pub fn select_next(&mut self) -> Option<SearchMatch> {
        if let Some(idx) = self.cursor {
            if idx + 1 < self.matches.len() {
                self.cursor = Some(idx + 1);
            }
        }
        self.current()
    }

    /// Moves to the preceding match; stays on the first one at the start.
    pub fn select_previous(&mut self) -> Option<SearchMatch> {
        if let Some(idx) = self.cursor {
            self.cursor = Some(idx.saturating_sub(1));
        }
        self.current()
    }
}
