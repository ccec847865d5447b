use scanner_core::{find_matches, ConfigurationError, SearchMatch, SearchSession};
use pretty_assertions::assert_eq;

fn m(start: usize, end: usize) -> SearchMatch {
    SearchMatch::new(start, end)
}

#[test]
fn repeated_term_matches_left_to_right() {
    let matches = find_matches("abcabcabc", "abc").unwrap();
    assert_eq!(
        matches,
        vec![m(0, 3), m(3, 6), m(6, 9)]
    );
}

#[test]
fn overlapping_occurrences_are_skipped() {
    let matches = find_matches("aaaa", "aa").unwrap();
    assert_eq!(matches, vec![m(0, 2), m(2, 4)]);
}

#[test]
fn search_is_case_sensitive_and_literal() {
    assert!(find_matches("ABC", "abc").unwrap().is_empty());
    assert_eq!(find_matches("a.c abc", "a.c").unwrap(), vec![m(0, 3)]);
}

#[test]
fn empty_term_is_rejected() {
    assert_eq!(
        find_matches("anything", ""),
        Err(ConfigurationError::EmptySearchTerm)
    );
    assert_eq!(
        SearchSession::new("anything", ""),
        Err(ConfigurationError::EmptySearchTerm)
    );
}

#[test]
fn absent_term_is_an_empty_result() {
    assert_eq!(find_matches("hello", "xyz"), Ok(Vec::new()));
    let mut session = SearchSession::new("hello", "xyz").unwrap();
    assert!(session.is_empty());
    assert_eq!(session.current(), None);
    assert_eq!(session.select_next(), None);
    assert_eq!(session.select_previous(), None);
}

#[test]
fn offsets_are_byte_offsets() {
    let matches = find_matches("café café", "café").unwrap();
    assert_eq!(matches, vec![m(0, 5), m(6, 11)]);
}

#[test]
fn navigation_clamps_at_both_ends() {
    let mut session = SearchSession::new("x-x-x", "x").unwrap();
    assert_eq!(session.position(), Some(0));
    assert_eq!(session.select_previous(), Some(m(0, 1)));

    assert_eq!(session.select_next(), Some(m(2, 3)));
    assert_eq!(session.select_next(), Some(m(4, 5)));
    assert_eq!(session.select_next(), Some(m(4, 5)));
    assert_eq!(session.position(), Some(2));

    assert_eq!(session.select_previous(), Some(m(2, 3)));
    assert_eq!(session.select_previous(), Some(m(0, 1)));
    assert_eq!(session.select_previous(), Some(m(0, 1)));
    assert_eq!(session.term(), "x");
}
