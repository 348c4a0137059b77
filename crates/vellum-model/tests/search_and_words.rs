//! Model-level search, word lookup, and indent guide queries.

mod common;

use common::demo_model;
use vellum_model::{SearchQuery, TextModel};
use vellum_text::{Position, Range};

#[test]
fn find_matches_over_the_whole_model() {
    let model = TextModel::with_defaults("alpha beta\ngamma alpha");
    let found = model
        .find_matches(&SearchQuery::literal("alpha"), None, false, None)
        .unwrap();
    let ranges: Vec<_> = found.iter().map(|m| m.range).collect();
    assert_eq!(ranges, vec![Range::new(1, 1, 1, 6), Range::new(2, 7, 2, 12)]);
}

#[test]
fn find_matches_respects_scope_and_limit() {
    let model = TextModel::with_defaults("x x x x x");
    let scoped = model
        .find_matches(
            &SearchQuery::literal("x"),
            Some(Range::new(1, 3, 1, 8)),
            false,
            None,
        )
        .unwrap();
    assert_eq!(scoped.len(), 3);

    let limited = model
        .find_matches(&SearchQuery::literal("x"), None, false, Some(2))
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn find_next_wraps_around() {
    let model = TextModel::with_defaults("a\nb\na");
    let q = SearchQuery::literal("a");
    let hit = model
        .find_next_match(&q, Position::new(3, 2), false)
        .unwrap()
        .unwrap();
    assert_eq!(hit.range, Range::new(1, 1, 1, 2));
    let prev = model
        .find_previous_match(&q, Position::new(1, 1), false)
        .unwrap()
        .unwrap();
    assert_eq!(prev.range, Range::new(3, 1, 3, 2));
}

#[test]
fn regex_search_with_captures() {
    let model = TextModel::with_defaults("width = 120\nheight = 80");
    let found = model
        .find_matches(&SearchQuery::regex(r"(\w+) = (\d+)"), None, true, None)
        .unwrap();
    assert_eq!(found.len(), 2);
    let caps = found[1].matches.as_ref().unwrap();
    assert_eq!(caps[1], "height");
    assert_eq!(caps[2], "80");
}

#[test]
fn word_at_position_uses_default_pattern() {
    let model = TextModel::with_defaults("hello big_world 3.14");
    let w = model
        .get_word_at_position(Position::new(1, 9))
        .unwrap()
        .unwrap();
    assert_eq!(w.word, "big_world");
    assert_eq!((w.start_column, w.end_column), (7, 16));

    let num = model
        .get_word_at_position(Position::new(1, 18))
        .unwrap()
        .unwrap();
    assert_eq!(num.word, "3.14");

    // Between two separators there is no covering word.
    let gap = TextModel::with_defaults("a  b");
    assert!(gap
        .get_word_at_position(Position::new(1, 3))
        .unwrap()
        .is_none());
}

#[test]
fn word_until_position_truncates() {
    let model = TextModel::with_defaults("identifier");
    let w = model.get_word_until_position(Position::new(1, 5)).unwrap();
    assert_eq!(w.word, "iden");
    assert_eq!((w.start_column, w.end_column), (1, 5));
}

#[test]
fn word_lookup_spans_same_language_tokens() {
    // The demo tokenizer splits at quotes, but the quoted part is still the
    // same language, so the word span crosses token boundaries.
    let mut model = demo_model("abc\"def\"ghi");
    model.force_tokenization(1).unwrap();
    let w = model
        .get_word_at_position(Position::new(1, 2))
        .unwrap()
        .unwrap();
    assert_eq!(w.word, "abc");
}

#[test]
fn indent_guides_for_a_block() {
    let model = TextModel::with_defaults("fn f() {\n    let x = 1;\n\n    let y = 2;\n}");
    assert_eq!(
        model.get_lines_indent_guides(1, 5).unwrap(),
        vec![0, 1, 1, 1, 0]
    );
}

#[test]
fn indent_guides_reject_bad_lines() {
    let model = TextModel::with_defaults("one line");
    assert!(model.get_lines_indent_guides(1, 9).is_err());
}
