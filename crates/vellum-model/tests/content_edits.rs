//! Content editing scenarios: simple edits, EOL switching, offset mapping,
//! validation.

use vellum_model::TextModel;
use vellum_text::{
    EditOperation, Eol, EolPreference, Position, Range, RawChange,
};

fn value(model: &TextModel) -> String {
    model.get_value(EolPreference::TextDefined, false).unwrap()
}

#[test]
fn simple_insert_changes_one_line() {
    let mut model = TextModel::with_defaults("abc\ndef");
    let v0 = model.get_version_id();

    let raw_seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = raw_seen.clone();
    model.on_did_change_raw_content(move |e| sink.borrow_mut().extend(e.changes.clone()));

    model
        .apply_edits(vec![EditOperation::insert(Position::new(1, 2), "X")])
        .unwrap();

    assert_eq!(value(&model), "aXbc\ndef");
    assert_eq!(model.get_version_id(), v0 + 1);
    assert_eq!(
        *raw_seen.borrow(),
        vec![RawChange::LineChanged { line: 1, content: "aXbc".into() }]
    );
}

#[test]
fn eol_switch_keeps_positions() {
    let mut model = TextModel::with_defaults("a\r\nb");
    assert_eq!(model.get_eol().unwrap(), Eol::CrLf);
    assert_eq!(model.get_offset_at(Position::new(2, 1)).unwrap(), 3);

    let raw_seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = raw_seen.clone();
    model.on_did_change_raw_content(move |e| sink.borrow_mut().extend(e.changes.clone()));

    let v0 = model.get_version_id();
    model.set_eol(Eol::Lf).unwrap();

    assert_eq!(value(&model), "a\nb");
    assert_eq!(model.get_line_count().unwrap(), 2);
    assert_eq!(model.get_offset_at(Position::new(2, 1)).unwrap(), 2);
    assert_eq!(model.get_version_id(), v0 + 1);
    assert_eq!(*raw_seen.borrow(), vec![RawChange::EolChanged { eol: Eol::Lf }]);

    // Setting the current EOL again is a no-op: no version bump, no event.
    model.set_eol(Eol::Lf).unwrap();
    assert_eq!(model.get_version_id(), v0 + 1);
    assert_eq!(raw_seen.borrow().len(), 1);
}

#[test]
fn offset_position_round_trip_through_model() {
    let model = TextModel::with_defaults("one\ntwo three\n\u{1F600}x");
    for line in 1..=model.get_line_count().unwrap() {
        let max = model.get_line_max_column(line).unwrap();
        for column in 1..=max {
            let p = Position::new(line, column);
            let p = model.validate_position(p).unwrap();
            let offset = model.get_offset_at(p).unwrap();
            assert_eq!(model.get_position_at(offset).unwrap(), p);
        }
    }
}

#[test]
fn version_only_bumps_on_content_events() {
    let mut model = TextModel::with_defaults("abc");
    let v0 = model.get_version_id();
    // Reads do not bump.
    let _ = model.get_value_in_range(Range::new(1, 1, 1, 2), EolPreference::TextDefined);
    let _ = model.get_line_content(1);
    assert_eq!(model.get_version_id(), v0);
    // Edits bump by one per batch.
    model
        .apply_edits(vec![
            EditOperation::insert(Position::new(1, 1), "x"),
            EditOperation::insert(Position::new(1, 3), "y"),
        ])
        .unwrap();
    assert_eq!(model.get_version_id(), v0 + 1);
}

#[test]
fn reverse_edits_round_trip() {
    let original = "alpha\nbeta\ngamma";
    let mut model = TextModel::with_defaults(original);
    let reverse = model
        .apply_edits(vec![
            EditOperation::replace(Range::new(1, 1, 1, 3), "AL"),
            EditOperation::delete(Range::new(2, 1, 3, 1)),
        ])
        .unwrap();
    assert_ne!(value(&model), original);
    model.apply_edits(reverse).unwrap();
    assert_eq!(value(&model), original);
    assert_eq!(model.get_eol().unwrap(), Eol::Lf);
}

#[test]
fn validate_position_clamps() {
    let model = TextModel::with_defaults("short\nlonger line");
    assert_eq!(
        model.validate_position(Position::new(0, 0)).unwrap(),
        Position::new(1, 1)
    );
    assert_eq!(
        model.validate_position(Position::new(99, 99)).unwrap(),
        Position::new(2, 12)
    );
    assert_eq!(
        model.validate_position(Position::new(1, 99)).unwrap(),
        Position::new(1, 6)
    );
}

#[test]
fn validate_position_never_splits_surrogates() {
    // Column 2 would sit between the two halves of the emoji.
    let model = TextModel::with_defaults("\u{1F600}b");
    let p = model.validate_position(Position::new(1, 2)).unwrap();
    assert_eq!(p, Position::new(1, 1));
    assert_eq!(
        model.validate_position(Position::new(1, 3)).unwrap(),
        Position::new(1, 3)
    );
}

#[test]
fn validate_range_expands_around_surrogates() {
    let model = TextModel::with_defaults("a\u{1F600}b");
    // Columns 3 splits the pair (emoji occupies columns 2..4).
    let r = model.validate_range(Range::new(1, 3, 1, 5)).unwrap();
    assert_eq!(r, Range::new(1, 2, 1, 5));
    let r = model.validate_range(Range::new(1, 1, 1, 3)).unwrap();
    assert_eq!(r, Range::new(1, 1, 1, 4));
    // Empty range inside the pair shifts left instead of expanding.
    let r = model.validate_range(Range::new(1, 3, 1, 3)).unwrap();
    assert_eq!(r, Range::new(1, 2, 1, 2));
}

#[test]
fn get_value_in_range_respects_preference() {
    let model = TextModel::with_defaults("a\r\nb");
    assert_eq!(
        model
            .get_value_in_range(Range::new(1, 1, 2, 2), EolPreference::Lf)
            .unwrap(),
        "a\nb"
    );
}

#[test]
fn set_value_flushes() {
    let mut model = TextModel::with_defaults("old content");
    let raw_seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = raw_seen.clone();
    model.on_did_change_raw_content(move |e| sink.borrow_mut().extend(e.changes.clone()));
    let flush_flags = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let fsink = flush_flags.clone();
    model.on_did_change_content(move |e| fsink.borrow_mut().push(e.is_flush));

    let v0 = model.get_version_id();
    model.set_value("brand\nnew").unwrap();

    assert_eq!(value(&model), "brand\nnew");
    assert_eq!(model.get_version_id(), v0 + 1);
    assert_eq!(*raw_seen.borrow(), vec![RawChange::Flush]);
    assert_eq!(*flush_flags.borrow(), vec![true]);
    // The undo stack does not survive a flush.
    assert!(!model.can_undo());
}

#[test]
fn line_whitespace_columns() {
    let model = TextModel::with_defaults("  lead\ntrail  \n\t\n");
    assert_eq!(model.get_line_first_non_whitespace_column(1).unwrap(), 3);
    assert_eq!(model.get_line_last_non_whitespace_column(2).unwrap(), 6);
    assert_eq!(model.get_line_first_non_whitespace_column(3).unwrap(), 0);
    assert_eq!(model.get_line_first_non_whitespace_column(4).unwrap(), 0);
}
