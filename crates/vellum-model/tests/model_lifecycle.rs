//! Identity, options, attachment, disposal.

use std::cell::RefCell;
use std::rc::Rc;

use vellum_model::{ModelError, OptionsUpdate, TextModel};
use vellum_text::{EditOperation, Eol, EolPreference, Position};

#[test]
fn models_get_stable_ids_and_uris() {
    let a = TextModel::with_defaults("a");
    let b = TextModel::with_defaults("b");
    assert!(a.id().starts_with("$model"));
    assert!(b.id().starts_with("$model"));
    assert_ne!(a.id(), b.id());
    assert!(a.uri().starts_with("inmemory://model/"));
    assert_ne!(a.uri(), b.uri());
}

#[test]
fn equals_compares_content_and_eol() {
    let a = TextModel::with_defaults("same\ntext");
    let b = TextModel::with_defaults("same\ntext");
    let c = TextModel::with_defaults("same\r\ntext");
    let d = TextModel::with_defaults("other");
    assert!(a.equals(&b));
    assert!(!a.equals(&c), "differing EOL is a different model");
    assert!(!a.equals(&d));
}

#[test]
fn attachment_counting() {
    let mut model = TextModel::with_defaults("x");
    assert!(!model.is_attached_to_editor());
    model.on_before_attached().unwrap();
    model.on_before_attached().unwrap();
    assert!(model.is_attached_to_editor());
    model.on_before_detached().unwrap();
    assert!(model.is_attached_to_editor());
    model.on_before_detached().unwrap();
    assert!(!model.is_attached_to_editor());
}

#[test]
fn update_options_emits_once_and_only_on_change() {
    let mut model = TextModel::with_defaults("x");
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    model.on_did_change_options(move |e| sink.borrow_mut().push(*e));

    model
        .update_options(OptionsUpdate {
            tab_size: Some(2),
            ..OptionsUpdate::default()
        })
        .unwrap();
    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].tab_size);
    assert_eq!(model.get_options().tab_size, 2);

    // Unchanged values are a silent no-op.
    model
        .update_options(OptionsUpdate {
            tab_size: Some(2),
            ..OptionsUpdate::default()
        })
        .unwrap();
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn dispose_fires_will_dispose_once() {
    let mut model = TextModel::with_defaults("x");
    let count = Rc::new(RefCell::new(0));
    let sink = count.clone();
    model.on_will_dispose(move || *sink.borrow_mut() += 1);
    model.dispose();
    model.dispose();
    assert_eq!(*count.borrow(), 1);
    assert!(model.is_disposed());
}

#[test]
fn disposed_models_reject_every_call() {
    let mut model = TextModel::with_defaults("x");
    model.dispose();

    assert_eq!(
        model.get_value(EolPreference::TextDefined, false),
        Err(ModelError::Disposed)
    );
    assert_eq!(model.get_line_count(), Err(ModelError::Disposed));
    assert_eq!(
        model.apply_edits(vec![EditOperation::insert(Position::new(1, 1), "y")]),
        Err(ModelError::Disposed)
    );
    assert_eq!(model.undo(), Err(ModelError::Disposed));
    assert_eq!(model.set_eol(Eol::CrLf), Err(ModelError::Disposed));
    assert_eq!(model.set_value("z"), Err(ModelError::Disposed));
    assert_eq!(
        model.delta_decorations(0, &[], vec![]),
        Err(ModelError::Disposed)
    );
    assert_eq!(model.force_tokenization(1), Err(ModelError::Disposed));
}

#[test]
fn exact_line_reads_reject_bad_line_numbers() {
    let model = TextModel::with_defaults("one\ntwo");
    assert!(model.get_line_content(0).is_err());
    assert!(model.get_line_content(3).is_err());
    assert!(model.get_line_max_column(3).is_err());
    assert!(model.get_line_tokens(0).is_err());
    assert!(model.get_line_content(2).is_ok());
}

#[test]
fn size_flags_for_ordinary_models() {
    let model = TextModel::with_defaults("tiny");
    assert!(!model.is_too_large_for_sync_resources());
    assert!(!model.is_too_large_for_tokenization());
    assert!(!model.is_dominated_by_long_lines());
}

#[test]
fn long_line_dominance() {
    let long = "x".repeat(20_000);
    let model = TextModel::with_defaults(&format!("short\n{long}"));
    assert!(model.is_dominated_by_long_lines());
}
