//! Decorations through the model API: stickiness under edits, batch
//! replacement, queries, ruler scoping.

use std::sync::Arc;

use vellum_model::{
    DecorationOptions, DecorationSpec, OverviewRulerLane, OverviewRulerOptions, TextModel,
};
use vellum_text::{EditOperation, Position, Range};
use vellum_tree::Stickiness;

fn opts(stickiness: Stickiness) -> Arc<DecorationOptions> {
    Arc::new(DecorationOptions {
        stickiness,
        ..DecorationOptions::default()
    })
}

fn ruler_opts() -> Arc<DecorationOptions> {
    Arc::new(DecorationOptions {
        overview_ruler: Some(OverviewRulerOptions {
            color: "rgba(255 0 0)".into(),
            position: OverviewRulerLane::Full,
        }),
        ..DecorationOptions::default()
    })
}

fn add_one(model: &mut TextModel, range: Range, options: Arc<DecorationOptions>) -> String {
    model
        .delta_decorations(0, &[], vec![DecorationSpec::new(range, options)])
        .unwrap()
        .remove(0)
}

#[test]
fn never_grows_shifts_on_insert_at_start() {
    let mut model = TextModel::with_defaults("abc\ndef");
    let id = add_one(
        &mut model,
        Range::new(1, 2, 1, 4),
        opts(Stickiness::NeverGrowsWhenTypingAtEdges),
    );
    model
        .apply_edits(vec![EditOperation::insert(Position::new(1, 2), "x")])
        .unwrap();
    assert_eq!(
        model.get_decoration_range(&id).unwrap(),
        Some(Range::new(1, 3, 1, 5))
    );
}

#[test]
fn always_grows_absorbs_insert_at_start() {
    let mut model = TextModel::with_defaults("abc\ndef");
    let id = add_one(
        &mut model,
        Range::new(1, 2, 1, 4),
        opts(Stickiness::AlwaysGrowsWhenTypingAtEdges),
    );
    model
        .apply_edits(vec![EditOperation::insert(Position::new(1, 2), "x")])
        .unwrap();
    assert_eq!(
        model.get_decoration_range(&id).unwrap(),
        Some(Range::new(1, 2, 1, 5))
    );
}

#[test]
fn force_move_markers_overrides_stickiness() {
    let mut model = TextModel::with_defaults("abcdef");
    let id = add_one(
        &mut model,
        Range::new(1, 2, 1, 4),
        opts(Stickiness::NeverGrowsWhenTypingAtEdges),
    );
    model
        .apply_edits(vec![EditOperation::replace_move(
            Range::new(1, 4, 1, 4),
            "zz",
        )])
        .unwrap();
    assert_eq!(
        model.get_decoration_range(&id).unwrap(),
        Some(Range::new(1, 2, 1, 6))
    );
}

#[test]
fn decoration_survives_multi_line_deletion() {
    let mut model = TextModel::with_defaults("one\ntwo\nthree\nfour");
    let id = add_one(
        &mut model,
        Range::new(4, 1, 4, 5),
        opts(Stickiness::AlwaysGrowsWhenTypingAtEdges),
    );
    model
        .apply_edits(vec![EditOperation::delete(Range::new(2, 1, 4, 1))])
        .unwrap();
    assert_eq!(
        model.get_decoration_range(&id).unwrap(),
        Some(Range::new(2, 1, 2, 5))
    );
}

#[test]
fn covered_decoration_collapses_on_deletion() {
    let mut model = TextModel::with_defaults("abcdefgh");
    let id = add_one(
        &mut model,
        Range::new(1, 3, 1, 6),
        opts(Stickiness::AlwaysGrowsWhenTypingAtEdges),
    );
    model
        .apply_edits(vec![EditOperation::delete(Range::new(1, 2, 1, 8))])
        .unwrap();
    let range = model.get_decoration_range(&id).unwrap().unwrap();
    assert_eq!(range, Range::new(1, 2, 1, 2));
}

#[test]
fn delta_decorations_reuses_ids() {
    let mut model = TextModel::with_defaults("hello world");
    let ids = model
        .delta_decorations(
            0,
            &[],
            vec![
                DecorationSpec::new(Range::new(1, 1, 1, 3), opts(Stickiness::default())),
                DecorationSpec::new(Range::new(1, 4, 1, 6), opts(Stickiness::default())),
            ],
        )
        .unwrap();
    assert_eq!(ids.len(), 2);

    let ids2 = model
        .delta_decorations(
            0,
            &ids,
            vec![DecorationSpec::new(
                Range::new(1, 7, 1, 9),
                opts(Stickiness::default()),
            )],
        )
        .unwrap();
    assert_eq!(ids2.len(), 1);
    assert_eq!(ids2[0], ids[0]);
    assert_eq!(model.get_decoration_range(&ids[1]).unwrap(), None);
    assert_eq!(
        model.get_decoration_range(&ids2[0]).unwrap(),
        Some(Range::new(1, 7, 1, 9))
    );

    // Empty delta is a no-op.
    let none = model.delta_decorations(0, &[], vec![]).unwrap();
    assert!(none.is_empty());
}

#[test]
fn queries_by_line_and_range() {
    let mut model = TextModel::with_defaults("one\ntwo\nthree");
    let a = add_one(&mut model, Range::new(1, 1, 1, 4), opts(Stickiness::default()));
    let b = add_one(&mut model, Range::new(2, 1, 3, 2), opts(Stickiness::default()));

    let line1 = model.get_line_decorations(1, 0, false).unwrap();
    assert_eq!(line1.len(), 1);
    assert_eq!(line1[0].id, a);

    let line3 = model.get_line_decorations(3, 0, false).unwrap();
    assert_eq!(line3.len(), 1);
    assert_eq!(line3[0].id, b);

    let all = model.get_all_decorations(0, false).unwrap();
    assert_eq!(all.len(), 2);

    let in_range = model
        .get_decorations_in_range(Range::new(2, 1, 2, 2), 0, false)
        .unwrap();
    assert_eq!(in_range.len(), 1);
    assert_eq!(in_range[0].id, b);
}

#[test]
fn overview_ruler_queries_skip_plain_tree() {
    let mut model = TextModel::with_defaults("line\nline\nline");
    let _plain = add_one(&mut model, Range::new(1, 1, 1, 3), opts(Stickiness::default()));
    let ruled = add_one(&mut model, Range::new(2, 1, 2, 3), ruler_opts());

    let ruler = model.get_overview_ruler_decorations(0, false).unwrap();
    assert_eq!(ruler.len(), 1);
    assert_eq!(ruler[0].id, ruled);
    assert!(ruler[0].options.in_overview_ruler());
}

#[test]
fn owner_scoping() {
    let mut model = TextModel::with_defaults("text here");
    model
        .delta_decorations(
            7,
            &[],
            vec![DecorationSpec::new(
                Range::new(1, 1, 1, 2),
                opts(Stickiness::default()),
            )],
        )
        .unwrap();
    model
        .delta_decorations(
            8,
            &[],
            vec![DecorationSpec::new(
                Range::new(1, 3, 1, 4),
                opts(Stickiness::default()),
            )],
        )
        .unwrap();

    assert_eq!(model.get_all_decorations(7, false).unwrap().len(), 1);
    assert_eq!(model.get_all_decorations(0, false).unwrap().len(), 2);

    model.remove_all_decorations_with_owner_id(7).unwrap();
    assert_eq!(model.get_all_decorations(0, false).unwrap().len(), 1);
}

#[test]
fn change_decorations_accessor() {
    let mut model = TextModel::with_defaults("some text body");
    let id = model
        .change_decorations(0, |accessor| {
            let id = accessor.add_decoration(
                Range::new(1, 1, 1, 5),
                opts(Stickiness::default()),
            );
            accessor.change_decoration(&id, Range::new(1, 6, 1, 10));
            id
        })
        .unwrap()
        .unwrap();
    assert_eq!(
        model.get_decoration_range(&id).unwrap(),
        Some(Range::new(1, 6, 1, 10))
    );

    model
        .change_decorations(0, |accessor| {
            accessor.remove_decoration(&id);
        })
        .unwrap();
    assert_eq!(model.get_decoration_range(&id).unwrap(), None);
}

#[test]
fn change_decorations_panic_is_contained() {
    let mut model = TextModel::with_defaults("abc");
    let result: Option<()> = model
        .change_decorations(0, |accessor| {
            accessor.add_decoration(Range::new(1, 1, 1, 2), opts(Stickiness::default()));
            panic!("listener bug");
        })
        .unwrap();
    assert!(result.is_none());
    // Partial effects are retained.
    assert_eq!(model.get_all_decorations(0, false).unwrap().len(), 1);
}

#[test]
fn unknown_ids_are_silently_ignored() {
    let mut model = TextModel::with_defaults("abc");
    let ids = model
        .delta_decorations(0, &["a;12345".to_string()], vec![])
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(model.get_decoration_range("nope;1").unwrap(), None);
    assert!(model.get_decoration_options("nope;1").unwrap().is_none());
}

#[test]
fn whole_line_and_class_options_round_trip() {
    let mut model = TextModel::with_defaults("abc");
    let options = DecorationOptions::register(DecorationOptions {
        class_name: Some("current line!".into()),
        is_whole_line: true,
        ..DecorationOptions::default()
    });
    let id = add_one(&mut model, Range::new(1, 1, 1, 1), options);
    let stored = model.get_decoration_options(&id).unwrap().unwrap();
    assert!(stored.is_whole_line);
    assert_eq!(stored.class_name.as_deref(), Some("current line "));
}
