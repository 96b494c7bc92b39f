mod common;

use common::session_with;
use docoverlay_core::{
    Color, EditSession, Element, ElementId, ImageContent, ImageSource, Point, Rect, TextAlign,
    TextContent, Word, WordId, WordPatch,
};

/// Everything a user can observe about page 1.
#[derive(Debug, PartialEq)]
struct Snapshot {
    words: Vec<Word>,
    elements: Vec<Element>,
}

fn snapshot(session: &EditSession) -> Snapshot {
    Snapshot {
        words: session.get_render_words(1),
        elements: session.page_elements(1).into_iter().cloned().collect(),
    }
}

fn words() -> Vec<Word> {
    vec![
        Word::new("a", "alpha", Rect::new(10.0, 10.0, 40.0, 12.0), 1),
        Word::new("b", "beta", Rect::new(60.0, 10.0, 40.0, 12.0), 1),
        Word::new("c", "gamma", Rect::new(10.0, 30.0, 40.0, 12.0), 1),
    ]
}

fn text_element() -> Element {
    Element::text(
        1,
        Rect::new(100.0, 100.0, 120.0, 30.0),
        TextContent {
            content: "Sale".into(),
            font_family: "Helvetica".into(),
            font_size: 18.0,
            color: Color::BLACK,
            align: TextAlign::Center,
            bold: true,
            italic: false,
        },
    )
}

/// One mutation per variant the store supports.
fn mutations() -> Vec<Box<dyn Fn(&mut EditSession, ElementId) -> bool>> {
    vec![
        Box::new(|s: &mut EditSession, _: ElementId| s.update_word(&WordId::from("a"), WordPatch::text("changed"))),
        Box::new(|s: &mut EditSession, _: ElementId| s.update_word(&WordId::from("b"), WordPatch::text(" "))),
        Box::new(|s: &mut EditSession, _: ElementId| s.update_word(&WordId::from("c"), WordPatch::position(Point::new(1.0, 2.0)))),
        Box::new(|s: &mut EditSession, _: ElementId| s.delete_word(&WordId::from("a"))),
        Box::new(|s: &mut EditSession, _: ElementId| {
            s.add_word(1, "added", Point::new(5.0, 300.0), 11.0, Color::BLACK).is_some()
        }),
        Box::new(|s: &mut EditSession, id: ElementId| s.update_element(&id, |e| e.rotation = 45.0)),
        Box::new(|s: &mut EditSession, id: ElementId| s.remove_element(&id)),
        Box::new(|s: &mut EditSession, id: ElementId| s.send_to_back(&id)),
        Box::new(|s: &mut EditSession, _: ElementId| {
            s.add_element(Element::image(
                1,
                Rect::new(0.0, 0.0, 10.0, 10.0),
                ImageContent {
                    source: ImageSource::bytes(vec![1, 2, 3]),
                    opacity: 0.5,
                    code_payload: None,
                },
            ))
            .is_some()
        }),
    ]
}

fn prepared() -> (EditSession, ElementId) {
    let mut session = session_with(words());
    let first = session.add_element(text_element()).unwrap();
    session.add_element(text_element()).unwrap();
    (session, first)
}

#[test]
fn undo_restores_pre_state_and_redo_restores_post_state() {
    for (index, mutate) in mutations().iter().enumerate() {
        let (mut session, id) = prepared();
        let before = snapshot(&session);

        assert!(mutate(&mut session, id), "mutation {index} should apply");
        let after = snapshot(&session);
        assert_ne!(before, after, "mutation {index} should be observable");

        assert!(session.undo());
        assert_eq!(snapshot(&session), before, "undo of mutation {index}");
        assert!(session.redo());
        assert_eq!(snapshot(&session), after, "redo of mutation {index}");
    }
}

#[test]
fn empty_stacks_are_noops() {
    let mut session = session_with(words());
    let before = snapshot(&session);
    assert!(!session.can_undo());
    assert!(!session.can_redo());
    assert!(!session.undo());
    assert!(!session.redo());
    assert_eq!(snapshot(&session), before);
}

#[test]
fn new_mutation_clears_redo() {
    let (mut session, _) = prepared();
    session.update_word(&WordId::from("a"), WordPatch::text("one"));
    session.undo();
    assert!(session.can_redo());

    session.update_word(&WordId::from("b"), WordPatch::text("two"));
    assert!(!session.can_redo());
}

#[test]
fn full_unwind_returns_to_seeded_state() {
    let (mut session, id) = prepared();
    for mutate in mutations() {
        mutate(&mut session, id);
    }
    while session.undo() {}

    assert_eq!(snapshot(&session), snapshot(&session_with(words())));
    assert_eq!(session.element_count(), 0);
}

#[test]
fn render_words_never_contain_blank_text() {
    let (mut session, id) = prepared();
    for mutate in mutations() {
        mutate(&mut session, id);
        assert!(session.get_render_words(1).iter().all(|w| !w.text.trim().is_empty()));
    }
    session.update_word(&WordId::from("c"), WordPatch::text("\n\t "));
    assert!(session.get_render_words(1).iter().all(|w| w.id != WordId::from("c")));
}

#[test]
fn is_edited_tracks_difference_from_original() {
    let mut session = session_with(words());
    let id = WordId::from("a");
    for (text, edited) in [("alpha!", true), ("ALPHA", true), ("alpha", false)] {
        session.update_word(&id, WordPatch::text(text));
        let word = session.word(&id).unwrap();
        assert_eq!(word.text, text);
        assert_eq!(word.is_edited, edited, "text {text:?}");
    }
    assert_eq!(session.word(&id), session.original_word(&id));
}
