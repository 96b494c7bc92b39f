mod common;

use std::sync::{Arc, Mutex};

use common::{ingest_bytes, png, text_pdf, texts};
use docoverlay_core::{
    CodeGenerator, DocumentEditor, DrawItem, EditorConfig, EditorError, ElementKind, ImageSource,
    ItemId, JobKind, Key, Modifiers, Pixel, PointerOutcome, SessionEvent, ShapeKind, Tool, WordId,
    WordPatch,
};

struct PngCode;

impl CodeGenerator for PngCode {
    fn generate(&self, _payload: &str) -> Result<Vec<u8>, String> {
        Ok(png(8, 8))
    }
}

fn loaded(pdf: Vec<u8>) -> DocumentEditor {
    let mut editor = DocumentEditor::with_placeholder(EditorConfig::default()).unwrap();
    editor.load(pdf).unwrap();
    editor.wait_for_load().unwrap();
    editor
}

/// Pixel at the centre of a word's current box.
fn centre_of(editor: &DocumentEditor, id: &str) -> Pixel {
    let word = editor.session().word(&WordId::from(id)).unwrap();
    editor.controller().viewport().to_viewport(word.bounds().center())
}

#[test]
fn edit_move_and_export_end_to_end() {
    let mut editor = loaded(text_pdf(&[&["Hello world"]]));

    let at = centre_of(&editor, "p1-w0");
    assert!(editor.double_click(at));
    editor.parts_mut().0.set_edit_buffer("Howdy");
    assert!(editor.key_down(Key::Enter, Modifiers::CTRL));

    let start = centre_of(&editor, "p1-w1");
    editor.pointer_down(start);
    editor.pointer_move(Pixel::new(start.x + 10.0, start.y + 100.0));
    editor.pointer_up(Pixel::new(start.x + 10.0, start.y + 100.0));
    assert_eq!(editor.session().undo_label(), Some("Move"));

    editor.export().unwrap();
    let output = editor.wait_for_export().unwrap();
    assert_eq!(output.manifest.edited_word_count, 2);

    let reingested = texts(&ingest_bytes(&output.bytes));
    assert_eq!(reingested, ["Hello", "world", "Howdy", "world"]);
}

#[test]
fn creation_tools_produce_exportable_elements() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    editor.parts_mut().0.set_code_generator(Arc::new(PngCode));
    editor.parts_mut().0.set_pending_code("https://example.com/c/42");
    editor.parts_mut().0.set_pending_image(ImageSource::bytes(png(4, 4)));

    let tools = [
        Tool::Text,
        Tool::Shape(ShapeKind::Star),
        Tool::Shape(ShapeKind::Arrow),
        Tool::Highlight,
        Tool::Image,
        Tool::Qr,
    ];
    for (index, tool) in tools.into_iter().enumerate() {
        editor.set_tool(tool);
        let outcome = editor.pointer_down(Pixel::new(20.0, 200.0 + index as f32 * 60.0));
        assert!(matches!(outcome, PointerOutcome::Created(_)), "{tool:?} -> {outcome:?}");
        assert_eq!(editor.controller().tool(), Tool::Select);
    }
    assert_eq!(editor.session().page_elements(1).len(), 6);
    let codes = editor
        .session()
        .page_elements(1)
        .into_iter()
        .filter(|e| matches!(&e.kind, ElementKind::Image(i) if i.code_payload.is_some()))
        .count();
    assert_eq!(codes, 1);

    editor.export().unwrap();
    let output = editor.wait_for_export().unwrap();
    assert_eq!(output.manifest.added_element_count, 6);

    let again = {
        editor.export().unwrap();
        editor.wait_for_export().unwrap()
    };
    assert_eq!(output.bytes, again.bytes);
}

#[test]
fn compose_reflects_live_drag_before_commit() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    let start = centre_of(&editor, "p1-w0");
    editor.pointer_down(start);
    editor.pointer_move(Pixel::new(start.x + 50.0, start.y));

    let list = editor.compose();
    let overlay_x = list
        .items
        .iter()
        .find_map(|item| match item {
            DrawItem::WordOverlay { rect, .. } => Some(rect.x),
            _ => None,
        })
        .unwrap();
    let stored = editor.session().word(&WordId::from("p1-w0")).unwrap().x;
    assert!((overlay_x - (stored + 50.0)).abs() < 1e-3);
    assert!(!editor.can_undo());

    editor.key_down(Key::Escape, Modifiers::NONE);
    assert!(!editor.pointer_up(Pixel::new(start.x + 50.0, start.y)));
    assert!(!editor.can_undo());
}

#[test]
fn reload_resets_history_and_notifies_subscribers() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    editor.session_mut().subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    editor.session_mut().delete_word(&WordId::from("p1-w0"));
    assert!(editor.can_undo());

    editor.load(text_pdf(&[&["Fresh", "start"]])).unwrap();
    let summary = editor.wait_for_load().unwrap();
    assert_eq!(summary.word_count, 2);
    assert!(!editor.can_undo());

    let events = events.lock().unwrap();
    assert!(events.contains(&SessionEvent::Seeded { page_count: 1, word_count: 2 }));
}

#[test]
fn delete_key_on_selected_element() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    editor.set_tool(Tool::Shape(ShapeKind::Circle));
    let PointerOutcome::Created(id) = editor.pointer_down(Pixel::new(300.0, 300.0)) else {
        panic!("no element created");
    };
    assert_eq!(editor.session().selection(), Some(&ItemId::Element(id)));
    assert!(editor.key_down(Key::Delete, Modifiers::NONE));
    assert!(editor.session().element(&id).is_none());
    assert!(editor.undo());
    assert!(editor.session().element(&id).is_some());
}

#[test]
fn encrypted_or_garbage_input_fails_to_load() {
    let mut editor = DocumentEditor::with_placeholder(EditorConfig::default()).unwrap();
    editor.load(b"%PDF-1.4 truncated".to_vec()).unwrap();
    let err = editor.wait_for_load().unwrap_err();
    assert_eq!(err.category(), docoverlay_core::ErrorCategory::Parse);
    assert!(!err.recovery_hint().is_empty());
    assert!(matches!(editor.export(), Err(EditorError::Export(_))));
}

#[test]
fn export_while_loading_is_rejected() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    editor.load(text_pdf(&[&["Again"]])).unwrap();
    assert!(matches!(editor.export(), Err(EditorError::Busy(JobKind::Ingestion))));
    editor.wait_for_load().unwrap();
}

#[test]
fn export_finishing_after_reload_is_dropped() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    editor.session_mut().update_word(&WordId::from("p1-w0"), WordPatch::text("Bye"));
    editor.export().unwrap();

    editor.load(text_pdf(&[&["Fresh", "start"]])).unwrap();
    assert!(!editor.is_exporting());
    assert!(matches!(editor.wait_for_export(), Err(EditorError::Cancelled(JobKind::Export))));

    let summary = editor.wait_for_load().unwrap();
    assert_eq!(summary.word_count, 2);
    assert!(editor.session().word_edits().is_empty());
    assert!(matches!(editor.wait_for_export(), Err(EditorError::Idle(JobKind::Export))));
}

#[test]
fn export_finishing_after_close_is_dropped() {
    let mut editor = loaded(text_pdf(&[&["Hello"]]));
    editor.export().unwrap();
    editor.close();

    let err = editor.wait_for_export().unwrap_err();
    assert_eq!(err.category(), docoverlay_core::ErrorCategory::Cancelled);
    assert!(!editor.is_loaded());
    assert!(editor.poll().is_empty());
}
