//! End-to-end scenarios exercising the full tokenize -> dispatch -> redact
//! -> write pipeline (and, for Form XObject recursion, the page
//! orchestrator) against literal content-stream inputs.

use std::collections::HashMap;

use redact_core::dispatch::OperatorDispatcher;
use redact_core::redact::{self, RedactionContext};
use redact_core::write::write_operations;
use redact_core::{
    FontId, FontResolver, GlyphPosition, ObjectStore, OperationKind, PageContent,
    RedactionOptions, RedactionPolicy, RedactionRectangle, XObjectData, XObjectSubtype,
    redact_page,
};

#[derive(Default)]
struct StubFontResolver {
    cid: bool,
}

impl FontResolver for StubFontResolver {
    fn extract_letters(&self, _page_number: u32) -> Vec<GlyphPosition> {
        Vec::new()
    }
    fn unicode_for(&self, _font_id: &FontId, codepoint: u32) -> Option<String> {
        char::from_u32(codepoint).map(String::from)
    }
    fn is_cid_font(&self, _font_id: &FontId) -> bool {
        self.cid
    }
    fn advance_width(&self, _font_id: &FontId, _font_size: f64, _codepoint: u32) -> f64 {
        500.0
    }
}

fn parse(src: &[u8], resolver: &dyn FontResolver) -> Vec<redact_core::Operation> {
    let dispatcher = OperatorDispatcher::new();
    dispatcher.parse(src, resolver, &|| false).unwrap()
}

#[test]
fn hello_world_with_no_rectangles_round_trips_unchanged() {
    let resolver = StubFontResolver::default();
    let ops = parse(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET", &resolver);
    let names: Vec<_> = ops.iter().map(|o| o.operator_name.as_str()).collect();
    assert_eq!(names, vec!["BT", "Tf", "Td", "Tj", "ET"]);

    let ctx = RedactionContext {
        rectangles: &[],
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    assert!(!decision.changed);
    assert!(decision.redacted_items.is_empty());

    let written = write_operations(&decision.operations, None, 0.0);
    let reparsed = parse(&written, &resolver);
    let reparsed_names: Vec<_> = reparsed.iter().map(|o| o.operator_name.as_str()).collect();
    assert_eq!(reparsed_names, vec!["BT", "Tf", "Td", "Tj", "ET"]);
}

#[test]
fn whole_operation_redaction_drops_intersecting_text() {
    let resolver = StubFontResolver::default();
    let ops = parse(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET", &resolver);
    let rectangles = vec![RedactionRectangle {
        page_coords: (90.0, 695.0, 200.0, 715.0),
        visual_coords: None,
    }];
    let ctx = RedactionContext {
        rectangles: &rectangles,
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    let names: Vec<_> = decision
        .operations
        .iter()
        .map(|o| o.operator_name.as_str())
        .collect();
    assert_eq!(names, vec!["BT", "Tf", "Td", "ET"]);
    assert_eq!(decision.redacted_items.len(), 1);
    assert_eq!(decision.redacted_items[0].text, "Hello World");
}

#[test]
fn glyph_level_redaction_keeps_hello_and_trailing_space() {
    // Each glyph (including the space) advances by 6 text-space units at a
    // 12pt font with a 500/1000 em stub advance, so "World" spans roughly
    // x=136..166 starting from Td's x=100. Cover only that run.
    let resolver = StubFontResolver::default();
    let ops = parse(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET", &resolver);
    let rectangles = vec![RedactionRectangle {
        page_coords: (134.0, 699.0, 172.0, 713.0),
        visual_coords: None,
    }];
    let ctx = RedactionContext {
        rectangles: &rectangles,
        font_resolver: &resolver,
        policy: RedactionPolicy::GlyphLevel,
    };
    let decision = redact::decide(ops, &ctx);

    let text_op = decision
        .operations
        .iter()
        .find(|o| matches!(o.kind, OperationKind::Text { .. }))
        .expect("rewritten text operation");
    assert_eq!(text_op.operator_name, "TJ");

    let written = write_operations(&decision.operations, None, 0.0);
    let reparsed = parse(&written, &resolver);
    let reparsed_text = reparsed
        .iter()
        .find_map(|o| match &o.kind {
            OperationKind::Text { decoded_text, .. } => Some(decoded_text.clone()),
            _ => None,
        })
        .expect("reparsed text operation");
    assert_eq!(reparsed_text, "Hello ");
}

#[test]
fn rectangle_fill_drops_both_path_operations() {
    let resolver = StubFontResolver::default();
    let ops = parse(b"100 200 50 30 re f", &resolver);
    let rectangles = vec![RedactionRectangle {
        page_coords: (110.0, 205.0, 140.0, 225.0),
        visual_coords: None,
    }];
    let ctx = RedactionContext {
        rectangles: &rectangles,
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    assert!(decision.operations.is_empty());

    let written = write_operations(&decision.operations, None, 0.0);
    let wrapped = redact_core::write::wrap_with_save_restore(written);
    let text = String::from_utf8(wrapped).unwrap();
    assert_eq!(text, "q\nQ\n");
}

#[test]
fn cid_font_hex_string_is_preserved_on_write() {
    let resolver = StubFontResolver { cid: true };
    let ops = parse(b"BT /CIDF 12 Tf 100 700 Td <4E2D56FD> Tj ET", &resolver);
    let ctx = RedactionContext {
        rectangles: &[],
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    let written = write_operations(&decision.operations, None, 0.0);
    let text = String::from_utf8(written).unwrap();
    assert!(text.contains("<4E2D56FD>"), "got: {text}");
    assert!(!text.contains('('), "hex string must not fall back to literal encoding: {text}");
}

#[test]
fn whole_operation_redaction_drops_intersecting_image() {
    let resolver = StubFontResolver::default();
    let ops = parse(b"q 100 0 0 100 50 60 cm /Im1 Do Q", &resolver);
    let rectangles = vec![RedactionRectangle {
        page_coords: (60.0, 70.0, 90.0, 100.0),
        visual_coords: None,
    }];
    let ctx = RedactionContext {
        rectangles: &rectangles,
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    let names: Vec<_> = decision
        .operations
        .iter()
        .map(|o| o.operator_name.as_str())
        .collect();
    assert_eq!(names, vec!["q", "cm", "Q"], "Do must be dropped, cm/q/Q kept");
    assert_eq!(decision.redacted_items.len(), 1);

    let written = write_operations(&decision.operations, None, 0.0);
    let reparsed = parse(&written, &resolver);
    assert!(
        !reparsed.iter().any(|o| o.operator_name == "Do"),
        "redacted image must not reappear after a write/reparse round trip"
    );
}

#[test]
fn second_text_block_keeps_persisted_font_without_an_injected_fallback() {
    let resolver = StubFontResolver::default();
    let ops = parse(
        b"BT /F1 12 Tf (A) Tj ET BT 0 0 Td (B) Tj ET",
        &resolver,
    );
    let ctx = RedactionContext {
        rectangles: &[],
        font_resolver: &resolver,
        policy: RedactionPolicy::WholeOperation,
    };
    let decision = redact::decide(ops, &ctx);
    // A deliberately wrong fallback: if the writer ever injected it before
    // the second block's `Tj`, the real `/F1 12` font would be overridden.
    let written = write_operations(&decision.operations, Some("WRONGFONT"), 1.0);
    let text = String::from_utf8(written).unwrap();
    assert!(!text.contains("WRONGFONT"), "got: {text}");
    assert_eq!(text.matches("Tf").count(), 1, "only one Tf should ever be written: {text}");

    let reparsed = parse(&text.into_bytes(), &resolver);
    let second_tj_font = reparsed.iter().find_map(|o| match &o.kind {
        OperationKind::Text {
            decoded_text,
            font_id,
            ..
        } if decoded_text == "B" => Some(font_id.clone()),
        _ => None,
    });
    assert_eq!(second_tj_font, Some(Some("F1".to_string())));
}

struct FormObjectStore {
    main_bytes: Vec<u8>,
    forms: HashMap<String, XObjectData>,
    committed_main: Option<Vec<u8>>,
    committed_forms: Option<HashMap<String, Vec<u8>>>,
}

impl ObjectStore for FormObjectStore {
    fn get_page_content(&self, _page_number: u32) -> redact_core::Result<PageContent> {
        Ok(PageContent {
            bytes: self.main_bytes.clone(),
            resources: Vec::new(),
            page_rotation: 0,
            media_box: (0.0, 0.0, 612.0, 792.0),
        })
    }

    fn resolve_xobject(
        &self,
        _resources: &[u8],
        name: &str,
    ) -> redact_core::Result<Option<XObjectData>> {
        Ok(self.forms.get(name).cloned())
    }

    fn commit_page(
        &mut self,
        _page_number: u32,
        new_main_bytes: Vec<u8>,
        new_form_bytes: HashMap<String, Vec<u8>>,
    ) -> redact_core::Result<()> {
        self.committed_main = Some(new_main_bytes);
        self.committed_forms = Some(new_form_bytes);
        Ok(())
    }
}

#[test]
fn form_xobject_recursion_rewrites_only_the_form_stream() {
    let mut forms = HashMap::new();
    forms.insert(
        "Fm1".to_string(),
        XObjectData {
            subtype: XObjectSubtype::Form,
            bbox: None,
            matrix: None,
            stream_bytes: b"BT /F1 12 Tf 50 50 Td (Secret) Tj ET".to_vec(),
            resources: Vec::new(),
        },
    );
    let mut store = FormObjectStore {
        main_bytes: b"/Fm1 Do".to_vec(),
        forms,
        committed_main: None,
        committed_forms: None,
    };
    let resolver = StubFontResolver::default();
    let rectangles = vec![RedactionRectangle {
        page_coords: (0.0, 0.0, 60.0, 70.0),
        visual_coords: None,
    }];
    let options = RedactionOptions::default();
    let report = redact_page(&mut store, &resolver, 1, &rectangles, &options, &|| false).unwrap();

    assert_eq!(report.forms_modified, 1);
    let main = String::from_utf8(store.committed_main.unwrap()).unwrap();
    assert!(main.contains("/Fm1 Do"), "main stream must be unchanged: {main}");

    let form_bytes = store
        .committed_forms
        .unwrap()
        .remove("Fm1")
        .expect("form bytes must be committed");
    let form_text = String::from_utf8(form_bytes).unwrap();
    assert!(
        !form_text.contains("Secret"),
        "redacted form must not contain the secret text: {form_text}"
    );
}
