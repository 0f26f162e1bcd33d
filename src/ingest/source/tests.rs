use super::*;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use tempfile::TempDir;

/// Build a PDF with one line of text per page
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let contents = pages
        .iter()
        .map(|text| {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        })
        .collect();
    build_pdf_from(contents)
}

/// Build a PDF with one content stream per page
fn build_pdf_from(contents: Vec<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in contents {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf saves");
    bytes
}

#[test]
fn source_selection_by_extension() {
    assert_eq!(
        source_for_path(Path::new("a/report.PDF"))
            .expect("pdf supported")
            .name(),
        "pdf"
    );
    assert_eq!(
        source_for_path(Path::new("notes.md"))
            .expect("md supported")
            .name(),
        "text"
    );
    assert!(matches!(
        source_for_path(Path::new("image.png")),
        Err(FolioError::Ingestion(_))
    ));
    assert!(source_for_path(Path::new("no_extension")).is_err());
}

#[test]
fn text_pages_split_on_form_feed() {
    let pages = split_text_pages("first page\x0csecond page\x0c\x0cfourth");

    assert_eq!(pages.len(), 4);
    assert_eq!(pages[&1], "first page");
    assert_eq!(pages[&2], "second page");
    assert_eq!(pages[&3], "");
    assert_eq!(pages[&4], "fourth");
}

#[test]
fn text_without_breaks_is_one_page() {
    let pages = split_text_pages("just one page\nwith two lines");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[&1], "just one page\nwith two lines");
}

#[test]
fn pdf_pages_are_numbered_from_one() {
    let bytes = build_pdf(&["Alpha page", "Beta page", "Gamma page"]);
    let extracted = extract_pdf_pages(&bytes).expect("pdf parses");
    assert!(extracted.unreadable.is_empty());
    let pages = extracted.pages;

    assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(pages[&1].contains("Alpha"));
    assert!(pages[&2].contains("Beta"));
    assert!(pages[&3].contains("Gamma"));
}

#[test]
fn unreadable_pdf_page_is_reported_not_blank() {
    let readable = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Tj", vec![Object::string_literal("Readable page")]),
        Operation::new("ET", vec![]),
    ];
    // A font selection without operands cannot be decoded
    let broken = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![]),
        Operation::new("Tj", vec![Object::string_literal("Lost text")]),
        Operation::new("ET", vec![]),
    ];
    let blank = vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])];
    let bytes = build_pdf_from(vec![readable, broken, blank]);

    let extracted = extract_pdf_pages(&bytes).expect("pdf parses");
    assert_eq!(extracted.len(), 3);
    assert_eq!(extracted.pages.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert!(extracted.pages[&1].contains("Readable"));
    assert_eq!(extracted.unreadable.keys().copied().collect::<Vec<_>>(), vec![2]);
    assert!(!extracted.unreadable[&2].is_empty());
}

#[test]
fn garbage_is_not_a_pdf() {
    assert!(matches!(
        extract_pdf_pages(b"definitely not a pdf"),
        Err(FolioError::Ingestion(_))
    ));
}

#[tokio::test]
async fn sources_read_from_disk() {
    let temp_dir = TempDir::new().expect("temp dir");

    let pdf_path = temp_dir.path().join("doc.pdf");
    std::fs::write(&pdf_path, build_pdf(&["Only page"])).expect("write pdf");
    let pages = PdfSource.pages(&pdf_path).await.expect("pdf pages");
    assert_eq!(pages.len(), 1);
    assert!(pages.unreadable.is_empty());

    let text_path = temp_dir.path().join("doc.txt");
    std::fs::write(&text_path, "one\x0ctwo").expect("write text");
    let pages = TextSource.pages(&text_path).await.expect("text pages");
    assert_eq!(pages.pages.len(), 2);
    assert_eq!(pages.pages[&2], "two");

    let missing = TextSource.pages(&temp_dir.path().join("missing.txt")).await;
    assert!(matches!(missing, Err(FolioError::Ingestion(_))));
}
