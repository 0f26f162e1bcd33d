use super::*;

fn timestamp() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .expect("valid timestamp")
        .naive_utc()
}

#[test]
fn document_display() {
    let document = Document {
        id: 7,
        name: "manual.pdf".to_string(),
        created_at: timestamp(),
    };
    assert_eq!(document.to_string(), "#7 manual.pdf");
}

#[test]
fn chunk_serialization() {
    let chunk = Chunk {
        id: 1,
        document_id: 2,
        position: 3,
        content: "page text".to_string(),
        created_at: timestamp(),
    };

    let json = serde_json::to_string(&chunk).expect("chunk serializes");
    let parsed: Chunk = serde_json::from_str(&json).expect("chunk deserializes");
    assert_eq!(parsed, chunk);
}
