use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

/// Stands in for the upstream document factory (§6: out of scope). The
/// gateway only needs to know which field is the delete/query key (e.g. an
/// item's permalink) and which fields hold body text to analyze; real
/// per-feed schemas are an external concern.
#[derive(Clone)]
pub struct DocumentSchema {
    pub schema: Schema,
    pub key_field: Field,
    pub body_field: Field,
}

impl DocumentSchema {
    /// Builds the minimal two-field schema (`key`, `body`) used throughout
    /// this crate's tests and the demo binary, grounded in the teacher's
    /// pattern of resolving named fields once against a `Schema`
    /// (`engine/src/index/queries.rs`).
    pub fn default_schema() -> Self {
        let mut builder = Schema::builder();
        let key_field = builder.add_text_field("key", STRING | STORED);
        let body_field = builder.add_text_field("body", TEXT | STORED);
        let schema = builder.build();

        Self {
            schema,
            key_field,
            body_field,
        }
    }

    pub fn make_document(&self, key: &str, body: &str) -> tantivy::Document {
        let mut document = tantivy::Document::new();
        document.add_text(self.key_field, key);
        document.add_text(self.body_field, body);
        document
    }
}
