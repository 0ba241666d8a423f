use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One page or passage of a text, as published in `texts_indices/<slug>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(deserialize_with = "label")]
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(deserialize_with = "label")]
    pub page: String,
    #[serde(default, deserialize_with = "optional_label", skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(deserialize_with = "label")]
    pub page_id_string: String,
    pub project: String,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            page: id.clone(),
            page_id_string: id.clone(),
            id,
            title: title.into(),
            text: text.into(),
            page_name: None,
            project: String::new(),
        }
    }

    pub fn with_page(mut self, page: impl Into<String>, page_id_string: impl Into<String>) -> Self {
        self.page = page.into();
        self.page_id_string = page_id_string.into();
        self
    }

    pub fn with_page_name(mut self, page_name: impl Into<String>) -> Self {
        self.page_name = Some(page_name.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Label shown next to a result: the page name when there is one
    pub fn display_page(&self) -> &str {
        self.page_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.page)
    }

    /// Path of the page viewer route for this record
    pub fn deep_link(&self) -> String {
        format!("/texts/{}/{}", self.project, self.page_id_string)
    }

    /// Value of an indexed field
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Text => &self.text,
            Field::Page => &self.page,
        }
    }
}

/// All records of one text, in publication order. Never mutated once fetched.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    slug: String,
    records: Vec<DocumentRecord>,
}

impl DocumentCollection {
    pub fn new(slug: impl Into<String>, records: Vec<DocumentRecord>) -> Self {
        Self {
            slug: slug.into(),
            records,
        }
    }

    /// Parse and validate an index document
    pub fn from_json(slug: impl Into<String>, bytes: &[u8]) -> serde_json::Result<Self> {
        let records: Vec<DocumentRecord> = serde_json::from_slice(bytes)?;
        Ok(Self::new(slug, records))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&DocumentRecord> {
        self.records.first()
    }

    /// Look up the record a search hit refers to
    pub fn find(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Searchable record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Text,
    Page,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Text, Field::Page];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Text => "text",
            Field::Page => "page",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub(crate) fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-document statistics for BM25 length normalisation
#[derive(Debug, Clone, Default)]
pub struct DocStats {
    /// Token count per field, in `Field::ALL` order
    pub lengths: [usize; 3],
}

impl DocStats {
    pub fn length(&self, field: Field) -> usize {
        self.lengths[field.position()]
    }
}

// Content pipelines emit ids and page labels as either strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Number(serde_json::Number),
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Text(text) => text,
            Label::Number(number) => number.to_string(),
        }
    }
}

fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Label::deserialize(deserializer).map(String::from)
}

fn optional_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Label>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_index_document() {
        let json = br#"[
            {"id": "1", "title": "Page 1", "text": "the great error", "page": "1",
             "page_id_string": "page_001", "project": "CCAG_1"},
            {"id": 2, "title": "Page 2", "text": "", "page": 2, "page_name": "2r",
             "page_id_string": "page_002", "project": "CCAG_1"}
        ]"#;

        let collection = DocumentCollection::from_json("CCAG_1", json).unwrap();
        assert_eq!(collection.slug(), "CCAG_1");
        assert_eq!(collection.len(), 2);

        let second = collection.find("2").unwrap();
        assert_eq!(second.page, "2");
        assert_eq!(second.display_page(), "2r");
        assert_eq!(second.deep_link(), "/texts/CCAG_1/page_002");
        assert_eq!(collection.find("1").unwrap().display_page(), "1");
        assert!(collection.find("3").is_none());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let json = br#"[{"id": "1", "title": "Page 1", "page": "1",
                         "page_id_string": "p1", "project": "X"}]"#;
        assert!(DocumentCollection::from_json("X", json).is_err());

        assert!(DocumentCollection::from_json("X", br#"{"id": "1"}"#).is_err());
    }

    #[test]
    fn test_field_names() {
        assert_eq!(Field::from_name("title"), Some(Field::Title));
        assert_eq!(Field::from_name("body"), None);
        let record = DocumentRecord::new("7", "Title", "Body").with_page("vii", "p7");
        assert_eq!(record.field(Field::Page), "vii");
        assert_eq!(record.field(Field::Text), "Body");
    }
}
