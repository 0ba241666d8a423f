use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A text that can be searched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub slug: String,
    pub label: String,
    #[serde(default)]
    index_path: Option<String>,
}

impl TextEntry {
    pub fn new(slug: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            index_path: None,
        }
    }

    pub fn with_index_path(mut self, index_path: impl Into<String>) -> Self {
        self.index_path = Some(index_path.into());
        self
    }

    /// Site-relative location of the text's index document
    pub fn index_path(&self) -> String {
        self.index_path
            .clone()
            .unwrap_or_else(|| format!("/texts_indices/{}.json", self.slug))
    }
}

/// The list of texts offered on the search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    texts: Vec<TextEntry>,
}

impl Catalog {
    pub fn new(texts: Vec<TextEntry>) -> Self {
        Self { texts }
    }

    /// Read a catalogue from a JSON array of `{slug, label, index_path?}`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read catalogue {}", path.display()))?;
        let catalog: Catalog = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse catalogue {}", path.display()))?;
        anyhow::ensure!(
            !catalog.texts.is_empty(),
            "Catalogue {} lists no texts",
            path.display()
        );
        Ok(catalog)
    }

    pub fn texts(&self) -> &[TextEntry] {
        &self.texts
    }

    pub fn get(&self, slug: &str) -> Option<&TextEntry> {
        self.texts.iter().find(|text| text.slug == slug)
    }

    /// Text selected when the search page opens
    pub fn default_text(&self) -> Option<&TextEntry> {
        self.texts.first()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![TextEntry::new("CCAG_1", "CCAG 1")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::default();
        let text = catalog.default_text().unwrap();
        assert_eq!(text.slug, "CCAG_1");
        assert_eq!(text.index_path(), "/texts_indices/CCAG_1.json");
        assert!(catalog.get("CCAG_2").is_none());
    }

    #[test]
    fn test_load_catalog_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"[{{"slug": "CCAG_1", "label": "CCAG 1"}},
               {{"slug": "CCAG_2", "label": "CCAG 2", "index_path": "/idx/two.json"}}]"#
        )?;

        let catalog = Catalog::load(file.path())?;
        assert_eq!(catalog.texts().len(), 2);
        assert_eq!(catalog.get("CCAG_2").unwrap().index_path(), "/idx/two.json");
        Ok(())
    }

    #[test]
    fn test_empty_catalog_is_rejected() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "[]")?;
        assert!(Catalog::load(file.path()).is_err());
        Ok(())
    }
}
