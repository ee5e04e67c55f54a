use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::glossary::GlossaryTable;
use crate::language::{Language, LanguageMap};

/// Stable reference to one chapter of one treatise
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId {
    /// Treatise file name (e.g. "marozzo_opera_nova.yaml")
    pub treatise_file: String,
    /// Chapter id within the treatise (e.g. "libro1_cap1")
    pub chapter_id: String,
}

impl DocumentId {
    pub fn new(treatise_file: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            treatise_file: treatise_file.into(),
            chapter_id: chapter_id.into(),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.treatise_file, self.chapter_id)
    }
}

/// A treatise chapter with up to three language bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// Title of the parent work
    pub work_title: String,
    pub bodies: LanguageMap<String>,
}

impl Document {
    pub fn new(id: DocumentId, title: impl Into<String>, work_title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            work_title: work_title.into(),
            bodies: LanguageMap::default(),
        }
    }

    pub fn with_body(mut self, language: Language, text: impl Into<String>) -> Self {
        self.bodies.set(language, text.into());
        self
    }
}

/// Snapshot of the content store: documents plus glossary
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub glossary: GlossaryTable,
}

// ============================================================================
// On-disk treatise format
// ============================================================================

#[derive(Debug, Deserialize)]
struct TreatiseSection {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    metadata: SectionMetadata,
    #[serde(default)]
    content: SectionContent,
}

#[derive(Debug, Default, Deserialize)]
#[allow(dead_code)]
struct SectionMetadata {
    #[serde(default)]
    master: Option<String>,
    #[serde(default)]
    work: Option<String>,
    #[serde(default)]
    book: Option<u32>,
    #[serde(default)]
    chapter: Option<u32>,
    #[serde(default)]
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct SectionContent {
    #[serde(default)]
    it: Option<String>,
    #[serde(default)]
    fr: Option<String>,
    #[serde(default)]
    en_versions: Option<Vec<EnglishVersion>>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EnglishVersion {
    #[serde(default)]
    translator: Option<String>,
    text: String,
}

impl TreatiseSection {
    fn into_document(self, treatise_file: &str) -> Document {
        // Multiple English translations are searched as one channel
        let en = self.content.en_versions.and_then(|versions| {
            if versions.is_empty() {
                None
            } else {
                Some(
                    versions
                        .into_iter()
                        .map(|v| v.text)
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
        });

        Document {
            id: DocumentId::new(treatise_file, self.id),
            title: self.title,
            work_title: self.metadata.work.unwrap_or_default(),
            bodies: LanguageMap {
                it: self.content.it,
                fr: self.content.fr,
                en,
            },
        }
    }
}

/// Parse one treatise file (a YAML list of sections)
pub fn parse_treatise(yaml: &str, treatise_file: &str) -> Result<Vec<Document>> {
    let sections: Vec<TreatiseSection> = serde_yaml::from_str(yaml)
        .with_context(|| format!("Failed to parse treatise {treatise_file}"))?;

    Ok(sections
        .into_iter()
        .map(|section| section.into_document(treatise_file))
        .collect())
}

/// Reads treatises and glossary from a data directory
#[derive(Debug, Clone)]
pub struct CorpusReader {
    data_dir: PathBuf,
    treatise_dir: PathBuf,
    glossary_path: PathBuf,
}

impl CorpusReader {
    pub fn with_config(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            treatise_dir: config.treatise_path(),
            glossary_path: config.glossary_path(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load every treatise and the glossary
    pub fn load(&self) -> Result<Corpus> {
        let documents = self.load_documents()?;
        let glossary = self.load_glossary()?;

        info!(
            "Loaded corpus from {:?}: {} documents, {} glossary terms",
            self.data_dir,
            documents.len(),
            glossary.len()
        );

        Ok(Corpus {
            documents,
            glossary,
        })
    }

    /// Treatise files sorted by file name so document order is stable
    pub fn treatise_files(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.treatise_dir;
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read treatise directory {dir:?}"))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load_documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for path in self.treatise_files()? {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();
            let yaml = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read treatise {path:?}"))?;

            let sections = parse_treatise(&yaml, &file_name)?;
            debug!("{}: {} sections", file_name, sections.len());
            documents.extend(sections);
        }

        Ok(documents)
    }

    pub fn load_glossary(&self) -> Result<GlossaryTable> {
        let path = &self.glossary_path;
        if !path.exists() {
            warn!("Glossary file {:?} not found, using an empty glossary", path);
            return Ok(GlossaryTable::new());
        }

        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary {path:?}"))?;
        GlossaryTable::from_yaml_str(&yaml)
            .with_context(|| format!("Failed to parse glossary {path:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_treatise_sections() {
        let yaml = r#"
- id: libro2_cap1
  title: Del primo assalto
  metadata:
    master: Achille Marozzo
    work: Opera Nova
    book: 2
    chapter: 1
    year: 1536
  content:
    it: Il {mandritto} colpisce.
    fr: Le {mandritto} frappe.
    en_versions:
      - translator: A
        text: The forehand
      - translator: B
        text: strikes.
- id: libro2_cap2
  title: Solo italiano
  content:
    it: Testo
"#;
        let docs = parse_treatise(yaml, "marozzo.yaml").unwrap();
        assert_eq!(docs.len(), 2);

        let first = &docs[0];
        assert_eq!(first.id, DocumentId::new("marozzo.yaml", "libro2_cap1"));
        assert_eq!(first.work_title, "Opera Nova");
        assert_eq!(first.bodies.en.as_deref(), Some("The forehand strikes."));

        let second = &docs[1];
        assert_eq!(second.bodies.fr, None);
        assert_eq!(second.bodies.en, None);
        assert_eq!(second.work_title, "");
    }

    #[test]
    fn test_empty_english_versions_stay_absent() {
        let yaml = r#"
- id: s1
  title: T
  content:
    fr: ""
    en_versions: []
"#;
        let docs = parse_treatise(yaml, "t.yaml").unwrap();
        assert_eq!(docs[0].bodies.fr.as_deref(), Some(""));
        assert_eq!(docs[0].bodies.en, None);
    }

    #[test]
    fn test_malformed_treatise_is_error() {
        let err = parse_treatise("- id: [unclosed", "bad.yaml").unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_document_id_display() {
        assert_eq!(DocumentId::new("a.yaml", "c1").to_string(), "a.yaml:c1");
    }
}
