use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language channels a treatise chapter can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    It,
    Fr,
    En,
}

impl Language {
    /// Canonical channel order
    pub const ALL: [Language; 3] = [Language::It, Language::Fr, Language::En];

    pub fn code(self) -> &'static str {
        match self {
            Language::It => "it",
            Language::Fr => "fr",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "it" => Ok(Language::It),
            "fr" => Ok(Language::Fr),
            "en" => Ok(Language::En),
            other => anyhow::bail!("Unknown language code: {other}"),
        }
    }
}

/// One optional slot per language.
///
/// `None` means the channel does not exist; `Some(String::new())` is an
/// explicitly empty channel. The two are kept apart on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageMap<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub it: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fr: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<T>,
}

impl<T> Default for LanguageMap<T> {
    fn default() -> Self {
        Self {
            it: None,
            fr: None,
            en: None,
        }
    }
}

impl<T> LanguageMap<T> {
    pub fn get(&self, language: Language) -> Option<&T> {
        match language {
            Language::It => self.it.as_ref(),
            Language::Fr => self.fr.as_ref(),
            Language::En => self.en.as_ref(),
        }
    }

    pub fn get_mut(&mut self, language: Language) -> &mut Option<T> {
        match language {
            Language::It => &mut self.it,
            Language::Fr => &mut self.fr,
            Language::En => &mut self.en,
        }
    }

    pub fn set(&mut self, language: Language, value: T) {
        *self.get_mut(language) = Some(value);
    }

    /// Present slots in canonical channel order
    pub fn iter(&self) -> impl Iterator<Item = (Language, &T)> {
        Language::ALL
            .into_iter()
            .filter_map(move |lang| self.get(lang).map(|value| (lang, value)))
    }

    pub fn into_map<U>(self, mut f: impl FnMut(T) -> U) -> LanguageMap<U> {
        LanguageMap {
            it: self.it.map(&mut f),
            fr: self.fr.map(&mut f),
            en: self.en.map(&mut f),
        }
    }
}

impl LanguageMap<String> {
    /// Channels that exist and hold at least one non-whitespace character
    pub fn populated(&self) -> impl Iterator<Item = (Language, &str)> {
        self.iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(lang, text)| (lang, text.as_str()))
    }

    pub fn has_populated(&self) -> bool {
        self.populated().next().is_some()
    }
}

impl<T> LanguageMap<Vec<T>> {
    /// A map where every language is present with an empty list
    pub fn empty_lists() -> Self {
        Self {
            it: Some(Vec::new()),
            fr: Some(Vec::new()),
            en: Some(Vec::new()),
        }
    }

    /// The list for a language, or an empty slice when absent
    pub fn list(&self, language: Language) -> &[T] {
        self.get(language).map(Vec::as_slice).unwrap_or(&[])
    }
}
