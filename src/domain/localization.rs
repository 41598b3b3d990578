//! Text fields that arrive either as a bare string or keyed by language code.

use std::collections::BTreeMap;

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

pub const DEFAULT_LANGUAGE: &str = "en";

/// Language codes present in the community dataset, common ones first.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("de", "Deutsch"),
    ("fr", "Français"),
    ("es", "Español"),
    ("it", "Italiano"),
    ("pt", "Português"),
    ("pt-BR", "Português (BR)"),
    ("ru", "Русский"),
    ("ja", "日本語"),
    ("kr", "한국어"),
    ("zh-CN", "简体中文"),
    ("zh-TW", "繁體中文"),
    ("pl", "Polski"),
    ("tr", "Türkçe"),
    ("uk", "Українська"),
    ("da", "Dansk"),
    ("no", "Norsk"),
    ("hr", "Hrvatski"),
    ("sr", "Srpski"),
    ("he", "עברית"),
];

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(known, _)| *known == code)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    #[serde(deserialize_with = "translations")]
    Localized(BTreeMap<String, String>),
}

/// One language entry as found upstream; `null` and non-text values happen.
#[derive(Deserialize)]
#[serde(untagged)]
enum Translation {
    Text(String),
    Other(IgnoredAny),
}

/// Keeps the non-empty text entries of a language map and drops the rest.
fn translations<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Translation>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(language, entry)| match entry {
            Translation::Text(text) if !text.is_empty() => Some((language, text)),
            Translation::Text(_) | Translation::Other(_) => None,
        })
        .collect())
}

impl Default for LocalizedText {
    fn default() -> Self {
        LocalizedText::Plain(String::new())
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        LocalizedText::Plain(value.to_string())
    }
}

impl LocalizedText {
    /// Requested language, then English, then the first non-empty entry.
    pub fn resolve(&self, language: &str) -> &str {
        match self {
            LocalizedText::Plain(text) => text,
            LocalizedText::Localized(map) => map
                .get(language)
                .filter(|text| !text.is_empty())
                .or_else(|| map.get(DEFAULT_LANGUAGE).filter(|text| !text.is_empty()))
                .or_else(|| map.values().find(|text| !text.is_empty()))
                .map(String::as_str)
                .unwrap_or(""),
        }
    }

    pub fn english(&self) -> &str {
        self.resolve(DEFAULT_LANGUAGE)
    }

    pub fn variants(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            LocalizedText::Plain(text) => Box::new(std::iter::once(text.as_str())),
            LocalizedText::Localized(map) => Box::new(map.values().map(String::as_str)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variants().all(str::is_empty)
    }
}

/// Lowercases and strips common Latin diacritics so "Küche" matches "kuche".
pub fn fold_for_search(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'ç' | 'ć' | 'č' => 'c',
            'ď' | 'đ' => 'd',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
            'ğ' => 'g',
            'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => 'i',
            'ł' => 'l',
            'ñ' | 'ń' | 'ň' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
            'ř' => 'r',
            'ś' | 'š' | 'ş' => 's',
            'ť' | 'ţ' => 't',
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
            'ý' | 'ÿ' => 'y',
            'ź' | 'ż' | 'ž' => 'z',
            other => other,
        })
        .collect()
}

/// `"advanced_electrical_components"` -> `"Advanced Electrical Components"`.
pub fn label_from_id(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
