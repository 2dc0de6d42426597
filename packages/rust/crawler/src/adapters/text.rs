//! Single-text-field extractor for verse text pages.

use scraper::{Html, Selector};

use versefetch_shared::{FieldSet, RecordShape};

use super::{Extractor, element_text};

/// Field name under which the verse text is reported.
pub const TEXT_FIELD: &str = "text";

/// Takes the text of the first element matching a selector.
pub struct TextExtractor {
    name: &'static str,
    selector: Selector,
}

impl TextExtractor {
    /// Full Arabic verse text from the word-by-word library pages.
    pub fn verse_text() -> Self {
        Self::from_static("verse-text", r#".text.center-justified > span[dir="rtl"]"#)
    }

    /// IndoPak script verse text.
    pub fn indopak() -> Self {
        Self::from_static(
            "indopak",
            "#_txt_Script_Body font.Arabic-IndoPak, #_txt_Script_Body span.Arabic-IndoPak",
        )
    }

    fn from_static(name: &'static str, selector: &'static str) -> Self {
        Self {
            name,
            selector: Selector::parse(selector).expect("valid selector"),
        }
    }
}

impl Extractor for TextExtractor {
    fn extract(&self, body: &str) -> Option<Vec<FieldSet>> {
        let doc = Html::parse_document(body);
        let text = doc.select(&self.selector).next().map(element_text)?;
        if text.is_empty() {
            return None;
        }

        let mut set = FieldSet::new();
        set.insert(TEXT_FIELD.to_string(), Some(text));
        Some(vec![set])
    }

    fn shape(&self) -> RecordShape {
        RecordShape::Text
    }

    fn name(&self) -> &str {
        self.name
    }
}
