//! Arabic/Urdu word pairs from the word-by-word library pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use versefetch_shared::{FieldSet, RecordShape};

use super::{Extractor, element_text};

static ARABIC_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"font[style*="font-family:AlQalam"]"#).expect("valid selector")
});

static PREFORMATTED_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".translation.center-justified > span.preformatted").expect("valid selector")
});

static FONT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("font").expect("valid selector"));

static LEADING_COLON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:\s*").expect("valid regex"));

/// Emits one `{arabic, urdu}` token per word.
///
/// Most pages style each word as an `AlQalam` font followed by a `Mehr`
/// sibling holding the `: `-prefixed meaning. Some later surahs instead lay
/// the words out as alternating `<font>` pairs inside a preformatted span;
/// that layout is used when the first finds nothing.
pub struct WordByWordExtractor;

impl WordByWordExtractor {
    fn styled_pairs(doc: &Html) -> Vec<FieldSet> {
        doc.select(&ARABIC_SEL)
            .filter_map(|arabic_el| {
                let arabic = element_text(arabic_el);
                let urdu_el = arabic_el
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(is_meaning_font)?;
                let urdu = LEADING_COLON_RE
                    .replace(&element_text(urdu_el), "")
                    .trim()
                    .to_string();
                (!arabic.is_empty() && !urdu.is_empty()).then(|| token(arabic, urdu))
            })
            .collect()
    }

    fn preformatted_pairs(doc: &Html) -> Vec<FieldSet> {
        let mut tokens = Vec::new();
        for span in doc.select(&PREFORMATTED_SEL) {
            let fonts: Vec<ElementRef<'_>> = span.select(&FONT_SEL).collect();
            for pair in fonts.chunks(2) {
                let arabic = element_text(pair[0]);
                let urdu = pair.get(1).map(|el| element_text(*el)).unwrap_or_default();
                if !arabic.is_empty() {
                    tokens.push(token(arabic, urdu));
                }
            }
        }
        tokens
    }
}

fn is_meaning_font(el: &ElementRef<'_>) -> bool {
    el.value().name() == "font"
        && el
            .value()
            .attr("style")
            .is_some_and(|style| style.contains("font-family:Mehr"))
}

fn token(arabic: String, urdu: String) -> FieldSet {
    let mut set = FieldSet::new();
    set.insert("arabic".to_string(), Some(arabic));
    set.insert("urdu".to_string(), Some(urdu));
    set
}

impl Extractor for WordByWordExtractor {
    fn extract(&self, body: &str) -> Option<Vec<FieldSet>> {
        let doc = Html::parse_document(body);
        let mut tokens = Self::styled_pairs(&doc);
        if tokens.is_empty() {
            tokens = Self::preformatted_pairs(&doc);
        }
        (!tokens.is_empty()).then_some(tokens)
    }

    fn shape(&self) -> RecordShape {
        RecordShape::Tokens
    }

    fn name(&self) -> &str {
        "word-by-word"
    }
}
