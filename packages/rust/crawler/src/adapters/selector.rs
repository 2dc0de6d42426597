//! Configuration-driven extractor.

use scraper::{ElementRef, Html, Selector};

use versefetch_shared::{FieldSet, Key, RecordShape, Result, SelectorConfig, VerseFetchError};

use super::{Extractor, element_text, has_content};
use crate::fetcher::render_key;

struct FieldRule {
    name: String,
    selector: Selector,
    optional: bool,
    /// Looked up in the element following the row.
    sibling: bool,
}

/// Extracts named fields with CSS selectors, optionally scoped to rows.
///
/// Without a row selector the whole document is one row. A required field
/// whose selector matches nothing is reported as an empty string; an
/// optional one is reported as `null`.
pub struct SelectorExtractor {
    row: Option<Selector>,
    row_id: Option<String>,
    sibling_row: Option<Selector>,
    fields: Vec<FieldRule>,
    shape: RecordShape,
}

impl SelectorExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self> {
        if config.fields.is_empty() {
            return Err(VerseFetchError::config(
                "[source.selector] must define at least one field",
            ));
        }
        check_defined(config, &config.optional, "optional")?;
        check_defined(config, &config.sibling, "sibling")?;

        if config.row.is_none() && (config.row_id.is_some() || !config.sibling.is_empty()) {
            return Err(VerseFetchError::config(
                "[source.selector] row_id and sibling require a row selector",
            ));
        }
        if let Some(template) = &config.row_id {
            let sample = render_key(template, Key::new(1, 1));
            if sample.contains('{') || sample.contains('}') {
                return Err(VerseFetchError::config(format!(
                    "row_id `{template}` has an unknown placeholder"
                )));
            }
        }

        let row = config.row.as_deref().map(parse_selector).transpose()?;
        let sibling_row = config.sibling_row.as_deref().map(parse_selector).transpose()?;
        let fields = config
            .fields
            .iter()
            .map(|(name, css)| {
                Ok(FieldRule {
                    name: name.clone(),
                    selector: parse_selector(css)?,
                    optional: config.optional.contains(name),
                    sibling: config.sibling.contains(name),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            row,
            row_id: config.row_id.clone(),
            sibling_row,
            fields,
            shape: config.shape(),
        })
    }

    fn extract_rows(&self, body: &str, wanted_id: Option<&str>) -> Option<Vec<FieldSet>> {
        let doc = Html::parse_document(body);
        let rows: Vec<_> = match &self.row {
            Some(row) => doc
                .select(row)
                .filter(|el| wanted_id.is_none_or(|id| el.value().attr("id") == Some(id)))
                .collect(),
            None => vec![doc.root_element()],
        };

        let sets: Vec<FieldSet> = rows
            .into_iter()
            .map(|row| {
                let following = self.following_row(row);
                self.fields
                    .iter()
                    .map(|field| {
                        let scope = if field.sibling { following } else { Some(row) };
                        let value = match scope.and_then(|el| el.select(&field.selector).next()) {
                            Some(el) => Some(element_text(el)),
                            None if field.optional => None,
                            None => Some(String::new()),
                        };
                        (field.name.clone(), value)
                    })
                    .collect()
            })
            .collect();

        sets.iter().any(has_content).then_some(sets)
    }

    /// The element right after `row`, if it qualifies for sibling fields.
    fn following_row<'a>(&self, row: ElementRef<'a>) -> Option<ElementRef<'a>> {
        let next = row.next_siblings().find_map(ElementRef::wrap)?;
        match &self.sibling_row {
            Some(selector) => selector.matches(&next).then_some(next),
            None => Some(next),
        }
    }
}

fn check_defined(config: &SelectorConfig, names: &[String], list: &str) -> Result<()> {
    match names.iter().find(|name| !config.fields.contains_key(*name)) {
        Some(unknown) => Err(VerseFetchError::config(format!(
            "{list} field `{unknown}` is not defined in [source.selector.fields]"
        ))),
        None => Ok(()),
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| VerseFetchError::config(format!("invalid selector `{css}`: {e}")))
}

impl Extractor for SelectorExtractor {
    fn extract(&self, body: &str) -> Option<Vec<FieldSet>> {
        self.extract_rows(body, None)
    }

    fn extract_for(&self, key: Key, body: &str) -> Option<Vec<FieldSet>> {
        match &self.row_id {
            Some(template) => self.extract_rows(body, Some(&render_key(template, key))),
            None => self.extract_rows(body, None),
        }
    }

    fn shape(&self) -> RecordShape {
        self.shape
    }

    fn name(&self) -> &str {
        "selector"
    }
}
