//! Canonicalization of extracted Quranic text.
//!
//! Pages render verse text with legacy ligatures, Mushaf-font private-use
//! glyphs and presentation-form waqf signs. A [`RuleSet`] maps those into a
//! canonical representation in a single ordered pass:
//!
//! 1. ligature code points → multi-character expansions
//! 2. private-use structural markers → canonical Unicode marks
//! 3. annotation marks → canonical letter forms
//! 4. remaining private-use code points (`U+E000..U+F8FF`) → deleted
//! 5. leading/trailing whitespace trimmed
//!
//! Rule sets are validated on construction so that [`RuleSet::normalize`]
//! is idempotent.

mod rules;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use versefetch_shared::{FieldSet, Result, VerseFetchError};

/// Names accepted by [`RuleSet::by_name`].
pub const RULE_SET_NAMES: &[&str] = &["standard", "indopak", "plain"];

static PRIVATE_USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{E000}-\x{F8FF}]").expect("valid regex"));

fn is_private_use(c: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&c)
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Substitution class, used for tracing and documentation of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    Ligature,
    StructuralMark,
    AnnotationMark,
}

/// A single find/replace rule. The pattern is always one code point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub class: RuleClass,
    pub from: String,
    pub to: String,
}

impl Rule {
    pub fn new(class: RuleClass, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            class,
            from: from.into(),
            to: to.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// An ordered substitution table plus private-use stripping and trimming.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set, rejecting tables that would break idempotence.
    ///
    /// Every pattern must be a single code point, and no replacement may
    /// contain a pattern or a private-use code point.
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Result<Self> {
        let name = name.into();

        for rule in &rules {
            let mut chars = rule.from.chars();
            if chars.next().is_none() || chars.next().is_some() {
                return Err(VerseFetchError::validation(format!(
                    "rule set `{name}`: pattern {:?} must be exactly one code point",
                    rule.from
                )));
            }
            if rule.to.chars().any(is_private_use) {
                return Err(VerseFetchError::validation(format!(
                    "rule set `{name}`: replacement for {:?} contains a private-use code point",
                    rule.from
                )));
            }
        }

        for rule in &rules {
            if let Some(clash) = rules.iter().find(|other| rule.to.contains(other.from.as_str())) {
                return Err(VerseFetchError::validation(format!(
                    "rule set `{name}`: replacement for {:?} re-introduces pattern {:?}",
                    rule.from, clash.from
                )));
            }
        }

        Ok(Self { name, rules })
    }

    /// The full table: ligatures, structural marks, annotation marks.
    pub fn standard() -> Self {
        let mut table = rules::table(RuleClass::Ligature, rules::LIGATURES);
        table.extend(rules::table(RuleClass::StructuralMark, rules::STRUCTURAL_MARKS));
        table.extend(rules::table(RuleClass::StructuralMark, rules::PRIVATE_TATWEEL));
        table.extend(rules::table(RuleClass::AnnotationMark, rules::ANNOTATION_MARKS));
        Self {
            name: "standard".into(),
            rules: table,
        }
    }

    /// Structural marks and the two common ligatures; waqf signs are kept.
    pub fn indopak() -> Self {
        let mut table = rules::table(RuleClass::StructuralMark, rules::STRUCTURAL_MARKS);
        table.extend(rules::table(RuleClass::Ligature, rules::INDOPAK_LIGATURES));
        Self {
            name: "indopak".into(),
            rules: table,
        }
    }

    /// No substitutions: strip private-use glyphs and trim only.
    pub fn plain() -> Self {
        Self {
            name: "plain".into(),
            rules: Vec::new(),
        }
    }

    /// Look up a built-in rule set by name.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "standard" => Ok(Self::standard()),
            "indopak" => Ok(Self::indopak()),
            "plain" => Ok(Self::plain()),
            other => Err(VerseFetchError::config(format!(
                "unknown rule set `{other}` (expected one of: {})",
                RULE_SET_NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Map raw text to canonical text. Total and idempotent.
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.to_string();

        for rule in &self.rules {
            if text.contains(rule.from.as_str()) {
                text = text.replace(rule.from.as_str(), &rule.to);
            }
        }

        if text.chars().any(is_private_use) {
            let stripped = PRIVATE_USE_RE.replace_all(&text, "");
            debug!(
                rule_set = %self.name,
                removed = text.chars().count() - stripped.chars().count(),
                "dropped unmapped private-use glyphs"
            );
            text = stripped.into_owned();
        }

        text.trim().to_string()
    }

    /// Normalize every present value of a field set. Absent values stay absent.
    pub fn normalize_fields(&self, fields: FieldSet) -> FieldSet {
        fields
            .into_iter()
            .map(|(name, value)| (name, value.map(|v| self.normalize(&v))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sets() -> Vec<RuleSet> {
        vec![RuleSet::standard(), RuleSet::indopak(), RuleSet::plain()]
    }

    #[test]
    fn builtin_sets_pass_validation() {
        for set in all_sets() {
            RuleSet::new(set.name().to_string(), set.rules().to_vec())
                .unwrap_or_else(|e| panic!("{} invalid: {e}", set.name()));
        }
    }

    #[test]
    fn structural_marks_mapped() {
        let rules = RuleSet::standard();
        assert_eq!(rules.normalize("\u{E022}"), "\u{06DE}");
        assert_eq!(rules.normalize("\u{E023}"), "\u{06E9}");
        assert_eq!(rules.normalize("text \u{E024}"), "text \u{06DD}");
        assert_eq!(rules.normalize("a\u{E01F}b"), "a\u{0640}b");
    }

    #[test]
    fn ligatures_expanded() {
        let rules = RuleSet::standard();
        assert_eq!(rules.normalize("\u{FC41}"), "صلى");
        assert_eq!(rules.normalize("\u{FC47}"), "رضي الله عنه");
    }

    #[test]
    fn annotation_marks_mapped_or_kept() {
        let rules = RuleSet::standard();
        assert_eq!(rules.normalize("\u{06D6}"), "صل");
        assert_eq!(rules.normalize("\u{06DC}"), "لا");
        // Sukun-like small high marks have no canonical target and survive.
        assert_eq!(rules.normalize("\u{06E1}"), "\u{06E1}");
        // IndoPak keeps waqf signs as-is.
        assert_eq!(RuleSet::indopak().normalize("\u{06D6}"), "\u{06D6}");
    }

    #[test]
    fn unmapped_private_use_deleted_and_trimmed() {
        let rules = RuleSet::standard();
        assert_eq!(rules.normalize("  \u{E000}بِسْمِ\u{F8FF} \u{E123} "), "بِسْمِ");
        assert_eq!(RuleSet::plain().normalize("\u{E022} x "), "x");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        let rules = RuleSet::standard();
        assert_eq!(rules.normalize(""), "");
        assert_eq!(rules.normalize("   \u{E001}  "), "");
        assert_eq!(rules.normalize(" a "), "a");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "  ",
            "\u{E022}\u{E023}\u{E024}\u{E01F}",
            "\u{FC41}\u{FC42}\u{FC43}\u{FC44}\u{FC45}\u{FC46}\u{FC47}\u{FC48}\u{FC49}",
            "\u{06DF}\u{06D6}\u{06D7}\u{06D8}\u{06D9}\u{06DA}\u{06DB}\u{06DC}\u{06E2}\u{06E0}\u{06E4}",
            " \u{E100} ذَٰلِكَ ٱلْكِتَٰبُ لَا رَيْبَ ۛ فِيهِ ۛ هُدًى لِّلْمُتَّقِينَ \u{E024} ",
            "a\u{E000} \u{E000}b",
            "\u{FD3E}١\u{FD3F}",
        ];

        for rules in all_sets() {
            for sample in samples {
                let once = rules.normalize(sample);
                let twice = rules.normalize(&once);
                assert_eq!(once, twice, "rule set {} on {sample:?}", rules.name());
            }
        }
    }

    #[test]
    fn invalid_tables_rejected() {
        let multi = vec![Rule::new(RuleClass::Ligature, "ab", "c")];
        assert!(RuleSet::new("multi", multi).is_err());

        let reintroduces = vec![
            Rule::new(RuleClass::AnnotationMark, "x", "y"),
            Rule::new(RuleClass::AnnotationMark, "z", "xx"),
        ];
        let err = RuleSet::new("loop", reintroduces).unwrap_err();
        assert!(err.to_string().contains("re-introduces"));

        let private = vec![Rule::new(RuleClass::StructuralMark, "q", "\u{E000}")];
        assert!(RuleSet::new("pua", private).is_err());
    }

    #[test]
    fn by_name_lookup() {
        assert_eq!(RuleSet::by_name("indopak").expect("known").name(), "indopak");
        let err = RuleSet::by_name("latin").unwrap_err();
        assert!(err.to_string().contains("standard, indopak, plain"));
    }

    #[test]
    fn normalize_fields_preserves_nulls() {
        let rules = RuleSet::standard();
        let mut fields = FieldSet::new();
        fields.insert("arabic".into(), Some(" \u{FC41} ".into()));
        fields.insert("hashiyah".into(), None);

        let out = rules.normalize_fields(fields);
        assert_eq!(out["arabic"].as_deref(), Some("صلى"));
        assert_eq!(out["hashiyah"], None);
    }
}
