//! Substitution tables for the built-in rule sets.
//!
//! Each table is `(pattern, replacement)` in application order. Marks that
//! are already canonical (waqf letters, harakat, tatweel, `U+06E5`/`U+06E6`,
//! ornate parentheses) have no entry: they pass through untouched.

use crate::{Rule, RuleClass};

/// Legacy presentation-form ligatures (`U+FC41..U+FC49`).
pub(crate) const LIGATURES: &[(&str, &str)] = &[
    ("\u{FC41}", "\u{0635}\u{0644}\u{0649}"),
    ("\u{FC42}", "\u{0642}\u{0644}\u{0649}"),
    ("\u{FC43}", "\u{0639}\u{0644}\u{064A}\u{0647}"),
    ("\u{FC44}", "\u{0648}\u{0633}\u{0644}\u{0645}"),
    ("\u{FC45}", "\u{0631}\u{062D}\u{0645}\u{0647}"),
    ("\u{FC46}", "\u{0631}\u{0636}\u{064A}"),
    (
        "\u{FC47}",
        "\u{0631}\u{0636}\u{064A} \u{0627}\u{0644}\u{0644}\u{0647} \u{0639}\u{0646}\u{0647}",
    ),
    (
        "\u{FC48}",
        "\u{0631}\u{0636}\u{064A} \u{0627}\u{0644}\u{0644}\u{0647} \u{0639}\u{0646}\u{0647}\u{0627}",
    ),
    (
        "\u{FC49}",
        "\u{0631}\u{0636}\u{064A} \u{0627}\u{0644}\u{0644}\u{0647} \u{0639}\u{0646}\u{0647}\u{0645}",
    ),
];

/// The two ligatures the IndoPak pages actually emit.
pub(crate) const INDOPAK_LIGATURES: &[(&str, &str)] = &[
    ("\u{FC41}", "\u{0635}\u{0644}\u{0649}"),
    ("\u{FC42}", "\u{0642}\u{0644}\u{0649}"),
];

/// Private-use glyphs of the Mushaf fonts for rub' el hizb, sajdah and
/// end-of-ayah markers.
pub(crate) const STRUCTURAL_MARKS: &[(&str, &str)] = &[
    ("\u{E022}", "\u{06DE}"),
    ("\u{E023}", "\u{06E9}"),
    ("\u{E024}", "\u{06DD}"),
];

/// Private-use tatweel.
pub(crate) const PRIVATE_TATWEEL: &[(&str, &str)] = &[("\u{E01F}", "\u{0640}")];

/// Small high waqf signs → the IndoPak letter forms.
pub(crate) const ANNOTATION_MARKS: &[(&str, &str)] = &[
    ("\u{06DF}", "\u{0642}\u{0641}"),
    ("\u{06D6}", "\u{0635}\u{0644}"),
    ("\u{06D7}", "\u{0648}\u{0642}\u{0641}\u{0647}"),
    ("\u{06D8}", "\u{062C}"),
    ("\u{06D9}", "\u{062C}"),
    ("\u{06DA}", "\u{0632}"),
    ("\u{06DB}", "\u{0633}"),
    ("\u{06DC}", "\u{0644}\u{0627}"),
    ("\u{06E2}", "\u{0645}"),
    ("\u{06E0}", "\u{0637}"),
    ("\u{06E4}", "\u{0635}"),
];

pub(crate) fn table(class: RuleClass, pairs: &[(&str, &str)]) -> Vec<Rule> {
    pairs
        .iter()
        .map(|(from, to)| Rule::new(class, *from, *to))
        .collect()
}
