//! 依宣告的產品類型與指揮官判斷牌組格式。
//!
//! 規則依序比對，第一個符合的勝出。產品類型只做完全比對（去空白、不分大小寫），
//! 不做子字串比對，例如 "Commander Collection" 不會被當成指揮官套牌。

use crate::domain::model::{CanonicalDeck, FormatTag};

const COMMANDER_TYPES: &[&str] = &["commander deck", "commander", "commanderprecon", "edh"];

const STANDARD_TYPES: &[&str] = &[
    "standard",
    "challenger deck",
    "intro pack",
    "theme deck",
    "planeswalker deck",
    "event deck",
];

// "intro pack" 同時出現在 Standard，依規則順序歸為 Standard
const LIMITED_TYPES: &[&str] = &[
    "limited",
    "jumpstart",
    "welcome deck",
    "sample deck",
    "demo deck",
    "draft",
    "cube",
    "starter deck",
    "intro pack",
];

const HISTORIC_TYPES: &[&str] = &["historic", "arena", "arena starter deck"];

const MODERN_LIKE_TYPES: &[&str] = &[
    "modern",
    "modern event deck",
    "pioneer",
    "pioneer challenger deck",
    "legacy",
    "vintage",
    "premium deck",
];

const RULES: &[(&[&str], FormatTag)] = &[
    (STANDARD_TYPES, FormatTag::Standard),
    (LIMITED_TYPES, FormatTag::Limited),
    (HISTORIC_TYPES, FormatTag::Historic),
    (MODERN_LIKE_TYPES, FormatTag::ModernLike),
];

fn declared_in(declared: &str, set: &[&str]) -> bool {
    set.iter().any(|candidate| candidate.eq_ignore_ascii_case(declared))
}

pub fn infer_format(deck: &CanonicalDeck) -> FormatTag {
    let declared = deck.format_hint.as_deref().map(str::trim).unwrap_or("");

    if !deck.commanders.is_empty() || declared_in(declared, COMMANDER_TYPES) {
        return FormatTag::Commander;
    }

    if declared.is_empty() {
        return FormatTag::Unknown;
    }

    RULES
        .iter()
        .find(|(set, _)| declared_in(declared, set))
        .map(|(_, tag)| *tag)
        .unwrap_or(FormatTag::Unknown)
}
