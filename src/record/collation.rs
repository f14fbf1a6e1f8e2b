//! Locale-aware string collation for key comparison.
//!
//! The built-in [`Collator`] implements a multi-level comparison in the style
//! of the Unicode collation algorithm, restricted to what record keys need:
//!
//! - **Primary**: base letters only (`"Resume" == "résumé"`)
//! - **Secondary**: plus diacritics (`"resume" < "résumé"`)
//! - **Tertiary**: plus case (`"resume" < "Resume"`)
//! - **Identical**: plus code point order as the final tie-break
//!
//! The folding only knows Latin letters, so [`Collator::for_locale`] accepts
//! just the languages whose alphabet order matches it. Other collations can
//! be plugged in through the [`Collation`] trait.

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// String ordering used for string key parts.
pub trait Collation: Send + Sync + fmt::Debug {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// How many levels of difference the collator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Primary,
    Secondary,
    Tertiary,
    Identical,
}

/// Languages whose default order is the Latin root order with accents as
/// secondary differences. Swedish or Spanish, which sort `å` or `ñ` as
/// letters of their own, are not in this list.
const ROOT_ORDER_LANGUAGES: &[&str] = &["ca", "de", "en", "fr", "id", "it", "ms", "nl", "pt"];

/// Built-in root collation with Latin diacritic folding.
#[derive(Debug, Clone)]
pub struct Collator {
    locale: String,
    strength: Strength,
}

impl Collator {
    pub fn new(strength: Strength) -> Self {
        Self {
            locale: "root".to_string(),
            strength,
        }
    }

    /// Collator for a locale tag such as `en`, `de_DE` or `pt-BR`.
    ///
    /// An optional `|strength` suffix selects the level (`de_DE|primary`);
    /// the default is tertiary. Tags whose language orders letters
    /// differently from the Latin folding are rejected.
    pub fn for_locale(spec: &str) -> Result<Self> {
        let (tag, strength) = match spec.split_once('|') {
            Some((tag, strength)) => (tag.trim(), parse_strength(strength.trim())?),
            None => (spec.trim(), Strength::Tertiary),
        };

        if !is_locale_tag(tag) {
            return Err(FlowError::Configuration(format!(
                "Invalid locale '{}'",
                spec
            )));
        }
        let language = tag.split(['_', '-']).next().unwrap_or_default().to_ascii_lowercase();
        if !ROOT_ORDER_LANGUAGES.contains(&language.as_str()) {
            return Err(FlowError::Configuration(format!(
                "Locale '{}' is not supported by the built-in collator",
                tag
            )));
        }

        Ok(Self {
            locale: tag.to_string(),
            strength,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn strength(&self) -> Strength {
        self.strength
    }
}

fn parse_strength(text: &str) -> Result<Strength> {
    match text.to_ascii_lowercase().as_str() {
        "primary" => Ok(Strength::Primary),
        "secondary" => Ok(Strength::Secondary),
        "tertiary" => Ok(Strength::Tertiary),
        "identical" => Ok(Strength::Identical),
        other => Err(FlowError::Configuration(format!(
            "Unknown collation strength '{}'",
            other
        ))),
    }
}

fn is_locale_tag(tag: &str) -> bool {
    let mut parts = tag.split(['_', '-']);
    let lang_ok = parts
        .next()
        .map(|l| (2..=3).contains(&l.len()) && l.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    lang_ok && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

impl Collation for Collator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let primary = a
            .chars()
            .flat_map(fold_base)
            .cmp(b.chars().flat_map(fold_base));
        if primary != Ordering::Equal || self.strength == Strength::Primary {
            return primary;
        }

        let secondary = a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase));
        if secondary != Ordering::Equal || self.strength == Strength::Secondary {
            return secondary;
        }

        // Lowercase sorts before uppercase at the tertiary level.
        let tertiary = a
            .chars()
            .map(|c| c.is_uppercase())
            .cmp(b.chars().map(|c| c.is_uppercase()));
        if tertiary != Ordering::Equal || self.strength == Strength::Tertiary {
            return tertiary;
        }

        a.cmp(b)
    }
}

/// Lowercase base letter(s) of a character with Latin diacritics removed.
fn fold_base(c: char) -> impl Iterator<Item = char> {
    let folded: &'static str = match c {
        'À'..='Å' | 'à'..='å' | 'Ā' | 'ā' | 'Ă' | 'ă' | 'Ą' | 'ą' => "a",
        'Æ' | 'æ' => "ae",
        'Ç' | 'ç' | 'Ć' | 'ć' | 'Č' | 'č' => "c",
        'Ď' | 'ď' | 'Đ' | 'đ' => "d",
        'È'..='Ë' | 'è'..='ë' | 'Ē' | 'ē' | 'Ė' | 'ė' | 'Ę' | 'ę' | 'Ě' | 'ě' => "e",
        'Ì'..='Ï' | 'ì'..='ï' | 'Ī' | 'ī' | 'Į' | 'į' | 'İ' | 'ı' => "i",
        'Ł' | 'ł' | 'Ľ' | 'ľ' | 'Ĺ' | 'ĺ' => "l",
        'Ñ' | 'ñ' | 'Ń' | 'ń' | 'Ň' | 'ň' => "n",
        'Ò'..='Ö' | 'Ø' | 'ò'..='ö' | 'ø' | 'Ō' | 'ō' | 'Ő' | 'ő' => "o",
        'Œ' | 'œ' => "oe",
        'Ŕ' | 'ŕ' | 'Ř' | 'ř' => "r",
        'Ś' | 'ś' | 'Š' | 'š' | 'Ş' | 'ş' => "s",
        'ß' => "ss",
        'Ť' | 'ť' | 'Ţ' | 'ţ' => "t",
        'Ù'..='Ü' | 'ù'..='ü' | 'Ū' | 'ū' | 'Ů' | 'ů' | 'Ű' | 'ű' => "u",
        'Ý' | 'ý' | 'ÿ' | 'Ÿ' => "y",
        'Ź' | 'ź' | 'Ż' | 'ż' | 'Ž' | 'ž' => "z",
        _ => "",
    };

    let mut single = None;
    if folded.is_empty() {
        single = Some(c.to_lowercase());
    }
    folded.chars().chain(single.into_iter().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_levels() {
        let primary = Collator::new(Strength::Primary);
        assert_eq!(primary.compare("Resume", "résumé"), Ordering::Equal);

        let secondary = Collator::new(Strength::Secondary);
        assert_eq!(secondary.compare("resume", "résumé"), Ordering::Less);
        assert_eq!(secondary.compare("resume", "RESUME"), Ordering::Equal);

        let tertiary = Collator::new(Strength::Tertiary);
        assert_eq!(tertiary.compare("resume", "Resume"), Ordering::Less);

        let identical = Collator::new(Strength::Identical);
        assert_eq!(identical.compare("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn test_accented_letters_sort_with_base_letter() {
        let collator = Collator::new(Strength::Tertiary);
        // Plain code point order would put "é" after "z".
        assert_eq!(collator.compare("éclair", "zebra"), Ordering::Less);
        assert_eq!(collator.compare("Straße", "strasse"), Ordering::Greater);
    }

    #[test]
    fn test_for_locale() {
        let c = Collator::for_locale("de_DE|primary").unwrap();
        assert_eq!(c.locale(), "de_DE");
        assert_eq!(c.strength(), Strength::Primary);
        assert_eq!(Collator::for_locale("pt-BR").unwrap().strength(), Strength::Tertiary);
        assert!(Collator::for_locale("not a locale").is_err());
        assert!(Collator::for_locale("en|loud").is_err());
    }

    #[test]
    fn test_for_locale_rejects_other_alphabets() {
        assert!(Collator::for_locale("en_GB").is_ok());
        assert!(Collator::for_locale("FR-ca|secondary").is_ok());
        for tag in ["sv_SE", "es", "da-DK", "ja", "ru_RU"] {
            let err = Collator::for_locale(tag).unwrap_err();
            assert!(err.to_string().contains("not supported"), "{}", tag);
        }
    }
}
