//! Known OCR language codes
//!
//! Codes follow the OCR model naming (ISO 639-1 where one exists, plus a few
//! script variants such as `ch_sim` and `rs_latin`).

use crate::vision::ReadingDirection;

/// Languages written right to left
pub const RTL_LANGUAGES: &[&str] = &["ar", "fa", "ur", "ug"];

/// Code and display name of every supported OCR language
pub const LANGUAGES: &[(&str, &str)] = &[
    ("abq", "Abaza"),
    ("ady", "Adyghe"),
    ("af", "Afrikaans"),
    ("ang", "Angika"),
    ("ar", "Arabic"),
    ("as", "Assamese"),
    ("ava", "Avar"),
    ("az", "Azerbaijani"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bh", "Bihari"),
    ("bho", "Bhojpuri"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("ch_sim", "Simplified Chinese"),
    ("ch_tra", "Traditional Chinese"),
    ("che", "Chechen"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("dar", "Dargwa"),
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("gom", "Goan Konkani"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("inh", "Ingush"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("kbd", "Kabardian"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("ku", "Kurdish"),
    ("la", "Latin"),
    ("lbe", "Lak"),
    ("lez", "Lezghian"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mah", "Magahi"),
    ("mai", "Maithili"),
    ("mi", "Maori"),
    ("mn", "Mongolian"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("mt", "Maltese"),
    ("ne", "Nepali"),
    ("new", "Newari"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("oc", "Occitan"),
    ("pi", "Pali"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("rs_cyrillic", "Serbian (Cyrillic)"),
    ("rs_latin", "Serbian (Latin)"),
    ("sck", "Nagpuri"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sq", "Albanian"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("tab", "Tabassaran"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tjk", "Tajik"),
    ("tl", "Tagalog"),
    ("tr", "Turkish"),
    ("ug", "Uyghur"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("uz", "Uzbek"),
    ("vi", "Vietnamese"),
];

/// Display name for a language code
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

pub fn is_known_language(code: &str) -> bool {
    language_name(code).is_some()
}

/// Split a comma-separated language list, dropping blanks
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Right to left if any of the languages is written right to left
pub fn reading_direction<S: AsRef<str>>(languages: &[S]) -> ReadingDirection {
    if languages
        .iter()
        .any(|l| RTL_LANGUAGES.contains(&l.as_ref()))
    {
        ReadingDirection::Rtl
    } else {
        ReadingDirection::Ltr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("en"), Some("English"));
        assert_eq!(language_name("ch_sim"), Some("Simplified Chinese"));
        assert_eq!(language_name("xx"), None);
    }

    #[test]
    fn test_rtl_languages_are_known() {
        for code in RTL_LANGUAGES {
            assert!(is_known_language(code), "{} missing from table", code);
        }
    }

    #[test]
    fn test_parse_language_list() {
        assert_eq!(parse_language_list("en"), vec!["en"]);
        assert_eq!(parse_language_list("en, fr,,de "), vec!["en", "fr", "de"]);
        assert!(parse_language_list(" , ").is_empty());
    }

    #[test]
    fn test_reading_direction() {
        assert_eq!(reading_direction(&["en"]), ReadingDirection::Ltr);
        assert_eq!(reading_direction(&["ar"]), ReadingDirection::Rtl);
        assert_eq!(reading_direction(&["en", "fa"]), ReadingDirection::Rtl);
        assert_eq!(reading_direction(&["ja", "ko"]), ReadingDirection::Ltr);
        assert_eq!(reading_direction::<&str>(&[]), ReadingDirection::Ltr);
    }
}
