use serde::{Deserialize, Serialize};

use crate::dict::Dictionary;

/// Output script. Read at emission time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMode {
    #[default]
    Traditional,
    Simplified,
}

impl ScriptMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Traditional => Self::Simplified,
            Self::Simplified => Self::Traditional,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::Simplified => "simplified",
        }
    }
}

/// Convert `text` code point by code point. Traditional output is the
/// dictionary's native script, so it is returned untouched.
pub fn convert_text(dict: &dyn Dictionary, text: &str, mode: ScriptMode) -> String {
    match mode {
        ScriptMode::Traditional => text.to_string(),
        ScriptMode::Simplified => {
            let mut out = String::with_capacity(text.len());
            let mut buf = [0u8; 4];
            for c in text.chars() {
                out.push_str(&dict.convert_script(c.encode_utf8(&mut buf), true));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::TableDictionary;

    fn dict() -> TableDictionary {
        let mut d = TableDictionary::new();
        d.insert_script_pair("體", "体");
        d.insert_script_pair("會", "会");
        d
    }

    #[test]
    fn toggled_flips() {
        assert_eq!(ScriptMode::Traditional.toggled(), ScriptMode::Simplified);
        assert_eq!(ScriptMode::Simplified.toggled(), ScriptMode::Traditional);
    }

    #[test]
    fn simplified_maps_each_code_point() {
        let d = dict();
        assert_eq!(convert_text(&d, "會體", ScriptMode::Simplified), "会体");
    }

    #[test]
    fn unmapped_falls_back_to_original() {
        let d = dict();
        assert_eq!(convert_text(&d, "你會", ScriptMode::Simplified), "你会");
    }

    #[test]
    fn traditional_is_identity() {
        let d = dict();
        assert_eq!(convert_text(&d, "會體", ScriptMode::Traditional), "會體");
    }
}
