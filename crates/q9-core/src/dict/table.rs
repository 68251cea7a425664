use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Dictionary;

/// Hash-map backed dictionary holding the three lookup tables.
#[derive(Debug, Default, Clone)]
pub struct TableDictionary {
    pub(super) codes: HashMap<String, Vec<String>>,
    pub(super) relates: HashMap<String, Vec<String>>,
    pub(super) to_simplified: HashMap<String, String>,
    pub(super) to_traditional: HashMap<String, String>,
}

/// Serialized form. Sorted vectors keep the file byte-stable across builds.
#[derive(Serialize, Deserialize)]
pub(super) struct TableBody {
    pub codes: Vec<(String, Vec<String>)>,
    pub relates: Vec<(String, Vec<String>)>,
    pub script_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictStats {
    pub codes: usize,
    pub candidates: usize,
    pub relates: usize,
    pub script_pairs: usize,
}

impl TableDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_code(&mut self, code: &str, candidates: Vec<String>) {
        self.codes.insert(code.to_string(), candidates);
    }

    pub fn insert_relates(&mut self, character: &str, words: Vec<String>) {
        self.relates.insert(character.to_string(), words);
    }

    /// Register a traditional→simplified pair. The reverse direction keeps
    /// the first traditional form seen for a simplified character.
    pub fn insert_script_pair(&mut self, traditional: &str, simplified: &str) {
        self.to_simplified
            .insert(traditional.to_string(), simplified.to_string());
        self.to_traditional
            .entry(simplified.to_string())
            .or_insert_with(|| traditional.to_string());
    }

    pub fn stats(&self) -> DictStats {
        DictStats {
            codes: self.codes.len(),
            candidates: self.codes.values().map(|v| v.len()).sum(),
            relates: self.relates.len(),
            script_pairs: self.to_simplified.len(),
        }
    }

    /// All `(code, candidates)` pairs sorted by code.
    pub fn iter_codes(&self) -> impl Iterator<Item = (&str, &[String])> {
        let mut keys: Vec<&String> = self.codes.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(move |k| (k.as_str(), self.codes[k].as_slice()))
    }

    pub(super) fn to_body(&self) -> TableBody {
        fn sorted<V: Clone>(map: &HashMap<String, V>) -> Vec<(String, V)> {
            let mut v: Vec<(String, V)> =
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            v.sort_by(|a, b| a.0.cmp(&b.0));
            v
        }
        TableBody {
            codes: sorted(&self.codes),
            relates: sorted(&self.relates),
            script_pairs: sorted(&self.to_simplified),
        }
    }

    pub(super) fn from_body(body: TableBody) -> Self {
        let mut dict = Self {
            codes: body.codes.into_iter().collect(),
            relates: body.relates.into_iter().collect(),
            ..Self::default()
        };
        for (traditional, simplified) in &body.script_pairs {
            dict.insert_script_pair(traditional, simplified);
        }
        dict
    }
}

fn non_empty(v: Option<&Vec<String>>) -> Option<Vec<String>> {
    v.filter(|v| !v.is_empty()).cloned()
}

impl Dictionary for TableDictionary {
    fn lookup_by_code(&self, code: &str) -> Option<Vec<String>> {
        non_empty(self.codes.get(code))
    }

    fn lookup_related(&self, character: &str) -> Option<Vec<String>> {
        non_empty(self.relates.get(character))
    }

    fn convert_script(&self, character: &str, to_simplified: bool) -> String {
        let table = if to_simplified {
            &self.to_simplified
        } else {
            &self.to_traditional
        };
        table
            .get(character)
            .cloned()
            .unwrap_or_else(|| character.to_string())
    }
}
