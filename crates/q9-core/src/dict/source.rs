//! Tab-separated dictionary sources.
//!
//! - `codes.tsv`: `code<TAB>characters`, one candidate per character
//! - `relates.tsv`: `character<TAB>word word ...`
//! - `ts.tsv`: `traditional<TAB>simplified`
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{DictError, TableDictionary};

pub const CODES_FILE: &str = "codes.tsv";
pub const RELATES_FILE: &str = "relates.tsv";
pub const SCRIPT_FILE: &str = "ts.tsv";

fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty() && !l.starts_with('#'))
}

fn split_pair(lineno: usize, line: &str) -> Result<(&str, &str), DictError> {
    let (key, value) = line
        .split_once('\t')
        .ok_or_else(|| DictError::Parse(format!("line {lineno}: expected two tab-separated fields")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(DictError::Parse(format!("line {lineno}: empty key")));
    }
    Ok((key, value.trim()))
}

pub fn is_valid_code(code: &str) -> bool {
    (1..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_codes(text: &str) -> Result<Vec<(String, Vec<String>)>, DictError> {
    let mut out = Vec::new();
    for (lineno, line) in records(text) {
        let (code, chars) = split_pair(lineno, line)?;
        if !is_valid_code(code) {
            return Err(DictError::Parse(format!(
                "line {lineno}: code {code:?} must be 1-3 digits"
            )));
        }
        let candidates: Vec<String> = chars.chars().map(String::from).collect();
        out.push((code.to_string(), candidates));
    }
    Ok(out)
}

pub fn parse_relates(text: &str) -> Result<Vec<(String, Vec<String>)>, DictError> {
    let mut out = Vec::new();
    for (lineno, line) in records(text) {
        let (character, words) = split_pair(lineno, line)?;
        let words: Vec<String> = words.split(' ').filter(|w| !w.is_empty()).map(String::from).collect();
        out.push((character.to_string(), words));
    }
    Ok(out)
}

pub fn parse_script_pairs(text: &str) -> Result<Vec<(String, String)>, DictError> {
    let mut out = Vec::new();
    for (lineno, line) in records(text) {
        let (traditional, simplified) = split_pair(lineno, line)?;
        if simplified.is_empty() {
            return Err(DictError::Parse(format!("line {lineno}: empty simplified form")));
        }
        out.push((traditional.to_string(), simplified.to_string()));
    }
    Ok(out)
}

impl TableDictionary {
    pub fn from_sources(
        codes: &str,
        relates: Option<&str>,
        script_pairs: Option<&str>,
    ) -> Result<Self, DictError> {
        let mut dict = Self::new();
        for (code, candidates) in parse_codes(codes)? {
            dict.insert_code(&code, candidates);
        }
        if let Some(text) = relates {
            for (character, words) in parse_relates(text)? {
                dict.insert_relates(&character, words);
            }
        }
        if let Some(text) = script_pairs {
            for (traditional, simplified) in parse_script_pairs(text)? {
                dict.insert_script_pair(&traditional, &simplified);
            }
        }
        Ok(dict)
    }

    /// Build from a directory holding `codes.tsv` and the optional
    /// `relates.tsv` / `ts.tsv`.
    pub fn from_source_dir(dir: &Path) -> Result<Self, DictError> {
        let codes = fs::read_to_string(dir.join(CODES_FILE))?;
        let optional = |name: &str| -> Result<Option<String>, DictError> {
            let path = dir.join(name);
            if path.exists() {
                Ok(Some(fs::read_to_string(path)?))
            } else {
                debug!(file = name, "optional source missing");
                Ok(None)
            }
        };
        let relates = optional(RELATES_FILE)?;
        let script_pairs = optional(SCRIPT_FILE)?;
        let dict = Self::from_sources(&codes, relates.as_deref(), script_pairs.as_deref())?;
        let stats = dict.stats();
        info!(
            codes = stats.codes,
            relates = stats.relates,
            script_pairs = stats.script_pairs,
            "compiled dictionary sources"
        );
        Ok(dict)
    }
}
