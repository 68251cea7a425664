
use std::sync::Arc;

use q9_core::dict::TableDictionary;
use q9_core::key::{KeyEvent, KeyKind};

use super::{ComposeSession, KeyResponse};

fn chars(s: &str) -> Vec<String> {
    s.chars().map(String::from).collect()
}

fn words(s: &str) -> Vec<String> {
    s.split(' ').map(String::from).collect()
}

/// Twenty characters under code 10: three pages (9 + 9 + 2).
pub(super) const TEN_PAGE_CHARS: &str = "一二三四五六七八九十百千萬億兆京垓秭穰溝";

/// Code "0" is left unmapped so that codes starting with 0 stay reachable.
pub(super) fn make_test_dict() -> Arc<TableDictionary> {
    let mut d = TableDictionary::new();
    d.insert_code("011", chars("你好嗎"));
    d.insert_code("10", chars(TEN_PAGE_CHARS));
    d.insert_code("123", chars("的"));
    d.insert_code("456", chars("*大"));
    d.insert_relates("你", words("你們 你好 你的"));
    d.insert_relates(
        "好",
        words("好人 好事 好看 好吃 好久 好像 好處 好多 好友 好聽 好玩"),
    );
    d.insert_relates("的", Vec::new());
    d.insert_script_pair("嗎", "吗");
    Arc::new(d)
}

pub(super) fn new_session() -> ComposeSession {
    ComposeSession::new(make_test_dict())
}

/// Feed a token string (`0`-`9`, `.`, `t`, `s`) and collect committed text.
pub(super) fn type_keys(session: &mut ComposeSession, keys: &str) -> Vec<String> {
    let mut committed = Vec::new();
    for c in keys.chars() {
        let resp = press(session, &c.to_string());
        if let Some(text) = resp.commit {
            committed.push(text);
        }
    }
    committed
}

pub(super) fn press(session: &mut ComposeSession, token: &str) -> KeyResponse {
    let kind = KeyKind::from_token(token).expect("valid key token");
    session.handle_key(KeyEvent::new(kind))
}
