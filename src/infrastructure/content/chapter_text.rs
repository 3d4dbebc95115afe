use crate::application::ports::content_api::RemoteVerse;
use regex::Regex;
use std::sync::OnceLock;

static VERSE_MARKER: OnceLock<Option<Regex>> = OnceLock::new();

fn verse_marker() -> Option<&'static Regex> {
    VERSE_MARKER
        .get_or_init(|| Regex::new(r"\[(\d+)\]").ok())
        .as_ref()
}

/// `[n]` の節番号マーカー付きテキストを節ごとに分割する。
///
/// マーカーより前の見出しなどは捨てる。マーカーが一つも無い場合は全文を 1 節とする。
/// u32 に収まらない番号はマーカーとみなさず本文に残す。
pub fn parse_verses(text: &str) -> Vec<RemoteVerse> {
    let mut verses = Vec::new();
    let mut current: Option<(u32, usize)> = None;

    if let Some(marker) = verse_marker() {
        for captures in marker.captures_iter(text) {
            let (Some(whole), Some(digits)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let Ok(number) = digits.as_str().parse::<u32>() else {
                continue;
            };
            if let Some((previous, body_start)) = current {
                push_verse(&mut verses, previous, &text[body_start..whole.start()]);
            }
            current = Some((number, whole.end()));
        }
    }

    match current {
        Some((number, body_start)) => push_verse(&mut verses, number, &text[body_start..]),
        None => push_verse(&mut verses, 1, text),
    }
    verses
}

fn push_verse(verses: &mut Vec<RemoteVerse>, number: u32, raw: &str) {
    let text = normalize_whitespace(raw);
    if !text.is_empty() {
        verses.push(RemoteVerse { number, text });
    }
}

fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
