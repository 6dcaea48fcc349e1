use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// 名前が解決できなかったときの値
pub const UNKNOWN_NAME: &str = "Unknown";

// ─── PhoneticTable ───────────────────────────────────────────────

/// NATO フォネティック、よく使われる単語、文字名の同音語 → 大文字1文字
const BUILTIN_LETTERS: &[(char, &[&str])] = &[
    ('A', &["a", "alpha", "able", "apple", "alfa"]),
    ('B', &["b", "bravo", "baker", "boy", "bee", "ball"]),
    ('C', &["c", "charlie", "cat", "charles", "cee", "car"]),
    ('D', &["d", "delta", "david", "dog", "dee", "door"]),
    ('E', &["e", "echo", "edward", "easy", "egg"]),
    ('F', &["f", "foxtrot", "frank", "fox", "eff", "fire"]),
    ('G', &["g", "golf", "george", "good", "gee", "green"]),
    ('H', &["h", "hotel", "henry", "how", "aitch", "house", "hat"]),
    ('I', &["i", "india", "ida", "item", "ice"]),
    ('J', &["j", "juliet", "juliett", "john", "jack", "jay", "jump"]),
    ('K', &["k", "kilo", "king", "kay", "key"]),
    ('L', &["l", "lima", "lincoln", "love", "ell", "light"]),
    ('M', &["m", "mike", "mary", "money", "em", "moon"]),
    ('N', &["n", "november", "nancy", "nice", "en", "night"]),
    ('O', &["o", "oscar", "ocean", "orange", "open"]),
    ('P', &["p", "papa", "peter", "paul", "pee", "pen"]),
    ('Q', &["q", "quebec", "queen", "quick", "cue", "queue"]),
    ('R', &["r", "romeo", "robert", "red", "ar"]),
    ('S', &["s", "sierra", "sugar", "sam", "ess", "sun"]),
    ('T', &["t", "tango", "thomas", "tom", "tee", "tree"]),
    ('U', &["u", "uniform", "union", "up", "uncle"]),
    ('V', &["v", "victor", "victory", "van", "vee", "voice"]),
    ('W', &["w", "whiskey", "william", "water", "double-u"]),
    ('X', &["x", "xray", "x-ray", "box", "ex"]),
    ('Y', &["y", "yankee", "yellow", "yes", "wye"]),
    ('Z', &["z", "zulu", "zebra", "zero", "zed", "zee"]),
];

/// 読み上げられたトークン → 文字 の多対一マップ。構築後は読み取り専用。
#[derive(Debug, Clone)]
pub struct PhoneticTable {
    map: HashMap<String, char>,
}

impl PhoneticTable {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        for (letter, words) in BUILTIN_LETTERS {
            for word in *words {
                map.insert(word.to_string(), *letter);
            }
        }
        Self { map }
    }

    /// 設定で追加されたマッピングを上書きマージする。文字でない値は無視。
    pub fn with_extra(extra: &BTreeMap<String, char>) -> Self {
        let mut table = Self::new();
        for (word, letter) in extra {
            if letter.is_ascii_alphabetic() {
                table
                    .map
                    .insert(word.to_lowercase(), letter.to_ascii_uppercase());
            } else {
                log::warn!("Ignoring letter mapping {word:?} -> {letter:?}: not a letter");
            }
        }
        table
    }

    /// 単語として引き、なければ1文字のアルファベットとして扱う
    pub fn lookup(&self, token: &str) -> Option<char> {
        let token = token.to_lowercase();
        if let Some(letter) = self.map.get(&token) {
            return Some(*letter);
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => c.to_uppercase().next(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for PhoneticTable {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Extraction ──────────────────────────────────────────────────

fn intro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:my name is|i['’]m|i am)\s+([a-z]+(?:\s+[a-z]+)?)")
            .expect("intro pattern is valid")
    })
}

/// 自己紹介文から名前候補 (最大2語、Title Case) を取り出す。
///
/// "my name is" / "I'm" / "I am" の直後を優先し、なければ3文字以上の大文字始まりの語を使う。
pub fn extract_name_tokens(text: &str) -> Vec<String> {
    if let Some(caps) = intro_pattern().captures(text) {
        if let Some(m) = caps.get(1) {
            return m.as_str().split_whitespace().map(title_case).collect();
        }
    }

    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 2 && is_title(w))
        .map(str::to_string)
        .collect()
}

/// 先頭だけ大文字、残りは小文字
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn is_title(word: &str) -> bool {
    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    match letters.next() {
        Some(first) if first.is_uppercase() => letters.all(|c| c.is_lowercase()),
        _ => false,
    }
}

// ─── Spelling ────────────────────────────────────────────────────

/// 1文字ずつ読み上げられた名前を組み立てる。1文字も解決できなければ None。
pub fn resolve_spelled_name(table: &PhoneticTable, spelled: &str) -> Option<String> {
    let letters: String = spelled
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter_map(|t| table.lookup(t))
        .collect();
    if letters.is_empty() {
        None
    } else {
        Some(title_case(&letters))
    }
}

/// `resolve_spelled_name` の結果、解決できなければ "Unknown"
pub fn spelled_name_or_unknown(table: &PhoneticTable, spelled: &str) -> String {
    resolve_spelled_name(table, spelled).unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

/// 確認への否定応答か ("no" / "wrong" / "incorrect" を含む)
pub fn is_negative_confirmation(reply: &str) -> bool {
    reply
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .any(|w| matches!(w.as_str(), "no" | "nope" | "wrong" | "incorrect"))
}
