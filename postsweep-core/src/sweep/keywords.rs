use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use crate::config::KeywordSection;

const DELETE_KEYWORDS: &[(&str, &[&str])] = &[
    ("en", &["delete"]),
    ("es", &["eliminar", "borrar"]),
    ("pt", &["excluir", "apagar"]),
    ("fr", &["supprimer"]),
    ("de", &["löschen"]),
    ("it", &["elimina"]),
    ("nl", &["verwijderen"]),
    ("pl", &["usuń"]),
    ("tr", &["sil"]),
    ("ru", &["удалить"]),
    ("uk", &["видалити"]),
    ("ar", &["حذف"]),
    ("hi", &["हटाएं"]),
    ("id", &["hapus"]),
    ("ja", &["削除"]),
    ("ko", &["삭제"]),
    ("zh", &["删除", "刪除"]),
];

const UNDO_REPOST_KEYWORDS: &[(&str, &[&str])] = &[
    ("en", &["undo repost", "undo retweet"]),
    ("es", &["deshacer"]),
    ("pt", &["desfazer"]),
    ("fr", &["annuler"]),
    ("de", &["rückgängig"]),
    ("it", &["annulla"]),
    ("nl", &["ongedaan"]),
    ("pl", &["cofnij"]),
    ("tr", &["geri al"]),
    ("ru", &["отменить"]),
    ("uk", &["скасувати"]),
    ("ar", &["تراجع", "إلغاء"]),
    ("hi", &["पूर्ववत"]),
    ("id", &["batalkan"]),
    ("ja", &["取り消す", "取り消し"]),
    ("ko", &["취소"]),
    ("zh", &["撤销", "撤銷", "取消"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Delete,
    UndoRepost,
}

/// Language-tagged keyword lists per menu action.
#[derive(Debug, Clone, Default)]
pub struct LocaleKeywords {
    delete: BTreeMap<String, Vec<String>>,
    undo_repost: BTreeMap<String, Vec<String>>,
}

impl LocaleKeywords {
    pub fn builtin() -> Self {
        Self {
            delete: table(DELETE_KEYWORDS),
            undo_repost: table(UNDO_REPOST_KEYWORDS),
        }
    }

    pub fn with_overrides(mut self, section: &KeywordSection) -> Self {
        merge(&mut self.delete, &section.delete);
        merge(&mut self.undo_repost, &section.undo_repost);
        self
    }

    pub fn languages(&self, action: MenuAction) -> impl Iterator<Item = &str> {
        self.lists(action).keys().map(String::as_str)
    }

    /// Delete entries must lead with the keyword; undo entries often put it
    /// last ("リポストを取り消す"), so those match on whole words.
    pub fn matcher(&self, action: MenuAction) -> Result<KeywordMatcher, regex::Error> {
        let placement = match action {
            MenuAction::Delete => Placement::Leading,
            MenuAction::UndoRepost => Placement::Word,
        };
        KeywordMatcher::new(
            self.lists(action).values().flatten().map(String::as_str),
            placement,
        )
    }

    fn lists(&self, action: MenuAction) -> &BTreeMap<String, Vec<String>> {
        match action {
            MenuAction::Delete => &self.delete,
            MenuAction::UndoRepost => &self.undo_repost,
        }
    }
}

fn table(source: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    source
        .iter()
        .map(|(lang, words)| {
            (
                lang.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}

fn merge(target: &mut BTreeMap<String, Vec<String>>, extra: &BTreeMap<String, Vec<String>>) {
    for (lang, words) in extra {
        let entry = target.entry(lang.clone()).or_default();
        for word in words {
            let word = word.trim();
            if !word.is_empty() && !entry.iter().any(|w| w == word) {
                entry.push(word.to_string());
            }
        }
    }
}

/// Where a keyword may sit inside a menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The entry starts with the keyword ("Delete", "Delete post").
    Leading,
    /// The keyword is a whole word anywhere in the entry ("리트윗 취소").
    Word,
}

/// Case-insensitive keyword alternation over whole words. Entries that
/// mention an account (`@handle`) never match, so a handle that happens to
/// contain a keyword cannot turn "Follow @silvia" into a delete entry.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    pattern: Regex,
}

impl KeywordMatcher {
    pub fn new<'a>(
        keywords: impl IntoIterator<Item = &'a str>,
        placement: Placement,
    ) -> Result<Self, regex::Error> {
        let alternation = keywords
            .into_iter()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(|kw| keyword_pattern(kw, placement))
            .collect::<Vec<_>>()
            .join("|");
        // An empty table must match nothing rather than everything.
        let source = if alternation.is_empty() {
            "[^\\s\\S]".to_string()
        } else {
            format!("(?:{alternation})")
        };
        let pattern = RegexBuilder::new(&source).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        !text.contains('@') && self.pattern.is_match(text)
    }

    /// Index of the first entry whose text matches.
    pub fn position(&self, entries: &[String]) -> Option<usize> {
        entries.iter().position(|entry| self.matches(entry))
    }
}

const NON_WORD: &str = r"[^\p{L}\p{M}\p{N}]";

/// One keyword with its boundaries. Scripts written without spaces get no
/// boundary on that side; "削除する" still starts with "削除".
fn keyword_pattern(keyword: &str, placement: Placement) -> String {
    let spaced = |c: Option<char>| c.map_or(false, |c| !is_unspaced(c));
    let lead = match placement {
        Placement::Leading => r"^\s*".to_string(),
        Placement::Word if spaced(keyword.chars().next()) => format!("(?:^|{NON_WORD})"),
        Placement::Word => String::new(),
    };
    let tail = if spaced(keyword.chars().last()) {
        format!("(?:$|{NON_WORD})")
    } else {
        String::new()
    };
    format!("{lead}{}{tail}", regex::escape(keyword))
}

fn is_unspaced(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_matcher_covers_several_languages() {
        let matcher = LocaleKeywords::builtin()
            .matcher(MenuAction::Delete)
            .unwrap();
        for label in ["Delete", "DELETE POST", "Eliminar", "Supprimer", "Löschen", "削除", "삭제", "Удалить"] {
            assert!(matcher.matches(label), "{label} should match");
        }
        assert!(!matcher.matches("Pin to your profile"));
        assert!(!matcher.matches("Embed post"));
    }

    #[test]
    fn undo_matcher_is_distinct_from_delete() {
        let keywords = LocaleKeywords::builtin();
        let undo = keywords.matcher(MenuAction::UndoRepost).unwrap();
        assert!(undo.matches("Undo repost"));
        assert!(undo.matches("Deshacer repost"));
        assert!(!undo.matches("Repost"));
        assert!(!undo.matches("Quote"));
    }

    #[test]
    fn position_picks_first_match() {
        let matcher = LocaleKeywords::builtin()
            .matcher(MenuAction::Delete)
            .unwrap();
        let entries = vec![
            "Pin to your profile".to_string(),
            "Delete".to_string(),
            "Embed post".to_string(),
        ];
        assert_eq!(matcher.position(&entries), Some(1));
        assert_eq!(matcher.position(&entries[2..]), None);
    }

    #[test]
    fn overrides_extend_tables() {
        let mut section = KeywordSection::default();
        section
            .delete
            .insert("ca".to_string(), vec!["suprimeix".to_string()]);
        let keywords = LocaleKeywords::builtin().with_overrides(&section);
        assert!(keywords.languages(MenuAction::Delete).any(|lang| lang == "ca"));
        let matcher = keywords.matcher(MenuAction::Delete).unwrap();
        assert!(matcher.matches("Suprimeix"));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let matcher = KeywordMatcher::new(std::iter::empty(), Placement::Leading).unwrap();
        assert!(!matcher.matches("anything"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn handles_never_look_like_menu_actions() {
        let keywords = LocaleKeywords::builtin();
        let delete = keywords.matcher(MenuAction::Delete).unwrap();
        for label in [
            "Follow @silvia",
            "Mute @basil",
            "Block @deleteme",
            "Report @hapus_id",
            "Silvia's list",
            "Deleted posts",
            "Add/remove from Lists",
        ] {
            assert!(!delete.matches(label), "{label} must not match");
        }
        assert!(delete.matches("Sil"));
        assert!(delete.matches("  Delete post"));
        assert!(delete.matches("削除する"));

        let undo = keywords.matcher(MenuAction::UndoRepost).unwrap();
        assert!(undo.matches("리트윗 취소"));
        assert!(undo.matches("リポストを取り消す"));
        assert!(!undo.matches("Unfollow @annullaria"));
        assert!(!undo.matches("Annullamento"));
    }
}
