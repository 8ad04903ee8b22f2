use anyhow::Context as _;
use regex::Regex;

/// Curated word list (Indonesian + English). Matching is substring-based on
/// normalized text, so variants inside longer runs are caught too.
const BADWORDS: &[&str] = &[
    "anjing", "bangsat", "goblok", "tolol", "kampret", "memek", "kontol", "babi", "asu",
    "fuck", "shit", "bitch", "asshole", "bastard", "cunt",
];

/// Letter classes for obfuscated spellings (leetspeak substitutions).
fn letter_class(letter: char) -> String {
    match letter {
        'a' => "[a@4]".to_owned(),
        'b' => "[b8]".to_owned(),
        'e' => "[e3]".to_owned(),
        'g' => "[g9]".to_owned(),
        'i' => "[i1!]".to_owned(),
        'l' => "[l1]".to_owned(),
        'o' => "[o0]".to_owned(),
        's' => "[s5$]".to_owned(),
        't' => "[t7]".to_owned(),
        'u' => "[uv]".to_owned(),
        other => regex::escape(&other.to_string()),
    }
}

/// Build one pattern for a word: substitution classes per letter, optional
/// separators (spaces, dots, underscores) between letters.
fn leet_pattern(word: &str) -> String {
    let classes: Vec<String> = word.chars().map(letter_class).collect();
    classes.join(r"[\s\W_]*")
}

/// Word filter built once at startup; patterns are precompiled.
#[derive(Debug)]
pub struct BadwordFilter {
    words: Vec<&'static str>,
    patterns: Vec<Regex>,
}

impl BadwordFilter {
    pub fn from_builtin() -> anyhow::Result<Self> {
        Self::from_words(BADWORDS)
    }

    pub fn from_words(words: &[&'static str]) -> anyhow::Result<Self> {
        let mut patterns = Vec::with_capacity(words.len());
        for word in words {
            let pattern = Regex::new(&leet_pattern(word))
                .with_context(|| format!("invalid badword pattern for `{word}`"))?;
            patterns.push(pattern);
        }

        Ok(Self {
            words: words.to_vec(),
            patterns,
        })
    }

    /// Check message content against the word list and its obfuscation
    /// patterns.
    pub fn contains_badword(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let collapsed: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();

        if self.words.iter().any(|word| collapsed.contains(word)) {
            return true;
        }

        self.patterns.iter().any(|pattern| pattern.is_match(&lowered))
    }
}

#[cfg(test)]
mod tests {
    use super::BadwordFilter;

    fn filter() -> BadwordFilter {
        BadwordFilter::from_builtin().unwrap()
    }

    #[test]
    fn matches_plain_words() {
        let f = filter();
        assert!(f.contains_badword("dasar anjing"));
        assert!(f.contains_badword("ANJING banget"));
        assert!(f.contains_badword("what the fuck"));
        assert!(!f.contains_badword("selamat pagi semua"));
    }

    #[test]
    fn matches_spaced_out_words() {
        let f = filter();
        assert!(f.contains_badword("a n j i n g"));
        assert!(f.contains_badword("f u c k"));
    }

    #[test]
    fn matches_leetspeak_substitutions() {
        let f = filter();
        assert!(f.contains_badword("4nj1ng"));
        assert!(f.contains_badword("g0bl0k"));
        assert!(f.contains_badword("b4ng5at"));
    }

    #[test]
    fn matches_separator_obfuscation() {
        let f = filter();
        assert!(f.contains_badword("a.n.j.i.n.g"));
        assert!(f.contains_badword("t_o_l_o_l"));
    }

    #[test]
    fn clean_text_passes() {
        let f = filter();
        assert!(!f.contains_badword("gimana kabarnya hari ini?"));
        assert!(!f.contains_badword("check out this cool project"));
    }
}
