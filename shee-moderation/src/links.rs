use anyhow::Context as _;
use regex::Regex;

/// Domains members may link to, by rough category.
const ALLOWED_DOMAINS: &[&str] = &[
    // social
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "tiktok.com",
    // streaming
    "youtube.com",
    "youtu.be",
    "twitch.tv",
    "spotify.com",
    // dev
    "github.com",
    "gitlab.com",
    "stackoverflow.com",
    "crates.io",
    // docs
    "docs.google.com",
    "notion.so",
    "wikipedia.org",
    // gaming
    "steampowered.com",
    "steamcommunity.com",
    "epicgames.com",
    // design
    "figma.com",
    "dribbble.com",
    "behance.net",
    // trusted
    "discord.com",
    "medium.com",
];

/// Link policy built once at startup; the URL matcher is precompiled.
#[derive(Debug)]
pub struct LinkPolicy {
    url_pattern: Regex,
    whitelist: Vec<&'static str>,
}

impl LinkPolicy {
    pub fn from_builtin() -> anyhow::Result<Self> {
        Self::from_domains(ALLOWED_DOMAINS)
    }

    pub fn from_domains(domains: &[&'static str]) -> anyhow::Result<Self> {
        let url_pattern = Regex::new(r"https?://\S+").context("invalid url pattern")?;
        Ok(Self {
            url_pattern,
            whitelist: domains.to_vec(),
        })
    }

    /// True if the text contains any URL whose host is not covered by the
    /// whitelist.
    pub fn has_unauthorized_link(&self, text: &str) -> bool {
        self.url_pattern.find_iter(text).any(|found| {
            let url = found.as_str().to_lowercase();
            !self.whitelist.iter().any(|domain| url.contains(domain))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::LinkPolicy;

    fn policy() -> LinkPolicy {
        LinkPolicy::from_builtin().unwrap()
    }

    #[test]
    fn whitelisted_links_pass() {
        let p = policy();
        assert!(!p.has_unauthorized_link("lihat ini https://youtube.com/watch?v=abc"));
        assert!(!p.has_unauthorized_link("repo: https://github.com/foo/bar"));
        assert!(!p.has_unauthorized_link("https://youtu.be/xyz and https://twitch.tv/someone"));
    }

    #[test]
    fn unknown_links_are_flagged() {
        let p = policy();
        assert!(p.has_unauthorized_link("free nitro http://sketchy-site.xyz/claim"));
        assert!(p.has_unauthorized_link("https://bit.ly/3abcdef"));
    }

    #[test]
    fn one_bad_link_among_good_ones_is_flagged() {
        let p = policy();
        assert!(p.has_unauthorized_link(
            "https://github.com/ok plus https://totally-not-a-scam.io/login"
        ));
    }

    #[test]
    fn text_without_links_passes() {
        let p = policy();
        assert!(!p.has_unauthorized_link("no links here, cuma ngobrol aja"));
        assert!(!p.has_unauthorized_link("visit example.com someday"));
    }
}
