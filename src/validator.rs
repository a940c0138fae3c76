use regex::Regex;
use std::sync::OnceLock;

/// Practical ceiling for a full address.
pub const MAX_EMAIL_LEN: usize = 254;

/// Substrings that mark placeholders, role addresses nobody reads, or image
/// file names the email regex picks up (`logo@2x.png`).
const DENYLIST: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "example@",
    "test@",
    "sample@",
    "demo@",
    "fake@",
    ".png",
    ".jpg",
    ".jpeg",
    ".svg",
    ".webp",
];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "example" / "esempio" with common digit-for-letter swaps
    RE.get_or_init(|| Regex::new(r"[e3]x[a4]mp[l1i|][e3]|[e3]s[e3]mp[i1l|][o0]").unwrap())
}

/// Returns false for anything that looks like noise rather than a real,
/// publicly listed contact address. Case-insensitive.
pub fn is_valid_email(candidate: &str) -> bool {
    let email = candidate.trim().to_lowercase();

    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return false,
    }

    if DENYLIST.iter().any(|bad| email.contains(bad)) {
        return false;
    }

    !placeholder_regex().is_match(&email)
}
