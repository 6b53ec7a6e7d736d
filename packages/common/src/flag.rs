//! Deterministic per-participation flag rendering.
//!
//! A template is an author-written string such as `flag{pwn_[TEAM_HASH]}`. Rendering is a pure
//! function of (template, secret, challenge, participation): calling it again for the same
//! instance always yields the same flag.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Replaced with 12 hex characters unique to the participation.
pub const TEAM_HASH_PLACEHOLDER: &str = "[TEAM_HASH]";
/// Replaced with a UUID derived from the same digest.
pub const GUID_PLACEHOLDER: &str = "[GUID]";

const PLACEHOLDERS: [&str; 2] = [TEAM_HASH_PLACEHOLDER, GUID_PLACEHOLDER];

/// Inputs for rendering one instance's flag.
#[derive(Debug, Clone, Copy)]
pub struct FlagSource<'a> {
    pub template: Option<&'a str>,
    pub secret: &'a str,
    pub challenge_id: i32,
    pub participation_id: i32,
    pub enable_leet: bool,
}

/// Render the flag for one participation.
pub fn render_flag(source: FlagSource<'_>) -> String {
    let digest = flag_digest(source.secret, source.challenge_id, source.participation_id);
    let team_hash = hex::encode(&digest[..6]);
    let guid = digest_guid(&digest);

    let Some(template) = source.template.map(str::trim).filter(|t| !t.is_empty()) else {
        return format!("flag{{{guid}}}");
    };

    // Without a placeholder every team would share one flag.
    let has_placeholder = PLACEHOLDERS.iter().any(|p| template.contains(p));
    let body_rendered = if source.enable_leet || !has_placeholder {
        let mut rng = StdRng::from_seed(digest);
        let (prefix, body, suffix) = split_braces(template);
        format!("{prefix}{}{suffix}", leet_body(body, &mut rng))
    } else {
        template.to_string()
    };

    body_rendered
        .replace(TEAM_HASH_PLACEHOLDER, &team_hash)
        .replace(GUID_PLACEHOLDER, &guid.to_string())
}

fn flag_digest(secret: &str, challenge_id: i32, participation_id: i32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"::");
    hasher.update(challenge_id.to_be_bytes());
    hasher.update(b"::");
    hasher.update(participation_id.to_be_bytes());
    hasher.finalize().into()
}

fn digest_guid(digest: &[u8; 32]) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Split `flag{body}` into (`flag{`, `body`, `}`). Templates without braces are all body.
fn split_braces(template: &str) -> (&str, &str, &str) {
    match (template.find('{'), template.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            &template[..=open],
            &template[open + 1..close],
            &template[close..],
        ),
        _ => ("", template, ""),
    }
}

fn leet_options(c: char) -> Option<&'static [char]> {
    let options: &'static [char] = match c.to_ascii_lowercase() {
        'a' => &['a', 'A', '4', '@'],
        'b' => &['b', 'B', '8', '6'],
        'e' => &['e', 'E', '3'],
        'g' => &['g', 'G', '9', '6'],
        'i' => &['i', 'I', '1', '!'],
        'l' => &['l', 'L', '1', '|'],
        'o' => &['o', 'O', '0'],
        's' => &['s', 'S', '5', '$'],
        't' => &['t', 'T', '7'],
        'z' => &['z', 'Z', '2'],
        _ => return None,
    };
    Some(options)
}

/// Leet-transform the literal parts of `body`, keeping placeholders intact.
fn leet_body(body: &str, rng: &mut StdRng) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(c) = rest.chars().next() {
        if let Some(placeholder) = PLACEHOLDERS.iter().find(|p| rest.starts_with(*p)) {
            out.push_str(placeholder);
            rest = &rest[placeholder.len()..];
            continue;
        }

        match leet_options(c) {
            Some(options) => out.push(options[rng.random_range(0..options.len())]),
            None => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}
