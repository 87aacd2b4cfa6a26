//! Pure path-template substitution (C3). Deterministic given a wall clock; tokens absent from a
//! template are passed through unchanged, matching `_apply_path_template` in both the chain
//! generator and the event dispatcher's reference implementations.

use chrono::{DateTime, Utc};

/// Inputs available for substitution. `file_name` must already be the final path segment
/// (including extension); callers resolve directories separately.
#[derive(Debug, Clone)]
pub struct ExpansionContext<'a> {
    pub file_name: &'a str,
    pub original_file_name: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(file_name: &'a str, now: DateTime<Utc>) -> Self {
        Self { file_name, original_file_name: file_name, now }
    }

    pub fn with_original(mut self, original_file_name: &'a str) -> Self {
        self.original_file_name = original_file_name;
        self
    }
}

fn split_name_ext(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, ext),
        _ => (file_name, ""),
    }
}

/// Expands the closed token set of §3.5: `{year} {month} {day} {hour} {minute} {timestamp}
/// {filename} {original_filename} {name}/{basename} {ext}/{extension}`. Tokens not present in the
/// template are left untouched; tokens present in the template but not recognized here are also
/// left untouched (the token set is closed, but expansion itself is permissive).
pub fn expand(template: &str, ctx: &ExpansionContext<'_>) -> String {
    let (basename, ext) = split_name_ext(ctx.file_name);
    let replacements: [(&str, String); 11] = [
        ("{year}", ctx.now.format("%Y").to_string()),
        ("{month}", ctx.now.format("%m").to_string()),
        ("{day}", ctx.now.format("%d").to_string()),
        ("{hour}", ctx.now.format("%H").to_string()),
        ("{minute}", ctx.now.format("%M").to_string()),
        ("{timestamp}", ctx.now.timestamp().to_string()),
        ("{filename}", ctx.file_name.to_string()),
        ("{original_filename}", ctx.original_file_name.to_string()),
        ("{name}", basename.to_string()),
        ("{basename}", basename.to_string()),
        ("{ext}", ext.to_string()),
    ];

    let mut out = template.to_string();
    for (token, value) in replacements {
        out = out.replace(token, &value);
    }
    // {extension} shares the same value as {ext} but is a distinct literal token.
    out = out.replace("{extension}", ext);
    out
}

const TOKENS: [&str; 12] = [
    "{year}", "{month}", "{day}", "{hour}", "{minute}", "{timestamp}", "{filename}",
    "{original_filename}", "{name}", "{basename}", "{ext}", "{extension}",
];

/// True if `s` still contains one of the closed token set (§8 invariant 3 guards against this
/// surviving into a `Transfer.destination_path` once a transfer has started).
pub fn contains_unresolved_token(s: &str) -> bool {
    TOKENS.iter().any(|t| s.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap()
    }

    #[test]
    fn expands_date_and_filename_tokens() {
        let ctx = ExpansionContext::new("a.mp4", fixed_now());
        let out = expand("/dst/{year}/{month}/{original_filename}", &ctx);
        assert_eq!(out, "/dst/2025/03/a.mp4");
    }

    #[test]
    fn basename_and_extension_tokens() {
        let ctx = ExpansionContext::new("clip.mov", fixed_now());
        assert_eq!(expand("{basename}-backup.{extension}", &ctx), "clip-backup.mov");
        assert_eq!(expand("{name}.{ext}", &ctx), "clip.mov");
    }

    #[test]
    fn passes_through_unknown_tokens() {
        let ctx = ExpansionContext::new("a.mp4", fixed_now());
        assert_eq!(expand("/dst/{unknown_token}/a", &ctx), "/dst/{unknown_token}/a");
    }

    #[test]
    fn idempotent_on_token_free_template() {
        let ctx = ExpansionContext::new("a.mp4", fixed_now());
        assert_eq!(expand("/dst/static/path", &ctx), "/dst/static/path");
    }

    #[test]
    fn dotfile_has_no_extension() {
        let ctx = ExpansionContext::new(".env", fixed_now());
        let (base, ext) = split_name_ext(ctx.file_name);
        assert_eq!(base, ".env");
        assert_eq!(ext, "");
    }

    #[test]
    fn detects_unresolved_tokens() {
        assert!(contains_unresolved_token("/dst/{original_filename}"));
        assert!(!contains_unresolved_token("/dst/a.mp4"));
    }
}
