/// Glob matcher for `file_pattern` matching: a small recursive `*`/`?` matcher rather than
/// pulling in the `glob` crate — templates only ever match a bare filename, never a directory
/// traversal.
pub struct WildcardPattern {
    chars: Vec<char>,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Self {
        Self { chars: pattern.chars().collect() }
    }

    pub fn matches(&self, text: &str) -> bool {
        let t: Vec<char> = text.chars().collect();
        Self::helper(&self.chars, &t)
    }

    fn helper(p: &[char], t: &[char]) -> bool {
        if p.is_empty() {
            return t.is_empty();
        }
        if p[0] == '*' {
            if Self::helper(&p[1..], t) {
                return true;
            }
            if !t.is_empty() && Self::helper(p, &t[1..]) {
                return true;
            }
            return false;
        } else if !t.is_empty() && (p[0] == '?' || p[0] == t[0]) {
            return Self::helper(&p[1..], &t[1..]);
        }
        false
    }
}

/// Initializes the daemon's `tracing` subscriber: a non-blocking rolling file writer under
/// `state_dir/logs`, level from `RUST_LOG` (default `info`), always-on since this is a
/// long-running service rather than a `--debug`-gated interactive CLI. Returns the worker guard;
/// it must be held for the process lifetime or buffered log lines are dropped on exit.
pub fn init_tracing(state_dir: &std::path::Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = state_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "orchestrator.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).with_ansi(false).init();
    Ok(guard)
}

#[cfg(test)]
mod wildcard_tests {
    use super::WildcardPattern;

    #[test]
    fn star_matches_any_suffix() {
        assert!(WildcardPattern::new("*.mp4").matches("clip.mp4"));
        assert!(!WildcardPattern::new("*.mp4").matches("clip.mov"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(WildcardPattern::new("a?c").matches("abc"));
        assert!(!WildcardPattern::new("a?c").matches("abbc"));
    }

    #[test]
    fn bare_filename_matches_exactly() {
        assert!(WildcardPattern::new("a.mp4").matches("a.mp4"));
        assert!(!WildcardPattern::new("a.mp4").matches("b.mp4"));
    }
}
