//! Scoped logging.
//!
//! [`ScopeLog`] brackets a unit of work with `begin`/`end` records on the
//! `log` facade, so slow loads and saves show up with their duration.

use std::time::Instant;

use log::Level;

/// Logs `<tag> begin` when created and `<tag> end` when dropped.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeLog {
    level: Level,
    tag: String,
    started: Instant,
}

impl ScopeLog {
    pub fn new(level: Level, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        log::log!(level, "{tag} begin");
        ScopeLog {
            level,
            tag,
            started: Instant::now(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Drop for ScopeLog {
    fn drop(&mut self) {
        log::log!(
            self.level,
            "{} end ({} ms)",
            self.tag,
            self.started.elapsed().as_millis()
        );
    }
}
