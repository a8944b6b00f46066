use crate::record::LogLevel;
use std::collections::BTreeMap;

/// Key consulted when no category prefix has a configured level.
pub const DEFAULT_KEY: &str = "Default";

/// Minimum severity per hierarchical category prefix.
///
/// Lookups walk from the most specific prefix to the least specific one and
/// finally fall back to [`DEFAULT_KEY`]: `app.db.pool` checks `app.db.pool`,
/// `app.db`, `app`, then `Default`. An empty category checks `Default`
/// only, so it is enabled whenever the default level allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    levels: BTreeMap<String, LogLevel>,
}

impl Default for LevelTable {
    fn default() -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(DEFAULT_KEY.to_string(), LogLevel::Information);
        LevelTable { levels }
    }
}

impl LevelTable {
    /// An empty table; every category is disabled until a level is set.
    pub fn empty() -> Self {
        LevelTable { levels: BTreeMap::new() }
    }

    pub fn set(&mut self, prefix: impl Into<String>, level: LogLevel) {
        self.levels.insert(prefix.into(), level);
    }

    pub fn with(mut self, prefix: impl Into<String>, level: LogLevel) -> Self {
        self.set(prefix, level);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Minimum level configured for `category`, if any prefix matches.
    pub fn min_level(&self, category: &str) -> Option<LogLevel> {
        key_prefixes(category).find_map(|prefix| self.levels.get(prefix).copied())
    }

    /// Whether a record of `level` in `category` should be emitted at all.
    pub fn is_enabled(&self, category: &str, level: LogLevel) -> bool {
        match self.min_level(category) {
            Some(min) => level != LogLevel::None && level >= min,
            None => false,
        }
    }

    /// Parse `category=level` pairs separated by `,` or `;`.
    ///
    /// Malformed pairs are skipped with a warning.
    pub fn parse(list: &str) -> Self {
        let mut table = LevelTable::empty();
        for pair in list.split([',', ';']).map(str::trim).filter(|p| !p.is_empty()) {
            let Some((category, level)) = pair.split_once('=') else {
                tracing::warn!(entry = pair, "ignoring log level entry without `=`");
                continue;
            };
            match level.parse::<LogLevel>() {
                Ok(level) => table.set(category.trim(), level),
                Err(e) => tracing::warn!(entry = pair, error = %e, "ignoring log level entry"),
            }
        }
        table
    }
}

/// Turn a tracing target (`app::db`) into a dotted category (`app.db`).
pub fn category_from_target(target: &str) -> String {
    target.replace("::", ".")
}

fn key_prefixes(category: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(category).filter(|c| !c.is_empty());
    let mut done = false;
    std::iter::from_fn(move || {
        if let Some(current) = next {
            next = current.rfind('.').map(|i| &current[..i]);
            return Some(current);
        }
        if done {
            return None;
        }
        done = true;
        Some(DEFAULT_KEY)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_walk_to_default() {
        let prefixes: Vec<&str> = key_prefixes("app.db.pool").collect();
        assert_eq!(prefixes, vec!["app.db.pool", "app.db", "app", "Default"]);
        assert_eq!(key_prefixes("").collect::<Vec<_>>(), vec!["Default"]);
    }

    #[test]
    fn most_specific_prefix_wins() {
        let table = LevelTable::default()
            .with("app", LogLevel::Warning)
            .with("app.db", LogLevel::Debug);

        assert!(table.is_enabled("app.db.pool", LogLevel::Debug));
        assert!(!table.is_enabled("app.http", LogLevel::Information));
        assert!(table.is_enabled("app.http", LogLevel::Warning));
        assert!(table.is_enabled("other", LogLevel::Information));
        assert!(!table.is_enabled("other", LogLevel::Debug));
    }

    #[test]
    fn no_match_disables() {
        let table = LevelTable::empty().with("app", LogLevel::Trace);
        assert!(!table.is_enabled("other", LogLevel::Critical));
        assert!(table.is_enabled("app.x", LogLevel::Trace));
    }

    #[test]
    fn none_level_silences_category() {
        let table = LevelTable::default().with("noisy", LogLevel::None);
        assert!(!table.is_enabled("noisy.part", LogLevel::Critical));
    }

    #[test]
    fn parse_skips_malformed_entries() {
        let table = LevelTable::parse("Default=warn; app.db = debug, broken, x=loud");
        assert_eq!(table.min_level("anything"), Some(LogLevel::Warning));
        assert_eq!(table.min_level("app.db.pool"), Some(LogLevel::Debug));
        assert_eq!(table.min_level("x"), Some(LogLevel::Warning));
    }

    #[test]
    fn targets_become_dotted_categories() {
        assert_eq!(category_from_target("my_app::db::pool"), "my_app.db.pool");
    }
}
