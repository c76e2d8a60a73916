/// Key layout of the durable store
///
/// With the default prefix `logbook`:
/// - `logbook:entry:{id}` -> LogEntry (JSON string)
/// - `logbook:index` -> sorted set of entry ids, scored by append score
/// - `logbook:count:{level}` -> integer counter
/// - `logbook:sources` -> set of source strings
use super::types::LogLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encode an entry key: {prefix}:entry:{id}
    pub fn entry(&self, id: &str) -> String {
        format!("{}:entry:{}", self.prefix, id)
    }

    pub fn index(&self) -> String {
        format!("{}:index", self.prefix)
    }

    /// Encode a per-level counter key: {prefix}:count:{level}
    pub fn count(&self, level: LogLevel) -> String {
        format!("{}:count:{}", self.prefix, level.as_str())
    }

    /// All five counter keys in `LogLevel::ALL` order
    pub fn counts(&self) -> Vec<String> {
        LogLevel::ALL.iter().map(|level| self.count(*level)).collect()
    }

    pub fn sources(&self) -> String {
        format!("{}:sources", self.prefix)
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("logbook")
    }
}
