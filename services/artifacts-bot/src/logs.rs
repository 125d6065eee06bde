//! Capped, append-only log stream shared by all bots

use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::config::DEFAULT_MAX_LOGS;
use crate::types::{LogEntry, Severity};

/// Query over the log stream; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub bot_name: Option<String>,
    pub severity: Option<Severity>,
    /// Case-insensitive match on message or bot name
    pub search: Option<String>,
}

impl LogFilter {
    pub fn bot(name: &str) -> Self {
        Self {
            bot_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        let bot_ok = self
            .bot_name
            .as_deref()
            .map_or(true, |name| name.is_empty() || entry.bot_name == name);
        let severity_ok = self.severity.map_or(true, |s| entry.severity == s);
        let search_ok = self.search.as_deref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            entry.message.to_lowercase().contains(&needle)
                || entry.bot_name.to_lowercase().contains(&needle)
        });
        bot_ok && severity_ok && search_ok
    }
}

/// Bounded log collection, oldest entries evicted first
#[derive(Debug, Clone)]
pub struct LogStream {
    entries: VecDeque<LogEntry>,
    max_len: usize,
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGS)
    }
}

impl LogStream {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_len.min(DEFAULT_MAX_LOGS)),
            max_len,
        }
    }

    /// Append an entry and return its id
    pub fn push(
        &mut self,
        bot_name: &str,
        message: &str,
        severity: Severity,
        details: Option<serde_json::Value>,
    ) -> Uuid {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            bot_name: bot_name.to_string(),
            message: message.to_string(),
            severity,
            details,
        };
        let id = entry.id;
        self.entries.push_back(entry);
        self.trim();
        id
    }

    fn trim(&mut self) {
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Change the cap, evicting immediately if needed
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
        self.trim();
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Up to `n` entries, newest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    /// Matching entries, newest first
    pub fn filtered(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn by_id(&self, id: Uuid) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Distinct bot names in first-seen order
    pub fn bot_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.bot_name.as_str()))
            .map(|e| e.bot_name.clone())
            .collect()
    }

    /// Clear everything, or only one bot's entries
    pub fn clear(&mut self, bot_name: Option<&str>) {
        match bot_name {
            Some(name) => self.entries.retain(|e| e.bot_name != name),
            None => self.entries.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_evicts_oldest_first() {
        let mut logs = LogStream::new(3);
        for i in 0..5 {
            logs.push("hero", &format!("msg {}", i), Severity::Info, None);
            assert!(logs.len() <= 3);
        }
        let messages: Vec<_> = logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["msg 2", "msg 3", "msg 4"]);
        assert_eq!(logs.recent(1)[0].message, "msg 4");
    }

    #[test]
    fn test_shrinking_cap_trims_immediately() {
        let mut logs = LogStream::new(10);
        for i in 0..10 {
            logs.push("hero", &format!("msg {}", i), Severity::Info, None);
        }
        logs.set_max_len(4);
        assert_eq!(logs.len(), 4);
        assert_eq!(logs.iter().next().map(|e| e.message.as_str()), Some("msg 6"));
    }

    #[test]
    fn test_filters_and_queries() {
        let mut logs = LogStream::default();
        let id = logs.push("Miner", "Gathered copper: +5XP", Severity::Success, None);
        logs.push("Fighter", "Combat completed: +12XP, +3 gold", Severity::Success, None);
        logs.push("Fighter", "Character Fighter not found", Severity::Error, None);

        assert_eq!(logs.filtered(&LogFilter::bot("Fighter")).len(), 2);
        assert_eq!(logs.filtered(&LogFilter::severity(Severity::Error)).len(), 1);

        let search = LogFilter {
            search: Some("COPPER".into()),
            ..Default::default()
        };
        assert_eq!(logs.filtered(&search).len(), 1);

        // bot name search also matches
        let by_name = LogFilter {
            search: Some("mine".into()),
            ..Default::default()
        };
        assert_eq!(logs.filtered(&by_name).len(), 1);

        assert_eq!(logs.bot_names(), vec!["Miner".to_string(), "Fighter".to_string()]);
        assert_eq!(logs.by_id(id).map(|e| e.bot_name.as_str()), Some("Miner"));

        logs.clear(Some("Fighter"));
        assert_eq!(logs.len(), 1);
        logs.clear(None);
        assert!(logs.is_empty());
    }
}
