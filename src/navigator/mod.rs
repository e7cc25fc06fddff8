//! Search-result navigation across documents.
//!
//! Navigation is a two-level iteration: the outer level walks documents in
//! registry order (reversed when going backward), the inner level walks the
//! flagged messages of one document (also reversed when going backward).
//!
//! [`Navigator::advance`] prefers to stay in the current document. It only
//! crosses to another document once the current one has no further match in
//! the requested direction, and then scans the other documents starting
//! just past the current one, wrapping around at the end of the list. That
//! makes repeated advances visit every match exactly once per cycle.
//!
//! There is a single [`Cursor`]. Cursors on other documents are therefore
//! cleared implicitly whenever the current document changes.

use serde::Serialize;
use tracing::trace;

use crate::registry::{EntryId, LogEntry, LogRegistry};

/// Direction of travel through the matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    /// Registry order, then message order.
    #[default]
    Forward,
    /// Reverse registry order, then reverse message order.
    Backward,
}

/// The navigated-to message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cursor {
    /// Document holding the message.
    pub entry: EntryId,
    /// Index of the message within the document.
    pub message: usize,
}

/// Stateful match traversal.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    cursor: Option<Cursor>,
}

fn ordered_matches(entry: &LogEntry, direction: SearchDirection) -> Vec<usize> {
    match direction {
        SearchDirection::Forward => entry.match_indices().collect(),
        SearchDirection::Backward => entry.match_indices().rev().collect(),
    }
}

impl Navigator {
    /// A navigator with no cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current cursor.
    #[must_use]
    pub const fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Drop the cursor.
    pub fn clear(&mut self) {
        self.cursor = None;
    }

    /// Put the cursor on a specific message, making its document current.
    ///
    /// Returns `false` if the entry or message does not exist.
    pub fn place(&mut self, registry: &mut LogRegistry, cursor: Cursor) -> bool {
        let exists = registry
            .get(cursor.entry)
            .is_some_and(|e| cursor.message < e.messages().len());
        if !exists {
            return false;
        }
        registry.select(cursor.entry);
        self.cursor = Some(cursor);
        true
    }

    /// Drop the cursor if it points into `id`.
    pub fn purge(&mut self, id: EntryId) {
        if self.cursor.is_some_and(|c| c.entry == id) {
            self.cursor = None;
        }
    }

    /// Drop the cursor if it no longer points at an existing message in the
    /// current document. Returns whether a cursor remains.
    pub fn revalidate(&mut self, registry: &LogRegistry) -> bool {
        if let Some(cursor) = self.cursor {
            let valid = registry.current() == Some(cursor.entry)
                && registry
                    .get(cursor.entry)
                    .is_some_and(|e| cursor.message < e.messages().len());
            if !valid {
                self.cursor = None;
            }
        }
        self.cursor.is_some()
    }

    /// Move to the next match in `direction`.
    ///
    /// 1. If the current document has matches, move to the one strictly after
    ///    the cursor, or to its first match when the cursor is not on a
    ///    match. No document switch happens while that succeeds.
    /// 2. Otherwise make the next document (after the current one, wrapping
    ///    back to the current one last) that has a match current, and move
    ///    to its first match.
    /// 3. With no match anywhere the cursor becomes undefined and the current
    ///    document is left as it was.
    pub fn advance(&mut self, direction: SearchDirection, registry: &mut LogRegistry) -> Option<Cursor> {
        let count = registry.len();
        let order: Vec<usize> = match direction {
            SearchDirection::Forward => (0..count).collect(),
            SearchDirection::Backward => (0..count).rev().collect(),
        };

        let current_slot = registry
            .current()
            .and_then(|id| registry.position(id))
            .and_then(|index| order.iter().position(|&i| i == index));

        if let Some(slot) = current_slot {
            let entry = &registry.entries()[order[slot]];
            let matches = ordered_matches(entry, direction);
            let from = self
                .cursor
                .filter(|c| c.entry == entry.id())
                .map(|c| c.message)
                .filter(|m| matches.contains(m));

            let next = match from {
                Some(m) => matches.iter().skip_while(|&&i| i != m).nth(1).copied(),
                None => matches.first().copied(),
            };

            if let Some(message) = next {
                let cursor = Cursor {
                    entry: entry.id(),
                    message,
                };
                trace!(entry = %cursor.entry, message, "advanced within document");
                self.cursor = Some(cursor);
                return self.cursor;
            }
        }

        // The current document comes last, so a lone document wraps onto itself.
        let start = current_slot.map_or(0, |s| s + 1);
        for step in 0..count {
            let slot = (start + step) % count;
            let entry = &registry.entries()[order[slot]];
            if let Some(&message) = ordered_matches(entry, direction).first() {
                let cursor = Cursor {
                    entry: entry.id(),
                    message,
                };
                registry.select(cursor.entry);
                trace!(entry = %cursor.entry, message, "advanced to another document");
                self.cursor = Some(cursor);
                return self.cursor;
            }
        }

        trace!("no filter matches to navigate to");
        self.cursor = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterState;
    use crate::model::{Conversation, Direction, Message};
    use crate::store::DocumentStore;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, min, 0).unwrap()
    }

    fn add(registry: &mut LogRegistry, name: &str, started: DateTime<Utc>, messages: &[(DateTime<Utc>, &str)]) -> EntryId {
        let messages = messages
            .iter()
            .map(|(ts, text)| Message::new(*ts, Direction::Incoming, text))
            .collect();
        let path = format!("/logs/{name}.xml");
        registry
            .upsert_loaded(Path::new(&path), Conversation::from_parts(name, started, messages))
            .id()
    }

    fn filtered(registry: &mut LogRegistry, text: &str) {
        let mut filter = FilterState::new();
        filter.set(text);
        filter.apply_all(registry);
    }

    /// D1 starts at 10:00 with "hello" and "goodbye"; D2 at 9:00 with "hello world".
    fn scenario() -> (LogRegistry, EntryId, EntryId) {
        let mut registry = LogRegistry::new(DocumentStore::default());
        let d1 = add(&mut registry, "d1", at(10, 0), &[(at(10, 0), "hello"), (at(10, 1), "goodbye")]);
        let d2 = add(&mut registry, "d2", at(9, 0), &[(at(9, 5), "hello world")]);
        registry.select_first();
        filtered(&mut registry, "hello");
        (registry, d1, d2)
    }

    #[test]
    fn test_scenario_forward_crosses_and_wraps() {
        let (mut registry, d1, d2) = scenario();
        let mut nav = Navigator::new();

        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d1, message: 0 }));
        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d2, message: 0 }));
        assert_eq!(registry.current(), Some(d2));
        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d1, message: 0 }));
        assert_eq!(registry.current(), Some(d1));
    }

    #[test]
    fn test_backward_from_no_cursor_takes_last_match_of_current() {
        let mut registry = LogRegistry::new(DocumentStore::default());
        let d1 = add(&mut registry, "d1", at(10, 0), &[(at(10, 0), "x1"), (at(10, 1), "x2")]);
        let d2 = add(&mut registry, "d2", at(9, 0), &[(at(9, 0), "x3")]);
        registry.select_first();
        filtered(&mut registry, "x");
        let mut nav = Navigator::new();

        assert_eq!(nav.advance(SearchDirection::Backward, &mut registry), Some(Cursor { entry: d1, message: 1 }));
        assert_eq!(nav.advance(SearchDirection::Backward, &mut registry), Some(Cursor { entry: d1, message: 0 }));
        assert_eq!(nav.advance(SearchDirection::Backward, &mut registry), Some(Cursor { entry: d2, message: 0 }));
        assert_eq!(nav.advance(SearchDirection::Backward, &mut registry), Some(Cursor { entry: d1, message: 1 }));
    }

    #[test]
    fn test_stays_in_document_while_matches_remain() {
        let mut registry = LogRegistry::new(DocumentStore::default());
        let d1 = add(&mut registry, "d1", at(10, 0), &[(at(10, 0), "a"), (at(10, 1), "b")]);
        let d2 = add(&mut registry, "d2", at(9, 0), &[(at(9, 0), "a"), (at(9, 1), "a"), (at(9, 2), "a")]);
        filtered(&mut registry, "a");
        registry.select(d2);
        let mut nav = Navigator::new();

        let visited: Vec<_> = (0..4)
            .map(|_| nav.advance(SearchDirection::Forward, &mut registry).unwrap())
            .collect();
        assert_eq!(
            visited,
            vec![
                Cursor { entry: d2, message: 0 },
                Cursor { entry: d2, message: 1 },
                Cursor { entry: d2, message: 2 },
                Cursor { entry: d1, message: 0 },
            ]
        );
    }

    #[test]
    fn test_cycle_visits_every_match_once_across_three_documents() {
        let mut registry = LogRegistry::new(DocumentStore::default());
        let d1 = add(&mut registry, "d1", at(12, 0), &[(at(12, 0), "hit")]);
        let d2 = add(&mut registry, "d2", at(11, 0), &[(at(11, 0), "hit"), (at(11, 1), "miss"), (at(11, 2), "hit")]);
        let d3 = add(&mut registry, "d3", at(10, 0), &[(at(10, 0), "hit")]);
        registry.select_first();
        filtered(&mut registry, "hit");
        let mut nav = Navigator::new();

        let visited: Vec<_> = (0..5)
            .map(|_| nav.advance(SearchDirection::Forward, &mut registry).unwrap())
            .collect();
        assert_eq!(
            visited,
            vec![
                Cursor { entry: d1, message: 0 },
                Cursor { entry: d2, message: 0 },
                Cursor { entry: d2, message: 2 },
                Cursor { entry: d3, message: 0 },
                Cursor { entry: d1, message: 0 },
            ]
        );
    }

    #[test]
    fn test_skips_documents_without_matches() {
        let mut registry = LogRegistry::new(DocumentStore::default());
        add(&mut registry, "d1", at(12, 0), &[(at(12, 0), "nothing")]);
        let d2 = add(&mut registry, "d2", at(11, 0), &[(at(11, 0), "needle")]);
        registry.select_first();
        filtered(&mut registry, "needle");
        let mut nav = Navigator::new();

        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d2, message: 0 }));
        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d2, message: 0 }));
    }

    #[test]
    fn test_no_matches_clears_cursor_and_keeps_current() {
        let (mut registry, d1, _) = scenario();
        let mut nav = Navigator::new();
        nav.advance(SearchDirection::Forward, &mut registry);

        filtered(&mut registry, "absent");
        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), None);
        assert_eq!(nav.cursor(), None);
        assert_eq!(registry.current(), Some(d1));
    }

    #[test]
    fn test_cursor_on_non_match_restarts_at_first_match() {
        let (mut registry, d1, _) = scenario();
        let mut nav = Navigator::new();
        assert!(nav.place(&mut registry, Cursor { entry: d1, message: 1 }));

        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d1, message: 0 }));
    }

    #[test]
    fn test_without_current_scans_from_top() {
        let (mut registry, d1, _) = scenario();
        registry.clear_selection();
        let mut nav = Navigator::new();

        assert_eq!(nav.advance(SearchDirection::Forward, &mut registry), Some(Cursor { entry: d1, message: 0 }));
        assert_eq!(registry.current(), Some(d1));
    }

    #[test]
    fn test_purge_and_revalidate() {
        let (mut registry, d1, d2) = scenario();
        let mut nav = Navigator::new();
        nav.advance(SearchDirection::Forward, &mut registry);

        nav.purge(d2);
        assert!(nav.cursor().is_some());
        nav.purge(d1);
        assert!(nav.cursor().is_none());

        assert!(nav.place(&mut registry, Cursor { entry: d2, message: 0 }));
        registry.remove("/logs/d2.xml");
        assert!(!nav.revalidate(&registry));
    }

    #[test]
    fn test_place_rejects_out_of_range() {
        let (mut registry, d1, _) = scenario();
        let mut nav = Navigator::new();
        assert!(!nav.place(&mut registry, Cursor { entry: d1, message: 9 }));
        assert!(nav.cursor().is_none());
    }
}
