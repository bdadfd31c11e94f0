//! New-circular selection for one check cycle.
//!
//! Given the cursor a cycle started from and the batch the feed returned
//! (newest first), decides which circulars to report and where the cursor
//! moves next.

use crate::models::{Category, Circular};

/// What a cycle reports and how far its cursor moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// New cursor value; `None` leaves the cursor untouched
    pub advance_to: Option<i64>,
    /// Circulars to report, oldest first
    pub circulars: Vec<Circular>,
}

impl CycleOutcome {
    /// Check if anything new was found.
    pub fn has_new(&self) -> bool {
        !self.circulars.is_empty()
    }
}

/// Select the circulars a checker scoped to `category` has not reported yet.
///
/// - With no cursor (`since == None`) the cycle is a cold start: the cursor
///   is seeded with the newest id of the whole batch and nothing is reported.
/// - An unfiltered checker moves its cursor to the newest id of the batch.
/// - A category checker moves its cursor to the newest matching id, and not
///   at all when nothing matched.
/// - The cursor never moves backwards, and ids at or below it are never reported.
pub fn select_new(category: &Category, batch: Vec<Circular>, since: Option<i64>) -> CycleOutcome {
    let unseen = |id: i64| since.is_none_or(|cursor| id > cursor);

    let newest_overall = batch.iter().map(|c| c.id).max();
    if since.is_none() {
        return CycleOutcome {
            advance_to: newest_overall,
            circulars: Vec::new(),
        };
    }

    let mut matching: Vec<Circular> = batch
        .into_iter()
        .filter(|c| unseen(c.id) && category.matches(c.category.as_ref()))
        .collect();
    matching.sort_by_key(|c| c.id);
    matching.dedup_by_key(|c| c.id);

    let advance_to = if category.is_all() {
        newest_overall
    } else {
        matching.last().map(|c| c.id)
    }
    .filter(|id| unseen(*id));

    let circulars = if category.is_all() {
        matching
    } else {
        matching.into_iter().map(Circular::without_category).collect()
    };

    CycleOutcome {
        advance_to,
        circulars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryTag;

    fn make_circular(id: i64, category: &str) -> Circular {
        Circular {
            id,
            title: format!("Circular {}", id),
            link: format!("https://example.com/{}.pdf", id),
            category: Some(CategoryTag::Name(category.to_string())),
        }
    }

    fn general() -> Category {
        Category::Name("general".into())
    }

    fn ids(circulars: &[Circular]) -> Vec<i64> {
        circulars.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_cold_start_reports_nothing() {
        let batch = vec![make_circular(105, "general"), make_circular(104, "exam")];

        let outcome = select_new(&general(), batch, None);
        assert!(!outcome.has_new());
        assert_eq!(outcome.advance_to, Some(105));
    }

    #[test]
    fn test_cold_start_seeds_even_without_matches() {
        let batch = vec![make_circular(105, "exam"), make_circular(104, "exam")];

        let outcome = select_new(&general(), batch, None);
        assert!(!outcome.has_new());
        assert_eq!(outcome.advance_to, Some(105));
    }

    #[test]
    fn test_cold_start_on_empty_feed() {
        let outcome = select_new(&Category::All, vec![], None);
        assert_eq!(outcome, CycleOutcome::default());
    }

    #[test]
    fn test_category_results_ascending_without_category() {
        let batch = vec![
            make_circular(103, "general"),
            make_circular(102, "general"),
            make_circular(101, "exam"),
        ];

        let outcome = select_new(&general(), batch, Some(100));
        assert_eq!(ids(&outcome.circulars), vec![102, 103]);
        assert!(outcome.circulars.iter().all(|c| c.category.is_none()));
        assert_eq!(outcome.advance_to, Some(103));
    }

    #[test]
    fn test_unfiltered_keeps_everything() {
        let batch = vec![
            make_circular(103, "general"),
            make_circular(102, "general"),
            make_circular(101, "exam"),
        ];

        let outcome = select_new(&Category::All, batch, Some(100));
        assert_eq!(ids(&outcome.circulars), vec![101, 102, 103]);
        assert!(outcome.circulars.iter().all(|c| c.category.is_some()));
        assert_eq!(outcome.advance_to, Some(103));
    }

    #[test]
    fn test_category_cursor_follows_newest_match() {
        let batch = vec![make_circular(104, "exam"), make_circular(103, "general")];

        let outcome = select_new(&general(), batch, Some(100));
        assert_eq!(ids(&outcome.circulars), vec![103]);
        assert_eq!(outcome.advance_to, Some(103));
    }

    #[test]
    fn test_quiet_category_does_not_advance() {
        let batch = vec![make_circular(103, "general"), make_circular(101, "general")];

        let outcome = select_new(&Category::Name("exam".into()), batch, Some(100));
        assert!(!outcome.has_new());
        assert_eq!(outcome.advance_to, None);
    }

    #[test]
    fn test_never_reports_seen_ids_or_moves_back() {
        let batch = vec![
            make_circular(102, "general"),
            make_circular(100, "general"),
            make_circular(99, "general"),
        ];

        let outcome = select_new(&general(), batch, Some(100));
        assert_eq!(ids(&outcome.circulars), vec![102]);
        assert_eq!(outcome.advance_to, Some(102));

        let stale = vec![make_circular(90, "general")];
        let outcome = select_new(&Category::All, stale, Some(100));
        assert!(!outcome.has_new());
        assert_eq!(outcome.advance_to, None);
    }

    #[test]
    fn test_numeric_category_matches_numeric_tags() {
        let mut numeric = make_circular(101, "");
        numeric.category = Some(CategoryTag::Id(41));
        let batch = vec![numeric, make_circular(102, "general")];

        let outcome = select_new(&Category::Id(41), batch, Some(100));
        assert_eq!(ids(&outcome.circulars), vec![101]);
    }
}
