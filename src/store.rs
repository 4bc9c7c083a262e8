//! The page of assignments currently shown to one staff member.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::{CareError, CareResult};
use crate::models::{Assignment, Status};
use crate::scheduler::AssignmentPage;
use crate::stats::Statistics;

/// Identifies one load request. Only the most recently issued ticket may
/// replace the page; results for older tickets are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    pub filter: Option<Status>,
    pub page: u32,
}

#[derive(Debug)]
pub struct AssignmentStore {
    staff_id: String,
    items: Vec<Assignment>,
    /// Assignment id to position in `items`.
    index: HashMap<u64, usize>,
    filter: Option<Status>,
    page: u32,
    total_pages: u32,
    updating: HashSet<u64>,
    generation: u64,
}

impl AssignmentStore {
    pub fn new(staff_id: impl Into<String>) -> AssignmentStore {
        AssignmentStore {
            staff_id: staff_id.into(),
            items: Vec::new(),
            index: HashMap::new(),
            filter: None,
            page: 1,
            total_pages: 0,
            updating: HashSet::new(),
            generation: 0,
        }
    }

    pub fn staff_id(&self) -> &str {
        &self.staff_id
    }

    pub fn items(&self) -> &[Assignment] {
        &self.items
    }

    pub fn get(&self, id: u64) -> Option<&Assignment> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    pub fn filter(&self) -> Option<Status> {
        self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Changes the server-side filter. The page always goes back to 1.
    pub fn set_filter(&mut self, filter: Option<Status>) {
        self.filter = filter;
        self.page = 1;
    }

    /// Moves to a 1-indexed page. Once a load has reported the page count,
    /// pages past it are refused.
    pub fn set_page(&mut self, page: u32) -> CareResult<()> {
        if page == 0 || (self.total_pages > 0 && page > self.total_pages) {
            return Err(CareError::InvalidInput(format!(
                "page {} is out of range (1..={})",
                page,
                self.total_pages.max(1)
            )));
        }
        self.page = page;
        Ok(())
    }

    /// Issues a ticket for the current filter and page, superseding any
    /// request still in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket { generation: self.generation, filter: self.filter, page: self.page }
    }

    /// Applies the outcome of a load.
    ///
    /// Returns `Ok(false)` when the ticket was superseded and the result was
    /// discarded. On failure the held page is left as it was. A page past the
    /// reported count is clamped to the last page.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: CareResult<AssignmentPage>) -> CareResult<bool> {
        if ticket.generation != self.generation {
            tracing::debug!(
                stale = ticket.generation,
                latest = self.generation,
                "discarding superseded load"
            );
            return Ok(false);
        }
        let page = result.map_err(CareError::into_load)?;
        self.index = page.items.iter().enumerate().map(|(i, a)| (a.id, i)).collect();
        self.items = page.items;
        self.total_pages = page.total_pages.max(1);
        if self.page > self.total_pages {
            self.page = self.total_pages;
        }
        Ok(true)
    }

    /// Swaps one assignment for its updated value, keeping its position.
    pub fn apply_local_transition(&mut self, id: u64, updated: Assignment) -> CareResult<()> {
        if updated.id != id {
            return Err(CareError::InvalidInput(format!(
                "update for assignment {} carries id {}",
                id, updated.id
            )));
        }
        let pos = *self
            .index
            .get(&id)
            .ok_or_else(|| CareError::NotFound(format!("assignment {}", id)))?;
        self.items[pos] = updated;
        Ok(())
    }

    /// Marks an assignment as having a transition in flight.
    pub fn mark_updating(&mut self, id: u64) -> CareResult<()> {
        if !self.updating.insert(id) {
            return Err(CareError::AlreadyUpdating(id));
        }
        Ok(())
    }

    pub fn clear_updating(&mut self, id: u64) {
        self.updating.remove(&id);
    }

    pub fn is_updating(&self, id: u64) -> bool {
        self.updating.contains(&id)
    }

    /// Fold over the held page only.
    pub fn page_statistics(&self, today: NaiveDate) -> Statistics {
        Statistics::tally(&self.items, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskDefinition, TaskKind};
    use chrono::{TimeZone, Utc};

    fn assignment(id: u64, status: Status) -> Assignment {
        let t = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
        Assignment {
            id,
            task: TaskDefinition {
                id: 100 + id,
                title: format!("Task {}", id),
                description: String::new(),
                kind: TaskKind::Daily,
                priority: Priority::High,
                due_date: None,
                referral_timer_minutes: None,
                active: true,
                created_at: t,
            },
            staff_id: "doc-1".into(),
            status,
            notes: String::new(),
            started_at: None,
            completed_at: None,
            referral_count: 0,
            progress: 0,
            active: true,
            created_at: t,
            updated_at: t,
            countdown: None,
        }
    }

    fn page(ids: &[u64], total_pages: u32) -> AssignmentPage {
        AssignmentPage {
            items: ids.iter().map(|&id| assignment(id, Status::Assigned)).collect(),
            total_pages,
        }
    }

    #[test]
    fn load_replaces_page() {
        let mut store = AssignmentStore::new("doc-1");
        let t = store.begin_load();
        assert!(store.finish_load(t, Ok(page(&[1, 2, 3], 2))).unwrap());
        assert_eq!(store.items().len(), 3);
        assert_eq!(store.total_pages(), 2);

        let t = store.begin_load();
        assert!(store.finish_load(t, Ok(page(&[9], 1))).unwrap());
        assert_eq!(store.items().iter().map(|a| a.id).collect::<Vec<_>>(), vec![9]);
        assert!(store.get(1).is_none());
        assert!(store.get(9).is_some());
    }

    #[test]
    fn failed_load_keeps_previous_data() {
        let mut store = AssignmentStore::new("doc-1");
        let t = store.begin_load();
        store.finish_load(t, Ok(page(&[1, 2], 1))).unwrap();

        let t = store.begin_load();
        let err = store.finish_load(t, Err(CareError::Network("offline".into()))).unwrap_err();
        assert!(matches!(err, CareError::Load(_)));
        assert_eq!(store.items().len(), 2);
    }

    #[test]
    fn last_request_wins() {
        let mut store = AssignmentStore::new("doc-1");
        let first = store.begin_load();
        store.set_filter(Some(Status::Completed));
        let second = store.begin_load();
        assert_eq!(second.filter, Some(Status::Completed));

        assert!(store.finish_load(second, Ok(page(&[5], 1))).unwrap());
        assert!(!store.finish_load(first, Ok(page(&[1, 2, 3], 1))).unwrap());
        assert_eq!(store.items().iter().map(|a| a.id).collect::<Vec<_>>(), vec![5]);

        // A stale failure is dropped too.
        let third = store.begin_load();
        let _fourth = store.begin_load();
        assert!(!store.finish_load(third, Err(CareError::Unauthorized)).unwrap());
    }

    #[test]
    fn page_is_clamped_after_load() {
        let mut store = AssignmentStore::new("doc-1");
        // Nothing is known about the page count yet, so any page is accepted.
        store.set_page(7).unwrap();
        let t = store.begin_load();
        assert!(store.finish_load(t, Ok(page(&[], 2))).unwrap());
        assert_eq!(store.page(), 2);
        assert!(store.set_page(3).is_err());

        store.set_filter(Some(Status::Rejected));
        let t = store.begin_load();
        store.finish_load(t, Ok(page(&[], 0))).unwrap();
        assert_eq!(store.total_pages(), 1);
        assert_eq!(store.page(), 1);
    }

    #[test]
    fn local_transition_preserves_order() {
        let mut store = AssignmentStore::new("doc-1");
        let t = store.begin_load();
        store.finish_load(t, Ok(page(&[4, 5, 6], 1))).unwrap();

        store.apply_local_transition(5, assignment(5, Status::Accepted)).unwrap();
        let ids: Vec<_> = store.items().iter().map(|a| (a.id, a.status)).collect();
        assert_eq!(
            ids,
            vec![(4, Status::Assigned), (5, Status::Accepted), (6, Status::Assigned)]
        );

        assert!(matches!(
            store.apply_local_transition(42, assignment(42, Status::Accepted)),
            Err(CareError::NotFound(_))
        ));
        assert!(matches!(
            store.apply_local_transition(4, assignment(6, Status::Accepted)),
            Err(CareError::InvalidInput(_))
        ));
    }

    #[test]
    fn filter_resets_page() {
        let mut store = AssignmentStore::new("doc-1");
        let t = store.begin_load();
        store.finish_load(t, Ok(page(&[1], 3))).unwrap();
        store.set_page(3).unwrap();
        assert_eq!(store.page(), 3);
        store.set_filter(Some(Status::InProgress));
        assert_eq!(store.page(), 1);
        assert!(store.set_page(0).is_err());
        assert!(store.set_page(4).is_err());
    }

    #[test]
    fn updating_marker_blocks_double_submit() {
        let mut store = AssignmentStore::new("doc-1");
        store.mark_updating(3).unwrap();
        assert!(store.is_updating(3));
        assert!(matches!(store.mark_updating(3), Err(CareError::AlreadyUpdating(3))));
        store.clear_updating(3);
        assert!(!store.is_updating(3));
        store.mark_updating(3).unwrap();
    }
}
