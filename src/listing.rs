//! List view plumbing: search, pagination, debounced input and a gate that
//! drops responses to superseded requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Records that can be matched against a free-text search term
pub trait Searchable {
    fn search_text(&self) -> Vec<&str>;

    /// Case-insensitive substring match over [`Searchable::search_text`].
    /// A blank term matches everything.
    fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.search_text()
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// 1-based index of the first item on this page, 0 when empty
    pub fn first_index(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.page - 1) * self.page_size + 1
        }
    }
}

/// Slice out one page. Out-of-range pages clamp to the last page; an empty
/// list still has one (empty) page.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;

    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        page,
        page_size,
        total_items: items.len(),
        total_pages,
    }
}

/// Client-side view over a fetched list
#[derive(Debug, Clone)]
pub struct ListView<T> {
    items: Vec<T>,
    search: String,
    page: usize,
    page_size: usize,
}

impl<T: Searchable + Clone> ListView<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            items,
            search: String::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Replace the data, keeping search and page (clamped on render)
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// A new search term starts over at page 1
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn filtered(&self) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| item.matches_search(&self.search))
            .cloned()
            .collect()
    }

    pub fn current_page(&self) -> Page<T> {
        paginate(&self.filtered(), self.page, self.page_size)
    }

    pub fn goto(&mut self, page: usize) {
        let total = self.current_page().total_pages;
        self.page = page.clamp(1, total);
    }

    pub fn next_page(&mut self) {
        self.goto(self.page + 1);
    }

    pub fn previous_page(&mut self) {
        self.goto(self.page.saturating_sub(1));
    }
}

/// Identifies one issued request; later tickets compare greater
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing tickets, one per filter change
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: Arc<AtomicU64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// Applies a response only if its ticket is still the latest issued
#[derive(Debug)]
pub struct LatestOnly {
    sequencer: RequestSequencer,
    applied: Option<Ticket>,
}

impl LatestOnly {
    pub fn new(sequencer: RequestSequencer) -> Self {
        Self {
            sequencer,
            applied: None,
        }
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    pub fn accept<T>(&mut self, ticket: Ticket, value: T) -> Option<T> {
        let superseded = !self.sequencer.is_latest(ticket)
            || self.applied.map_or(false, |applied| applied >= ticket);
        if superseded {
            tracing::debug!("Discarding stale response for request #{}", ticket.value());
            return None;
        }
        self.applied = Some(ticket);
        Some(value)
    }
}

/// Collapses bursts of input into the last value once input has been quiet
/// for `delay`
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    delay: Duration,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Next settled value, or `None` once the input is closed and drained
    pub async fn next<T>(&self, input: &mut mpsc::Receiver<T>) -> Option<T> {
        let mut pending = input.recv().await?;
        loop {
            match tokio::time::timeout(self.delay, input.recv()).await {
                Ok(Some(newer)) => pending = newer,
                Ok(None) | Err(_) => return Some(pending),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str);

    impl Searchable for Row {
        fn search_text(&self) -> Vec<&str> {
            vec![self.0]
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        const NAMES: [&str; 5] = ["Algebra", "Biology", "Chemistry", "Algorithms", "Botany"];
        (0..n).map(|i| Row(NAMES[i % NAMES.len()])).collect()
    }

    #[test]
    fn paginate_clamps_and_counts() {
        let items: Vec<u32> = (1..=23).collect();
        let page = paginate(&items, 3, 10);
        assert_eq!(page.items, vec![21, 22, 23]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_index(), 21);
        assert!(!page.has_next());

        let clamped = paginate(&items, 99, 10);
        assert_eq!(clamped.page, 3);

        let empty = paginate::<u32>(&[], 1, 10);
        assert_eq!(empty.total_pages, 1);
        assert_eq!(empty.first_index(), 0);
    }

    #[test]
    fn search_resets_to_the_first_page() {
        let mut view = ListView::new(rows(25), 10);
        view.next_page();
        view.next_page();
        assert_eq!(view.current_page().page, 3);

        view.set_search("alg");
        let page = view.current_page();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_items, 10);
        assert!(page.items.iter().all(|r| r.0.starts_with("Alg")));
    }

    #[test]
    fn page_navigation_stays_in_range() {
        let mut view = ListView::new(rows(12), 5);
        view.previous_page();
        assert_eq!(view.current_page().page, 1);
        view.goto(10);
        assert_eq!(view.current_page().page, 3);

        view.set_items(rows(3));
        assert_eq!(view.current_page().page, 1);
    }

    #[test]
    fn stale_tickets_are_discarded() {
        let sequencer = RequestSequencer::new();
        let mut gate = LatestOnly::new(sequencer.clone());

        let first = sequencer.issue();
        let second = sequencer.issue();
        assert!(second > first);

        assert_eq!(gate.accept(second, "newer"), Some("newer"));
        assert_eq!(gate.accept(first, "older"), None);
        assert_eq!(gate.accept(second, "again"), None);
    }

    #[test]
    fn response_for_superseded_request_is_dropped_even_if_first() {
        let sequencer = RequestSequencer::new();
        let mut gate = LatestOnly::new(sequencer.clone());
        let first = sequencer.issue();
        let _second = sequencer.issue();
        assert_eq!(gate.accept(first, 1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_keeps_the_last_value_of_a_burst() {
        let (tx, mut rx) = mpsc::channel(8);
        for term in ["a", "al", "alg"] {
            tx.send(term).await.unwrap();
        }

        let debouncer = Debouncer::new(Duration::from_millis(500));
        assert_eq!(debouncer.next(&mut rx).await, Some("alg"));

        drop(tx);
        assert_eq!(debouncer.next(&mut rx).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_separates_quiet_gaps() {
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send("bio").await.unwrap();
            tokio::time::sleep(Duration::from_millis(600)).await;
            tx.send("chem").await.unwrap();
        });

        let debouncer = Debouncer::new(Duration::from_millis(500));
        assert_eq!(debouncer.next(&mut rx).await, Some("bio"));
        assert_eq!(debouncer.next(&mut rx).await, Some("chem"));
        assert_eq!(debouncer.next(&mut rx).await, None);
    }
}
