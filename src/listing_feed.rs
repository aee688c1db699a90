// Current listing collection, refreshed from the backend with last-state-wins commits

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{backend::MarketplaceBackend, models::Listing};

/// Issued before a fetch starts. Tickets are strictly increasing, so a later
/// ticket always belongs to a newer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

struct Snapshot {
    ticket: FetchTicket,
    listings: Arc<Vec<Listing>>,
    fetched_at: Instant,
}

#[derive(Default)]
struct FeedState {
    snapshot: Option<Snapshot>,
    // tickets below this were issued before the last invalidation
    floor: u64,
}

/// What the views render from. A failed load is an empty collection plus a
/// flag, never an error.
#[derive(Debug, Clone)]
pub struct FeedView {
    pub listings: Arc<Vec<Listing>>,
    pub load_failed: bool,
}

pub struct ListingFeed {
    backend: Arc<dyn MarketplaceBackend>,
    ttl: Duration,
    issued: AtomicU64,
    state: RwLock<FeedState>,
}

impl ListingFeed {
    pub fn new(backend: Arc<dyn MarketplaceBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            issued: AtomicU64::new(0),
            state: RwLock::new(FeedState::default()),
        }
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Stores `listings` unless a newer fetch already landed or the feed was
    /// invalidated after `ticket` was issued. Returns whether it was kept.
    pub async fn commit(&self, ticket: FetchTicket, listings: Vec<Listing>) -> bool {
        let mut state = self.state.write().await;
        if ticket.0 < state.floor {
            warn!("Discarding listings from fetch #{}: feed invalidated since.", ticket.0);
            return false;
        }
        if let Some(current) = &state.snapshot {
            if current.ticket > ticket {
                warn!(
                    "Discarding listings from fetch #{}: fetch #{} is newer.",
                    ticket.0, current.ticket.0
                );
                return false;
            }
        }
        info!("Committed {} listings from fetch #{}.", listings.len(), ticket.0);
        state.snapshot = Some(Snapshot {
            ticket,
            listings: Arc::new(listings),
            fetched_at: Instant::now(),
        });
        true
    }

    /// Drops the cached collection; in-flight fetches started earlier will
    /// not be committed.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.snapshot = None;
        state.floor = self.issued.load(Ordering::SeqCst) + 1;
    }

    pub async fn refresh(&self) -> FeedView {
        let ticket = self.begin_fetch();
        match self.backend.list_listings().await {
            Ok(listings) => {
                let fallback = Arc::new(listings.clone());
                self.commit(ticket, listings).await;
                // a newer commit may have won; show whatever is current
                let state = self.state.read().await;
                let listings = state
                    .snapshot
                    .as_ref()
                    .map(|s| s.listings.clone())
                    .unwrap_or(fallback);
                FeedView { listings, load_failed: false }
            }
            Err(e) => {
                warn!("Failed to load listings: {}", e);
                FeedView {
                    listings: Arc::new(Vec::new()),
                    load_failed: true,
                }
            }
        }
    }

    pub async fn current(&self) -> FeedView {
        {
            let state = self.state.read().await;
            if let Some(snapshot) = &state.snapshot {
                if snapshot.fetched_at.elapsed() < self.ttl {
                    return FeedView {
                        listings: snapshot.listings.clone(),
                        load_failed: false,
                    };
                }
            }
        }
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mock_backend::MockBackend, query::tests::listing};

    fn feed(backend: Arc<MockBackend>) -> ListingFeed {
        ListingFeed::new(backend, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn later_fetch_wins_over_late_arrival() {
        let feed = feed(Arc::new(MockBackend::default()));
        let older = feed.begin_fetch();
        let newer = feed.begin_fetch();

        assert!(feed.commit(newer, vec![listing(2, "Samsung", "Galaxy S24", 280_000)]).await);
        assert!(!feed.commit(older, vec![listing(1, "Apple", "iPhone 15", 250_000)]).await);

        let view = feed.current().await;
        assert_eq!(view.listings.len(), 1);
        assert_eq!(view.listings[0].brand, "Samsung");
    }

    #[tokio::test]
    async fn fresh_snapshot_is_served_from_cache() {
        let backend = Arc::new(MockBackend::with_listings(vec![listing(1, "Apple", "iPhone 15", 250_000)]));
        let feed = feed(backend.clone());

        assert_eq!(feed.current().await.listings.len(), 1);
        assert_eq!(feed.current().await.listings.len(), 1);
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn invalidation_discards_in_flight_fetches() {
        let backend = Arc::new(MockBackend::with_listings(vec![listing(1, "Apple", "iPhone 15", 250_000)]));
        let feed = feed(backend.clone());
        let before = feed.begin_fetch();
        feed.invalidate().await;
        assert!(!feed.commit(before, Vec::new()).await);

        feed.current().await;
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn failed_load_is_empty_not_an_error() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_listings(true);
        let view = feed(backend).current().await;
        assert!(view.load_failed);
        assert!(view.listings.is_empty());
    }
}
