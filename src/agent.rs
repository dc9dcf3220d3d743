//! Dispatches feed records to a trading strategy.
//!
//! The [`Agent`] pumps trades in a background task and depth diffs in the
//! caller's task. Every depth diff is split into a bid task and an ask
//! task that run concurrently; levels within one side are delivered in
//! wire order. Nothing orders the two sides of a diff, successive diffs,
//! or trades against depth updates.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::Result;
use crate::feed::MarketFeed;
use crate::models::{BookEntry, DepthDiff, Side, Trade};

/// Trailing strategy-specific arguments. The dispatcher always passes an
/// empty slice.
pub type Extras = [serde_json::Value];

/// Trading logic driven by market data.
///
/// One strategy instance is shared by the trade pump and by every bid and
/// ask task, so callbacks can run concurrently, including callbacks for
/// different depth diffs. Implementations must synchronize their own
/// state. A callback that never completes stalls every later level on the
/// same side.
pub trait Strategy: Send + Sync + 'static {
    /// Places an order. Never called by the dispatcher itself.
    fn new_order(
        &self,
        order_id: &str,
        price: f64,
        quantity: f64,
        extras: &Extras,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Called once per completed trade. Identifiers are decimal strings.
    fn on_trade(
        &self,
        price: f64,
        quantity: f64,
        trade_id: &str,
        buyer_order_id: &str,
        seller_order_id: &str,
        extras: &Extras,
    ) -> impl Future<Output = ()> + Send;

    /// Called for each non-removal bid level in a depth diff.
    fn on_book_update_bid(
        &self,
        price: f64,
        quantity: f64,
        extras: &Extras,
    ) -> impl Future<Output = ()> + Send;

    /// Called for each non-removal ask level in a depth diff.
    fn on_book_update_ask(
        &self,
        price: f64,
        quantity: f64,
        extras: &Extras,
    ) -> impl Future<Output = ()> + Send;
}

/// Binds a [`MarketFeed`] to a [`Strategy`].
pub struct Agent<F, S> {
    feed: F,
    strategy: Arc<S>,
}

impl<F: MarketFeed, S: Strategy> Agent<F, S> {
    #[must_use]
    pub fn new(feed: F, strategy: S) -> Self {
        Self::with_shared_strategy(feed, Arc::new(strategy))
    }

    /// Creates an agent around a strategy the caller keeps a handle to.
    #[must_use]
    pub fn with_shared_strategy(feed: F, strategy: Arc<S>) -> Self {
        Self { feed, strategy }
    }

    /// Opens both streams and dispatches until both have ended.
    ///
    /// The trade stream is opened first; the depth stream is not opened if
    /// that fails.
    ///
    /// # Errors
    ///
    /// Returns the feed's error if either stream fails its initial dial.
    pub async fn start(&self) -> Result<()> {
        let mut trades = self.feed.trades().await.inspect_err(|e| {
            error!(error = %e, symbol = self.feed.symbol(), "error on reading trades");
        })?;
        let mut depth = self.feed.depth_updates().await.inspect_err(|e| {
            error!(error = %e, symbol = self.feed.symbol(), "error on reading book updates");
        })?;

        let strategy = Arc::clone(&self.strategy);
        let trade_pump = tokio::spawn(async move {
            while let Some(trade) = trades.next().await {
                dispatch_trade(strategy.as_ref(), trade).await;
            }
        });

        let mut side_tasks = JoinSet::new();
        while let Some(diff) = depth.next().await {
            spawn_sides(&mut side_tasks, &self.strategy, diff);

            while let Some(finished) = side_tasks.try_join_next() {
                log_side_failure(finished);
            }
        }

        while let Some(finished) = side_tasks.join_next().await {
            log_side_failure(finished);
        }
        if let Err(e) = trade_pump.await {
            error!(error = %e, "trade dispatch task failed");
        }

        Ok(())
    }
}

async fn dispatch_trade<S: Strategy>(strategy: &S, trade: Trade) {
    strategy
        .on_trade(
            trade.price,
            trade.quantity,
            &trade.id.to_string(),
            &trade.buyer_order_id.to_string(),
            &trade.seller_order_id.to_string(),
            &[],
        )
        .await;
}

fn spawn_sides<S: Strategy>(tasks: &mut JoinSet<()>, strategy: &Arc<S>, diff: DepthDiff) {
    let DepthDiff { bids, asks, .. } = diff;

    tasks.spawn(dispatch_side(Arc::clone(strategy), Side::Bid, bids));
    tasks.spawn(dispatch_side(Arc::clone(strategy), Side::Ask, asks));
}

/// Delivers one side of a diff in wire order, skipping removals.
async fn dispatch_side<S: Strategy>(strategy: Arc<S>, side: Side, levels: Vec<BookEntry>) {
    for level in levels {
        if level.is_removal() {
            // TODO: surface removals through a dedicated strategy callback
            debug!(side = side.as_str(), price = level.price, "book level removed");
            continue;
        }

        match side {
            Side::Bid => strategy.on_book_update_bid(level.price, level.quantity, &[]).await,
            Side::Ask => strategy.on_book_update_ask(level.price, level.quantity, &[]).await,
        }
    }
}

fn log_side_failure(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "book update task failed");
    }
}
