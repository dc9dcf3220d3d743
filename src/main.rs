use tracing::{debug, info};

use binance_agent::agent::Extras;
use binance_agent::config::fetch_config;
use binance_agent::{Agent, AgentError, BinanceFeed, Strategy};

/// Whether the agent is looking to buy or to sell.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Buyer,
    Seller,
}

/// Logs every market event it receives. Order placement is a no-op.
struct SimpleStrategy {
    mode: Mode,
    market: String,
}

impl SimpleStrategy {
    fn new(mode: Mode, market: &str) -> Self {
        Self {
            mode,
            market: market.to_string(),
        }
    }
}

impl Strategy for SimpleStrategy {
    async fn new_order(
        &self,
        order_id: &str,
        price: f64,
        quantity: f64,
        _extras: &Extras,
    ) -> Result<(), AgentError> {
        debug!(order_id, price, quantity, mode = ?self.mode, "new order");
        Ok(())
    }

    async fn on_trade(
        &self,
        price: f64,
        quantity: f64,
        trade_id: &str,
        buyer_order_id: &str,
        seller_order_id: &str,
        _extras: &Extras,
    ) {
        debug!(
            price,
            quantity,
            trade_id,
            buyer_order_id,
            seller_order_id,
            "trade in {} market",
            self.market
        );
    }

    async fn on_book_update_bid(&self, price: f64, quantity: f64, _extras: &Extras) {
        debug!(price, quantity, event_type = "bid", "book update in {} market", self.market);
    }

    async fn on_book_update_ask(&self, price: f64, quantity: f64, _extras: &Extras) {
        debug!(price, quantity, event_type = "ask", "book update in {} market", self.market);
    }
}

#[tokio::main]
async fn main() -> Result<(), AgentError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    let feed = BinanceFeed::from_config(&app_config.binance)?;

    // `binance-agent sell` runs the seller side; anything else buys.
    let mode = match std::env::args().nth(1).as_deref() {
        Some("sell") => Mode::Seller,
        _ => Mode::Buyer,
    };
    let strategy = SimpleStrategy::new(mode, &app_config.binance.symbol);

    info!(symbol = %app_config.binance.symbol, ?mode, "agent starting...");
    Agent::new(feed, strategy).start().await
}
