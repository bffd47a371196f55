//! Production Trading System with Live Market Data
//! Complete implementation with orderbook management and trading strategy

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Mutex};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443";

// Trading parameters
const SPREAD_THRESHOLD_BPS: f64 = 0.01; // 0.01 basis points (very tight to trigger on BTC/ETH)
const MIN_EDGE_BPS: f64 = 0.005; // Minimum edge to trade
const MAX_POSITION_SIZE: f64 = 10000.0; // Max USD position
const PRICE_TICK: f64 = 0.01;

#[derive(Debug, Clone)]
struct OrderLevel {
    price: f64,
    quantity: f64,
    orders: u32,
}

#[derive(Debug, Clone)]
struct OrderBook {
    symbol: String,
    bids: BTreeMap<i64, OrderLevel>, // price_ticks -> level
    asks: BTreeMap<i64, OrderLevel>,
    last_update_id: u64,
    last_update: Instant,
}

impl OrderBook {
    fn new(symbol: String) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id: 0,
            last_update: Instant::now(),
        }
    }
    
    fn price_to_ticks(price: f64) -> i64 {
        (price / PRICE_TICK).round() as i64
    }
    
    fn ticks_to_price(ticks: i64) -> f64 {
        ticks as f64 * PRICE_TICK
    }
    
    fn update(&mut self, bids: &[[String; 2]], asks: &[[String; 2]], update_id: u64) {
        self.last_update_id = update_id;
        self.last_update = Instant::now();
        
        // Update bids
        for bid in bids {
            let price = bid[0].parse::<f64>().unwrap_or(0.0);
            let qty = bid[1].parse::<f64>().unwrap_or(0.0);
            
            let price_ticks = Self::price_to_ticks(price);
            
            if qty > 0.0 {
                self.bids.insert(price_ticks, OrderLevel {
                    price,
                    quantity: qty,
                    orders: 1,
                });
            } else {
                self.bids.remove(&price_ticks);
            }
        }
        
        // Update asks
        for ask in asks {
            let price = ask[0].parse::<f64>().unwrap_or(0.0);
            let qty = ask[1].parse::<f64>().unwrap_or(0.0);
            
            let price_ticks = Self::price_to_ticks(price);
            
            if qty > 0.0 {
                self.asks.insert(price_ticks, OrderLevel {
                    price,
                    quantity: qty,
                    orders: 1,
                });
            } else {
                self.asks.remove(&price_ticks);
            }
        }
    }
    
    fn best_bid(&self) -> Option<&OrderLevel> {
        self.bids.values().rev().next()
    }
    
    fn best_ask(&self) -> Option<&OrderLevel> {
        self.asks.values().next()
    }
    
    fn spread_bps(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        let mid = (bid.price + ask.price) / 2.0;
        Some((ask.price - bid.price) / mid * 10000.0)
    }
    
    fn midpoint(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / 2.0)
    }
}

#[derive(Debug, Clone, Serialize)]
struct Trade {
    symbol: String,
    side: String,
    price: f64,
    quantity: f64,
    timestamp: u64,
    reason: String,
}

#[derive(Debug)]
struct TradingEngine {
    orderbooks: Arc<RwLock<BTreeMap<String, OrderBook>>>,
    trades: Arc<Mutex<Vec<Trade>>>,
    position: Arc<RwLock<BTreeMap<String, f64>>>,
    pnl: Arc<RwLock<f64>>,
    stats: Arc<TradingStats>,
    // Kelly Criterion tracking
    win_rate: Arc<RwLock<f64>>,
    avg_win: Arc<RwLock<f64>>,
    avg_loss: Arc<RwLock<f64>>,
    total_trades: Arc<AtomicU64>,
    winning_trades: Arc<AtomicU64>,
}

#[derive(Debug)]
struct TradingStats {
    messages_received: AtomicU64,
    orderbook_updates: AtomicU64,
    trades_executed: AtomicU64,
    trading_opportunities: AtomicU64,
    errors: AtomicU64,
    connected: AtomicBool,
}

impl Default for TradingStats {
    fn default() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            orderbook_updates: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            trading_opportunities: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            connected: AtomicBool::new(false),
        }
    }
}

impl TradingEngine {
    fn new() -> Self {
        Self {
            orderbooks: Arc::new(RwLock::new(BTreeMap::new())),
            trades: Arc::new(Mutex::new(Vec::new())),
            position: Arc::new(RwLock::new(BTreeMap::new())),
            pnl: Arc::new(RwLock::new(0.0)),
            stats: Arc::new(TradingStats::default()),
            win_rate: Arc::new(RwLock::new(0.55)), // Initial estimate
            avg_win: Arc::new(RwLock::new(20.0)),
            avg_loss: Arc::new(RwLock::new(10.0)),
            total_trades: Arc::new(AtomicU64::new(0)),
            winning_trades: Arc::new(AtomicU64::new(0)),
        }
    }
    
    async fn calculate_kelly_position_size(&self, capital: f64) -> f64 {
        let win_rate = *self.win_rate.read().await;
        let avg_win = *self.avg_win.read().await;
        let avg_loss = *self.avg_loss.read().await;
        let total_trades = self.total_trades.load(Ordering::Relaxed);
        
        // Need at least 10 trades for Kelly
        if total_trades < 10 || avg_loss == 0.0 {
            return capital * 0.02; // 2% conservative start
        }
        
        let b = avg_win / avg_loss;
        let p = win_rate;
        let q = 1.0 - p;
        
        let kelly_fraction = (b * p - q) / b;
        let capped_kelly = kelly_fraction.max(0.0).min(0.25); // Cap at 25%
        
        capital * capped_kelly
    }
    
    async fn process_orderbook_update(&self, symbol: &str, bids: &[[String; 2]], asks: &[[String; 2]], update_id: u64) {
        let mut books = self.orderbooks.write().await;
        let book = books.entry(symbol.to_string())
            .or_insert_with(|| OrderBook::new(symbol.to_string()));
        
        book.update(bids, asks, update_id);
        self.stats.orderbook_updates.fetch_add(1, Ordering::Relaxed);
        
        // Check for trading opportunities
        if let Some(spread_bps) = book.spread_bps() {
            if spread_bps > SPREAD_THRESHOLD_BPS {
                self.stats.trading_opportunities.fetch_add(1, Ordering::Relaxed);
                
                // Paper trade: market making strategy
                if spread_bps > MIN_EDGE_BPS * 2.0 {
                    self.execute_paper_trade(symbol, book).await;
                }
            }
        }
    }
    
    async fn execute_paper_trade(&self, symbol: &str, book: &OrderBook) {
        if let (Some(bid), Some(ask), Some(mid)) = (book.best_bid(), book.best_ask(), book.midpoint()) {
            let spread_bps = (ask.price - bid.price) / mid * 10000.0;
            
            // Simple market making: place orders inside the spread
            let buy_price = bid.price + PRICE_TICK;
            let sell_price = ask.price - PRICE_TICK;
            
            if sell_price > buy_price && spread_bps > MIN_EDGE_BPS * 2.0 {
                // Use Kelly Criterion for position sizing
                let capital = 10000.0; // Base capital
                let kelly_size = self.calculate_kelly_position_size(capital).await;
                let qty = (kelly_size / mid).min(bid.quantity.min(ask.quantity) * 0.1);
                
                // Simulate buy order
                let buy_trade = Trade {
                    symbol: symbol.to_string(),
                    side: "BUY".to_string(),
                    price: buy_price,
                    quantity: qty,
                    timestamp: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_else(|_| std::time::Duration::from_secs(0))
                        .as_millis() as u64,
                    reason: format!("Market making - spread: {:.2} bps", spread_bps),
                };
                
                // Simulate sell order
                let sell_trade = Trade {
                    symbol: symbol.to_string(),
                    side: "SELL".to_string(),
                    price: sell_price,
                    quantity: qty,
                    timestamp: buy_trade.timestamp + 1,
                    reason: format!("Market making - spread: {:.2} bps", spread_bps),
                };
                
                let mut trades = self.trades.lock().await;
                trades.push(buy_trade.clone());
                trades.push(sell_trade.clone());
                
                // Update PnL (paper trading)
                let profit = (sell_price - buy_price) * qty;
                let mut pnl = self.pnl.write().await;
                *pnl += profit;
                
                // Update Kelly tracking
                self.total_trades.fetch_add(1, Ordering::Relaxed);
                if profit > 0.0 {
                    self.winning_trades.fetch_add(1, Ordering::Relaxed);
                    let mut avg_win = self.avg_win.write().await;
                    let wins = self.winning_trades.load(Ordering::Relaxed) as f64;
                    *avg_win = (*avg_win * (wins - 1.0) + profit) / wins;
                } else if profit < 0.0 {
                    let mut avg_loss = self.avg_loss.write().await;
                    let losses = (self.total_trades.load(Ordering::Relaxed) - self.winning_trades.load(Ordering::Relaxed)) as f64;
                    *avg_loss = (*avg_loss * (losses - 1.0) + profit.abs()) / losses.max(1.0);
                }
                
                // Update win rate
                let mut win_rate = self.win_rate.write().await;
                *win_rate = self.winning_trades.load(Ordering::Relaxed) as f64 / self.total_trades.load(Ordering::Relaxed).max(1) as f64;
                
                self.stats.trades_executed.fetch_add(2, Ordering::Relaxed);
                
                info!("ðŸ“ˆ TRADE: {} - Buy @ {:.2}, Sell @ {:.2}, Qty: {:.4}, Profit: ${:.2} | Kelly Size: ${:.2}", 
                      symbol, buy_price, sell_price, qty, profit, kelly_size);
            }
        }
    }
    
    async fn display_status(&self) {
        let books = self.orderbooks.read().await;
        let trades = self.trades.lock().await;
        let pnl = self.pnl.read().await;
        
        info!("\nâ•”â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•—");
        info!("â•‘         SHRIVENQUANT PRODUCTION TRADING SYSTEM               â•‘");
        info!("â•šâ•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•â•");
        
        info!("\nðŸ“Š ORDERBOOKS:");
        for (symbol, book) in books.iter() {
            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                let spread_bps = book.spread_bps().unwrap_or(0.0);
                info!("  {} - Bid: ${:.2} x {:.4}, Ask: ${:.2} x {:.4}, Spread: {:.2} bps",
                         symbol, bid.price, bid.quantity, ask.price, ask.quantity, spread_bps);
            }
        }
        
        info!("\nðŸ’¹ STATISTICS:");
        info!("  Messages:      {}", self.stats.messages_received.load(Ordering::Relaxed));
        info!("  OB Updates:    {}", self.stats.orderbook_updates.load(Ordering::Relaxed));
        info!("  Opportunities: {}", self.stats.trading_opportunities.load(Ordering::Relaxed));
        info!("  Trades:        {}", self.stats.trades_executed.load(Ordering::Relaxed));
        info!("  Errors:        {}", self.stats.errors.load(Ordering::Relaxed));
        
        let win_rate = *self.win_rate.read().await;
        let avg_win = *self.avg_win.read().await;
        let avg_loss = *self.avg_loss.read().await;
        let kelly_fraction = if avg_loss > 0.0 { ((avg_win/avg_loss) * win_rate - (1.0 - win_rate)) / (avg_win/avg_loss) } else { 0.02 };
        
        info!("\nðŸ’° PAPER TRADING:");
        info!("  Total Trades: {}", trades.len());
        info!("  PnL: ${:.2}", pnl);
        info!("  Win Rate: {:.1}%", win_rate * 100.0);
        info!("  Avg Win: ${:.2} | Avg Loss: ${:.2}", avg_win, avg_loss);
        info!("  Kelly Fraction: {:.1}%", kelly_fraction.max(0.0).min(0.25) * 100.0);
        
        if trades.len() > 0 {
            info!("\nðŸ“œ RECENT TRADES:");
            for trade in trades.iter().rev().take(5) {
                info!("  {} {} {:.4} @ ${:.2} - {}",
                         trade.side, trade.symbol, trade.quantity, trade.price, trade.reason);
            }
        }
    }
}

async fn run_websocket_client(engine: Arc<TradingEngine>) -> Result<()> {
    let symbols = vec!["btcusdt", "ethusdt"];
    let mut streams = Vec::new();
    
    for symbol in &symbols {
        streams.push(format!("{}@depth@100ms", symbol));
        streams.push(format!("{}@trade", symbol));
    }
    
    let stream_path = streams.join("/");
    let ws_url = format!("{}/stream?streams={}", BINANCE_WS_URL, stream_path);
    
    info!("Connecting to: {}", ws_url);
    
    loop {
        match connect_async(&ws_url).await {
            Ok((ws_stream, _)) => {
                info!("âœ… Connected to Binance WebSocket");
                engine.stats.connected.store(true, Ordering::Relaxed);
                
                let (mut write, mut read) = ws_stream.split();
                let mut ping_interval = interval(Duration::from_secs(30));
                
                loop {
                    tokio::select! {
                        Some(msg) = read.next() => {
                            match msg {
                                Ok(Message::Text(text)) => {
                                    engine.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                                    
                                    if let Ok(json) = serde_json::from_str::<Value>(&text) {
                                        if let Some(stream) = json["stream"].as_str() {
                                            let data = &json["data"];
                                            
                                            if stream.contains("@depth") {
                                                let symbol = stream.split('@').next().unwrap_or("unknown");
                                                let update_id = data["u"].as_u64().unwrap_or(0);
                                                
                                                let bids: Vec<[String; 2]> = data["b"].as_array()
                                                    .map(|arr| arr.iter()
                                                        .filter_map(|v| {
                                                            let price = v[0].as_str()?.to_string();
                                                            let qty = v[1].as_str()?.to_string();
                                                            Some([price, qty])
                                                        })
                                                        .collect())
                                                    .unwrap_or_default();
                                                
                                                let asks: Vec<[String; 2]> = data["a"].as_array()
                                                    .map(|arr| arr.iter()
                                                        .filter_map(|v| {
                                                            let price = v[0].as_str()?.to_string();
                                                            let qty = v[1].as_str()?.to_string();
                                                            Some([price, qty])
                                                        })
                                                        .collect())
                                                    .unwrap_or_default();
                                                
                                                engine.process_orderbook_update(
                                                    &symbol.to_uppercase(),
                                                    &bids,
                                                    &asks,
                                                    update_id
                                                ).await;
                                            }
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => {
                                    warn!("WebSocket closed by server");
                                    break;
                                }
                                Err(e) => {
                                    error!("WebSocket error: {}", e);
                                    engine.stats.errors.fetch_add(1, Ordering::Relaxed);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        _ = ping_interval.tick() => {
                            if write.send(Message::Ping(vec![])).await.is_err() {
                                warn!("Failed to send ping");
                                break;
                            }
                        }
                    }
                }
                
                engine.stats.connected.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                engine.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        
        // Reconnect after 5 seconds
        tokio::time::sleep(Duration::from_secs(5)).await;
        info!("Reconnecting...");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();
    
    info!("ðŸš€ ShrivenQuant Production Trading System");
    info!("{}", "=".repeat(60));
    
    let engine = Arc::new(TradingEngine::new());
    
    // Start WebSocket client
    let engine_clone = engine.clone();
    tokio::spawn(async move {
        if let Err(e) = run_websocket_client(engine_clone).await {
            error!("WebSocket client error: {}", e);
        }
    });
    
    // Display loop
    let engine_clone = engine.clone();
    tokio::spawn(async move {
        let mut display_interval = interval(Duration::from_secs(5));
        loop {
            display_interval.tick().await;
            engine_clone.display_status().await;
        }
    });
    
    // Keep running until Ctrl+C
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    
    // Save trades to file
    let trades = engine.trades.lock().await;
    if !trades.is_empty() {
        let json = serde_json::to_string_pretty(&*trades)?;
        tokio::fs::write("paper_trades.json", json).await?;
        info!("Saved {} trades to paper_trades.json", trades.len());
    }
    
    Ok(())
}