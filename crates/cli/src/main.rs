use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use binopt_core::domain::Direction;
use binopt_core::reconcile::NotificationGate;
use binopt_core::traits::{BalanceStore, ControlStore, PriceSource, TradeStore};
use binopt_core::ConfigLoader;
use binopt_data::{
    DatabaseClient, MemoryBalanceStore, MemoryControlStore, MemoryTradeStore, PgBalanceStore,
    PgControlStore, PgTradeStore,
};
use binopt_engine::{scheduler, TradeEngine};
use binopt_feed::SimulatedFeed;
use binopt_web_api::{ApiContext, ApiServer};

#[derive(Parser)]
#[command(name = "binopt")]
#[command(about = "Binary options trading platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading server with web API and price feed
    Server {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run an in-memory trade simulation and print the results
    Simulate {
        /// Number of trades to place
        #[arg(short, long, default_value_t = 10)]
        trades: u32,
        /// Starting balance per symbol
        #[arg(short, long, default_value_t = 10_000)]
        deposit: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Server { config } => {
            run_server(&config).await?;
        }
        Commands::Simulate { trades, deposit } => {
            run_simulate(trades, deposit).await?;
        }
    }

    Ok(())
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    tracing::info!("Starting trading server with config: {}", config_path);

    let config = ConfigLoader::load_from(config_path)?;

    let database = DatabaseClient::new(&config.database.url, config.database.max_connections).await?;
    database.migrate().await?;
    let pool = database.pool();

    let trades: Arc<dyn TradeStore> = Arc::new(PgTradeStore::new(pool.clone()));
    let balances: Arc<dyn BalanceStore> = Arc::new(PgBalanceStore::new(pool.clone()));
    let controls: Arc<dyn ControlStore> = Arc::new(PgControlStore::new(pool));

    let feed = Arc::new(SimulatedFeed::new(&config.feed));
    let feed_task = {
        let feed = feed.clone();
        tokio::spawn(async move { feed.run().await })
    };

    let engine = Arc::new(TradeEngine::new(
        trades,
        balances,
        controls,
        feed.clone() as Arc<dyn PriceSource>,
    ));

    let recovered = scheduler::recover(&engine).await?;
    tracing::info!(recovered, "Startup recovery complete");

    let sweep_task = tokio::spawn(scheduler::run_sweep(
        engine.clone(),
        config.engine.sweep_interval_secs,
    ));

    let ctx = Arc::new(ApiContext::new(
        engine,
        feed.clone() as Arc<dyn PriceSource>,
        feed.sender(),
        config.auth.clone(),
    ));
    let server = ApiServer::new(ctx);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.serve(&addr).await {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down");

    server_task.abort();
    sweep_task.abort();
    feed_task.abort();

    tracing::info!("Trading server stopped");
    Ok(())
}

async fn run_simulate(trade_count: u32, deposit: u64) -> anyhow::Result<()> {
    use tokio::time::{sleep, Duration};

    tracing::info!(trade_count, deposit, "Running in-memory simulation");

    let config = binopt_core::config::AppConfig::default();
    let symbols = config.feed.symbols.clone();

    let trades: Arc<dyn TradeStore> = Arc::new(MemoryTradeStore::new());
    let balances: Arc<dyn BalanceStore> = Arc::new(MemoryBalanceStore::new());
    let controls: Arc<dyn ControlStore> = Arc::new(MemoryControlStore::new());

    let feed = Arc::new(SimulatedFeed::new(&config.feed));
    let feed_task = {
        let feed = feed.clone();
        tokio::spawn(async move { feed.run().await })
    };

    let engine = Arc::new(TradeEngine::new(
        trades,
        balances,
        controls,
        feed.clone() as Arc<dyn PriceSource>,
    ));
    let mut events = engine.subscribe();

    let user_id = Uuid::new_v4();
    let stake = dec!(50);
    for symbol in &symbols {
        engine
            .deposit(user_id, symbol, Decimal::from(deposit))
            .await?;
    }

    // Wait for the first tick so every symbol has a quote.
    sleep(Duration::from_millis(config.feed.tick_interval_ms + 100)).await;

    let mut placed = Vec::with_capacity(trade_count as usize);
    for i in 0..trade_count {
        let symbol = &symbols[i as usize % symbols.len()];
        let direction = if i % 2 == 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        let trade = engine.place(user_id, symbol, direction, stake, 30).await?;
        placed.push(trade);
    }

    // Let prices drift before forcing settlement.
    sleep(Duration::from_millis(3 * config.feed.tick_interval_ms)).await;

    println!("\n{}", "=".repeat(78));
    println!("Simulation Results - {trade_count} trades at {stake} each");
    println!("{}", "=".repeat(78));
    println!(
        "{:<10} {:<5} {:>12} {:>12} {:>10} {:>6}",
        "Symbol", "Dir", "Entry", "Exit", "Profit", "Won"
    );
    println!("{}", "-".repeat(78));

    for trade in &placed {
        engine.settle(trade.id).await?;
    }

    // Deliveries funnel through the gate, so a replayed broadcast event
    // cannot double-count a trade.
    let mut gate = NotificationGate::new(placed.len().max(1));
    let mut total_profit = Decimal::ZERO;
    let mut wins = 0;
    for _ in 0..placed.len() {
        let event = events.recv().await?;
        let Some(delivery) = gate.offer(event, true) else {
            continue;
        };
        let event = delivery.event;
        if event.won {
            wins += 1;
        }
        total_profit += event.profit;
        println!(
            "{:<10} {:<5} {:>12} {:>12} {:>10} {:>6}",
            event.symbol,
            event.direction.to_string(),
            event.entry_price,
            event.exit_price,
            event.profit,
            if event.won { "✓" } else { "✗" }
        );
    }

    println!("{}", "=".repeat(78));
    println!("Won: {wins}/{} trades", placed.len());
    println!("Net profit: {total_profit}");
    for symbol in &symbols {
        let balance = engine.balance(user_id, symbol).await?;
        println!("{symbol} balance: {} available", balance.available);
    }
    println!();

    feed_task.abort();
    Ok(())
}
