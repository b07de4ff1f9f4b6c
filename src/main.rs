use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dqtrader::config::AppConfig;
use dqtrader::core::NUM_ACTIONS;
use dqtrader::env::{generate_series, SeriesConfig, TradingEnv};
use dqtrader::error::Result;
use dqtrader::training::{
    evaluate, summarize_results, Checkpointer, JsonStatusSink, LogStatusSink, StatusSink, Trainer,
};
use dqtrader::{DdqnAgent, LinearQNet};

#[derive(Parser)]
#[command(name = "dqtrader", about = "Double DQN trading bot", version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the agent on a synthetic price series
    Train {
        /// Number of episodes to run
        #[arg(long, default_value_t = 50)]
        episodes: usize,
        /// Checkpoint name to resume from
        #[arg(long)]
        resume: Option<String>,
        /// Override the checkpoint directory
        #[arg(long)]
        checkpoint_dir: Option<String>,
    },
    /// Evaluate a trained agent greedily (no exploration, no learning)
    Eval {
        /// Checkpoint name to load (defaults to the latest)
        #[arg(long)]
        checkpoint: Option<String>,
        /// Number of evaluation episodes
        #[arg(long, default_value_t = 5)]
        episodes: usize,
    },
    /// Generate a synthetic price series and write it to a JSON file
    GenData {
        /// Output file path
        #[arg(long, default_value = "series.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            episodes,
            resume,
            checkpoint_dir,
        } => run_train(config, episodes, resume, checkpoint_dir),
        Commands::Eval {
            checkpoint,
            episodes,
        } => run_eval(config, checkpoint, episodes),
        Commands::GenData { output } => run_gen_data(config, &output),
    }
}

fn run_gen_data(config: AppConfig, output: &std::path::Path) -> Result<()> {
    let data = generate_series(&series_config(&config), config.data.series_len)?;

    let json = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "len": data.len(),
        "closes": data.closes(),
    });
    std::fs::write(output, serde_json::to_string_pretty(&json)?)?;

    info!(
        "wrote {} steps to {}",
        data.len(),
        output.display()
    );
    Ok(())
}

fn series_config(config: &AppConfig) -> SeriesConfig {
    SeriesConfig {
        initial_price: config.data.initial_price,
        volatility: config.data.volatility,
        mean_price: config.data.initial_price,
        ..Default::default()
    }
}

fn build_env(config: &AppConfig) -> Result<TradingEnv> {
    let data = generate_series(&series_config(config), config.data.series_len)?;
    TradingEnv::new(data, config.trading.clone(), config.data.lookback)
}

fn build_agent(config: &AppConfig, env: &TradingEnv) -> Result<DdqnAgent> {
    let net = LinearQNet::new(
        env.observation_dim(),
        NUM_ACTIONS,
        config.agent.learning_rate,
    );
    DdqnAgent::new(config.agent.clone(), Box::new(net))
}

fn run_train(
    config: AppConfig,
    episodes: usize,
    resume: Option<String>,
    checkpoint_dir: Option<String>,
) -> Result<()> {
    let mut env = build_env(&config)?;
    let mut agent = build_agent(&config, &env)?;

    let dir = checkpoint_dir.unwrap_or_else(|| config.run.checkpoint_dir.clone());
    let checkpointer = Checkpointer::new(&dir, config.run.max_checkpoints);

    if let Some(name) = resume.as_deref() {
        // A failed load is recoverable: keep the fresh in-memory parameters.
        if let Err(e) = checkpointer.load(&mut agent, name) {
            warn!("failed to resume from '{}': {} (starting fresh)", name, e);
        } else {
            info!("resumed from checkpoint '{}'", name);
        }
    }

    println!("=== dqtrader training ===");
    println!("episodes:        {}", episodes);
    println!("series length:   {}", config.data.series_len);
    println!("observation dim: {}", env.observation_dim());
    println!("batch size:      {}", config.agent.batch_size);
    println!("checkpoints:     {}", dir);

    let sink: Box<dyn StatusSink> = match config.run.status_file.as_deref() {
        Some(path) => Box::new(JsonStatusSink::new(path)),
        None => Box::new(LogStatusSink),
    };

    let mut trainer = Trainer::new().with_sink(sink).with_checkpointer(
        checkpointer.clone(),
        config.run.checkpoint_frequency as u64,
    );

    let results = trainer.run(&mut env, &mut agent, episodes);

    // Final checkpoint so eval picks up the end state.
    if let Err(e) = checkpointer.save(&agent, "latest") {
        warn!("final checkpoint save failed: {}", e);
    }

    let summary = summarize_results(&results);
    println!("=== training summary ===");
    println!("episodes:     {}", summary.num_episodes);
    println!("avg reward:   {:.4}", summary.avg_reward);
    println!("avg pnl:      {:.4}", summary.avg_pnl);
    println!("avg trades:   {:.2}", summary.avg_trades);
    println!("win rate:     {:.1}%", summary.episode_win_rate * 100.0);
    println!("profit factor: {:.3}", summary.profit_factor);
    println!("final epsilon: {:.4}", agent.epsilon());

    Ok(())
}

fn run_eval(config: AppConfig, checkpoint: Option<String>, episodes: usize) -> Result<()> {
    let mut env = build_env(&config)?;
    let mut agent = build_agent(&config, &env)?;

    let checkpointer = Checkpointer::new(&config.run.checkpoint_dir, config.run.max_checkpoints);
    let name = checkpoint.or_else(|| checkpointer.latest_checkpoint());

    match name.as_deref() {
        Some(name) => {
            if let Err(e) = checkpointer.load(&mut agent, name) {
                warn!("failed to load '{}': {} (evaluating untrained agent)", name, e);
            }
        }
        None => warn!("no checkpoint found, evaluating untrained agent"),
    }

    let results = evaluate(&mut env, &mut agent, episodes);

    println!("=== evaluation ===");
    for r in &results {
        println!(
            "episode {}: reward={:.4} pnl={:.4} trades={} portfolio={:.2}",
            r.episode, r.total_reward, r.realized_pnl, r.trade_count, r.portfolio_value
        );
    }
    let summary = summarize_results(&results);
    println!(
        "avg pnl={:.4} win rate={:.1}%",
        summary.avg_pnl,
        summary.episode_win_rate * 100.0
    );

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dqtrader=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
