use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam::channel;
use okey::config::Config;
use okey::script::{ScriptError, parse_line};
use okey::{
    DecisionPolicy, Hand, JokerContext, Observation, OkeyError, Phase, StrategyPolicy, Tile,
    deal_hand,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Okey hand evaluation and turn decisions")]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `okey::evaluator=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the best meld partition of a hand
    Eval {
        /// Tiles such as R1 R2 R3 K5 *
        #[arg(required = true)]
        tiles: Vec<String>,

        #[command(flatten)]
        joker: JokerArgs,

        /// Fail instead of reporting a search that ran out of budget
        #[arg(long)]
        strict: bool,
    },
    /// Decide the next action for one hand
    Decide {
        /// Hand as a comma or space separated list
        #[arg(long)]
        hand: String,

        /// Tile on top of the discard pile
        #[arg(long)]
        discard: Option<String>,

        #[command(flatten)]
        joker: JokerArgs,
    },
    /// Feed an observation script through the round state machine
    Replay {
        script: PathBuf,

        /// Settle finished rounds immediately instead of waiting
        #[arg(long)]
        no_wait: bool,
    },
    /// Evaluate random deals in parallel
    Bench {
        #[arg(short = 'n', long, default_value_t = 1000)]
        hands: usize,

        /// Random seed for reproducible runs (random if omitted, always printed)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Tiles per hand; 15 also times a full discard decision
        #[arg(long, default_value_t = 14)]
        size: usize,
    },
}

#[derive(Args, Debug)]
struct JokerArgs {
    /// The round's okey tile
    #[arg(long, conflicts_with = "indicator")]
    okey: Option<String>,

    /// The face-up indicator tile; the okey is the next rank
    #[arg(long)]
    indicator: Option<String>,
}

impl JokerArgs {
    fn context(&self) -> Result<JokerContext> {
        let ctx = match (&self.okey, &self.indicator) {
            (Some(okey), _) => JokerContext::new(Tile::from_string(okey)?)?,
            (None, Some(indicator)) => JokerContext::from_indicator(Tile::from_string(indicator)?)?,
            (None, None) => JokerContext::none(),
        };
        Ok(ctx)
    }
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn run_eval(config: &Config, tiles: &[String], joker: &JokerArgs, strict: bool) -> Result<()> {
    let hand = Hand::from_string(&tiles.join(" "))?;
    let ctx = joker.context()?;
    let evaluator = config.build_evaluator();

    let started = Instant::now();
    let evaluation = if strict {
        evaluator.try_evaluate(&hand, &ctx)?
    } else {
        evaluator.evaluate(&hand, &ctx)
    };
    let elapsed = started.elapsed();

    println!("hand: {hand}");
    if let Some(okey) = ctx.okey() {
        println!("okey: {okey}");
    }
    println!("{evaluation}");
    println!("searched {} nodes in {:.2?}", evaluation.nodes, elapsed);

    if evaluation.is_win(evaluator.rules()) {
        println!("winning hand");
    } else if hand.size() == 15 {
        if let Some(tile) = evaluator.winning_discard(&hand, &ctx) {
            println!("wins by discarding {tile}");
        }
    }
    Ok(())
}

fn run_decide(config: &Config, hand: &str, discard: Option<&str>, joker: &JokerArgs) -> Result<()> {
    let hand = Hand::from_string(hand)?;
    let discard = discard.map(Tile::from_string).transpose()?;
    let ctx = joker.context()?;
    let policy = config.build_policy();

    let overfull = hand.overfull_tiles();
    if !overfull.is_empty() {
        warn!(tiles = ?overfull, "hand holds more copies than the set contains");
    }

    let action = policy.decide(&hand, discard, &ctx)?;
    println!("hand: {hand}");
    println!("action: {action}");

    if let (Some(discard), 13 | 14) = (discard, hand.size()) {
        let assessment = policy.assess_take_discard(&hand, discard, &ctx)?;
        println!(
            "taking {discard}: deadwood {} -> {} (then discard {})",
            assessment.current_deadwood, assessment.deadwood_after, assessment.discard_after
        );
    }
    if hand.size() == 15 {
        let choice = policy.choose_discard(&hand, &ctx)?;
        println!("after discarding {}:", choice.tile);
        println!("{}", choice.evaluation);
    }
    Ok(())
}

enum Feed {
    Observation(usize, Observation),
    Malformed(ScriptError),
}

fn run_replay(config: &Config, script: &Path, no_wait: bool) -> Result<()> {
    let file = std::fs::File::open(script)
        .with_context(|| format!("opening {}", script.display()))?;
    let (tx, rx) = channel::bounded::<Feed>(64);

    let reader = thread::spawn(move || -> std::io::Result<()> {
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let feed = match parse_line(idx + 1, &line) {
                Ok(Some(obs)) => Feed::Observation(idx + 1, obs),
                Ok(None) => continue,
                Err(err) => Feed::Malformed(err),
            };
            if tx.send(feed).is_err() {
                break;
            }
        }
        Ok(())
    });

    let mut machine = config.build_machine(config.build_policy());
    let settle_delay = config.machine.settle_delay();
    let mut actions = 0usize;
    let mut skipped = 0usize;

    for feed in rx {
        let (line, obs) = match feed {
            Feed::Observation(line, obs) => (line, obs),
            Feed::Malformed(err) => {
                warn!(%err, "ignoring malformed script line");
                skipped += 1;
                continue;
            }
        };

        match machine.step(&obs) {
            Ok(Some(action)) => {
                actions += 1;
                println!("line {line:>4}  {:<14} {action}", machine.phase().to_string());
            }
            Ok(None) => {}
            Err(err @ OkeyError::RoundStalled { .. }) => {
                println!("line {line:>4}  {:<14} {err}", machine.phase().to_string());
                skipped += 1;
            }
            Err(err) => {
                info!(line, %err, "observation skipped");
                skipped += 1;
            }
        }

        if machine.phase() == Phase::Finished {
            if !no_wait {
                channel::after(settle_delay).recv()?;
            }
            machine.settle();
            println!("line {line:>4}  round over, back to {}", machine.phase());
        }
    }

    match reader.join() {
        Ok(result) => result.context("reading script")?,
        Err(_) => bail!("script reader thread panicked"),
    }

    println!(
        "{} actions over {} decisions, {} observations skipped",
        actions,
        machine.decisions(),
        skipped
    );
    Ok(())
}

fn run_bench(
    config: &Config,
    hands: usize,
    seed: Option<u64>,
    threads: Option<usize>,
    size: usize,
) -> Result<()> {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    println!("seed {seed}, {hands} hands of {size}, {threads} threads");

    let mut rng = StdRng::seed_from_u64(seed);
    let deals: Vec<(Hand, JokerContext)> = (0..hands)
        .map(|_| {
            let hand = deal_hand(&mut rng, size);
            let indicator = Tile::from_slot(rng.random_range(0..okey::PLAIN_SLOTS));
            let ctx = JokerContext::from_indicator(indicator).unwrap_or_default();
            (hand, ctx)
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building thread pool")?;
    let policy: StrategyPolicy = config.build_policy();

    let started = Instant::now();
    let results: Vec<(usize, bool, bool, u64)> = pool.install(|| {
        deals
            .par_iter()
            .map(|(hand, ctx)| {
                let evaluation = policy.evaluator().evaluate(hand, ctx);
                let win = evaluation.is_win(policy.evaluator().rules());
                (evaluation.deadwood_count(), evaluation.complete, win, evaluation.nodes)
            })
            .collect()
    });
    let elapsed = started.elapsed();

    let incomplete = results.iter().filter(|r| !r.1).count();
    let wins = results.iter().filter(|r| r.2).count();
    let deadwood: usize = results.iter().map(|r| r.0).sum();
    let nodes: u64 = results.iter().map(|r| r.3).sum();
    let per_hand = elapsed / hands.max(1) as u32;

    println!("evaluated in {elapsed:.2?} ({per_hand:.2?} per hand)");
    println!(
        "mean deadwood {:.2}, {} winning hands, {} searches cut short, {} nodes",
        deadwood as f64 / hands.max(1) as f64,
        wins,
        incomplete,
        nodes
    );

    if size == 15 {
        let started = Instant::now();
        let decided = pool.install(|| {
            deals
                .par_iter()
                .map(|(hand, ctx)| policy.decide(hand, None, ctx))
                .filter(|action| action.is_ok())
                .count()
        });
        println!("{decided} discard decisions in {:.2?}", started.elapsed());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;
    let config = load_config(cli.config.as_ref())?;

    match &cli.command {
        Command::Eval {
            tiles,
            joker,
            strict,
        } => run_eval(&config, tiles, joker, *strict),
        Command::Decide {
            hand,
            discard,
            joker,
        } => run_decide(&config, hand, discard.as_deref(), joker),
        Command::Replay { script, no_wait } => run_replay(&config, script, *no_wait),
        Command::Bench {
            hands,
            seed,
            threads,
            size,
        } => run_bench(&config, *hands, *seed, *threads, *size),
    }
}
