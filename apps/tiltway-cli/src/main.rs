use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use tiltway_client::{ClientSession, ReplayPlayer};
use tiltway_common::ItemKind;
use tiltway_level::{BallSpec, GoalSpec, ItemSpec, LevelTemplate, TemplateBuilder};
use tiltway_proto::replay::{ReplayHeader, ReplayReader, ReplayWriter};
use tiltway_proto::CommandQueue;
use tiltway_sim::{ServerSession, SessionConfig};

#[derive(Parser)]
#[command(name = "tiltway-cli", about = "CLI tool for tiltway replays")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a replay file's header
    Inspect {
        /// Replay file to read
        file: PathBuf,
        /// Emit the header as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode and print a replay's command stream
    Dump {
        /// Replay file to read
        file: PathBuf,
        /// Stop after this many commands
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Record a demo session, replay it, and verify the reconstruction
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "450")]
        ticks: u32,
        /// Write the recording to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Inspect { file, json } => inspect(&file, json),
        Commands::Dump { file, limit } => dump(&file, limit),
        Commands::Simulate { ticks, output } => simulate(ticks, output.as_deref()),
    }
}

fn inspect(path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ReplayReader::open(file).with_context(|| format!("reading {}", path.display()))?;
    let h = reader.header();

    if json {
        println!("{}", serde_json::to_string_pretty(h)?);
        return Ok(());
    }

    println!("player:  {}", h.player);
    println!("date:    {}", h.date);
    println!("level:   {}", h.file);
    println!("mode:    {}", h.mode);
    println!("outcome: {:?}", h.outcome);
    println!("time:    {}.{:02}s", h.time_cs / 100, h.time_cs % 100);
    println!("coins:   {}", h.coins);
    if h.level_time > 0 {
        println!("limit:   {}.{:02}s", h.level_time / 100, h.level_time % 100);
    }
    if h.level_goal > 0 {
        println!("goal:    {} coins", h.level_goal);
    }
    Ok(())
}

fn dump(path: &std::path::Path, limit: Option<usize>) -> anyhow::Result<()> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader =
        ReplayReader::open(file).with_context(|| format!("reading {}", path.display()))?;

    let mut n = 0usize;
    let mut ticks = 0usize;
    while let Some(cmd) = reader.next_cmd()? {
        if limit.is_some_and(|l| n >= l) {
            println!("... (stopped at {n} commands)");
            return Ok(());
        }
        if cmd == tiltway_proto::Command::EndOfTick {
            ticks += 1;
        }
        println!("{n:6} {cmd:?}");
        n += 1;
    }
    println!("{n} commands, {ticks} ticks");
    Ok(())
}

/// A small built-in level: a flat floor, a patrolling platform, a few
/// coins, and a goal.
fn demo_template() -> anyhow::Result<LevelTemplate> {
    TemplateBuilder::new("demo/patrol")
        .meta("version", "1.0")
        .meta("author", "tiltway")
        .plane(Vec3::Y, 0.0)
        .path(tiltway_level::PathSpec {
            p: Vec3::new(2.0, 0.5, 2.0),
            travel_time: 2.0,
            next: 1,
            ..Default::default()
        })
        .path(tiltway_level::PathSpec {
            p: Vec3::new(-2.0, 0.5, 2.0),
            travel_time: 2.0,
            next: 0,
            ..Default::default()
        })
        .body(tiltway_level::BodySpec {
            path: Some(0),
            rot_path: None,
        })
        .item(ItemSpec {
            p: Vec3::new(1.5, 0.25, 0.0),
            kind: ItemKind::Coin,
            value: 1,
            body: None,
        })
        .item(ItemSpec {
            p: Vec3::new(3.0, 0.25, 0.0),
            kind: ItemKind::Coin,
            value: 5,
            body: Some(0),
        })
        .goal(GoalSpec {
            p: Vec3::new(6.0, 0.0, 0.0),
            r: 1.0,
            body: None,
        })
        .ball(BallSpec {
            p: Vec3::new(0.0, 0.25, 0.0),
            r: 0.25,
        })
        .finish()
        .context("building demo level")
}

fn simulate(ticks: u32, output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let template = std::sync::Arc::new(demo_template()?);
    println!("Demo session: level={}, ticks={ticks}", template.name());

    let header = ReplayHeader {
        player: "demo".to_owned(),
        file: template.name().to_owned(),
        ..Default::default()
    };
    let mut writer = ReplayWriter::create(Cursor::new(Vec::new()), &header)?;

    let mut queue = CommandQueue::new();
    let mut server = ServerSession::new(template.clone(), SessionConfig::default(), &mut queue);
    let mut live = ClientSession::new(template.clone());
    live.sync_recorded(&mut queue, &mut writer)?;

    for i in 0..ticks {
        // A gentle figure of tilt that rolls the ball around the floor.
        let t = i as f32 / tiltway_common::consts::UPS as f32;
        server.set_input(8.0 * (t * 0.7).sin(), 8.0 * (t * 0.9).cos());
        server.tick(&mut queue);
        live.sync_recorded(&mut queue, &mut writer)?;
    }
    writer.set_result(server.outcome(), server.coins(), (server.timer() * 100.0) as i32)?;
    let buf = writer.into_inner().into_inner();
    println!(
        "Recorded: {} bytes, timer={:.2}s, coins={}, outcome={:?}",
        buf.len(),
        server.timer(),
        server.coins(),
        server.outcome()
    );

    if let Some(path) = output {
        fs::write(path, &buf).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    live.apply_lerp(1.0);

    let mut player = ReplayPlayer::open(Cursor::new(buf))?;
    let mut replayed = ClientSession::new(template);
    while player.run_tick(&mut replayed)? {}
    replayed.apply_lerp(1.0);

    let live_ball = live.world().balls[0];
    let replayed_ball = replayed.world().balls[0];
    println!(
        "Live:   p={:?}, timer={:.2}s, coins={}",
        live_ball.p,
        live.timer(),
        live.coins()
    );
    println!(
        "Replay: p={:?}, timer={:.2}s, coins={}",
        replayed_ball.p,
        replayed.timer(),
        replayed.coins()
    );
    println!(
        "Match: {}",
        if live_ball.p == replayed_ball.p
            && live.timer() == replayed.timer()
            && live.coins() == replayed.coins()
            && live.status() == replayed.status()
        {
            "OK"
        } else {
            "MISMATCH"
        }
    );
    Ok(())
}
