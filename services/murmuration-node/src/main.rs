use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use murmuration_core::config::SwarmConfig;
use murmuration_core::logging;
use murmuration_mission::{
    ActuationBackend, FormationSpec, MissionOrchestrator, SimBackendConfig, SimulatedAgentBackend,
};
use murmuration_swarm::{BoxSurface, RingSurface, Sphere, SurfaceFunction, Torus};

struct NodeOptions {
    config_path: Option<PathBuf>,
    shape: String,
    agents: usize,
    hold_secs: u64,
    seed: u64,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            shape: "sphere".to_string(),
            agents: 4,
            hold_secs: 20,
            seed: 42,
        }
    }
}

fn parse_options(args: &[String]) -> anyhow::Result<NodeOptions> {
    let mut opts = NodeOptions::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config was provided without a path")?;
                opts.config_path = Some(PathBuf::from(path));
            }
            "--shape" => {
                opts.shape = iter
                    .next()
                    .context("--shape was provided without a name")?
                    .clone();
            }
            "--agents" => {
                opts.agents = iter
                    .next()
                    .context("--agents was provided without a count")?
                    .parse()
                    .context("--agents expects an integer")?;
            }
            "--hold-secs" => {
                opts.hold_secs = iter
                    .next()
                    .context("--hold-secs was provided without a value")?
                    .parse()
                    .context("--hold-secs expects an integer")?;
            }
            "--seed" => {
                opts.seed = iter
                    .next()
                    .context("--seed was provided without a value")?
                    .parse()
                    .context("--seed expects an integer")?;
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(opts)
}

fn surface_for(shape: &str) -> anyhow::Result<Box<dyn SurfaceFunction>> {
    Ok(match shape {
        "sphere" => Box::new(Sphere { radius: 0.5 }),
        "cube" => Box::new(BoxSurface::cube(0.5)),
        "torus" => Box::new(Torus {
            major_radius: 0.35,
            minor_radius: 0.15,
        }),
        "ring" => Box::new(RingSurface { radius: 0.5 }),
        other => bail!("unknown shape: {other} (expected sphere|cube|torus|ring)"),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let opts = parse_options(&args)?;
    let cfg = match &opts.config_path {
        Some(path) => SwarmConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SwarmConfig::default(),
    };
    let surface = surface_for(&opts.shape)?;

    info!(
        shape = %opts.shape,
        agents = opts.agents,
        seed = opts.seed,
        "starting simulated mission"
    );

    let fleet = SimulatedAgentBackend::fleet(opts.agents, 2.0, SimBackendConfig::default());
    let backends: Vec<Arc<dyn ActuationBackend>> = fleet
        .iter()
        .map(|b| Arc::clone(b) as Arc<dyn ActuationBackend>)
        .collect();
    let mut orchestrator = MissionOrchestrator::new(cfg, backends);

    orchestrator
        .prepare(
            surface.as_ref(),
            FormationSpec {
                label: opts.shape.clone(),
                seed: opts.seed,
            },
        )
        .await?;
    orchestrator.start().await?;

    info!(hold_secs = opts.hold_secs, "formation reached; holding");
    tokio::time::sleep(Duration::from_secs(opts.hold_secs)).await;

    orchestrator.stop().await?;
    let status = orchestrator.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
