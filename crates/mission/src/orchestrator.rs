//! Mission orchestration state machine.
//!
//! Sequences one mission through `IDLE → ARMED → TAKING_OFF → EN_ROUTE →
//! HOLDING → LANDING → IDLE`. Every command phase is a fan-out/fan-in batch
//! through the [`DispatchCoordinator`]; the potential-field control loop
//! runs as a single periodic task only while holding, and a stop request is
//! honored from any state after in-flight batches fully resolve.
//!
//! Failures local to one agent exclude that agent and record a diagnostic;
//! the remaining swarm continues in degraded mode. Errors that invalidate
//! the plan abort `prepare()` before any physical command is issued.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmuration_core::config::SwarmConfig;
use murmuration_core::Vec3;
use murmuration_swarm::assign::AssignmentError;
use murmuration_swarm::{
    assign, Assignment, Formation, FrameTransform, GainProfile, PointDistributor,
    PotentialFieldController, SurfaceFunction,
};

use crate::agent::Agent;
use crate::artifact::{self, MissionArtifact};
use crate::backend::{ActuationBackend, BackendError, CommandHandle};
use crate::dispatch::{BatchReport, DispatchCoordinator};
use crate::error::{Diagnostic, DiagnosticCode, MissionError};

/// Mission lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionPhase {
    /// No mission running
    Idle,
    /// All reachable agents armed
    Armed,
    /// Takeoff batch in flight
    TakingOff,
    /// Move-to-formation batch in flight or awaiting arrival
    EnRoute,
    /// Formation reached; control loop station-keeping
    Holding,
    /// Land batch in flight
    Landing,
}

impl MissionPhase {
    /// Check if a transition to `next` is part of the mission lifecycle.
    pub fn can_transition_to(self, next: MissionPhase) -> bool {
        match (self, next) {
            (MissionPhase::Idle, MissionPhase::Armed) => true,
            (MissionPhase::Armed, MissionPhase::TakingOff) => true,
            (MissionPhase::TakingOff, MissionPhase::EnRoute) => true,
            (MissionPhase::EnRoute, MissionPhase::Holding) => true,
            (MissionPhase::Landing, MissionPhase::Idle) => true,
            // a stop request forces landing from any state
            (_, MissionPhase::Landing) => true,
            _ => false,
        }
    }
}

/// Parameters naming one formation to prepare.
#[derive(Debug, Clone)]
pub struct FormationSpec {
    /// Human-readable shape label, recorded in artifacts and logs
    pub label: String,
    /// Seed for deterministic point generation
    pub seed: u64,
}

/// Snapshot of the mission for callers.
#[derive(Debug, Clone, Serialize)]
pub struct MissionStatus {
    /// Identifier of the prepared/running mission
    pub mission_id: Option<String>,
    /// Current phase
    pub phase: MissionPhase,
    /// Agent names in roster order
    pub agents: Vec<String>,
    /// Which agents are still participating
    pub active: Vec<bool>,
    /// Which agents are inside the arrival threshold
    pub arrived: Vec<bool>,
    /// Recorded degradations
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
struct MissionState {
    mission_id: Option<Uuid>,
    phase: MissionPhase,
    active: Vec<bool>,
    arrived: Vec<bool>,
    diagnostics: Vec<Diagnostic>,
}

struct MissionPlan {
    formation: Formation,
    goals: Vec<Vec3>,
    assignment: Assignment,
    label: String,
}

/// Drives a roster of agents through one mission at a time.
pub struct MissionOrchestrator {
    cfg: SwarmConfig,
    agents: Vec<Agent>,
    backends: Vec<Arc<dyn ActuationBackend>>,
    controller: PotentialFieldController,
    state: Arc<Mutex<MissionState>>,
    plan: Option<MissionPlan>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    holding: Option<JoinHandle<()>>,
}

impl MissionOrchestrator {
    /// Create an orchestrator over one backend per agent.
    pub fn new(cfg: SwarmConfig, backends: Vec<Arc<dyn ActuationBackend>>) -> Self {
        let agents: Vec<Agent> = backends
            .iter()
            .enumerate()
            .map(|(i, b)| Agent::new(b.name(), i))
            .collect();
        let n = agents.len();
        let (stop_tx, stop_rx) = watch::channel(false);

        Self {
            controller: PotentialFieldController::new(cfg.control.clone()),
            cfg,
            agents,
            backends,
            state: Arc::new(Mutex::new(MissionState {
                mission_id: None,
                phase: MissionPhase::Idle,
                active: vec![true; n],
                arrived: vec![false; n],
                diagnostics: Vec::new(),
            })),
            plan: None,
            stop_tx,
            stop_rx,
            holding: None,
        }
    }

    /// Agent roster snapshots.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Per-agent goals of the prepared mission, in roster order.
    pub fn goals(&self) -> Option<&[Vec3]> {
        self.plan.as_ref().map(|p| p.goals.as_slice())
    }

    /// Formation of the prepared mission, retained for diagnostics.
    pub fn formation(&self) -> Option<&Formation> {
        self.plan.as_ref().map(|p| &p.formation)
    }

    /// Assignment of the prepared mission, retained for diagnostics.
    pub fn assignment(&self) -> Option<&Assignment> {
        self.plan.as_ref().map(|p| &p.assignment)
    }

    /// Label of the prepared mission.
    pub fn mission_label(&self) -> Option<&str> {
        self.plan.as_ref().map(|p| p.label.as_str())
    }

    /// Build the formation and assignment for the next mission.
    ///
    /// Connects agents, generates points on `surface`, transforms them into
    /// the deployment frame and assigns them. Issues no motion command, so
    /// a planning failure leaves the swarm physically untouched.
    pub async fn prepare(
        &mut self,
        surface: &dyn SurfaceFunction,
        spec: FormationSpec,
    ) -> Result<(), MissionError> {
        self.ensure_idle().await?;

        let n = self.agents.len();
        let mission_id = Uuid::new_v4();
        {
            let mut s = self.state.lock().await;
            s.mission_id = Some(mission_id);
            s.active = vec![true; n];
            s.arrived = vec![false; n];
            s.diagnostics.clear();
        }
        for agent in &mut self.agents {
            agent.reset_for_mission();
        }

        // connect every reachable agent; the unreachable fly out of scope
        let connect_timeout = self.cfg.mission.connect_timeout();
        let handles = self.command_handles(|backend, _| {
            let backend = Arc::clone(backend);
            CommandHandle::spawn(async move {
                tokio::time::timeout(connect_timeout, backend.connect())
                    .await
                    .unwrap_or(Err(BackendError::TimedOut))
            })
        });
        let report = DispatchCoordinator::execute("connect", handles).await;
        self.exclude_failed(&report, DiagnosticCode::ActuationUnreachable)
            .await;
        for i in self.active_indices() {
            self.agents[i].connected = true;
        }
        self.refresh_positions().await;

        let distributor = PointDistributor::new(surface, self.cfg.distribution.clone());
        let formation = distributor.generate(n, spec.seed);
        if formation.len() != n {
            return Err(MissionError::CountMismatch {
                agents: n,
                targets: formation.len(),
            });
        }
        if !formation.converged {
            let mut s = self.state.lock().await;
            s.diagnostics.push(Diagnostic::new(
                DiagnosticCode::OptimizationNonConvergence,
                "point refinement hit its iteration cap; using best iterate",
            ));
        }

        let transform = FrameTransform::new(&self.cfg.frame);
        let world = transform.apply(&formation.points);
        let positions: Vec<Vec3> = self.agents.iter().map(|a| a.position).collect();
        let assignment = assign(&positions, &world, &self.cfg.assignment).map_err(
            |AssignmentError::CountMismatch { agents, targets }| MissionError::CountMismatch {
                agents,
                targets,
            },
        )?;
        let goals = assignment.goals(&world);

        if let Some(dir) = self.cfg.mission.output_dir.clone() {
            let record = MissionArtifact {
                mission_id: mission_id.to_string(),
                label: spec.label.clone(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                num_points: goals.len(),
                scale: self.cfg.frame.scale,
                altitude: self.cfg.frame.altitude,
                seed: spec.seed,
                converged: formation.converged,
                goals_ned: goals.iter().map(Vec3::to_array).collect(),
                assignment: assignment.target_of.clone(),
            };
            match artifact::write(&dir, &record) {
                Ok(path) => info!(path = %path.display(), "mission artifact saved"),
                Err(err) => warn!(%err, "could not save mission artifact"),
            }
        }

        self.plan = Some(MissionPlan {
            formation,
            goals,
            assignment,
            label: spec.label.clone(),
        });
        info!(mission = %mission_id, label = %spec.label, agents = n, "mission prepared");
        Ok(())
    }

    /// Fly the prepared mission up to station-keeping.
    ///
    /// Runs the arm, takeoff and move batches, then hands control to the
    /// periodic station-keeping loop. Returns once the swarm is holding.
    pub async fn start(&mut self) -> Result<(), MissionError> {
        self.ensure_idle().await?;
        let goals = self
            .plan
            .as_ref()
            .ok_or(MissionError::NotPrepared)?
            .goals
            .clone();
        let _ = self.stop_tx.send(false);

        // arm
        let handles = self.command_handles(|backend, _| {
            let backend = Arc::clone(backend);
            CommandHandle::spawn(async move { backend.arm().await })
        });
        let report = DispatchCoordinator::execute("arm", handles).await;
        self.exclude_failed(&report, DiagnosticCode::DispatchPartialFailure)
            .await;
        let armed = self.active_indices();
        if armed.is_empty() {
            return Err(MissionError::AllAgentsFailed("arm".into()));
        }
        for i in armed {
            self.agents[i].armed = true;
        }
        self.set_phase(MissionPhase::Armed).await;
        if self.stop_requested() {
            return self.land_sequence().await;
        }

        // takeoff
        self.set_phase(MissionPhase::TakingOff).await;
        let handles = self.command_handles(|backend, _| backend.takeoff());
        let report = DispatchCoordinator::execute("takeoff", handles).await;
        self.exclude_failed(&report, DiagnosticCode::DispatchPartialFailure)
            .await;
        let airborne = self.active_indices();
        if airborne.is_empty() {
            self.land_sequence().await?;
            return Err(MissionError::AllAgentsFailed("takeoff".into()));
        }
        for i in airborne {
            self.agents[i].airborne = true;
        }
        self.set_phase(MissionPhase::EnRoute).await;
        if self.stop_requested() {
            return self.land_sequence().await;
        }

        // move to formation, bounded by the arrival deadline
        let speed = self.cfg.mission.move_speed;
        let deadline = tokio::time::Instant::now() + self.cfg.mission.arrival_timeout();
        let handles = self.command_handles(|backend, i| backend.move_to(goals[i], speed));
        let report = DispatchCoordinator::execute_until("move", handles, deadline).await;
        self.exclude_failed(&report, DiagnosticCode::DispatchPartialFailure)
            .await;

        self.refresh_positions().await;
        let threshold = self.cfg.control.arrival_threshold;
        {
            let mut s = self.state.lock().await;
            for i in 0..self.agents.len() {
                s.arrived[i] =
                    s.active[i] && self.agents[i].position.distance(goals[i]) < threshold;
            }
            let short = s
                .active
                .iter()
                .zip(&s.arrived)
                .filter(|(active, arrived)| **active && !**arrived)
                .count();
            if short > 0 {
                s.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::ArrivalTimeout,
                    format!("{short} agents short of formation at handover"),
                ));
            }
        }

        self.set_phase(MissionPhase::Holding).await;
        if self.stop_requested() {
            return self.land_sequence().await;
        }
        self.spawn_holding_loop(goals);
        Ok(())
    }

    /// Request landing from any state.
    ///
    /// Halts the control loop first (it checks the stop flag each tick and
    /// is joined here), then dispatches the land and disarm batches.
    pub async fn stop(&mut self) -> Result<(), MissionError> {
        info!("stop requested");
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.holding.take() {
            if let Err(err) = task.await {
                warn!(%err, "holding loop ended abnormally");
            }
        }
        self.land_sequence().await
    }

    /// Current mission snapshot.
    pub async fn status(&self) -> MissionStatus {
        let s = self.state.lock().await;
        MissionStatus {
            mission_id: s.mission_id.map(|id| id.to_string()),
            phase: s.phase,
            agents: self.agents.iter().map(|a| a.name.clone()).collect(),
            active: s.active.clone(),
            arrived: s.arrived.clone(),
            diagnostics: s.diagnostics.clone(),
        }
    }

    async fn ensure_idle(&self) -> Result<(), MissionError> {
        let s = self.state.lock().await;
        if s.phase != MissionPhase::Idle {
            return Err(MissionError::MissionActive(format!("{:?}", s.phase)));
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn active_indices(&self) -> Vec<usize> {
        self.agents
            .iter()
            .filter(|a| a.active)
            .map(|a| a.index)
            .collect()
    }

    /// Issue one command per active agent; all commands are started before
    /// any result is awaited.
    fn command_handles<F>(&self, issue: F) -> Vec<(usize, String, CommandHandle)>
    where
        F: Fn(&Arc<dyn ActuationBackend>, usize) -> CommandHandle,
    {
        self.active_indices()
            .into_iter()
            .map(|i| (i, self.agents[i].name.clone(), issue(&self.backends[i], i)))
            .collect()
    }

    /// Record batch failures; non-timeout failures exclude the agent.
    async fn exclude_failed(&mut self, report: &BatchReport, code: DiagnosticCode) {
        if report.all_succeeded() {
            return;
        }
        let mut s = self.state.lock().await;
        for failure in &report.failures {
            if failure.timed_out {
                // still en route, not broken: keep the agent flying
                s.diagnostics.push(Diagnostic::for_agent(
                    DiagnosticCode::ArrivalTimeout,
                    failure.agent.clone(),
                    failure.reason.clone(),
                ));
                continue;
            }
            s.active[failure.index] = false;
            self.agents[failure.index].active = false;
            if code == DiagnosticCode::ActuationUnreachable {
                self.agents[failure.index].connected = false;
            }
            s.diagnostics.push(Diagnostic::for_agent(
                code,
                failure.agent.clone(),
                failure.reason.clone(),
            ));
        }
    }

    /// Pull fresh position snapshots; unreachable agents are frozen.
    async fn refresh_positions(&mut self) {
        let mut lost: Vec<(usize, String)> = Vec::new();
        for i in self.active_indices() {
            match self.backends[i].position().await {
                Ok(p) => self.agents[i].position = p,
                Err(err) => lost.push((i, err.to_string())),
            }
        }
        if lost.is_empty() {
            return;
        }
        let mut s = self.state.lock().await;
        for (i, reason) in lost {
            s.active[i] = false;
            self.agents[i].active = false;
            self.agents[i].connected = false;
            s.diagnostics.push(Diagnostic::for_agent(
                DiagnosticCode::ActuationUnreachable,
                self.agents[i].name.clone(),
                reason,
            ));
        }
    }

    /// The holding task may have excluded agents; fold that back into the
    /// roster before the next batch.
    async fn sync_active_from_state(&mut self) {
        let s = self.state.lock().await;
        for (agent, active) in self.agents.iter_mut().zip(&s.active) {
            agent.active &= *active;
        }
    }

    async fn set_phase(&self, next: MissionPhase) {
        let mut s = self.state.lock().await;
        let from = s.phase;
        if from == next {
            return;
        }
        if !from.can_transition_to(next) {
            warn!(?from, ?next, "irregular phase transition");
        }
        info!(?from, ?next, "phase transition");
        s.phase = next;
    }

    async fn land_sequence(&mut self) -> Result<(), MissionError> {
        self.sync_active_from_state().await;
        self.set_phase(MissionPhase::Landing).await;

        let handles = self.command_handles(|backend, _| backend.land());
        let report = DispatchCoordinator::execute("land", handles).await;
        self.exclude_failed(&report, DiagnosticCode::DispatchPartialFailure)
            .await;
        for agent in &mut self.agents {
            agent.airborne = false;
            agent.velocity = Vec3::ZERO;
        }

        let handles = self.command_handles(|backend, _| {
            let backend = Arc::clone(backend);
            CommandHandle::spawn(async move { backend.disarm().await })
        });
        let report = DispatchCoordinator::execute("disarm", handles).await;
        self.exclude_failed(&report, DiagnosticCode::DispatchPartialFailure)
            .await;
        for agent in &mut self.agents {
            agent.armed = false;
        }

        self.set_phase(MissionPhase::Idle).await;
        info!("swarm landed and idle");
        Ok(())
    }

    /// Single periodic control task: runs only while holding, checks the
    /// stop flag cooperatively each tick, and fans velocity commands out
    /// through the coordinator.
    fn spawn_holding_loop(&mut self, goals: Vec<Vec3>) {
        let backends = self.backends.clone();
        let names: Vec<String> = self.agents.iter().map(|a| a.name.clone()).collect();
        let controller = self.controller.clone();
        let period = self.cfg.mission.control_period();
        let state = Arc::clone(&self.state);
        let stop_rx = self.stop_tx.subscribe();
        let mut positions: Vec<Vec3> = self.agents.iter().map(|a| a.position).collect();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if *stop_rx.borrow() {
                    break;
                }

                let (mut active, profile) = {
                    let s = state.lock().await;
                    let everyone_in = s
                        .active
                        .iter()
                        .zip(&s.arrived)
                        .filter(|(active, _)| **active)
                        .all(|(_, arrived)| *arrived)
                        && s.active.iter().any(|a| *a);
                    let profile = if everyone_in {
                        GainProfile::StationKeep
                    } else {
                        GainProfile::Transit
                    };
                    (s.active.clone(), profile)
                };

                // eventually-consistent position snapshots
                let mut lost: Vec<(usize, String)> = Vec::new();
                for i in 0..backends.len() {
                    if !active[i] {
                        continue;
                    }
                    match backends[i].position().await {
                        Ok(p) => positions[i] = p,
                        Err(err) => lost.push((i, err.to_string())),
                    }
                }
                if !lost.is_empty() {
                    let mut s = state.lock().await;
                    for (i, reason) in &lost {
                        s.active[*i] = false;
                        active[*i] = false;
                        s.diagnostics.push(Diagnostic::for_agent(
                            DiagnosticCode::ActuationUnreachable,
                            names[*i].clone(),
                            reason.clone(),
                        ));
                    }
                }

                let out = controller.step(&positions, &goals, &active, profile);

                let handles: Vec<(usize, String, CommandHandle)> = (0..backends.len())
                    .filter(|i| active[*i])
                    .map(|i| {
                        (
                            i,
                            names[i].clone(),
                            backends[i].set_velocity(out.velocities[i], period),
                        )
                    })
                    .collect();
                let report = DispatchCoordinator::execute("velocity", handles).await;

                let mut s = state.lock().await;
                if !report.all_succeeded() {
                    for failure in &report.failures {
                        s.active[failure.index] = false;
                        s.diagnostics.push(Diagnostic::for_agent(
                            DiagnosticCode::ActuationUnreachable,
                            failure.agent.clone(),
                            failure.reason.clone(),
                        ));
                    }
                }
                s.arrived = out.arrived;
            }
            debug!("holding loop stopped");
        });
        self.holding = Some(task);
    }
}
