//! Phased compilation
//!
//! A [`Compilation`] moves through `Created → Analyzed → Compiled →
//! Rendered`:
//!
//! 1. [`Compilation::analyze`] runs every phase's planners and collects
//!    their ops into a [`Plan`]. Each planner's ops are dry-run against a
//!    scratch copy of the working state so later planners see a settled
//!    schema; the compilation's own state is left untouched.
//! 2. [`Compilation::compile`] applies the plan phase by phase, recording
//!    every outcome in a [`Log`].
//! 3. [`Compilation::schema`] renders the entries copied by the schema
//!    phase.

pub mod op;
pub mod plan;
pub mod planner;
pub mod planners;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CompilationOptions;
use crate::error::{CompileError, Result};
use crate::protoschema::ProtoSchema;
use crate::repository::Repository;
use crate::schema::Schema;

pub use op::{IncludeScope, MergeResult, Op, OpKind};
pub use plan::{Log, LogEntry, LogStats, PhaseLog, PhasePlan, Plan};
pub use planner::{Phase, Planner};

/// Lifecycle of a compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilationState {
    Created,
    Analyzed,
    Compiled,
    Rendered,
}

impl fmt::Display for CompilationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompilationState::Created => "created",
            CompilationState::Analyzed => "analyzed",
            CompilationState::Compiled => "compiled",
            CompilationState::Rendered => "rendered",
        };
        write!(f, "{}", name)
    }
}

/// One run of the compiler over a repository
#[derive(Debug)]
pub struct Compilation {
    options: CompilationOptions,
    proto: ProtoSchema,
    state: CompilationState,
    plan: Option<Plan>,
    log: Option<Log>,
    schema: Option<Schema>,
}

impl Compilation {
    pub fn new(repository: impl Into<Arc<Repository>>, options: CompilationOptions) -> Self {
        Self {
            options,
            proto: ProtoSchema::new(repository.into()),
            state: CompilationState::Created,
            plan: None,
            log: None,
            schema: None,
        }
    }

    pub fn state(&self) -> CompilationState {
        self.state
    }

    pub fn options(&self) -> &CompilationOptions {
        &self.options
    }

    /// Working state, for introspection
    pub fn proto(&self) -> &ProtoSchema {
        &self.proto
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn log(&self) -> Option<&Log> {
        self.log.as_ref()
    }

    /// Plan every phase; repeated calls return the same plan
    pub fn analyze(&mut self) -> Result<&Plan> {
        if self.plan.is_none() {
            let plan = self.plan_phases()?;
            self.plan = Some(plan);
            self.state = CompilationState::Analyzed;
        }
        self.plan.as_ref().ok_or(CompileError::OutOfOrder {
            step: "analyze",
            state: self.state,
        })
    }

    fn plan_phases(&self) -> Result<Plan> {
        if let Some(fingerprint) = self.proto.repository().fingerprint() {
            info!("Analyzing repository {}", fingerprint);
        }

        let mut scratch = self.proto.clone();
        let mut plan = Plan::default();
        for phase in Phase::ALL {
            let mut phase_plan = PhasePlan::new(phase);
            for planner in phase.planners() {
                let ops = planner.analyze(&scratch, &self.options)?;
                debug!("{} planner emitted {} ops", planner.name(), ops.len());
                for op in ops {
                    op::execute(&op, &mut scratch, &self.options);
                    phase_plan.push(op);
                }
            }
            info!(
                "Planned {} phase: {} ops across {} locations",
                phase,
                phase_plan.len(),
                phase_plan.ops.len()
            );
            plan.phases.push(phase_plan);
        }
        Ok(plan)
    }

    /// Apply the plan; requires [`analyze`](Self::analyze) first
    pub fn compile(&mut self) -> Result<&Log> {
        if self.state == CompilationState::Created {
            return Err(CompileError::OutOfOrder {
                step: "compile",
                state: self.state,
            });
        }

        if self.log.is_none() {
            let plan = self.plan.as_ref().ok_or(CompileError::OutOfOrder {
                step: "compile",
                state: self.state,
            })?;

            let mut log = Log::default();
            for phase_plan in &plan.phases {
                let mut phase_log = PhaseLog::new(phase_plan.phase);
                for op in phase_plan.schedule() {
                    let result = op::execute(op, &mut self.proto, &self.options);
                    if let MergeResult::Failed(reason) = &result {
                        warn!("{} phase: {} failed: {}", phase_plan.phase, op, reason);
                    }
                    phase_log.record(op.clone(), result);
                }
                log.phases.push(phase_log);
            }

            let stats = log.stats();
            info!(
                "Compiled: {} applied, {} no-op, {} failed",
                stats.applied, stats.no_op, stats.failed
            );
            self.log = Some(log);
            self.state = CompilationState::Compiled;
        }

        self.log.as_ref().ok_or(CompileError::OutOfOrder {
            step: "compile",
            state: self.state,
        })
    }

    /// Render the compiled schema; requires [`compile`](Self::compile) first
    pub fn schema(&mut self) -> Result<&Schema> {
        if self.state < CompilationState::Compiled {
            return Err(CompileError::OutOfOrder {
                step: "render",
                state: self.state,
            });
        }

        if self.schema.is_none() {
            let required: Vec<_> = self
                .plan
                .as_ref()
                .and_then(|p| p.phase(Phase::Schema))
                .map(|p| p.ops.keys().cloned().collect())
                .unwrap_or_default();

            let missing: Vec<_> = required
                .into_iter()
                .filter(|l| !self.proto.contains(l))
                .collect();

            if !missing.is_empty() {
                let failures = self
                    .log
                    .iter()
                    .flat_map(Log::failures)
                    .filter_map(|e| match &e.result {
                        MergeResult::Failed(reason) => Some(format!("{}: {}", e.op, reason)),
                        _ => None,
                    })
                    .collect();
                return Err(CompileError::IncompleteSchema { missing, failures });
            }

            self.schema = Some(Schema::render(&self.proto)?);
            self.state = CompilationState::Rendered;
        }

        self.schema.as_ref().ok_or(CompileError::OutOfOrder {
            step: "render",
            state: self.state,
        })
    }

    /// Analyze, compile and render in one go
    pub fn build(&mut self) -> Result<Schema> {
        self.analyze()?;
        self.compile()?;
        self.schema().cloned()
    }
}
