//! ---
//! refdata_section: "04-rights"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Right assignment generation pipeline."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use refdata_domain::{IntermediateRightAssignment, RightAssignment};
use refdata_persistence::Repositories;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::graph::SupervisionGraph;
use crate::metrics::RightsMetrics;
use crate::Result;

/// Which users a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationScope {
    All,
    User(Uuid),
}

impl GenerationScope {
    fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::User(_) => "user",
        }
    }
}

impl fmt::Display for GenerationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all users"),
            Self::User(id) => write!(f, "user {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub scope: GenerationScope,
    pub intermediate_rows: usize,
    pub rows_written: u64,
    pub elapsed: Duration,
}

/// Expand intermediate rows into distinct right assignments.
///
/// Rows carrying a supervisory node become one tuple per supervised facility
/// for the row's program; a node row without a program supervises nothing.
/// All other rows are copied without the node.
pub fn expand(
    rows: Vec<IntermediateRightAssignment>,
    graph: &mut SupervisionGraph,
) -> BTreeSet<RightAssignment> {
    let mut out = BTreeSet::new();
    for row in rows {
        match (row.supervisory_node_id, row.program_id) {
            (Some(node), Some(program)) => {
                for facility in graph.supervised_facilities(node, program).iter() {
                    out.insert(row.for_facility(*facility));
                }
            }
            (Some(_), None) => {}
            (None, _) => {
                out.insert(row.into_assignment());
            }
        }
    }
    out
}

/// Rebuilds the right assignment table from role assignments.
///
/// Runs are serialised; each run reads and writes under one lock.
#[derive(Clone)]
pub struct RightAssignmentGenerator {
    repos: Repositories,
    metrics: Option<RightsMetrics>,
    run_lock: Arc<Mutex<()>>,
}

impl RightAssignmentGenerator {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            metrics: None,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_metrics(mut self, metrics: RightsMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace every right assignment.
    pub async fn generate_all(&self) -> Result<GenerationReport> {
        self.run(GenerationScope::All).await
    }

    /// Replace the right assignments of one user only.
    pub async fn generate_for_user(&self, user_id: Uuid) -> Result<GenerationReport> {
        self.run(GenerationScope::User(user_id)).await
    }

    async fn run(&self, scope: GenerationScope) -> Result<GenerationReport> {
        let _running = self.run_lock.lock().await;
        let started = Instant::now();
        let user = match scope {
            GenerationScope::All => None,
            GenerationScope::User(id) => Some(id),
        };

        debug!(%scope, "fetching intermediate right assignments");
        let rows = self.repos.role_assignments.find_intermediate(user).await?;
        let intermediate_rows = rows.len();

        let snapshot = self.repos.supervisory_nodes.load_snapshot().await?;
        let mut graph = SupervisionGraph::from_snapshot(&snapshot);
        debug!(
            %scope,
            intermediate_rows,
            nodes = graph.node_count(),
            "expanding supervisory nodes"
        );
        let assignments: Vec<RightAssignment> = expand(rows, &mut graph).into_iter().collect();

        debug!(%scope, distinct = assignments.len(), "dropping and inserting right assignments");
        let rows_written = match scope {
            GenerationScope::All => self.repos.right_assignments.replace_all(&assignments).await?,
            GenerationScope::User(id) => {
                self.repos
                    .right_assignments
                    .replace_for_user(id, &assignments)
                    .await?
            }
        };

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_run(scope.label(), rows_written, elapsed.as_secs_f64());
        }
        info!(
            %scope,
            rows_written,
            elapsed_ms = elapsed.as_millis() as u64,
            "right assignments generated"
        );

        Ok(GenerationReport {
            scope,
            intermediate_rows,
            rows_written,
            elapsed,
        })
    }
}
