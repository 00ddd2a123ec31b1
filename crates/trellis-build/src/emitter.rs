//! Plan emission: serialized executor input, streaming sinks and graph dumps
//!
//! Emission performs no merging. It orders descriptors producers-first,
//! checks every referenced dependency is emitted for the same target and
//! hands the result to a [`BuildExecutor`] or serializes it whole.

use crate::compiler::TargetResolution;
use crate::descriptor::BuildDescriptor;
use crate::error::{BuildError, BuildResult};
use crate::graph::Visibility;
use crate::planner::PlanOutcome;
use crate::target::Target;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

/// Version of the executor input layout
pub const FORMAT_VERSION: u32 = 1;

/// Everything a build executor needs, for every planned target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInput {
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_project: Option<String>,
    pub targets: Vec<TargetPlan>,
}

impl ExecutorInput {
    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Descriptors of one target in dependency order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPlan {
    pub key: String,
    pub target: Target,
    pub order: Vec<String>,
    /// SHA-256 of the serialized descriptors
    pub fingerprint: String,
    pub descriptors: Vec<BuildDescriptor>,
}

/// Downstream consumer of emitted descriptors
///
/// Descriptors arrive one at a time, producers before consumers, so an
/// executor can start work before the whole plan is known.
pub trait BuildExecutor {
    fn begin_target(&mut self, plan: &TargetHeader<'_>) -> BuildResult<()>;

    fn descriptor(&mut self, descriptor: &BuildDescriptor) -> BuildResult<()>;

    fn end_target(&mut self, _key: &str) -> BuildResult<()> {
        Ok(())
    }
}

/// Per-target header handed to executors
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TargetHeader<'a> {
    pub key: &'a str,
    pub order: &'a [String],
    pub fingerprint: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum StreamRecord<'a> {
    Target(TargetHeader<'a>),
    Descriptor(&'a BuildDescriptor),
}

/// Writes one JSON object per line
pub struct JsonLinesExecutor<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesExecutor<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &StreamRecord<'_>) -> BuildResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> BuildExecutor for JsonLinesExecutor<W> {
    fn begin_target(&mut self, plan: &TargetHeader<'_>) -> BuildResult<()> {
        self.write_record(&StreamRecord::Target(*plan))
    }

    fn descriptor(&mut self, descriptor: &BuildDescriptor) -> BuildResult<()> {
        self.write_record(&StreamRecord::Descriptor(descriptor))
    }

    fn end_target(&mut self, _key: &str) -> BuildResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Gathers descriptors in memory, in arrival order
#[derive(Debug, Default)]
pub struct CollectingExecutor {
    pub targets: Vec<String>,
    pub descriptors: Vec<BuildDescriptor>,
}

impl BuildExecutor for CollectingExecutor {
    fn begin_target(&mut self, plan: &TargetHeader<'_>) -> BuildResult<()> {
        self.targets.push(plan.key.to_string());
        Ok(())
    }

    fn descriptor(&mut self, descriptor: &BuildDescriptor) -> BuildResult<()> {
        self.descriptors.push(descriptor.clone());
        Ok(())
    }
}

/// Serialize one target's descriptors in `order`
///
/// Fails with [`BuildError::IncompleteDescriptor`] if a descriptor names a
/// dependency that is not part of the emitted set.
pub fn emit_target(
    target: &Target,
    order: &[String],
    descriptors: &[Arc<BuildDescriptor>],
) -> BuildResult<TargetPlan> {
    let key = target.key();
    let mut ordered = Vec::with_capacity(order.len());
    for name in order {
        let descriptor = descriptors
            .iter()
            .find(|d| &d.project == name && d.target == key)
            .ok_or_else(|| BuildError::incomplete(name, name, target))?;
        ordered.push(BuildDescriptor::clone(descriptor));
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    for descriptor in &ordered {
        for dep in &descriptor.dependencies {
            if !emitted.contains(dep.as_str()) {
                return Err(BuildError::incomplete(&descriptor.project, dep, target));
            }
        }
        emitted.insert(descriptor.project.as_str());
    }

    let fingerprint = fingerprint(&ordered)?;
    Ok(TargetPlan {
        key,
        target: target.clone(),
        order: order.to_vec(),
        fingerprint,
        descriptors: ordered,
    })
}

/// Serialize every successful target of a plan run
pub fn emit(outcome: &PlanOutcome) -> BuildResult<ExecutorInput> {
    let targets = outcome
        .resolutions
        .iter()
        .map(|r| emit_target(&r.target, &r.order, &r.descriptors))
        .collect::<BuildResult<Vec<_>>>()?;

    Ok(ExecutorInput {
        format_version: FORMAT_VERSION,
        solution: outcome.solution.clone(),
        startup_project: outcome.startup_project.clone(),
        targets,
    })
}

/// Stream every target of `input` into `executor`
pub fn stream(input: &ExecutorInput, executor: &mut dyn BuildExecutor) -> BuildResult<()> {
    for plan in &input.targets {
        executor.begin_target(&TargetHeader {
            key: &plan.key,
            order: &plan.order,
            fingerprint: &plan.fingerprint,
        })?;
        for descriptor in &plan.descriptors {
            executor.descriptor(descriptor)?;
        }
        executor.end_target(&plan.key)?;
    }
    Ok(())
}

fn fingerprint(descriptors: &[BuildDescriptor]) -> BuildResult<String> {
    let bytes = serde_json::to_vec(descriptors)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Graphviz dump of one target's dependency graph
///
/// Public edges are solid, private edges dashed.
pub fn dot_graph(resolution: &TargetResolution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", resolution.target.key());
    let _ = writeln!(out, "  rankdir=LR;");
    for name in &resolution.order {
        let _ = writeln!(out, "  \"{}\";", name);
    }
    for name in &resolution.order {
        let Some(node) = resolution.graph.get_node(name) else {
            continue;
        };
        for (dep, visibility) in &node.dependencies {
            match visibility {
                Visibility::Public => {
                    let _ = writeln!(out, "  \"{}\" -> \"{}\";", name, dep);
                }
                Visibility::Private => {
                    let _ = writeln!(out, "  \"{}\" -> \"{}\" [style=dashed];", name, dep);
                }
            }
        }
    }
    out.push_str("}\n");
    out
}
