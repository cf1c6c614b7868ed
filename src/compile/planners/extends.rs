//! Inheritance through `extends`
//!
//! Parent links between core objects and classes form a graph. Ops are
//! emitted parent-first in topological order so a grandchild always sees a
//! parent that has already inherited from its own parent. A cycle is fatal.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

use super::{core_definitions, family, RECORD_KINDS};
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::{Phase, Planner};
use crate::config::CompilationOptions;
use crate::error::{CompileError, Result};
use crate::merge::{merge, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::definition::{INCLUDE_KEY, KEY_KEY, SRC_EXTENSION_KEY};
use crate::repository::{Definition, Location};

/// Fields a child never inherits from its parent
const NOT_INHERITED: &[&str] = &["uid", KEY_KEY, SRC_EXTENSION_KEY, INCLUDE_KEY];

pub struct ExtendsPlanner;

impl Planner for ExtendsPlanner {
    fn name(&self) -> &'static str {
        "extends"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let graph = InheritanceGraph::build(proto);
        let order = graph.parent_first()?;

        let ops = order
            .into_iter()
            .filter_map(|child| {
                let parent = graph.parents.get(&child)?;
                Some(Op::new(
                    child,
                    OpKind::Extend {
                        source: parent.clone(),
                    },
                ))
            })
            .collect();
        Ok(ops)
    }
}

/// Parent links between live core records
struct InheritanceGraph {
    graph: DiGraph<Location, ()>,
    /// child -> parent
    parents: BTreeMap<Location, Location>,
}

impl InheritanceGraph {
    fn build(proto: &ProtoSchema) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<Location, NodeIndex> = HashMap::new();
        let mut parents = BTreeMap::new();

        let records = core_definitions(proto, RECORD_KINDS);
        for (location, _) in &records {
            nodes.insert(location.clone(), graph.add_node(location.clone()));
        }

        for (location, definition) in &records {
            let Some(parent_name) = definition.extends() else {
                continue;
            };
            if definition.name() == Some(parent_name) || location.name == parent_name {
                continue;
            }

            let kinds = family(location.kind);
            let Some(parent) = proto.find_by_name(kinds, parent_name, definition.src_extension()) else {
                match proto.suggest(kinds, parent_name) {
                    Some(suggestion) => warn!(
                        "{}: cannot resolve parent {:?}, did you mean {:?}?",
                        location, parent_name, suggestion
                    ),
                    None => warn!("{}: cannot resolve parent {:?}", location, parent_name),
                }
                continue;
            };
            if &parent == location {
                continue;
            }

            if let (Some(&from), Some(&to)) = (nodes.get(&parent), nodes.get(location)) {
                graph.add_edge(from, to, ());
                parents.insert(location.clone(), parent);
            }
        }

        Self { graph, parents }
    }

    /// Records in parent-first order, or the members of a cycle
    fn parent_first(&self) -> Result<Vec<Location>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|i| self.graph[i].clone()).collect()),
            Err(cycle) => {
                let culprit = cycle.node_id();
                let mut members: Vec<Location> = kosaraju_scc(&self.graph)
                    .into_iter()
                    .find(|scc| scc.contains(&culprit))
                    .unwrap_or_else(|| vec![culprit])
                    .into_iter()
                    .map(|i| self.graph[i].clone())
                    .collect();
                members.sort();
                Err(CompileError::CyclicInheritance {
                    phase: Phase::Structure,
                    cycle: members,
                })
            }
        }
    }
}

/// Inherit everything the child does not define itself
pub(crate) fn extend(definition: &mut Definition, parent: &Definition) -> Edit {
    Ok(merge(
        definition.as_map_mut(),
        parent.as_map(),
        MergeOptions::fill().ignoring(NOT_INHERITED),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use serde_json::json;

    #[test]
    fn test_parent_first_and_transitive() {
        let mut proto = proto(vec![
            (
                "events/base_event.json",
                json!({"name": "base_event", "description": "Base", "attributes": {"time": {}}}),
            ),
            (
                "events/network/network.json",
                json!({"name": "network", "extends": "base_event", "attributes": {"src_endpoint": {}}}),
            ),
            (
                "events/network/http_activity.json",
                json!({"name": "http_activity", "extends": "network", "uid": 2, "attributes": {}}),
            ),
        ]);
        let options = CompilationOptions::default();
        let ops = ExtendsPlanner.analyze(&proto, &options).unwrap();
        let order: Vec<_> = ops.iter().map(|op| op.target.name.as_str()).collect();
        assert_eq!(order, vec!["network", "http_activity"]);

        run(&mut proto, &ops, &options);
        let http = proto.resolve(&Location::class("http_activity")).unwrap();
        assert_eq!(http.attribute_names(), vec!["src_endpoint", "time"]);
        assert_eq!(http.description(), Some("Base"));
        assert_eq!(http.uid(), Some(2));
    }

    #[test]
    fn test_cycle_is_reported() {
        let proto = proto(vec![
            ("objects/a.json", json!({"name": "a", "extends": "b"})),
            ("objects/b.json", json!({"name": "b", "extends": "a"})),
            ("objects/c.json", json!({"name": "c", "extends": "a"})),
        ]);
        match ExtendsPlanner.analyze(&proto, &CompilationOptions::default()) {
            Err(CompileError::CyclicInheritance { phase, cycle }) => {
                assert_eq!(phase, Phase::Structure);
                assert_eq!(cycle, vec![Location::object("a"), Location::object("b")]);
            }
            other => panic!("Expected CyclicInheritance, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_and_self_references_are_skipped() {
        let proto = proto(vec![
            ("objects/file.json", json!({"name": "file", "extends": "file"})),
            ("objects/user.json", json!({"name": "user", "extends": "entity"})),
        ]);
        assert!(ExtendsPlanner
            .analyze(&proto, &CompilationOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_uid_and_key_are_not_inherited() {
        let mut child = Definition::from_value(json!({"name": "child"})).unwrap();
        let parent = Definition::from_value(json!({
            "name": "parent", "uid": 7, "key": "x/parent", "src_extension": "x", "caption": "Parent"
        }))
        .unwrap();
        let changes = extend(&mut child, &parent).unwrap();
        assert_eq!(changes, vec!["caption"]);
        assert_eq!(child.uid(), None);
    }
}
