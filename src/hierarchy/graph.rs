// In-memory agent forest: arena of nodes plus an upline -> children index

use crate::db::schema::{AgentProfile, HierarchyFields};
use crate::errors::{AppError, Result};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// One agent in the loaded working set.
#[derive(Debug, Clone)]
pub struct AgentNode {
    pub id: Uuid,
    pub upline_id: Option<Uuid>,
    pub contract_level: Option<i32>,
    /// Root-to-self id sequence; always ends with `id`.
    pub path: Vec<Uuid>,
    pub depth: i32,
}

impl From<&AgentProfile> for AgentNode {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            id: profile.id,
            upline_id: profile.upline_id,
            contract_level: profile.contract_level,
            path: profile.path_ids(),
            depth: profile.hierarchy_depth,
        }
    }
}

/// The agent forest over a working set of agents.
///
/// Nodes live in an id-keyed arena; parent/child structure is kept in a
/// separate adjacency index so cycle checks and subtree walks are plain map
/// operations. Structure is always derived from `upline_id`, never from the
/// stored path strings (those are caches and may be stale after a detach).
#[derive(Debug, Default)]
pub struct HierarchyGraph {
    nodes: HashMap<Uuid, AgentNode>,
    children: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a working set of profiles.
    pub fn from_profiles<'a, I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = &'a AgentProfile>,
    {
        let mut graph = Self::new();
        for profile in profiles {
            graph.insert(AgentNode::from(profile));
        }
        graph
    }

    pub fn insert(&mut self, node: AgentNode) {
        if let Some(upline) = node.upline_id {
            self.children.entry(upline).or_default().insert(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    pub fn get(&self, id: Uuid) -> Option<&AgentNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct downlines of the given agent.
    pub fn children(&self, id: Uuid) -> Vec<Uuid> {
        self.children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All downlines of the given agent, direct and indirect.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            if let Some(kids) = self.children.get(&current) {
                for &child in kids {
                    result.push(child);
                    frontier.push(child);
                }
            }
        }
        result
    }

    /// Length of the longest downline chain under the given agent, derived
    /// from adjacency (stored depths can be stale after a detach).
    pub fn depth_below(&self, id: Uuid) -> i32 {
        let mut max = 0;
        let mut frontier = vec![(id, 0)];
        while let Some((current, depth)) = frontier.pop() {
            if let Some(kids) = self.children.get(&current) {
                for &child in kids {
                    max = max.max(depth + 1);
                    frontier.push((child, depth + 1));
                }
            }
        }
        max
    }

    /// Agents in the working set with no upline, or whose upline is outside
    /// the set (subtree rendering starts from these).
    pub fn roots(&self) -> Vec<Uuid> {
        let mut roots: Vec<Uuid> = self
            .nodes
            .values()
            .filter(|n| match n.upline_id {
                None => true,
                Some(upline) => !self.nodes.contains_key(&upline),
            })
            .map(|n| n.id)
            .collect();
        roots.sort();
        roots
    }

    /// True when `candidate` sits anywhere below `ancestor`.
    pub fn is_descendant(&self, candidate: Uuid, ancestor: Uuid) -> bool {
        let mut frontier = vec![ancestor];
        while let Some(current) = frontier.pop() {
            if let Some(kids) = self.children.get(&current) {
                if kids.contains(&candidate) {
                    return true;
                }
                frontier.extend(kids.iter().copied());
            }
        }
        false
    }

    /// Set `new_upline` as the child's upline, recomputing the child's path
    /// and depth. Fails with a cycle error when the edge would make the
    /// child its own ancestor.
    pub fn attach_child(&mut self, child_id: Uuid, new_upline_id: Uuid) -> Result<HierarchyFields> {
        if child_id == new_upline_id {
            return Err(AppError::Cycle(
                "an agent cannot be its own upline".to_string(),
            ));
        }
        if !self.nodes.contains_key(&child_id) {
            return Err(AppError::NotFound("Agent".to_string()));
        }
        if !self.nodes.contains_key(&new_upline_id) {
            return Err(AppError::NotFound("Upline agent".to_string()));
        }
        if self.is_descendant(new_upline_id, child_id) {
            return Err(AppError::Cycle(
                "the proposed upline is already a downline of this agent".to_string(),
            ));
        }

        let (upline_path, upline_depth) = {
            let upline = &self.nodes[&new_upline_id];
            (upline.path.clone(), upline.depth)
        };

        let old_upline = self.nodes[&child_id].upline_id;
        if let Some(old) = old_upline {
            if let Some(set) = self.children.get_mut(&old) {
                set.remove(&child_id);
            }
        }
        self.children
            .entry(new_upline_id)
            .or_default()
            .insert(child_id);

        let child = self.nodes.get_mut(&child_id).expect("checked above");
        child.upline_id = Some(new_upline_id);
        child.path = upline_path;
        child.path.push(child_id);
        child.depth = upline_depth + 1;

        Ok(HierarchyFields {
            upline_id: Some(new_upline_id),
            hierarchy_path: path_string(&child.path),
            hierarchy_depth: child.depth,
        })
    }

    /// Cut the edge above the child, making it a root. Only the child's own
    /// path and depth are rewritten; descendants keep their stored paths
    /// until a recompute pass (structure stays correct via `upline_id`).
    pub fn detach_child(&mut self, child_id: Uuid) -> Result<HierarchyFields> {
        let old_upline = {
            let child = self
                .nodes
                .get(&child_id)
                .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
            child.upline_id
        };

        if let Some(old) = old_upline {
            if let Some(set) = self.children.get_mut(&old) {
                set.remove(&child_id);
            }
        }

        let child = self.nodes.get_mut(&child_id).expect("checked above");
        child.upline_id = None;
        child.path = vec![child_id];
        child.depth = 0;

        Ok(HierarchyFields::root(child_id))
    }
}

fn path_string(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
