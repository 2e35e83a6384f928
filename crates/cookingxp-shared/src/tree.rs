//! Progression trees.
//!
//! A tree is a fixed number of tiers, each holding nodes that point at an
//! achievement in the registry. Nodes carry per-tree derived status: the same
//! achievement can be reachable in one tree and locked in another.
//!
//! Validation runs two passes:
//! 1. Mirror each node's `active` flag from the registry and advance
//!    `unlocked_tier` over the longest prefix of tiers that contain an
//!    active node. A tier with nothing active stops advancement.
//! 2. Mark a node reachable when its tier is within `unlocked_tier` and it
//!    has no prerequisites or at least one active prerequisite, then ask the
//!    catalog gate to release the content behind every reachable node.

use crate::achievement::{AchievementId, AchievementRegistry};
use crate::catalog::{CatalogGate, CatalogKey};
use crate::error::{Result, XpError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

pub type TreeId = u32;

/// Tier count used when the configuration does not override it
pub const DEFAULT_TREE_HEIGHT: usize = 4;

/// Position of a node inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub tier: usize,
    pub index: usize,
}

impl NodeRef {
    pub const fn new(tier: usize, index: usize) -> Self {
        Self { tier, index }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tier, self.index)
    }
}

/// Display state of a node within one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Locked,
    Unlocked,
    Activated,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Locked => "locked",
            NodeState::Unlocked => "unlocked",
            NodeState::Activated => "activated",
        };
        write!(f, "{}", s)
    }
}

/// A tree-local holder for an achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    achievement: AchievementId,
    prerequisites: Vec<NodeRef>,
    reachable: bool,
    active: bool,
}

impl TreeNode {
    fn new(achievement: AchievementId) -> Self {
        Self {
            achievement,
            prerequisites: Vec::new(),
            reachable: false,
            active: false,
        }
    }

    pub fn achievement(&self) -> AchievementId {
        self.achievement
    }

    pub fn prerequisites(&self) -> &[NodeRef] {
        &self.prerequisites
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Cached copy of the registry flag as of the last validation
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> NodeState {
        if self.active {
            NodeState::Activated
        } else if self.reachable {
            NodeState::Unlocked
        } else {
            NodeState::Locked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionTree {
    id: TreeId,
    name: String,
    unlocked_tier: usize,
    tiers: Vec<Vec<TreeNode>>,
}

impl ProgressionTree {
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Display-name resource key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of leading tiers that each hold an activated node
    pub fn unlocked_tier(&self) -> usize {
        self.unlocked_tier
    }

    pub fn height(&self) -> usize {
        self.tiers.len()
    }

    pub fn tiers(&self) -> &[Vec<TreeNode>] {
        &self.tiers
    }

    pub fn node(&self, at: NodeRef) -> Option<&TreeNode> {
        self.tiers.get(at.tier).and_then(|tier| tier.get(at.index))
    }

    pub fn node_count(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    /// Achievements behind reachable nodes, in tier order
    pub fn reachable_achievements(&self) -> Vec<AchievementId> {
        self.tiers
            .iter()
            .flatten()
            .filter(|n| n.reachable)
            .map(|n| n.achievement)
            .collect()
    }

    pub fn contains_achievement(&self, id: AchievementId) -> bool {
        self.tiers.iter().flatten().any(|n| n.achievement == id)
    }

    /// Recompute derived node status and release content for reachable
    /// nodes. Returns the catalog keys newly released by this pass.
    pub fn validate(
        &mut self,
        registry: &AchievementRegistry,
        gate: &mut dyn CatalogGate,
    ) -> Result<BTreeSet<CatalogKey>> {
        // Pass 1: mirror activation, advance unlocked tier
        self.unlocked_tier = 0;
        for (tier_idx, tier) in self.tiers.iter_mut().enumerate() {
            let mut tier_has_activation = false;
            for node in tier.iter_mut() {
                node.active = registry.is_active(node.achievement)?;
                tier_has_activation |= node.active;
            }

            if tier_has_activation && self.unlocked_tier == tier_idx {
                self.unlocked_tier += 1;
            }
        }

        // Pass 2: reachability
        let reachable: Vec<Vec<bool>> = self
            .tiers
            .iter()
            .enumerate()
            .map(|(tier_idx, tier)| {
                tier.iter()
                    .map(|node| {
                        tier_idx <= self.unlocked_tier
                            && (node.prerequisites.is_empty()
                                || node
                                    .prerequisites
                                    .iter()
                                    .any(|p| self.node(*p).is_some_and(|n| n.active)))
                    })
                    .collect()
            })
            .collect();

        let mut released = BTreeSet::new();
        for (tier, flags) in self.tiers.iter_mut().zip(reachable) {
            for (node, reachable) in tier.iter_mut().zip(flags) {
                node.reachable = reachable;
                if reachable {
                    released.extend(gate.release_by_achievement(node.achievement));
                }
            }
        }

        debug!(
            tree = self.id,
            unlocked_tier = self.unlocked_tier,
            released = released.len(),
            "validated tree"
        );

        Ok(released)
    }
}

/// Assembles a tree's fixed topology. Checks happen in [`TreeBuilder::build`].
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    id: TreeId,
    name: String,
    height: usize,
    nodes: Vec<(usize, AchievementId)>,
    edges: Vec<(NodeRef, NodeRef)>,
}

impl TreeBuilder {
    pub fn new(id: TreeId, name: &str, height: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            height,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Append a node to `tier` and return its position
    pub fn add_node(&mut self, tier: usize, achievement: AchievementId) -> NodeRef {
        let index = self.nodes.iter().filter(|(t, _)| *t == tier).count();
        self.nodes.push((tier, achievement));
        NodeRef::new(tier, index)
    }

    /// Require activation of `from` before `to` can unlock
    pub fn add_edge(&mut self, from: NodeRef, to: NodeRef) -> &mut Self {
        self.edges.push((from, to));
        self
    }

    /// Validate and assemble the tree. Every edge must point from a lower
    /// tier to a higher one and every achievement must be registered.
    pub fn build(self, registry: &AchievementRegistry) -> Result<ProgressionTree> {
        let mut tiers: Vec<Vec<TreeNode>> = vec![Vec::new(); self.height];

        for &(tier, achievement) in &self.nodes {
            if tier >= self.height {
                return Err(XpError::MalformedTopology(format!(
                    "tree {}: tier {} exceeds height {}",
                    self.id, tier, self.height
                )));
            }
            if !registry.contains(achievement) {
                return Err(XpError::AchievementNotFound(achievement));
            }
            tiers[tier].push(TreeNode::new(achievement));
        }

        for &(from, to) in &self.edges {
            let exists = |at: NodeRef| tiers.get(at.tier).is_some_and(|t| at.index < t.len());
            let (to_exists, from_exists) = (exists(to), exists(from));
            if !to_exists {
                return Err(XpError::MalformedTopology(format!(
                    "tree {}: edge {} -> {} targets a missing node",
                    self.id, from, to
                )));
            }
            if from.tier >= to.tier {
                return Err(XpError::MalformedTopology(format!(
                    "tree {}: edge {} -> {} does not point to a higher tier",
                    self.id, from, to
                )));
            }
            if !from_exists {
                return Err(XpError::MalformedTopology(format!(
                    "tree {}: prerequisite {} of {} does not exist",
                    self.id, from, to
                )));
            }
            tiers[to.tier][to.index].prerequisites.push(from);
        }

        Ok(ProgressionTree {
            id: self.id,
            name: self.name,
            unlocked_tier: 0,
            tiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievement::AchievementDef;
    use crate::catalog::{CatalogEntry, RecipeCatalog};

    fn registry(n: u16) -> AchievementRegistry {
        let mut registry = AchievementRegistry::new();
        for id in 0..n {
            registry.register(AchievementDef::new(id)).unwrap();
        }
        registry
    }

    /// tier 0: A(#0); tier 1: B(#1) requires A
    fn two_tier(registry: &AchievementRegistry) -> ProgressionTree {
        let mut builder = TreeBuilder::new(0, "game_tree0", 2);
        let a = builder.add_node(0, AchievementId(0));
        let b = builder.add_node(1, AchievementId(1));
        builder.add_edge(a, b);
        builder.build(registry).unwrap()
    }

    #[test]
    fn test_initial_validation_unlocks_tier_zero() {
        let registry = registry(2);
        let mut catalog = RecipeCatalog::from_entries(vec![CatalogEntry::new(10, "Toast", &[0])]);
        let mut tree = two_tier(&registry);

        let released = tree.validate(&registry, &mut catalog).unwrap();

        assert_eq!(tree.unlocked_tier(), 0);
        assert!(tree.node(NodeRef::new(0, 0)).unwrap().is_reachable());
        assert!(!tree.node(NodeRef::new(1, 0)).unwrap().is_reachable());
        assert_eq!(released, BTreeSet::from([10]));
    }

    #[test]
    fn test_activation_advances_tier() {
        let mut registry = registry(2);
        let mut catalog = RecipeCatalog::new();
        let mut tree = two_tier(&registry);

        registry.mark_active(AchievementId(0)).unwrap();
        tree.validate(&registry, &mut catalog).unwrap();

        let a = tree.node(NodeRef::new(0, 0)).unwrap();
        let b = tree.node(NodeRef::new(1, 0)).unwrap();
        assert_eq!(tree.unlocked_tier(), 1);
        assert!(a.is_active());
        assert_eq!(a.state(), NodeState::Activated);
        assert!(b.is_reachable());
        assert_eq!(b.state(), NodeState::Unlocked);
    }

    #[test]
    fn test_gap_freezes_advancement() {
        let mut registry = registry(3);
        let mut catalog = RecipeCatalog::new();
        let mut builder = TreeBuilder::new(1, "gap", 3);
        builder.add_node(0, AchievementId(0));
        builder.add_node(1, AchievementId(1));
        builder.add_node(2, AchievementId(2));
        let mut tree = builder.build(&registry).unwrap();

        registry.mark_active(AchievementId(0)).unwrap();
        registry.mark_active(AchievementId(2)).unwrap();
        tree.validate(&registry, &mut catalog).unwrap();

        assert_eq!(tree.unlocked_tier(), 1);
        // Tier 2 is past the ceiling even though its own box is active
        let third = tree.node(NodeRef::new(2, 0)).unwrap();
        assert!(third.is_active());
        assert!(!third.is_reachable());
    }

    #[test]
    fn test_unsatisfied_prerequisite_stays_locked() {
        let mut registry = registry(4);
        let mut catalog = RecipeCatalog::new();
        let mut builder = TreeBuilder::new(2, "branches", 2);
        let a = builder.add_node(0, AchievementId(0));
        let b = builder.add_node(0, AchievementId(1));
        let c = builder.add_node(1, AchievementId(2));
        let d = builder.add_node(1, AchievementId(3));
        builder.add_edge(a, c).add_edge(b, d);
        let mut tree = builder.build(&registry).unwrap();

        registry.mark_active(AchievementId(0)).unwrap();
        tree.validate(&registry, &mut catalog).unwrap();

        assert_eq!(tree.unlocked_tier(), 1);
        assert!(tree.node(c).unwrap().is_reachable());
        assert!(!tree.node(d).unwrap().is_reachable());
        assert_eq!(tree.node(d).unwrap().state(), NodeState::Locked);
    }

    #[test]
    fn test_any_prerequisite_suffices() {
        let mut registry = registry(3);
        let mut catalog = RecipeCatalog::new();
        let mut builder = TreeBuilder::new(0, "join", 2);
        let a = builder.add_node(0, AchievementId(0));
        let b = builder.add_node(0, AchievementId(1));
        let c = builder.add_node(1, AchievementId(2));
        builder.add_edge(a, c).add_edge(b, c);
        let mut tree = builder.build(&registry).unwrap();

        registry.mark_active(AchievementId(1)).unwrap();
        tree.validate(&registry, &mut catalog).unwrap();
        assert!(tree.node(c).unwrap().is_reachable());
    }

    #[test]
    fn test_backward_edge_rejected() {
        let registry = registry(2);
        let mut builder = TreeBuilder::new(0, "bad", 2);
        let a = builder.add_node(0, AchievementId(0));
        let b = builder.add_node(1, AchievementId(1));
        builder.add_edge(b, a);

        let err = builder.build(&registry).unwrap_err();
        assert!(matches!(err, XpError::MalformedTopology(_)));
    }

    #[test]
    fn test_same_tier_edge_rejected() {
        let registry = registry(2);
        let mut builder = TreeBuilder::new(0, "flat", 2);
        let a = builder.add_node(0, AchievementId(0));
        let b = builder.add_node(0, AchievementId(1));
        builder.add_edge(a, b);
        assert!(matches!(
            builder.build(&registry),
            Err(XpError::MalformedTopology(_))
        ));
    }

    #[test]
    fn test_missing_prerequisite_rejected() {
        let registry = registry(2);
        let mut builder = TreeBuilder::new(0, "dangling", 2);
        let b = builder.add_node(1, AchievementId(1));
        builder.add_edge(NodeRef::new(0, 3), b);
        assert!(matches!(
            builder.build(&registry),
            Err(XpError::MalformedTopology(_))
        ));
    }

    #[test]
    fn test_edge_to_missing_node_rejected() {
        let registry = registry(2);
        let mut builder = TreeBuilder::new(0, "dangling", 2);
        let a = builder.add_node(0, AchievementId(0));
        builder.add_edge(a, NodeRef::new(1, 0));
        assert!(matches!(
            builder.build(&registry),
            Err(XpError::MalformedTopology(_))
        ));
    }

    #[test]
    fn test_tier_beyond_height_rejected() {
        let registry = registry(1);
        let mut builder = TreeBuilder::new(0, "short", 1);
        builder.add_node(1, AchievementId(0));
        assert!(matches!(
            builder.build(&registry),
            Err(XpError::MalformedTopology(_))
        ));
    }

    #[test]
    fn test_unknown_achievement_rejected() {
        let registry = registry(1);
        let mut builder = TreeBuilder::new(0, "unknown", 2);
        builder.add_node(0, AchievementId(5));
        assert!(matches!(
            builder.build(&registry),
            Err(XpError::AchievementNotFound(AchievementId(5)))
        ));
    }
}
