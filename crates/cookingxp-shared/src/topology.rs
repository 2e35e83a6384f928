//! Topology definitions: which achievements exist and how trees are laid out.
//!
//! The built-in cooking topology has 20 achievements over two trees. Box 3
//! sits in tier 1 of the first tree and tier 0 of the second, so earning it
//! advances both.

use crate::achievement::{AchievementDef, AchievementId, AchievementRegistry};
use crate::error::{Result, XpError};
use crate::tree::{NodeRef, ProgressionTree, TreeBuilder, TreeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Number of achievements in the built-in topology
pub const NUM_OF_ACHIEVEMENTS: u16 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    pub tier: usize,
    pub achievement: AchievementId,
    /// Prerequisites, addressed by tier and position within that tier
    #[serde(default)]
    pub requires: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDef {
    pub id: TreeId,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDef {
    #[serde(default)]
    pub achievements: Vec<AchievementDef>,
    #[serde(default)]
    pub trees: Vec<TreeDef>,
}

impl Default for TopologyDef {
    fn default() -> Self {
        Self::cooking()
    }
}

fn node(tier: usize, achievement: u16, requires: &[(usize, usize)]) -> NodeDef {
    NodeDef {
        tier,
        achievement: AchievementId(achievement),
        requires: requires.iter().map(|&(t, i)| NodeRef::new(t, i)).collect(),
    }
}

impl TopologyDef {
    /// The built-in topology
    pub fn cooking() -> Self {
        let achievements = (0..NUM_OF_ACHIEVEMENTS).map(AchievementDef::new).collect();

        let tree0 = TreeDef {
            id: 0,
            name: "game_tree0".to_string(),
            nodes: vec![
                node(0, 0, &[]),
                node(0, 1, &[]),
                node(0, 2, &[]),
                node(1, 3, &[(0, 0)]),
                node(1, 4, &[(0, 0), (0, 1)]),
                node(1, 5, &[(0, 2)]),
                node(2, 6, &[]),
                node(2, 7, &[]),
                node(2, 8, &[(1, 2)]),
                node(3, 9, &[]),
                node(3, 10, &[]),
            ],
        };

        let tree1 = TreeDef {
            id: 1,
            name: "game_tree1".to_string(),
            nodes: vec![
                node(0, 11, &[]),
                node(0, 3, &[]),
                node(0, 12, &[]),
                node(1, 13, &[]),
                node(1, 14, &[(0, 1)]),
                node(1, 15, &[]),
                node(2, 16, &[]),
                node(2, 17, &[]),
                node(3, 18, &[(2, 0)]),
                node(3, 19, &[(2, 1)]),
            ],
        };

        Self {
            achievements,
            trees: vec![tree0, tree1],
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Register every achievement and assemble every tree with `height` tiers.
    pub fn build(
        &self,
        height: usize,
    ) -> Result<(AchievementRegistry, BTreeMap<TreeId, ProgressionTree>)> {
        let mut registry = AchievementRegistry::new();
        for def in &self.achievements {
            registry.register(def.clone())?;
        }

        let mut trees = BTreeMap::new();
        for tree_def in &self.trees {
            if trees.contains_key(&tree_def.id) {
                return Err(XpError::DuplicateTree(tree_def.id));
            }

            let mut builder = TreeBuilder::new(tree_def.id, &tree_def.name, height);
            let refs: Vec<NodeRef> = tree_def
                .nodes
                .iter()
                .map(|n| builder.add_node(n.tier, n.achievement))
                .collect();
            for (node_def, to) in tree_def.nodes.iter().zip(refs) {
                for from in &node_def.requires {
                    builder.add_edge(*from, to);
                }
            }

            trees.insert(tree_def.id, builder.build(&registry)?);
        }

        Ok((registry, trees))
    }
}
