//! Topology files and construction-time checks.

use cookingxp_shared::config::EngineConfig;
use cookingxp_shared::{
    AchievementId, ErrorKind, MemoryPrefs, NodeRef, ProgressionEngine, RecipeCatalog, TopologyDef,
    XpError,
};
use std::fs;
use tempfile::tempdir;

const DESSERTS: &str = r#"
[[achievements]]
id = 40
title = "game_box_title40"

[[achievements]]
id = 41

[[achievements]]
id = 42

[[trees]]
id = 3
name = "game_tree_desserts"

[[trees.nodes]]
tier = 0
achievement = 40

[[trees.nodes]]
tier = 1
achievement = 41
requires = [{ tier = 0, index = 0 }]

[[trees.nodes]]
tier = 2
achievement = 42
requires = [{ tier = 1, index = 0 }]
"#;

fn engine_for(topology: &TopologyDef) -> Result<ProgressionEngine, XpError> {
    ProgressionEngine::new(
        topology,
        &EngineConfig::default(),
        RecipeCatalog::new(),
        MemoryPrefs::new(),
    )
}

#[test]
fn test_engine_from_topology_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("topology.toml");
    fs::write(&path, DESSERTS).unwrap();

    let topology = TopologyDef::from_file(&path).unwrap();
    let engine = engine_for(&topology).unwrap();

    engine.record_completion(AchievementId(40)).unwrap();
    engine.record_completion(AchievementId(41)).unwrap();

    let tree = engine.tree(3).unwrap();
    assert_eq!(tree.height(), 4);
    assert_eq!(tree.unlocked_tier(), 2);
    assert!(tree.node(NodeRef::new(2, 0)).unwrap().is_reachable());
    assert_eq!(engine.achievement(AchievementId(40)).unwrap().title, "game_box_title40");
}

#[test]
fn test_backward_edge_in_file_rejected() {
    let bad = DESSERTS.replace(
        "requires = [{ tier = 1, index = 0 }]",
        "requires = [{ tier = 2, index = 0 }]",
    );
    let topology = TopologyDef::from_toml_str(&bad).unwrap();
    let err = engine_for(&topology).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MalformedTopology);
}

#[test]
fn test_duplicate_achievement_rejected() {
    let mut topology = TopologyDef::from_toml_str(DESSERTS).unwrap();
    topology.achievements.push(topology.achievements[0].clone());
    let err = engine_for(&topology).err().unwrap();
    assert!(matches!(err, XpError::DuplicateAchievement(AchievementId(40))));
}

#[test]
fn test_node_for_unregistered_achievement_rejected() {
    let mut topology = TopologyDef::from_toml_str(DESSERTS).unwrap();
    topology.achievements.retain(|a| a.id != AchievementId(42));
    let err = engine_for(&topology).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_unparsable_topology_file() {
    let err = TopologyDef::from_toml_str("[[trees]]\nid = \"zero\"\n").unwrap_err();
    assert!(matches!(err, XpError::Toml(_)));
}

#[test]
fn test_empty_topology_is_valid() {
    let engine = engine_for(&TopologyDef {
        achievements: Vec::new(),
        trees: Vec::new(),
    })
    .unwrap();
    assert!(engine.trees().is_empty());
    assert!(engine.validate_all().unwrap().is_empty());
}
