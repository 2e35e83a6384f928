//! Command handlers for xpctl.

use anyhow::{Context, Result};
use cookingxp_shared::{
    AchievementId, CatalogKey, JsonFilePrefs, NodeState, ProgressionEngine, RecipeCatalog,
    TopologyDef, XpConfig,
};
use owo_colors::OwoColorize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Load config, topology, catalog and preference file, then start the engine
pub fn open_engine(config_path: Option<&Path>) -> Result<ProgressionEngine> {
    let config = XpConfig::load(config_path)?;
    config.validate()?;

    let topology = match &config.content.topology_path {
        Some(path) => TopologyDef::from_file(path)
            .with_context(|| format!("Failed to load topology {}", path.display()))?,
        None => TopologyDef::cooking(),
    };

    let catalog = match &config.content.catalog_path {
        Some(path) => RecipeCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => RecipeCatalog::new(),
    };

    let state_path = config.state_path();
    info!("Using state file {}", state_path.display());
    let store = JsonFilePrefs::open(&state_path)
        .with_context(|| format!("Failed to open {}", state_path.display()))?;

    let engine = ProgressionEngine::new(&topology, &config.engine, catalog, store)
        .context("Failed to start progression engine")?;
    Ok(engine)
}

fn print_released(engine: &ProgressionEngine, released: &BTreeSet<CatalogKey>) {
    for entry in engine.lookup_entries(released) {
        println!("  {} {} unlocked!", "+".green(), entry.name.bold());
    }
}

fn state_label(state: NodeState) -> String {
    match state {
        NodeState::Activated => format!("{}", state.green()),
        NodeState::Unlocked => format!("{}", state.yellow()),
        NodeState::Locked => format!("{}", state.dimmed()),
    }
}

pub fn status(engine: &ProgressionEngine) -> Result<()> {
    println!();
    println!("{} {}", "score".bold(), engine.score());

    for tree in engine.trees() {
        println!();
        println!(
            "{} {}   unlocked tiers: {}/{}",
            "tree".bold(),
            tree.name(),
            tree.unlocked_tier(),
            tree.height()
        );
        for (tier_idx, tier) in tree.tiers().iter().enumerate() {
            let cells: Vec<String> = tier
                .iter()
                .map(|node| format!("#{} {}", node.achievement(), state_label(node.state())))
                .collect();
            println!("  tier {}  {}", tier_idx, cells.join("   "));
        }
    }
    println!();
    Ok(())
}

pub fn complete(engine: &ProgressionEngine, id: u16) -> Result<()> {
    let released = engine
        .record_completion(AchievementId(id))
        .with_context(|| format!("Cannot complete achievement {}", id))?;

    println!("Completed #{}   score {}", id, engine.score());
    print_released(engine, &released);
    Ok(())
}

pub fn reset(engine: &ProgressionEngine) -> Result<()> {
    engine.reset()?;
    println!("Progress cleared   score {}", engine.score());
    Ok(())
}

pub fn score(engine: &ProgressionEngine, set: Option<i64>) -> Result<()> {
    if let Some(value) = set {
        engine.set_score(value)?;
    }
    println!("{}", engine.score());
    Ok(())
}

pub fn export(engine: &ProgressionEngine) -> Result<()> {
    let state = engine.export_state();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

pub fn validate(engine: &ProgressionEngine) -> Result<()> {
    let released = engine.validate_all()?;
    if released.is_empty() {
        println!("Nothing new released");
    } else {
        print_released(engine, &released);
    }
    Ok(())
}
