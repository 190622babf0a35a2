//! Assemble the shared rule set from `[engine]` configuration.

use eliza_config::EngineConfig;
use eliza_engine::{RulePack, RuleSet};
use tracing::{debug, info};

use crate::GatewayError;

/// Names accepted in `engine.builtin_packs`.
pub const BUILTIN_PACKS: &[&str] = &["zh"];

/// Look up a pack compiled into the binary.
pub fn builtin_pack(name: &str) -> Result<RulePack, GatewayError> {
    match name {
        "zh" => Ok(RulePack::chinese()?),
        other => Err(GatewayError::UnknownPack(other.to_string())),
    }
}

/// Load the base script, then merge built-in packs and pack files in order.
///
/// Every conversation the gateway creates shares the result.
pub fn build_rules(config: &EngineConfig) -> Result<RuleSet, GatewayError> {
    let mut rules = match &config.script {
        Some(path) => RuleSet::from_script_file(path).map_err(|source| GatewayError::RuleFile {
            path: path.clone(),
            source,
        })?,
        None => RuleSet::doctor()?,
    };

    for name in &config.builtin_packs {
        rules.merge(builtin_pack(name)?)?;
        debug!(pack = %name, "Built-in rule pack merged");
    }

    for path in &config.packs {
        RulePack::from_file(path)
            .and_then(|pack| rules.merge(pack))
            .map_err(|source| GatewayError::RuleFile {
                path: path.clone(),
                source,
            })?;
        debug!(pack = %path.display(), "Rule pack file merged");
    }

    info!(
        keywords = rules.keyword_count(),
        digest = %rules.digest(),
        "Rule set loaded"
    );
    Ok(rules)
}
