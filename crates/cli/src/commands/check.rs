//! `eliza check`: load the rule set the way the gateway would and report.

use std::path::PathBuf;
use std::sync::Arc;

use eliza_config::AppConfig;
use eliza_engine::Conversation;

pub async fn run(
    script: Option<PathBuf>,
    packs: Vec<PathBuf>,
    say: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if script.is_some() {
        config.engine.script = script;
    }
    config.engine.packs.extend(packs);

    println!("ELIZA Rule Check");
    println!("================\n");

    let rules = match eliza_gateway::build_rules(&config.engine) {
        Ok(rules) => rules,
        Err(e) => {
            println!("  ❌ Rules failed to load: {e}");
            return Err(e.into());
        }
    };

    let rule_count: usize = rules
        .keywords()
        .map(|k| k.rules.len() + k.memory_rules.len())
        .sum();
    println!("  ✅ Rules valid");
    println!("  Keywords:        {}", rules.keyword_count());
    println!("  Decompositions:  {rule_count}");
    println!("  Synonym groups:  {}", rules.synonyms().len());
    println!("  Exact families:  {}", rules.exact_families().len());
    println!("  Default prompts: {}", rules.default_prompts().len());
    println!("  Digest:          {}", rules.digest());

    if !say.is_empty() {
        println!();
        let mut conversation = Conversation::new(Arc::new(rules))
            .with_memory_capacity(config.engine.memory_capacity)
            .with_max_words(config.engine.max_utterance_words);
        for utterance in &say {
            let turn = conversation.turn(utterance)?;
            println!("  > {utterance}");
            println!("  < {}    [{:?}]", turn.reply, turn.source);
        }
    }

    Ok(())
}
