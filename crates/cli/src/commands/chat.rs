//! `eliza chat`: interactive or single-message conversation.
//!
//! With `--session <id>` the conversation is loaded from and saved to the
//! configured session store after every turn, so a terminal chat and API
//! clients can continue the same dialogue.

use std::sync::Arc;

use eliza_config::AppConfig;
use eliza_core::{SessionId, SessionStore};
use eliza_engine::{Conversation, EngineError, RuleSet};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// A conversation plus where to persist it.
struct ChatSession {
    conversation: Conversation,
    persist: Option<(Arc<dyn SessionStore>, SessionId)>,
}

impl ChatSession {
    async fn open(
        config: &AppConfig,
        rules: Arc<RuleSet>,
        session: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let fresh = || {
            Conversation::new(rules.clone())
                .with_memory_capacity(config.engine.memory_capacity)
                .with_max_words(config.engine.max_utterance_words)
        };

        let Some(raw) = session else {
            return Ok(Self {
                conversation: fresh(),
                persist: None,
            });
        };

        let id = SessionId::parse(&raw)?;
        let store = eliza_gateway::open_store(config);
        let conversation = match store.load(&id).await? {
            Some(record) => match Conversation::from_bytes(&record.blob, rules.clone()) {
                Ok(restored) => restored.with_max_words(config.engine.max_utterance_words),
                Err(e) => {
                    warn!(session = %id, error = %e, "Stored session does not fit the current rules, starting over");
                    fresh()
                }
            },
            None => fresh(),
        };

        Ok(Self {
            conversation,
            persist: Some((store, id)),
        })
    }

    async fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some((store, id)) = &self.persist {
            store.save(id, self.conversation.to_bytes()?).await?;
        }
        Ok(())
    }
}

pub async fn run(
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let rules = Arc::new(eliza_gateway::build_rules(&config.engine)?);
    let mut chat = ChatSession::open(&config, rules, session).await?;

    if let Some(msg) = message {
        // Single message mode
        let reply = chat.conversation.respond(&msg)?;
        chat.save().await?;
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ELIZA, Interactive Mode");
    println!("  Type your message and press Enter. Say goodbye (or Ctrl+D) to quit.");
    if let Some((_, id)) = &chat.persist {
        println!("  Session:  {id}");
    }
    println!();

    if let Some(greeting) = chat.conversation.greeting() {
        println!("  ELIZA > {greeting}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You   > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let turn = match chat.conversation.turn(&line) {
            Ok(turn) => turn,
            Err(e @ EngineError::UtteranceTooLong { .. }) => {
                println!("  ({e})");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        chat.save().await?;
        println!("  ELIZA > {}", turn.reply);

        if turn.is_farewell() {
            break;
        }
    }

    Ok(())
}
