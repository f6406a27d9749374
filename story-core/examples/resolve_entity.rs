//! Resolve a name against the knowledge service and print the ranked matches.
//!
//! Usage: `cargo run -p story-core --example resolve_entity -- "Wendy" character`
//!
//! Set KNOWLEDGE_MOCK_MODE=true to run against offline data.

use story_core::{logging, KnowledgeClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    logging::init(std::env::var("VERBOSE").is_ok());

    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "dragon".to_string());
    let entity_type = args.next();

    let client = KnowledgeClient::from_env()?;
    println!("=== Resolving '{name}' ===");
    if client.is_mock() {
        println!("(mock mode)");
    }

    match client.check_health().await {
        Some(health) => println!("Service status: {}", health.status),
        None => println!("Service status: unreachable"),
    }

    let matches = client.resolve(&name, entity_type.as_deref()).await;
    if matches.is_empty() {
        println!("\nNo candidates found.");
        return Ok(());
    }

    println!();
    for m in &matches {
        let flag = if m.is_exact_match {
            "exact"
        } else if client.scorer().should_require_confirmation(m) {
            "confirm"
        } else {
            "accept"
        };
        println!(
            "[{flag:>7}] {:<24} {:<10} confidence {:.2}  {}",
            m.entity.name, m.entity.entity_type, m.confidence, m.rationale
        );
    }

    if let Some(best) = client.scorer().best_match(&matches) {
        println!("\nBest match: {}", best.entity.name);
    }
    Ok(())
}
