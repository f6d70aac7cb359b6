//! One-shot acquisition from the command line, no server needed.

use crate::config::ForageConfig;
use crate::service::AcquisitionService;
use anyhow::Result;

pub async fn run(query: &str, source: Option<&str>, json: bool) -> Result<()> {
    let config = ForageConfig::from_env();
    let service = AcquisitionService::build(config).await?;

    let result = service.acquire(query, source).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "content": result.content,
                "origin": result.origin,
                "sessionId": result.session_id,
            }))?
        );
    } else {
        println!("{}", result.content);
        eprintln!();
        eprintln!("origin: {}", result.origin);
        if let Some(id) = &result.session_id {
            eprintln!("session: {id}");
        }
    }
    Ok(())
}
