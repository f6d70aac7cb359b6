//! Environment readiness check.

use crate::config::ForageConfig;
use crate::fetch::FetchClient;
use crate::renderer::find_chromium;
use anyhow::Result;

/// Check browser availability, the knowledge endpoint, and snapshot storage.
pub async fn run() -> Result<()> {
    let config = ForageConfig::from_env();

    println!("Forage Doctor");
    println!("=============");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Browser: optional but preferred
    let chromium = find_chromium();
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Search and extraction will run over plain HTTP."
        ),
    }

    // Knowledge endpoint reachability
    let fetch = FetchClient::new(5_000);
    match fetch.get(&config.knowledge_url, 5_000).await {
        Ok(resp) if resp.status < 500 => {
            println!("[OK] Knowledge endpoint reachable: {}", config.knowledge_url)
        }
        Ok(resp) => println!(
            "[!!] Knowledge endpoint returned HTTP {}: {}",
            resp.status, config.knowledge_url
        ),
        Err(e) => println!(
            "[!!] Knowledge endpoint unreachable ({e}): {}",
            config.knowledge_url
        ),
    }

    // Snapshot directory writability
    match snapshot_dir_writable(&config) {
        Ok(()) => println!(
            "[OK] Snapshot directory writable: {}",
            config.snapshot_dir.display()
        ),
        Err(e) => println!(
            "[!!] Snapshot directory not writable ({e}): {}",
            config.snapshot_dir.display()
        ),
    }

    println!();
    // The fallback chain makes every configuration serviceable; the doctor
    // only distinguishes full capability from degraded.
    if chromium.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: DEGRADED (HTTP-only, no page rendering or snapshots)");
    }

    Ok(())
}

fn snapshot_dir_writable(config: &ForageConfig) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.snapshot_dir)?;
    let probe = config.snapshot_dir.join(".doctor-probe");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)?;
    Ok(())
}
