//! `memloop tools`: Show the tools the current configuration registers.

use memloop_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = memloop_tools::registry_from_config(&config.tools)?;

    println!();
    println!("  {} tools enabled:", registry.len());
    println!();
    for descriptor in registry.descriptors() {
        println!("  {:<24} {}", descriptor.name, descriptor.description);
    }
    println!();
    println!("  Timeout: {}s per call", config.tools.timeout_secs);
    if config.tools.cache_ttl_secs > 0 {
        println!("  Cache:   {}s TTL for cacheable tools", config.tools.cache_ttl_secs);
    }
    println!();

    Ok(())
}
