//! Minimal failover demo: dispatch one prompt, watching switch and
//! circuit events as they happen.
//!
//! Requires at least one agent binary (`claude`, `gemini`, ...) on PATH:
//!
//! ```text
//! cargo run --example failover -- "summarize this repository"
//! ```

use agentmux::{Agentmux, Configuration, SendOptions};

#[tokio::main]
async fn main() -> agentmux::Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "say hello".to_string());

    let config = Configuration::builder()
        .provider("claude", |p| p)
        .provider("gemini", |p| p.priority(1))
        .provider("codex", |p| p.priority(2))
        .default_provider("claude")
        .fallback_providers(vec!["gemini".into()])
        .build()?;

    let mux = Agentmux::new(config)?;
    mux.on_provider_switch(|event| {
        eprintln!("switching {} -> {} ({})", event.from, event.to, event.reason);
    });
    mux.on_circuit_open(|provider| {
        eprintln!("circuit opened for {provider}");
    });

    let response = mux.send_message(&prompt, None, &SendOptions::default()).await?;
    println!("[{}] {}", response.provider, response.output);

    for (provider, totals) in mux.token_tracker().totals() {
        eprintln!("{provider}: {} tokens over {} requests", totals.total, totals.requests);
    }
    Ok(())
}
