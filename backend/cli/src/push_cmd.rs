//! Operator commands against a running gateway.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use pushcast_client::{HttpRegistryClient, RegistryEndpoint};
use pushcast_core::{DispatchReport, SubscriptionPayload};

use crate::api::PushApiClient;
use crate::terminal_output::{note_success, note_warn, render_report, render_table};

pub struct SendArgs {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub endpoint: Option<String>,
}

pub async fn send(api: &PushApiClient, args: SendArgs) -> Result<()> {
    let mut request = serde_json::Map::new();
    for (key, value) in [
        ("title", args.title),
        ("body", args.body),
        ("url", args.url),
        ("endpoint", args.endpoint),
    ] {
        if let Some(value) = value {
            request.insert(key.to_string(), Value::String(value));
        }
    }

    let report: DispatchReport = api.post("/send", &Value::Object(request)).await?;
    print!("{}", render_report(&report));
    if report.results.is_empty() {
        note_warn("No matching subscriptions");
    }
    Ok(())
}

pub async fn status(api: &PushApiClient, health_url: &str) -> Result<()> {
    let health: Value = api.get_url(health_url).await?;
    let debug: Value = api.get("/debug").await?;

    let sending = health.get("sending").and_then(Value::as_bool).unwrap_or(false);
    println!("Pushcast at {}", api.base_url());
    println!("  sending:       {}", if sending { "enabled" } else { "disabled (no VAPID keys)" });
    println!("  subscriptions: {}", debug["count"]);
    if let Some(latest) = debug.get("latest").and_then(Value::as_str) {
        println!("  last update:   {latest}");
    }

    let rows: Vec<Vec<String>> = debug["endpoints"]
        .as_array()
        .map(|eps| {
            eps.iter()
                .filter_map(Value::as_str)
                .map(|e| vec![e.to_string()])
                .collect()
        })
        .unwrap_or_default();
    if !rows.is_empty() {
        print!("\n{}", render_table(&["Endpoint"], &rows));
    }
    Ok(())
}

pub async fn public_key(api: &PushApiClient) -> Result<()> {
    let body: Value = api.get("/public-key").await?;
    match body.get("publicKey").and_then(Value::as_str) {
        Some(key) => {
            println!("{key}");
            Ok(())
        }
        None => bail!("Gateway response has no publicKey: {body}"),
    }
}

/// Register a subscription JSON file exported from a browser.
pub async fn subscribe(api: &PushApiClient, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let payload = SubscriptionPayload::new(value);
    let Some(endpoint) = payload.endpoint().map(str::to_string) else {
        bail!("{} has no endpoint field", file.display());
    };

    HttpRegistryClient::new(api.base_url())?.upsert(&payload).await?;
    note_success(&format!("Registered {endpoint}"));
    Ok(())
}

pub async fn unsubscribe(api: &PushApiClient, endpoint: &str) -> Result<()> {
    let body: Value = api.delete("/unsubscribe", &json!({ "endpoint": endpoint })).await?;
    if body["removed"].as_bool().unwrap_or(false) {
        note_success(&format!("Removed {endpoint}; {} subscriptions remain", body["count"]));
    } else {
        note_warn(&format!("{endpoint} was not registered"));
    }
    Ok(())
}
