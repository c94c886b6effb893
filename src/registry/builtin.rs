//! Built-in target table for the Flux network and Flux AI services.

use super::ProbeTarget;
use crate::config::ServerConfig;

use serde_json::json;

/// All built-in probe targets.
pub fn builtin_targets(cfg: &ServerConfig) -> Vec<ProbeTarget> {
    let network = cfg.network_url.as_str();
    let explorer = cfg.explorer_url.as_str();
    let stats = cfg.stats_url.as_str();
    let ai = cfg.ai_url.as_str();

    vec![
        // Network daemon
        ProbeTarget::get("Node Count", network, "/daemon/getnodecount", "daemon-node-count")
            .with_description("Number of FluxNodes by tier"),
        ProbeTarget::get("Network Info", network, "/daemon/getinfo", "daemon-info")
            .with_description("Daemon chain and peer information"),
        ProbeTarget::get("Applications", network, "/apps/globalappslist", "app-list")
            .with_description("Globally deployed applications"),
        // Explorer
        ProbeTarget::get("Explorer Stats", explorer, "/stats", "explorer-stats")
            .with_description("Block explorer statistics"),
        ProbeTarget::get("Explorer Transactions", explorer, "/txs?limit=20", "transaction-list")
            .with_description("Latest transactions seen by the explorer"),
        // Stats service
        ProbeTarget::get("FluxNode Stats", stats, "/fluxnodes", "stats-nodes")
            .with_description("Node statistics service"),
        // AI services
        ProbeTarget::get("FluxGPT", ai, "/v1/chat/completions", "chat-completion")
            .with_description("Chat with the most advanced AI models")
            .with_auth()
            .with_post(json!({
                "messages": [{ "role": "user", "content": "Hello, test connection" }]
            })),
        ProbeTarget::get("FluxGPT Stream", ai, "/v1/chat/completions", "chat-completion")
            .with_description("Streaming chat completions")
            .with_auth()
            .with_post(json!({
                "messages": [{ "role": "user", "content": "Hello, test streaming" }],
                "stream": true
            })),
        ProbeTarget::get("FluxINTEL", ai, "/v1/chat/files", "document-files")
            .with_description("Chat with your documents")
            .with_auth(),
        ProbeTarget::get("FluxONE", ai, "/v1/images/generations", "image-generation")
            .with_description("Create AI images in seconds")
            .with_auth()
            .with_post(json!({ "prompt": "A test image", "model": "flux-1-schnell" })),
        ProbeTarget::get("Models", ai, "/v1/models", "model-list")
            .with_description("Models offered by the AI provider")
            .with_auth(),
    ]
}

/// Built-in groups, keyed by the name used in `/health-aggregate/{group}`.
pub const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    ("network", &["Node Count", "Network Info", "Applications"]),
    ("explorer", &["Explorer Stats", "Explorer Transactions"]),
    ("stats", &["FluxNode Stats"]),
    ("ai-services", &["FluxGPT", "FluxGPT Stream", "FluxINTEL", "FluxONE", "Models"]),
    (
        "infrastructure",
        &[
            "Node Count",
            "Network Info",
            "Applications",
            "Explorer Stats",
            "Explorer Transactions",
            "FluxNode Stats",
        ],
    ),
];
