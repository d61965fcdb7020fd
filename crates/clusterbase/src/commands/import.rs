use super::Session;
use anyhow::Context;
use clusterbase_cloud::{Cluster, ClusterDocument};
use colored::Colorize;
use std::path::Path;

pub async fn handle(session: &Session, file: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let cluster: Cluster = serde_json::from_str(&content)
        .with_context(|| format!("invalid cluster document in {}", file.display()))?;

    let doc = ClusterDocument::new(cluster);
    session.store().create(&doc).await?;

    println!("{} Imported {}", "✓".green().bold(), doc.key.cyan());
    Ok(())
}
