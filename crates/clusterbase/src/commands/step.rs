use super::{Session, finish};
use clusterbase::Step;
use colored::Colorize;

pub async fn handle(session: &Session, step: Step) -> anyhow::Result<()> {
    println!("Step: {}", step.to_string().cyan());

    let mut manager = session.manager().await?;
    let result = manager.run_step(step).await;
    finish(manager, result).await?;

    println!("{} {}", "✓".green().bold(), step);
    Ok(())
}
