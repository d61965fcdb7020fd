use super::{Session, finish};
use colored::Colorize;

pub async fn handle(session: &Session) -> anyhow::Result<()> {
    println!("{}", "Installing base resources...".blue());

    let mut manager = session.manager().await?;
    let result = manager.install().await;
    finish(manager, result).await?;

    println!("{}", "✓ Base resources installed".green().bold());
    Ok(())
}
