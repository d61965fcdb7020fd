use super::{Session, finish};

/// Print the template as JSON. Generated outbound IP references are still
/// recorded on the cluster.
pub async fn handle(session: &Session) -> anyhow::Result<()> {
    let mut manager = session.manager().await?;
    let result = manager.build_base_resources().await;

    let template = match result {
        Ok(template) => template,
        Err(err) => return finish(manager, Err(err)).await,
    };
    finish(manager, Ok(())).await?;

    println!("{}", serde_json::to_string_pretty(&template)?);
    Ok(())
}
