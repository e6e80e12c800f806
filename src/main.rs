#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meta_notes_lib::run().await?;
    Ok(())
}
