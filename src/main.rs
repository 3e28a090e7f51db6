#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tallygrade::run().await {
        eprintln!("tallygrade fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
