#[tokio::main]
async fn main() -> anyhow::Result<()> {
    facefocus::run().await
}
