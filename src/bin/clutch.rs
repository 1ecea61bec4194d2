#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clutch::command::run().await
}
