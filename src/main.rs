#[tokio::main]
async fn main() -> anyhow::Result<()> {
    api_registry::run_server().await
}
