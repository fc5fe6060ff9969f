#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sellersight::run().await
}
