#[tokio::main]
async fn main() -> anyhow::Result<()> {
    affect_lamp_lib::run().await
}
