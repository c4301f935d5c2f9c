mod display;
mod driver;
mod host;
mod transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
