//! item-service 入口

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    relay_bootstrap::run("config", item_service::router).await
}
