use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    actionplan_cli::main_entry().await
}
