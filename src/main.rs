use anyhow::Result;
use mindmap_batch::utils::logging;
use mindmap_batch::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(&config.log_level);

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    match std::env::args().nth(1).as_deref() {
        Some("serve") => app.serve().await?,
        None | Some("batch") => {
            app.run().await?;
        }
        Some(other) => anyhow::bail!("未知命令: {} (可用: batch, serve)", other),
    }

    Ok(())
}
