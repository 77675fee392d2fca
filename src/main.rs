// 脊柱健康助手 - 命令行入口

use clap::Parser;
use spine_advisor_lib::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    spine_advisor_lib::run(cli).await
}
