// 命令行参数定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// 脊柱健康助手命令行参数
#[derive(Parser, Debug)]
#[command(name = "spine-advisor", version)]
#[command(about = "脊柱健康助手：记录症状与影像，由 AI 给出分析并追踪病情变化")]
pub struct Cli {
    /// 配置文件路径（默认在数据目录下）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 数据目录，覆盖配置文件中的设置
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 日志级别或过滤规则，例如 debug、spine_advisor_lib=trace
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// 交互模式（默认）
    Shell,

    /// 执行一次分析并保存结果
    Analyze {
        /// 症状描述
        #[arg(short, long, default_value = "")]
        symptoms: String,

        /// 疼痛等级 0-10
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=10))]
        pain: Option<u8>,

        /// 影像文件（png/jpg/jpeg/bmp）
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// 分析完成后导出 Markdown 报告
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// 查看就诊历史（最新的在前）
    History {
        /// 只显示最近 N 条
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// 查看病情动态统计与图表数据
    Dynamics,

    /// 查看或修改患者档案
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },

    /// 清空全部就诊历史
    Clear {
        /// 确认删除
        #[arg(long)]
        yes: bool,
    },

    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ProfileAction {
    /// 显示档案
    Show,
    /// 修改一个字段（name/age/height/weight/diagnosis/history）
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// 显示配置（API key 已隐藏）
    Show,
    /// 修改一个配置项
    Set { key: String, value: String },
}
