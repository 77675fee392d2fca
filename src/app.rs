//! 应用程序初始化和启动
//!
//! 负责完整的启动流程，包括：
//! - 日志系统初始化
//! - 配置加载与数据目录确定
//! - LLM Actor 启动
//! - 分发到交互模式或一次性子命令

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{error, info};

use crate::actors::{LLMHandle, LLMManagerActor};
use crate::analysis::AnalysisDispatcher;
use crate::cli::{Cli, Command, ConfigAction, ProfileAction};
use crate::commands;
use crate::llm::LLMManager;
use crate::logger;
use crate::models::PersistedAppConfig;
use crate::session::Session;
use crate::settings::SettingsManager;
use crate::shell;
use crate::utils::{default_config_path, get_app_data_dir, get_log_dir, validate_image_path};

/// 需要调用 AI 的命令共享的状态
pub struct AppState {
    pub settings: Arc<SettingsManager>,
    pub llm_handle: LLMHandle,
    pub dispatcher: AnalysisDispatcher,
}

/// 启动 LLM Actor 并创建分析调度器
fn start_analysis_services(
    settings: Arc<SettingsManager>,
    config: &PersistedAppConfig,
) -> Result<(AppState, tokio::sync::mpsc::Receiver<crate::analysis::AnalysisOutcome>)> {
    let manager = LLMManager::new(config.llm_config.clone())
        .context("LLM 初始化失败，请检查 provider 与 proxy 配置")?;
    info!(
        "LLM provider: {}（已配置 API key: {}）",
        manager.provider_name(),
        manager.is_configured()
    );

    let (llm_actor, llm_handle) = LLMManagerActor::new(manager);
    tokio::spawn(llm_actor.run());

    let (dispatcher, outcomes) = AnalysisDispatcher::new(
        llm_handle.clone(),
        config.image_settings.clone(),
        config.repair_malformed_json,
    );

    Ok((
        AppState {
            settings,
            llm_handle,
            dispatcher,
        },
        outcomes,
    ))
}

/// 数据目录：命令行参数 > 配置文件 > 系统默认目录
fn resolve_data_dir(cli: &Cli, config: &PersistedAppConfig) -> PathBuf {
    cli.data_dir
        .clone()
        .or_else(|| config.data_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(get_app_data_dir)
}

fn into_anyhow(reply: Result<String, String>) -> Result<String> {
    reply.map_err(|e| anyhow!(e))
}

/// 应用程序入口
pub async fn run(cli: Cli) -> Result<()> {
    let _log_guard = logger::init(cli.log_level.as_deref(), &get_log_dir())?;
    info!("脊柱健康助手启动");

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let settings = Arc::new(SettingsManager::new(config_path).await?);
    let config = settings.get().await;

    let data_dir = resolve_data_dir(&cli, &config);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("创建数据目录失败: {:?}", data_dir))?;
    let mut session = Session::open(&data_dir, config.trend_policy);

    let command = cli.command.clone().unwrap_or(Command::Shell);
    let result = match command {
        Command::Shell => {
            let (state, outcomes) = start_analysis_services(settings, &config)?;
            if !state.llm_handle.health_check().await {
                bail!("LLM Manager Actor 无响应");
            }
            shell::run_shell(&state, session, outcomes).await
        }

        Command::Analyze {
            symptoms,
            pain,
            image,
            report,
        } => {
            let draft = session.draft_mut();
            draft.symptoms = symptoms.trim().to_string();
            draft.pain_level = pain;
            draft.image_path = match image {
                Some(path) => Some(
                    validate_image_path(&path.to_string_lossy()).map_err(|e| anyhow!(e))?,
                ),
                None => None,
            };

            let (state, mut outcomes) = start_analysis_services(settings, &config)?;
            eprintln!(
                "{}",
                into_anyhow(commands::start_analysis(&session, &state.dispatcher))?
            );

            let outcome = outcomes
                .recv()
                .await
                .ok_or_else(|| anyhow!("分析任务意外中止"))?;
            println!(
                "{}",
                into_anyhow(commands::finish_analysis(&mut session, outcome))?
            );

            if let Some(path) = report {
                println!(
                    "{}",
                    into_anyhow(commands::export_markdown_report(&session, &path))?
                );
            }
            Ok(())
        }

        Command::History { limit } => {
            println!("{}", commands::list_history(&session, limit));
            Ok(())
        }

        Command::Dynamics => {
            println!("{}", commands::show_dynamics(&session));
            Ok(())
        }

        Command::Profile { action } => {
            let reply = match action.unwrap_or(ProfileAction::Show) {
                ProfileAction::Show => Ok(commands::show_profile(&session)),
                ProfileAction::Set { key, value } => {
                    commands::update_profile(&mut session, &key, &value)
                }
            };
            println!("{}", into_anyhow(reply)?);
            Ok(())
        }

        Command::Clear { yes } => {
            if !yes {
                bail!(
                    "将删除全部 {} 条就诊记录，请加上 --yes 确认",
                    session.history().len()
                );
            }
            println!("{}", into_anyhow(commands::clear_history(&mut session))?);
            Ok(())
        }

        Command::Config { action } => {
            let reply = match action.unwrap_or(ConfigAction::Show) {
                ConfigAction::Show => commands::get_app_config(&settings).await,
                ConfigAction::Set { key, value } => {
                    commands::update_config(&settings, None, &key, &value).await
                }
            };
            println!("{}", into_anyhow(reply)?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("命令执行失败: {:#}", e);
    }
    result
}
