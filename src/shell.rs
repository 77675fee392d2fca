// 交互式 shell - 同时等待用户输入和后台分析结果

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::analysis::AnalysisOutcome;
use crate::app::AppState;
use crate::commands;
use crate::session::Session;

const HELP: &str = "\
可用命令:
  symptoms <文本>          填写症状描述
  pain <0-10|none>         设置疼痛等级
  image <路径|none>        选择影像文件（png/jpg/jpeg/bmp）
  draft                    查看当前填写的内容
  analyze                  提交 AI 分析
  result                   查看最近一次分析结果
  history [n]              查看就诊历史（最新的在前）
  dynamics                 查看病情动态
  profile                  查看档案
  profile set <字段> <值>  修改档案（name/age/height/weight/diagnosis/history）
  clear                    清空全部就诊历史（需要确认）
  report <路径>            导出 Markdown 报告
  config                   查看配置
  config set <键> <值>     修改配置
  help                     显示本帮助
  quit                     退出";

/// shell 命令
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Symptoms(String),
    Pain(String),
    Image(String),
    Draft,
    Analyze,
    Result,
    History(Option<usize>),
    Dynamics,
    Profile,
    ProfileSet { key: String, value: String },
    Clear,
    Report(PathBuf),
    Config,
    ConfigSet { key: String, value: String },
    Help,
    Quit,
}

/// 把 "set key value..." 拆成键和值，值可以包含空格
fn split_key_value(rest: &str, usage: &str) -> Result<(String, String), String> {
    let rest = rest.trim();
    let (key, value) = rest
        .split_once(char::is_whitespace)
        .map(|(k, v)| (k, v.trim()))
        .unwrap_or((rest, ""));
    if key.is_empty() {
        return Err(format!("用法: {}", usage));
    }
    Ok((key.to_string(), value.to_string()))
}

impl ShellCommand {
    /// 解析一行输入，空行返回 None
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, rest) = line
            .split_once(char::is_whitespace)
            .map(|(n, r)| (n, r.trim()))
            .unwrap_or((line, ""));

        let command = match name.to_lowercase().as_str() {
            "symptoms" | "s" => Self::Symptoms(rest.to_string()),
            "pain" | "p" => {
                if rest.is_empty() {
                    return Err("用法: pain <0-10|none>".to_string());
                }
                Self::Pain(rest.to_string())
            }
            "image" | "i" => {
                if rest.is_empty() {
                    return Err("用法: image <路径|none>".to_string());
                }
                Self::Image(rest.to_string())
            }
            "draft" => Self::Draft,
            "analyze" | "a" => Self::Analyze,
            "result" => Self::Result,
            "history" | "h" => {
                if rest.is_empty() {
                    Self::History(None)
                } else {
                    let n = rest
                        .parse::<usize>()
                        .map_err(|_| format!("history 的参数必须是正整数: {}", rest))?;
                    Self::History(Some(n))
                }
            }
            "dynamics" | "d" => Self::Dynamics,
            "profile" => match rest.split_once(char::is_whitespace) {
                None if rest.is_empty() || rest == "show" => Self::Profile,
                Some(("set", kv)) => {
                    let (key, value) = split_key_value(kv, "profile set <字段> <值>")?;
                    Self::ProfileSet { key, value }
                }
                _ => return Err("用法: profile [set <字段> <值>]".to_string()),
            },
            "clear" => Self::Clear,
            "report" => {
                if rest.is_empty() {
                    return Err("用法: report <路径>".to_string());
                }
                Self::Report(PathBuf::from(rest))
            }
            "config" => match rest.split_once(char::is_whitespace) {
                None if rest.is_empty() || rest == "show" => Self::Config,
                Some(("set", kv)) => {
                    let (key, value) = split_key_value(kv, "config set <键> <值>")?;
                    Self::ConfigSet { key, value }
                }
                _ => return Err("用法: config [set <键> <值>]".to_string()),
            },
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("未知命令: {}（输入 help 查看帮助）", other)),
        };

        Ok(Some(command))
    }
}

fn is_confirmation(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "是")
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_reply(reply: Result<String, String>) {
    match reply {
        Ok(text) => println!("{}", text),
        Err(e) => println!("❌ {}", e),
    }
}

/// 交互循环状态
struct Shell<'a> {
    state: &'a AppState,
    session: Session,
    awaiting_clear_confirmation: bool,
}

impl<'a> Shell<'a> {
    /// 处理一行输入，返回 false 表示退出
    async fn handle_line(&mut self, line: &str) -> bool {
        if self.awaiting_clear_confirmation {
            self.awaiting_clear_confirmation = false;
            if is_confirmation(line) {
                print_reply(commands::clear_history(&mut self.session));
            } else {
                println!("已取消");
            }
            return true;
        }

        let command = match ShellCommand::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                println!("❌ {}", e);
                return true;
            }
        };
        debug!("shell 命令: {:?}", command);

        let session = &mut self.session;
        let reply = match command {
            ShellCommand::Symptoms(text) => Ok(commands::set_symptoms(session, &text)),
            ShellCommand::Pain(value) => commands::set_pain(session, &value),
            ShellCommand::Image(value) => commands::set_image(session, &value),
            ShellCommand::Draft => Ok(commands::show_draft(session)),
            ShellCommand::Analyze => commands::start_analysis(session, &self.state.dispatcher),
            ShellCommand::Result => commands::show_last_result(session),
            ShellCommand::History(limit) => Ok(commands::list_history(session, limit)),
            ShellCommand::Dynamics => Ok(commands::show_dynamics(session)),
            ShellCommand::Profile => Ok(commands::show_profile(session)),
            ShellCommand::ProfileSet { key, value } => {
                commands::update_profile(session, &key, &value)
            }
            ShellCommand::Clear => {
                if session.history().is_empty() {
                    Ok("历史为空，无需清除".to_string())
                } else {
                    self.awaiting_clear_confirmation = true;
                    Ok(format!(
                        "确定要删除全部 {} 条就诊记录吗？输入 yes 确认，其他任意输入取消",
                        session.history().len()
                    ))
                }
            }
            ShellCommand::Report(path) => commands::export_markdown_report(session, &path),
            ShellCommand::Config => commands::get_app_config(&self.state.settings).await,
            ShellCommand::ConfigSet { key, value } => {
                commands::update_config(
                    &self.state.settings,
                    Some(&self.state.llm_handle),
                    &key,
                    &value,
                )
                .await
            }
            ShellCommand::Help => Ok(HELP.to_string()),
            ShellCommand::Quit => return false,
        };

        print_reply(reply);
        true
    }

    fn handle_outcome(&mut self, outcome: AnalysisOutcome) {
        println!();
        print_reply(commands::finish_analysis(&mut self.session, outcome));
    }
}

/// 运行交互式 shell，直到用户退出或输入结束
pub async fn run_shell(
    state: &AppState,
    session: Session,
    mut outcomes: mpsc::Receiver<AnalysisOutcome>,
) -> Result<()> {
    info!("进入交互模式");
    println!("脊柱健康助手 - 输入 help 查看命令");

    let mut shell = Shell {
        state,
        session,
        awaiting_clear_confirmation: false,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !shell.handle_line(&line).await {
                    break;
                }
            }
            Some(outcome) = outcomes.recv() => {
                shell.handle_outcome(outcome);
            }
        }
        print_prompt();
    }

    if state.dispatcher.is_busy() {
        println!("分析仍在进行，结果将不会保存");
    }
    info!("退出交互模式");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("   ").unwrap(), None);
        assert_eq!(
            ShellCommand::parse("symptoms 右侧腰部 酸痛").unwrap(),
            Some(ShellCommand::Symptoms("右侧腰部 酸痛".to_string()))
        );
        assert_eq!(
            ShellCommand::parse("pain 5").unwrap(),
            Some(ShellCommand::Pain("5".to_string()))
        );
        assert_eq!(
            ShellCommand::parse("history 3").unwrap(),
            Some(ShellCommand::History(Some(3)))
        );
        assert_eq!(
            ShellCommand::parse("ANALYZE").unwrap(),
            Some(ShellCommand::Analyze)
        );
        assert_eq!(ShellCommand::parse("quit").unwrap(), Some(ShellCommand::Quit));
    }

    #[test]
    fn test_parse_set_commands() {
        assert_eq!(
            ShellCommand::parse("profile set history 2019 年腰椎间盘突出").unwrap(),
            Some(ShellCommand::ProfileSet {
                key: "history".to_string(),
                value: "2019 年腰椎间盘突出".to_string(),
            })
        );
        assert_eq!(
            ShellCommand::parse("config set proxy").unwrap(),
            Some(ShellCommand::ConfigSet {
                key: "proxy".to_string(),
                value: String::new(),
            })
        );
        assert_eq!(ShellCommand::parse("profile").unwrap(), Some(ShellCommand::Profile));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ShellCommand::parse("pain").is_err());
        assert!(ShellCommand::parse("history abc").is_err());
        assert!(ShellCommand::parse("report").is_err());
        assert!(ShellCommand::parse("profile delete").is_err());
        assert!(ShellCommand::parse("dance").is_err());
    }

    #[test]
    fn test_confirmation() {
        assert!(is_confirmation("yes"));
        assert!(is_confirmation(" Y "));
        assert!(!is_confirmation("no"));
        assert!(!is_confirmation(""));
    }
}
