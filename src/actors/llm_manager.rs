// LLM Manager Actor - 使用Actor模式管理LLM状态
//
// 用消息传递替代锁机制，消除Arc<Mutex<LLMManager>>的锁竞争

use crate::llm::{ImageAttachment, LLMConfig, LLMManager};
use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

/// LLM管理器命令
pub enum LLMCommand {
    /// 应用新的LLM配置
    Configure {
        config: LLMConfig,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 发送诊断请求
    Diagnose {
        prompt: String,
        image: Option<ImageAttachment>,
        reply: oneshot::Sender<Result<String>>,
    },

    /// 健康检查（Ping）
    HealthCheck { reply: oneshot::Sender<()> },
}

/// LLM Manager Actor（无需外层Mutex）
pub struct LLMManagerActor {
    receiver: mpsc::Receiver<LLMCommand>,
    manager: LLMManager, // 直接持有，无需锁
}

impl LLMManagerActor {
    /// 创建新的Actor
    pub fn new(manager: LLMManager) -> (Self, LLMHandle) {
        let (sender, receiver) = mpsc::channel(32);
        let actor = Self { receiver, manager };
        let handle = LLMHandle { sender };
        (actor, handle)
    }

    /// 运行Actor（在单独的任务中运行）
    pub async fn run(mut self) {
        tracing::info!("LLM Manager Actor 已启动");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LLMCommand::Configure { config, reply } => {
                    let result = self.manager.configure(config);
                    let _ = reply.send(result);
                }

                LLMCommand::Diagnose {
                    prompt,
                    image,
                    reply,
                } => {
                    let result = self.manager.diagnose(&prompt, image.as_ref()).await;
                    let _ = reply.send(result);
                }

                LLMCommand::HealthCheck { reply } => {
                    // 立即响应，表明Actor正常运行
                    let _ = reply.send(());
                }
            }
        }

        tracing::info!("LLM Manager Actor 已停止");
    }
}

/// LLM Handle（用于与Actor通信，可克隆）
#[derive(Clone)]
pub struct LLMHandle {
    sender: mpsc::Sender<LLMCommand>,
}

impl LLMHandle {
    /// 应用新的LLM配置
    pub async fn configure(&self, config: LLMConfig) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(LLMCommand::Configure { config, reply })
            .await
            .map_err(|_| anyhow::anyhow!("Actor通道已关闭"))?;
        rx.await.map_err(|_| anyhow::anyhow!("Actor已停止"))?
    }

    /// 发送诊断请求，返回模型原始输出
    pub async fn diagnose(&self, prompt: String, image: Option<ImageAttachment>) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(LLMCommand::Diagnose {
                prompt,
                image,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Actor通道已关闭"))?;
        rx.await.map_err(|_| anyhow::anyhow!("Actor已停止"))?
    }

    /// 健康检查
    /// 返回true表示Actor正常运行，false表示Actor无响应或已停止
    /// 超时时间为5秒
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();

        if self
            .sender
            .send(LLMCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            tracing::warn!("LLM Manager Actor 健康检查失败: 通道已关闭");
            return false;
        }

        match tokio::time::timeout(std::time::Duration::from_secs(5), rx).await {
            Ok(Ok(())) => {
                tracing::debug!("LLM Manager Actor 健康检查成功");
                true
            }
            Ok(Err(_)) => {
                tracing::warn!("LLM Manager Actor 健康检查失败: Actor已停止");
                false
            }
            Err(_) => {
                tracing::warn!("LLM Manager Actor 健康检查失败: 超时(5秒)");
                false
            }
        }
    }
}
