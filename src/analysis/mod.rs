//! 诊断分析模块
//!
//! 负责一次诊断请求的完整流程：
//! - 构建提示词（prompt）
//! - 在后台任务中预处理影像、调用 LLM、解析返回（AnalysisDispatcher）
//! - 通过队列把结果交回交互上下文写入历史

pub mod error;
pub mod gate;
pub mod parser;
pub mod prompt;

pub use error::AnalysisError;
pub use gate::{BusyGate, BusyGuard};
pub use parser::{parse_diagnosis, DiagnosisReport};
pub use prompt::build_prompt;

use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::actors::LLMHandle;
use crate::llm::prepare_image;
use crate::models::ImageSettings;

/// 一次分析请求（提示词已在交互上下文中构建好）
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub symptoms: String,
    pub pain_level: Option<u8>,
    pub image_path: Option<PathBuf>,
}

impl AnalysisRequest {
    /// 既没有症状也没有影像
    pub fn is_empty(&self) -> bool {
        self.symptoms.trim().is_empty() && self.image_path.is_none()
    }
}

/// 后台任务的结果，连同忙碌凭证一起交回
///
/// 凭证在交互上下文处理完结果后随本结构一起释放
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub symptoms: String,
    pub pain_level: Option<u8>,
    pub result: Result<DiagnosisReport, AnalysisError>,
    _guard: BusyGuard,
}

/// 分析调度器
#[derive(Clone)]
pub struct AnalysisDispatcher {
    llm: LLMHandle,
    gate: BusyGate,
    image_settings: ImageSettings,
    repair_malformed_json: bool,
    sender: mpsc::Sender<AnalysisOutcome>,
}

impl AnalysisDispatcher {
    /// 创建调度器，返回结果队列的接收端（由交互上下文持有）
    pub fn new(
        llm: LLMHandle,
        image_settings: ImageSettings,
        repair_malformed_json: bool,
    ) -> (Self, mpsc::Receiver<AnalysisOutcome>) {
        let (sender, receiver) = mpsc::channel(4);
        let dispatcher = Self {
            llm,
            gate: BusyGate::new(),
            image_settings,
            repair_malformed_json,
            sender,
        };
        (dispatcher, receiver)
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// 提交分析请求
    ///
    /// 输入为空或已有任务在进行时立即返回错误，不启动后台任务
    pub fn dispatch(&self, request: AnalysisRequest) -> Result<(), AnalysisError> {
        if request.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let guard = self.gate.try_acquire()?;

        let llm = self.llm.clone();
        let sender = self.sender.clone();
        let image_settings = self.image_settings.clone();
        let repair = self.repair_malformed_json;

        tokio::spawn(async move {
            let start_time = Instant::now();
            let result = run_analysis(&llm, &request, image_settings, repair).await;

            match &result {
                Ok(report) => info!(
                    "分析完成，耗时 {} ms，风险等级: {}",
                    start_time.elapsed().as_millis(),
                    report.risk_level.label()
                ),
                Err(e) => error!("分析失败: {}", e),
            }

            let outcome = AnalysisOutcome {
                symptoms: request.symptoms,
                pain_level: request.pain_level,
                result,
                _guard: guard,
            };
            if sender.send(outcome).await.is_err() {
                warn!("结果队列已关闭，丢弃分析结果");
            }
        });

        Ok(())
    }
}

async fn run_analysis(
    llm: &LLMHandle,
    request: &AnalysisRequest,
    image_settings: ImageSettings,
    repair: bool,
) -> Result<DiagnosisReport, AnalysisError> {
    let image = match request.image_path.clone() {
        Some(path) => {
            let attachment =
                tokio::task::spawn_blocking(move || prepare_image(&path, &image_settings))
                    .await
                    .map_err(|e| AnalysisError::Image(e.to_string()))?
                    .map_err(|e| AnalysisError::Image(e.to_string()))?;
            Some(attachment)
        }
        None => None,
    };

    let raw = llm
        .diagnose(request.prompt.clone(), image)
        .await
        .map_err(|e| AnalysisError::Provider(e.to_string()))?;

    parse_diagnosis(&raw, repair)
}
