// 分析错误类型 - 用户可见的分析失败原因

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("已有分析任务正在进行，请等待完成")]
    Busy,

    #[error("请填写症状描述或选择影像文件")]
    EmptyInput,

    #[error("影像处理失败: {0}")]
    Image(String),

    #[error("AI 服务调用失败: {0}")]
    Provider(String),

    #[error("AI 返回的内容无法解析: {reason}\n--- 原始返回 ---\n{raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("保存就诊记录失败: {0}")]
    Persist(String),
}

impl AnalysisError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}
