// 会话上下文 - 交互期间持有档案、历史、草稿与最近一次分析结果
//
// 只由交互循环持有和修改，后台任务通过结果队列把数据交回来

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::analysis::{
    build_prompt, AnalysisError, AnalysisOutcome, AnalysisRequest, DiagnosisReport,
};
use crate::storage::{
    format_timestamp, local_now, DynamicsSummary, HistoryTracker, Profile, ProfileStore,
    TrendPolicy, VisitRecord, HISTORY_FILE, PROFILE_FILE,
};

/// 尚未提交的分析输入
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub symptoms: String,
    pub pain_level: Option<u8>,
    pub image_path: Option<PathBuf>,
}

/// 本次会话中完成的一次分析
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAnalysis {
    pub report: DiagnosisReport,
    pub record: VisitRecord,
}

pub struct Session {
    profile: Profile,
    profile_store: ProfileStore,
    history: HistoryTracker,
    draft: Draft,
    last_completed: Option<CompletedAnalysis>,
    policy: TrendPolicy,
}

impl Session {
    /// 从数据目录加载档案和历史
    pub fn open(data_dir: &Path, policy: TrendPolicy) -> Self {
        let profile_store = ProfileStore::new(data_dir.join(PROFILE_FILE));
        let profile = profile_store.load();
        let history = HistoryTracker::load(data_dir.join(HISTORY_FILE));
        info!("会话已打开，数据目录: {:?}", data_dir);

        Self {
            profile,
            profile_store,
            history,
            draft: Draft::default(),
            last_completed: None,
            policy,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// 修改一个档案字段并立即保存；保存失败时恢复原值
    pub fn set_profile_field(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.profile.clone();
        self.profile
            .set_field(key, value)
            .map_err(anyhow::Error::msg)?;

        if let Err(e) = self.profile_store.save(&self.profile) {
            self.profile = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    /// 清空历史（调用方负责确认）
    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn policy(&self) -> &TrendPolicy {
        &self.policy
    }

    pub fn summary(&self) -> DynamicsSummary {
        self.history.summary(&self.policy)
    }

    pub fn last_completed(&self) -> Option<&CompletedAnalysis> {
        self.last_completed.as_ref()
    }

    /// 用当前草稿、档案和上次就诊构建分析请求
    pub fn prepare_request(&self) -> AnalysisRequest {
        let symptoms = self.draft.symptoms.trim().to_string();
        let prompt = build_prompt(
            &self.profile,
            self.draft.pain_level,
            self.history.last(),
            &symptoms,
            self.draft.image_path.is_some(),
        );

        AnalysisRequest {
            prompt,
            symptoms,
            pain_level: self.draft.pain_level,
            image_path: self.draft.image_path.clone(),
        }
    }

    /// 处理后台任务交回的结果：成功时追加就诊记录
    ///
    /// outcome 在函数返回时释放，忙碌标志随之清除
    pub fn apply_outcome(
        &mut self,
        outcome: AnalysisOutcome,
    ) -> Result<&CompletedAnalysis, AnalysisError> {
        let report = match outcome.result {
            Ok(report) => report,
            Err(e) => {
                warn!("分析未完成，不写入历史: {}", e);
                return Err(e);
            }
        };

        let record = report.to_visit_record(
            &outcome.symptoms,
            outcome.pain_level,
            format_timestamp(&local_now()),
        );
        self.history
            .append(record.clone())
            .map_err(|e| AnalysisError::Persist(e.to_string()))?;

        // 提交成功后清空草稿中的影像，症状和疼痛保留以便复诊修改
        self.draft.image_path = None;
        Ok(self.last_completed.insert(CompletedAnalysis { report, record }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::testing::MockProvider;
    use crate::actors::LLMManagerActor;
    use crate::analysis::AnalysisDispatcher;
    use crate::llm::{LLMConfig, LLMManager};
    use crate::models::ImageSettings;
    use crate::storage::Dynamics;
    use tempfile::tempdir;

    fn dispatcher(reply: &str) -> (AnalysisDispatcher, tokio::sync::mpsc::Receiver<AnalysisOutcome>) {
        let manager =
            LLMManager::with_provider(LLMConfig::default(), Box::new(MockProvider::replying(reply)));
        let (actor, handle) = LLMManagerActor::new(manager);
        tokio::spawn(actor.run());
        AnalysisDispatcher::new(handle, ImageSettings::default(), false)
    }

    #[test]
    fn test_profile_field_persisted() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());
        session.set_profile_field("height", "170").unwrap();
        session.set_profile_field("weight", "70").unwrap();
        assert!(session.set_profile_field("blood", "A").is_err());

        let reopened = Session::open(dir.path(), TrendPolicy::default());
        assert_eq!(reopened.profile().height, "170");
        assert_eq!(reopened.profile().bmi(), Some(24.2));
    }

    #[test]
    fn test_prepare_request_uses_draft_and_history() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());
        session.draft_mut().symptoms = "  右侧腰痛  ".to_string();
        session.draft_mut().pain_level = Some(7);

        let request = session.prepare_request();
        assert_eq!(request.symptoms, "右侧腰痛");
        assert_eq!(request.pain_level, Some(7));
        assert!(request.prompt.contains("患者疼痛等级: 7/10"));
        assert!(!request.prompt.contains("上次分析"));
    }

    #[tokio::test]
    async fn test_apply_outcome_appends_record() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());
        session.draft_mut().symptoms = "颈部僵硬".to_string();
        session.draft_mut().pain_level = Some(3);

        let (dispatcher, mut rx) = dispatcher(
            r#"```json
{"curvature_angle": 9.5, "risk_level": "low", "dynamics": "initial_visit", "exercises": ["颈部拉伸"]}
```"#,
        );
        dispatcher.dispatch(session.prepare_request()).unwrap();
        let outcome = rx.recv().await.unwrap();

        let completed = session.apply_outcome(outcome).unwrap();
        assert_eq!(completed.record.angle, Some(9.5));
        assert_eq!(completed.record.symptoms, "颈部僵硬");
        assert_eq!(completed.record.dynamics, Dynamics::InitialVisit);
        assert!(completed.record.parsed_timestamp().is_some());
        assert!(!dispatcher.is_busy());

        assert_eq!(session.history().len(), 1);
        let reopened = Session::open(dir.path(), TrendPolicy::default());
        assert_eq!(reopened.history().len(), 1);
        assert!(reopened.last_completed().is_none());
    }

    #[tokio::test]
    async fn test_failed_outcome_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());
        session.draft_mut().symptoms = "背痛".to_string();

        let (dispatcher, mut rx) = dispatcher("服务繁忙，请稍后再试");
        dispatcher.dispatch(session.prepare_request()).unwrap();
        let outcome = rx.recv().await.unwrap();

        let err = session.apply_outcome(outcome).unwrap_err();
        assert!(err.to_string().contains("服务繁忙"), "错误信息应包含原始返回");
        assert!(session.history().is_empty());
        assert!(session.last_completed().is_none());
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_session_unchanged() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());
        session.draft_mut().symptoms = "腰痛".to_string();

        // 历史文件路径被目录占用，保存必然失败
        std::fs::create_dir(session.history().path()).unwrap();

        let (dispatcher, mut rx) = dispatcher(r#"{"curvature_angle": 11, "risk_level": "medium"}"#);
        dispatcher.dispatch(session.prepare_request()).unwrap();
        let outcome = rx.recv().await.unwrap();

        let err = session.apply_outcome(outcome).unwrap_err();
        assert!(
            matches!(err, AnalysisError::Persist(_)),
            "保存失败应返回 Persist 错误，实际: {:?}",
            err
        );
        assert!(session.history().is_empty(), "保存失败的记录不应留在内存中");
        assert!(session.last_completed().is_none());
        assert_eq!(session.draft().symptoms, "腰痛", "保存失败时草稿应保留");
        assert!(!dispatcher.is_busy());
    }
}
