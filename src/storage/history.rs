// 就诊历史追踪 - 只追加的记录序列、相邻两次就诊的变化量与图表序列

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::json_file;
use super::models::VisitRecord;

/// 可比较的数值字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendField {
    Angle,
    PainLevel,
}

impl TrendField {
    fn value_of(&self, record: &VisitRecord) -> Option<f64> {
        match self {
            Self::Angle => record.angle,
            Self::PainLevel => record.pain_level.map(f64::from),
        }
    }
}

/// 变化方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Decreased,
    Increased,
    Unchanged,
}

impl Direction {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Decreased => "▼",
            Self::Increased => "▲",
            Self::Unchanged => "=",
        }
    }
}

/// 两次就诊之间某个字段的变化
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delta {
    /// 任一侧字段未设置
    Unavailable,
    Changed { direction: Direction, magnitude: f64 },
}

/// 变化对患者是否有利（只影响显示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Favorability {
    Favorable,
    Unfavorable,
}

/// 趋势判定策略
///
/// 角度或疼痛下降、不变视为有利，上升视为不利；
/// 上升幅度不超过容差时仍视为有利。默认容差为 0。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TrendPolicy {
    /// 角度容差（度）
    #[serde(default)]
    pub angle_tolerance: f64,
    /// 疼痛等级容差
    #[serde(default)]
    pub pain_tolerance: f64,
}

impl TrendPolicy {
    pub fn tolerance(&self, field: TrendField) -> f64 {
        match field {
            TrendField::Angle => self.angle_tolerance,
            TrendField::PainLevel => self.pain_tolerance,
        }
    }

    /// 判定变化是否有利，变化不可用时返回 None
    pub fn classify(&self, field: TrendField, delta: &Delta) -> Option<Favorability> {
        match delta {
            Delta::Unavailable => None,
            Delta::Changed {
                direction: Direction::Increased,
                magnitude,
            } if *magnitude > self.tolerance(field) => Some(Favorability::Unfavorable),
            Delta::Changed { .. } => Some(Favorability::Favorable),
        }
    }
}

/// 计算 current 相对 previous 的变化
///
/// 角度差值按显示精度保留一位小数
pub fn delta(current: &VisitRecord, previous: &VisitRecord, field: TrendField) -> Delta {
    let (Some(now), Some(before)) = (field.value_of(current), field.value_of(previous)) else {
        return Delta::Unavailable;
    };

    let mut diff = now - before;
    if field == TrendField::Angle {
        diff = (diff * 10.0).round() / 10.0;
    }

    let direction = if diff < 0.0 {
        Direction::Decreased
    } else if diff > 0.0 {
        Direction::Increased
    } else {
        Direction::Unchanged
    };

    Delta::Changed {
        direction,
        magnitude: diff.abs(),
    }
}

/// 图表数据点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: NaiveDateTime,
    pub angle: Option<f64>,
    pub pain_level: Option<u8>,
}

/// 与上一次就诊对比的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicsSummary {
    pub total_visits: usize,
    pub current_angle: Option<f64>,
    pub current_pain: Option<u8>,
    pub angle_delta: Delta,
    pub angle_trend: Option<Favorability>,
    pub pain_delta: Delta,
    pub pain_trend: Option<Favorability>,
}

/// 就诊历史
pub struct HistoryTracker {
    path: PathBuf,
    records: Vec<VisitRecord>,
}

impl HistoryTracker {
    /// 从文件加载历史，文件缺失或损坏时从空历史开始
    pub fn load(path: PathBuf) -> Self {
        let records: Vec<VisitRecord> = json_file::load_or_default(&path);
        info!("已加载 {} 条就诊记录: {:?}", records.len(), path);
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[VisitRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&VisitRecord> {
        self.records.last()
    }

    /// 追加记录并立即保存；保存失败时内存中也不保留该记录
    pub fn append(&mut self, record: VisitRecord) -> Result<()> {
        self.records.push(record);
        if let Err(e) = json_file::save_atomic(&self.path, &self.records) {
            self.records.pop();
            error!("保存就诊记录失败: {}", e);
            return Err(e);
        }
        info!("新增就诊记录，共 {} 条", self.records.len());
        Ok(())
    }

    /// 按时间顺序返回最近 n 条记录
    pub fn latest(&self, n: usize) -> &[VisitRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// 清空全部历史并保存（调用方负责确认）
    pub fn clear(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.records);
        if let Err(e) = json_file::save_atomic(&self.path, &self.records) {
            self.records = previous;
            error!("清空就诊记录失败: {}", e);
            return Err(e);
        }
        info!("已清空 {} 条就诊记录", previous.len());
        Ok(())
    }

    /// 图表序列：跳过角度和疼痛都未设置、或时间戳无法解析的记录
    ///
    /// 每次调用都基于当前记录重新计算
    pub fn series_for_chart(&self) -> impl Iterator<Item = ChartPoint> + '_ {
        self.records.iter().filter_map(|record| {
            if record.angle.is_none() && record.pain_level.is_none() {
                return None;
            }
            let timestamp = record.parsed_timestamp()?;
            Some(ChartPoint {
                timestamp,
                angle: record.angle,
                pain_level: record.pain_level,
            })
        })
    }

    /// 最近一次就诊的统计与变化
    pub fn summary(&self, policy: &TrendPolicy) -> DynamicsSummary {
        let current = self.records.last();
        let (angle_delta, pain_delta) = match self.latest(2) {
            [previous, current] => (
                delta(current, previous, TrendField::Angle),
                delta(current, previous, TrendField::PainLevel),
            ),
            _ => (Delta::Unavailable, Delta::Unavailable),
        };

        DynamicsSummary {
            total_visits: self.records.len(),
            current_angle: current.and_then(|r| r.angle),
            current_pain: current.and_then(|r| r.pain_level),
            angle_trend: policy.classify(TrendField::Angle, &angle_delta),
            angle_delta,
            pain_trend: policy.classify(TrendField::PainLevel, &pain_delta),
            pain_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{Dynamics, RiskLevel};
    use tempfile::tempdir;

    fn record(timestamp: &str, angle: Option<f64>, pain: Option<u8>) -> VisitRecord {
        VisitRecord {
            timestamp: timestamp.to_string(),
            symptoms: "腰部酸痛".to_string(),
            pain_level: pain,
            risk: RiskLevel::Low,
            angle,
            stiffness_recommendation: None,
            zone: Some("腰椎".to_string()),
            urgent: false,
            exercises: vec!["平板支撑".to_string()],
            comment: String::new(),
            dynamics: Dynamics::InitialVisit,
            dynamics_comment: String::new(),
        }
    }

    fn tracker() -> (tempfile::TempDir, HistoryTracker) {
        let dir = tempdir().unwrap();
        let tracker = HistoryTracker::load(dir.path().join("history.json"));
        (dir, tracker)
    }

    #[test]
    fn test_latest_returns_tail_in_order() {
        let (_dir, mut history) = tracker();
        assert!(history.latest(2).is_empty());

        for i in 0..5u8 {
            history
                .append(record(&format!("2026-01-0{} 10:00:00", i + 1), None, Some(i)))
                .unwrap();
        }

        let latest = history.latest(2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].pain_level, Some(3));
        assert_eq!(latest[1].pain_level, Some(4));
        assert_eq!(history.latest(10).len(), 5);
        assert!(history.latest(0).is_empty());
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let (dir, mut history) = tracker();
        history
            .append(record("2026-01-01 10:00:00", Some(12.0), Some(6)))
            .unwrap();
        history
            .append(record("2026-01-08 10:00:00", Some(10.5), Some(4)))
            .unwrap();

        let reloaded = HistoryTracker::load(dir.path().join("history.json"));
        assert_eq!(reloaded.records(), history.records());
    }

    #[test]
    fn test_clear_then_latest_is_empty() {
        let (dir, mut history) = tracker();
        history
            .append(record("2026-01-01 10:00:00", Some(12.0), Some(6)))
            .unwrap();
        history.clear().unwrap();

        assert!(history.latest(1).is_empty());
        let reloaded = HistoryTracker::load(dir.path().join("history.json"));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_append_failure_keeps_memory_unchanged() {
        let (dir, mut history) = tracker();
        history
            .append(record("2026-01-01 10:00:00", Some(12.0), Some(6)))
            .unwrap();

        // 目标路径变成目录后写入必然失败
        let path = dir.path().join("history.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = history.append(record("2026-01-08 10:00:00", Some(10.0), Some(4)));
        assert!(result.is_err(), "写入目录应当失败");
        assert_eq!(history.len(), 1, "保存失败的记录不应留在内存中");
        assert_eq!(history.last().and_then(|r| r.pain_level), Some(6));
    }

    #[test]
    fn test_clear_failure_restores_records() {
        let (dir, mut history) = tracker();
        history
            .append(record("2026-01-01 10:00:00", Some(12.0), Some(6)))
            .unwrap();
        history
            .append(record("2026-01-08 10:00:00", Some(10.0), Some(4)))
            .unwrap();

        let path = dir.path().join("history.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(history.clear().is_err(), "写入目录应当失败");
        assert_eq!(history.len(), 2, "清空失败时应恢复原有记录");
    }

    #[test]
    fn test_load_legacy_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[
                {"date": "01.03.2026 09:30", "symptoms": "спина", "pain_level": 6,
                 "risk": "средний", "angle": 14, "stiffness": "средний",
                 "dynamics": "pervichnyy_osmotr"},
                {"date": "08.03.2026 10:00", "symptoms": "спина", "pain_level": "--",
                 "risk": "низкий", "angle": 12.5, "stiffness": "мягкий",
                 "dynamics": "uluchshenie"}
            ]"#,
        )
        .unwrap();

        let history = HistoryTracker::load(path);
        assert_eq!(history.len(), 2);
        assert_eq!(history.series_for_chart().count(), 2, "旧版本记录应出现在图表中");

        let summary = history.summary(&TrendPolicy::default());
        assert_eq!(
            summary.angle_delta,
            Delta::Changed {
                direction: Direction::Decreased,
                magnitude: 1.5
            }
        );
        assert_eq!(summary.angle_trend, Some(Favorability::Favorable));
    }

    #[test]
    fn test_delta() {
        let previous = record("2026-01-01 10:00:00", Some(12.5), Some(6));
        let current = record("2026-01-08 10:00:00", Some(10.0), Some(8));

        assert_eq!(
            delta(&current, &previous, TrendField::Angle),
            Delta::Changed {
                direction: Direction::Decreased,
                magnitude: 2.5
            }
        );
        assert_eq!(
            delta(&current, &previous, TrendField::PainLevel),
            Delta::Changed {
                direction: Direction::Increased,
                magnitude: 2.0
            }
        );
        assert_eq!(
            delta(&current, &current, TrendField::Angle),
            Delta::Changed {
                direction: Direction::Unchanged,
                magnitude: 0.0
            }
        );

        let missing = record("2026-01-09 10:00:00", None, None);
        assert_eq!(delta(&missing, &previous, TrendField::Angle), Delta::Unavailable);
        assert_eq!(delta(&current, &missing, TrendField::PainLevel), Delta::Unavailable);
    }

    #[test]
    fn test_angle_delta_rounded_to_one_decimal() {
        let previous = record("2026-01-01 10:00:00", Some(10.1), None);
        let current = record("2026-01-08 10:00:00", Some(12.3), None);

        match delta(&current, &previous, TrendField::Angle) {
            Delta::Changed { direction, magnitude } => {
                assert_eq!(direction, Direction::Increased);
                assert_eq!(magnitude, 2.2);
            }
            other => panic!("意外的结果: {:?}", other),
        }
    }

    #[test]
    fn test_trend_policy() {
        let strict = TrendPolicy::default();
        let increased = Delta::Changed {
            direction: Direction::Increased,
            magnitude: 1.0,
        };
        let unchanged = Delta::Changed {
            direction: Direction::Unchanged,
            magnitude: 0.0,
        };

        assert_eq!(
            strict.classify(TrendField::Angle, &increased),
            Some(Favorability::Unfavorable)
        );
        assert_eq!(
            strict.classify(TrendField::Angle, &unchanged),
            Some(Favorability::Favorable)
        );
        assert_eq!(strict.classify(TrendField::Angle, &Delta::Unavailable), None);

        let tolerant = TrendPolicy {
            angle_tolerance: 1.5,
            pain_tolerance: 0.0,
        };
        assert_eq!(
            tolerant.classify(TrendField::Angle, &increased),
            Some(Favorability::Favorable)
        );
        assert_eq!(
            tolerant.classify(TrendField::PainLevel, &increased),
            Some(Favorability::Unfavorable)
        );
    }

    #[test]
    fn test_series_for_chart_filters_records() {
        let (_dir, mut history) = tracker();
        history
            .append(record("2026-01-01 10:00:00", Some(12.0), None))
            .unwrap();
        history
            .append(record("2026-01-02 10:00:00", None, None))
            .unwrap();
        history
            .append(record("不是时间", Some(11.0), Some(3)))
            .unwrap();
        history
            .append(record("03.01.2026 10:00", None, Some(5)))
            .unwrap();

        let points: Vec<ChartPoint> = history.series_for_chart().collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].angle, Some(12.0));
        assert_eq!(points[1].pain_level, Some(5));
        assert!(points[0].timestamp < points[1].timestamp);

        // 可重复计算
        assert_eq!(history.series_for_chart().count(), 2);
    }

    #[test]
    fn test_summary() {
        let (_dir, mut history) = tracker();
        let empty = history.summary(&TrendPolicy::default());
        assert_eq!(empty.total_visits, 0);
        assert_eq!(empty.angle_delta, Delta::Unavailable);

        history
            .append(record("2026-01-01 10:00:00", Some(14.0), Some(7)))
            .unwrap();
        history
            .append(record("2026-01-08 10:00:00", Some(12.0), None))
            .unwrap();

        let summary = history.summary(&TrendPolicy::default());
        assert_eq!(summary.total_visits, 2);
        assert_eq!(summary.current_angle, Some(12.0));
        assert_eq!(summary.current_pain, None);
        assert_eq!(summary.angle_trend, Some(Favorability::Favorable));
        assert_eq!(summary.pain_delta, Delta::Unavailable);
        assert_eq!(summary.pain_trend, None);
    }
}
