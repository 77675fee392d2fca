// 患者档案存储

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_file;
use super::models::deserialize_text;

/// 档案中允许编辑的字段名
pub const PROFILE_FIELDS: [&str; 6] = ["name", "age", "height", "weight", "diagnosis", "history"];

/// 患者档案（所有字段按用户输入的原文保存）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// 姓名
    #[serde(default, deserialize_with = "deserialize_text")]
    pub name: String,
    /// 年龄
    #[serde(default, deserialize_with = "deserialize_text")]
    pub age: String,
    /// 身高（厘米）
    #[serde(default, deserialize_with = "deserialize_text")]
    pub height: String,
    /// 体重（千克）
    #[serde(default, deserialize_with = "deserialize_text")]
    pub weight: String,
    /// 诊断
    #[serde(default, deserialize_with = "deserialize_text")]
    pub diagnosis: String,
    /// 既往病史
    #[serde(default, deserialize_with = "deserialize_text")]
    pub history: String,
}

impl Profile {
    /// 按字段名设置值
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim().to_string();
        match key {
            "name" => self.name = value,
            "age" => self.age = value,
            "height" => self.height = value,
            "weight" => self.weight = value,
            "diagnosis" => self.diagnosis = value,
            "history" => self.history = value,
            other => {
                return Err(format!(
                    "未知的档案字段: {}（可用字段: {}）",
                    other,
                    PROFILE_FIELDS.join(", ")
                ))
            }
        }
        Ok(())
    }

    /// 按字段名读取值
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(&self.name),
            "age" => Some(&self.age),
            "height" => Some(&self.height),
            "weight" => Some(&self.weight),
            "diagnosis" => Some(&self.diagnosis),
            "history" => Some(&self.history),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        PROFILE_FIELDS
            .iter()
            .all(|key| self.field(key).map(|v| v.trim().is_empty()).unwrap_or(true))
    }

    pub fn bmi(&self) -> Option<f64> {
        bmi(&self.height, &self.weight)
    }
}

/// 计算 BMI = 体重(kg) / 身高(m)^2，保留一位小数
///
/// 身高或体重缺失、不是数字、身高不大于 0 时返回 None
pub fn bmi(height_cm: &str, weight_kg: &str) -> Option<f64> {
    let height = height_cm.trim().replace(',', ".").parse::<f64>().ok()?;
    let weight = weight_kg.trim().replace(',', ".").parse::<f64>().ok()?;

    if !height.is_finite() || !weight.is_finite() || height <= 0.0 || weight < 0.0 {
        return None;
    }

    let height_m = height / 100.0;
    let value = weight / (height_m * height_m);
    Some((value * 10.0).round() / 10.0)
}

/// 档案文件存储
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取档案，文件缺失或损坏时返回空档案
    pub fn load(&self) -> Profile {
        json_file::load_or_default(&self.path)
    }

    /// 整体覆盖保存档案
    pub fn save(&self, profile: &Profile) -> Result<()> {
        json_file::save_atomic(&self.path, profile)?;
        info!("患者档案已保存: {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bmi() {
        assert_eq!(bmi("170", "70"), Some(24.2));
        assert_eq!(bmi(" 180 ", "81"), Some(25.0));
        assert_eq!(bmi("0", "70"), None);
        assert_eq!(bmi("170", ""), None);
        assert_eq!(bmi("abc", "70"), None);
        assert_eq!(bmi("-170", "70"), None);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));

        let mut profile = Profile::default();
        profile.set_field("name", "李四").unwrap();
        profile.set_field("age", "42").unwrap();
        profile.set_field("height", "170").unwrap();
        profile.set_field("weight", "70").unwrap();
        profile.set_field("diagnosis", "腰椎间盘突出").unwrap();
        profile.set_field("history", "2019 年腰椎手术").unwrap();
        store.save(&profile).unwrap();

        assert_eq!(store.load(), profile);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut profile = Profile::default();
        assert!(profile.set_field("blood_type", "A").is_err());
        assert!(profile.is_empty());
    }

    #[test]
    fn test_numeric_values_coerced_to_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"name": "王五", "age": 35, "height": 172.5}"#).unwrap();

        let profile = ProfileStore::new(path).load();
        assert_eq!(profile.age, "35");
        assert_eq!(profile.height, "172.5");
        assert_eq!(profile.weight, "");
    }

    #[test]
    fn test_corrupt_profile_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(ProfileStore::new(path).load().is_empty());
    }
}
