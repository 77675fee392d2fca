// JSON 文件读写 - 缺失或损坏时回退到默认值，写入使用临时文件 + 重命名

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// 读取 JSON 文件，文件不存在、为空或内容损坏时返回默认值
///
/// 损坏只记录警告日志，不向上层报错
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("读取 {:?} 失败，使用空数据: {}", path, e);
            return T::default();
        }
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return T::default();
    }

    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!("{:?} 内容已损坏，使用空数据: {}", path, e);
            T::default()
        }
    }
}

/// 整体重写 JSON 文件
///
/// 先写入同目录下的临时文件，再原子地替换目标文件，避免写到一半的文件
pub fn save_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {:?}", dir))?;

    let json = serde_json::to_string_pretty(value)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("创建临时文件失败: {:?}", dir))?;
    temp.write_all(json.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| anyhow::anyhow!("写入 {:?} 失败: {}", path, e.error))?;

    Ok(())
}
