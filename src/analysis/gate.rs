// 忙碌标志 - 同一时间只允许一个分析任务

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::AnalysisError;

/// 分析任务的忙碌标志
#[derive(Debug, Clone, Default)]
pub struct BusyGate {
    busy: Arc<AtomicBool>,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用，已被占用时返回 Busy
    pub fn try_acquire(&self) -> Result<BusyGuard, AnalysisError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AnalysisError::Busy)?;
        Ok(BusyGuard {
            busy: self.busy.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// 占用凭证，drop 时释放忙碌标志
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected() {
        let gate = BusyGate::new();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.try_acquire(), Err(AnalysisError::Busy)));

        drop(guard);
        assert!(!gate.is_busy(), "释放后应该可以再次占用");
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_guard_released_on_panic() {
        let gate = BusyGate::new();
        let guard = gate.try_acquire().unwrap();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("任务异常退出");
        });
        assert!(handle.await.is_err());
        assert!(!gate.is_busy(), "任务 panic 后忙碌标志应被释放");
    }
}
