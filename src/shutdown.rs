use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 所有订阅者共享同一个广播信号，重复触发只生效一次。
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 已经关闭，返回一个立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭
    pub async fn shutdown(&self) {
        let mut shutdown_tx = self.shutdown_tx.write().await;
        let Some(tx) = shutdown_tx.take() else {
            debug!("关闭管理器已经触发过关闭");
            return;
        };

        debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
        // 可能没有接收者
        let _ = tx.send(());
        info!("关闭信号已发送");
    }

    pub async fn is_shutdown(&self) -> bool {
        self.shutdown_tx.read().await.is_none()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_reaches_all_subscribers() {
        let manager = ShutdownManager::new();
        let mut first = manager.subscribe().await;
        let mut second = manager.clone().subscribe().await;

        assert!(!manager.is_shutdown().await);
        manager.shutdown().await;
        manager.shutdown().await;

        assert!(manager.is_shutdown().await);
        tokio::time::timeout(Duration::from_secs(1), first.recv())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), second.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_is_signalled_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;

        let mut late = manager.subscribe().await;
        tokio::time::timeout(Duration::from_secs(1), late.recv())
            .await
            .unwrap()
            .unwrap();
    }
}
