use async_trait::async_trait;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// 到達可能なら true
    async fn check(&self) -> bool;
}
