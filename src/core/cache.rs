use crate::core::currency::ExchangeRate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A single shared "latest known good" value. Every `put` overwrites the
/// previous one; nothing expires.
#[derive(Clone)]
pub struct Slot<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<Option<V>>>,
}

pub type RateCache = Slot<ExchangeRate>;

impl<V> Slot<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get(&self) -> Option<V> {
        let slot = self.inner.lock().await;
        let value = slot.clone();
        if value.is_some() {
            debug!("Cache HIT");
        } else {
            debug!("Cache MISS");
        }
        value
    }

    pub async fn put(&self, value: V) {
        let mut slot = self.inner.lock().await;
        debug!("Cache PUT");
        *slot = Some(value);
    }
}

impl<V> Default for Slot<V>
where
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
