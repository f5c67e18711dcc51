//! 每個 key 同時最多一個進行中的抓取，其他呼叫者等待同一個結果。

use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

type Slot<T> = watch::Receiver<Option<Result<T>>>;
type SlotMap<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

/// 抓取結束（包含 panic）時移除 key，之後的呼叫才會重新開始
struct InFlightGuard<T> {
    map: SlotMap<T>,
    key: String,
    slot: Slot<T>,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        let mut map = self
            .map
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 只移除自己的 slot，key 可能已被新的抓取接手
        if map
            .get(&self.key)
            .is_some_and(|slot| slot.same_channel(&self.slot))
        {
            map.remove(&self.key);
        }
    }
}

pub struct SingleFlight<T> {
    in_flight: SlotMap<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 同一個 key 已有抓取在跑就加入等待，否則用 `make` 建立新的抓取。
    ///
    /// 抓取在獨立的 task 中執行，呼叫端放棄等待不會中斷抓取或快取寫入。
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut rx = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            // sender 已關閉代表抓取中途結束，不再加入
            let joinable = in_flight
                .get(key)
                .filter(|rx| rx.has_changed().is_ok())
                .cloned();

            match joinable {
                Some(rx) => {
                    tracing::debug!("⏳ Joining in-flight fetch for '{}'", key);
                    rx
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(key.to_string(), rx.clone());

                    let fut = make();
                    let guard = InFlightGuard {
                        map: Arc::clone(&self.in_flight),
                        key: key.to_string(),
                        slot: rx.clone(),
                    };
                    tokio::spawn(async move {
                        let result = fut.await;
                        // 先移除再送出，之後的呼叫會重新檢查快取
                        drop(guard);
                        let _ = tx.send(Some(result));
                    });

                    rx
                }
            }
        };

        let outcome = rx.wait_for(|value| value.is_some()).await;
        match outcome {
            Ok(value) => match value.as_ref() {
                Some(result) => result.clone(),
                None => Err(EtlError::TaskFailed {
                    message: format!("fetch for '{}' produced no result", key),
                }),
            },
            Err(_) => Err(EtlError::TaskFailed {
                message: format!("fetch for '{}' was aborted", key),
            }),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
