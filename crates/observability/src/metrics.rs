//! 摄取服务指标模块
//!
//! 覆盖 HTTP 边界（接收/拒绝事件数）与缓冲存储（积压深度、刷盘结果）。

use metrics::{counter, gauge, histogram};

/// 记录通过校验并进入缓冲区的事件数
pub fn record_events_received(count: usize) {
    counter!("ingest_events_received_total").increment(count as u64);
}

/// 记录被拒绝的事件
///
/// `reason` 取值：`decode` (无法解析) / `required` (缺少必填字段)
pub fn record_events_rejected(reason: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!("ingest_events_rejected_total", "reason" => reason).increment(count as u64);
}

/// 记录缓冲区积压深度
pub fn record_pending_depth(depth: usize) {
    gauge!("ingest_store_pending").set(depth as f64);
}

/// 记录一次刷盘
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_flush;
///
/// record_flush(true, batch.len(), started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_flush(success: bool, records: usize, duration_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!("ingest_flush_total", "status" => status).increment(1);
    histogram!("ingest_flush_duration_ms", "status" => status).record(duration_ms);

    if success {
        counter!("ingest_flushed_records_total").increment(records as u64);
    }
}

/// 记录 HTTP 请求 (按路由与状态码)
pub fn record_http_request(path: &str, status: u16) {
    counter!(
        "ingest_http_requests_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
