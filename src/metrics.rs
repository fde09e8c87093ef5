use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, TextEncoder, opts, register_int_counter,
    register_int_counter_vec,
};

pub static SCHEDULER_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "trellis_scheduler_runs_total",
            "Scheduler invocations by task and outcome"
        ),
        &["task", "outcome"]
    )
    .unwrap()
});

pub static SIGNATURE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "trellis_signature_failures_total",
            "Inbound requests rejected by HTTP signature checks"
        ),
        &["reason"]
    )
    .unwrap()
});

pub static SIGNATURES_VERIFIED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "trellis_signatures_verified_total",
        "Inbound requests authenticated by HTTP signature"
    ))
    .unwrap()
});

pub static FOLLOW_SCORE_UPDATES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "trellis_follow_score_updates_total",
        "Follow relationships whose score was adjusted"
    ))
    .unwrap()
});

pub static FOLLOWS_REMOVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "trellis_follows_removed_total",
        "Follow relationships removed after reaching the failure floor"
    ))
    .unwrap()
});

pub static JOBS_EMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!("trellis_jobs_emitted_total", "Jobs handed to the job queue"),
        &["type"]
    )
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
