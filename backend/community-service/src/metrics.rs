use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static COMMENTS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "community_service_comments_created_total",
            "Comments committed by community-service",
        ),
        &["kind"],
    )
    .expect("failed to create community_service_comments_created_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register community_service_comments_created_total");
    counter
});

static COMMENTS_DELETED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "community_service_comments_deleted_total",
            "Comment rows removed by deletes, replies included",
        ),
        &["kind"],
    )
    .expect("failed to create community_service_comments_deleted_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register community_service_comments_deleted_total");
    counter
});

static VOTE_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "community_service_vote_transitions_total",
            "Vote transitions by outcome",
        ),
        &["transition", "outcome"],
    )
    .expect("failed to create community_service_vote_transitions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register community_service_vote_transitions_total");
    counter
});

static OUTBOUND_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "community_service_outbound_events_total",
            "Outbound events dispatched after commit",
        ),
        &["event_type", "status"],
    )
    .expect("failed to create community_service_outbound_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register community_service_outbound_events_total");
    counter
});

static INBOUND_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "community_service_inbound_events_total",
            "Forum lifecycle and creator events consumed",
        ),
        &["event_type", "status"],
    )
    .expect("failed to create community_service_inbound_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register community_service_inbound_events_total");
    counter
});

/// `kind` is "root" or "reply"
pub fn record_comment_created(kind: &str) {
    COMMENTS_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_comments_deleted(kind: &str, rows: u64) {
    COMMENTS_DELETED_TOTAL
        .with_label_values(&[kind])
        .inc_by(rows);
}

pub fn record_vote_transition(transition: &str, outcome: &str) {
    VOTE_TRANSITIONS_TOTAL
        .with_label_values(&[transition, outcome])
        .inc();
}

pub fn record_outbound_event(event_type: &str, status: &str) {
    OUTBOUND_EVENTS_TOTAL
        .with_label_values(&[event_type, status])
        .inc();
}

pub fn record_inbound_event(event_type: &str, status: &str) {
    INBOUND_EVENTS_TOTAL
        .with_label_values(&[event_type, status])
        .inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_registered_once() {
        record_comment_created("root");
        record_comment_created("root");
        record_vote_transition("None->Like", "applied");

        let value = COMMENTS_CREATED_TOTAL.with_label_values(&["root"]).get();
        assert!(value >= 2);

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"community_service_comments_created_total".to_string()));
        assert!(names.contains(&"community_service_vote_transitions_total".to_string()));
    }
}
