use kismet_core::{ClientEnvelope, ServerEnvelope};
use serde_json::json;

use crate::integration::{create_test_dispatcher, init_tracing};
use crate::utils::quiesce;

#[tokio::test]
async fn relay_without_a_partner_is_silently_dropped() {
    init_tracing();

    let mut harness = create_test_dispatcher();
    let s1 = harness.connect().await;
    let bystander = harness.connect().await;

    // s1 was never matched; its offer has nowhere to go.
    harness
        .send(
            s1,
            ClientEnvelope::Offer {
                description: json!({"type": "offer", "sdp": "v=0"}),
            },
        )
        .await;
    quiesce().await;

    for session in [s1, bystander] {
        let sent = harness.sink.sent_to(&session).await;
        assert!(
            !sent
                .iter()
                .any(|e| matches!(e, ServerEnvelope::Offer { .. })),
            "orphaned offer must not be delivered to {session}"
        );
    }

    // The race is benign: the sender's session is untouched.
    assert_eq!(harness.stats().await.sessions, 2);
}
