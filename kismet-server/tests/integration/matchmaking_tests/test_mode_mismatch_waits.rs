use kismet_core::{ChatMode, ServerEnvelope};

use crate::integration::{create_test_dispatcher, init_tracing};
use crate::utils::quiesce;

#[tokio::test]
async fn different_modes_never_pair() {
    init_tracing();

    let mut harness = create_test_dispatcher();
    let s1 = harness.connect().await;
    let s2 = harness.connect().await;

    harness.begin_search(s1, ChatMode::Video).await;
    harness.begin_search(s2, ChatMode::Text).await;
    quiesce().await;

    let stats = harness.stats().await;
    assert_eq!(stats.waiting, 2);
    assert_eq!(stats.rooms, 0);

    for session in [s1, s2] {
        let sent = harness.sink.sent_to(&session).await;
        assert!(
            !sent
                .iter()
                .any(|e| matches!(e, ServerEnvelope::MatchFound { .. })),
            "{session} should not have been matched"
        );
    }
}
