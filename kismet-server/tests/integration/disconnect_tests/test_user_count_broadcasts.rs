use kismet_core::ServerEnvelope;

use crate::integration::{create_test_dispatcher, init_tracing};
use crate::utils::next_broadcast;

#[tokio::test]
async fn user_count_is_broadcast_on_connect_and_disconnect() {
    init_tracing();

    let mut harness = create_test_dispatcher();

    let _s1 = harness.connect().await;
    let count = next_broadcast(&mut harness.sink_rx).await.unwrap();
    assert_eq!(count, ServerEnvelope::UserCount { count: 1 });

    let s2 = harness.connect().await;
    let count = next_broadcast(&mut harness.sink_rx).await.unwrap();
    assert_eq!(count, ServerEnvelope::UserCount { count: 2 });

    harness.disconnect(s2).await;
    let count = next_broadcast(&mut harness.sink_rx).await.unwrap();
    assert_eq!(count, ServerEnvelope::UserCount { count: 1 });
}
