use kismet_core::ChatMode;

use crate::integration::{create_test_dispatcher, init_tracing};
use crate::utils::{next_direct_for, quiesce};

#[tokio::test]
async fn disconnect_while_waiting_shrinks_the_pool_only() {
    init_tracing();

    let mut harness = create_test_dispatcher();
    let s1 = harness.connect().await;
    let bystander = harness.connect().await;

    harness.begin_search(s1, ChatMode::Video).await;
    next_direct_for(&mut harness.sink_rx, s1).await.unwrap();
    assert_eq!(harness.stats().await.waiting, 1);

    harness.disconnect(s1).await;
    quiesce().await;

    let stats = harness.stats().await;
    assert_eq!(stats.waiting, 0);
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.rooms, 0);

    // Nobody was paired with s1, so no room-related traffic goes out.
    for session in [s1, bystander] {
        assert_eq!(harness.sink.peer_disconnected_count(&session).await, 0);
    }
}
