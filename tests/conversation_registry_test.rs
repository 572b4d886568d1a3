mod common;

use chat_service::error::AppError;
use chat_service::services::conversation_service::ConversationService;

#[tokio::test]
async fn get_or_create_is_order_independent() {
    let Some(db) = common::try_pool().await else {
        return;
    };
    let alice = common::seed_user(&db, "alice").await;
    let bob = common::seed_user(&db, "bob").await;

    let ab = ConversationService::get_or_create(&db, alice, bob)
        .await
        .expect("first contact");
    let ba = ConversationService::get_or_create(&db, bob, alice)
        .await
        .expect("reverse lookup");

    assert_eq!(ab.id, ba.id);
    assert!(ab.participants.contains(alice));
    assert!(ab.participants.contains(bob));
}

#[tokio::test]
async fn get_or_create_rejects_self_conversation() {
    let Some(db) = common::try_pool().await else {
        return;
    };
    let alice = common::seed_user(&db, "alice").await;

    let result = ConversationService::get_or_create(&db, alice, alice).await;
    assert!(matches!(result, Err(AppError::InvalidParticipants)));
}

#[tokio::test]
async fn concurrent_first_contact_yields_one_conversation() {
    let Some(db) = common::try_pool().await else {
        return;
    };
    let alice = common::seed_user(&db, "alice").await;
    let bob = common::seed_user(&db, "bob").await;

    let mut handles = Vec::new();
    for i in 0..100 {
        let db = db.clone();
        // Alternate argument order to also stress pair normalization
        let (a, b) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
        handles.push(tokio::spawn(async move {
            ConversationService::get_or_create(&db, a, b).await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let conversation = handle.await.expect("task").expect("get_or_create");
        ids.insert(conversation.id);
    }
    assert_eq!(ids.len(), 1, "concurrent creates must converge on one row");

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversations \
         WHERE participant_low = LEAST($1, $2) AND participant_high = GREATEST($1, $2)",
    )
    .bind(alice)
    .bind(bob)
    .fetch_one(&db)
    .await
    .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn set_active_soft_disables_and_listing_skips_it() {
    let Some(db) = common::try_pool().await else {
        return;
    };
    let alice = common::seed_user(&db, "alice").await;
    let bob = common::seed_user(&db, "bob").await;

    let conversation = ConversationService::get_or_create(&db, alice, bob)
        .await
        .expect("create");

    ConversationService::set_active(&db, conversation.id, false)
        .await
        .expect("deactivate");

    let summaries = ConversationService::list_for_user(&db, alice)
        .await
        .expect("list");
    assert!(summaries.iter().all(|s| s.id != conversation.id));

    // The row still exists: deactivation is not deletion
    let found = ConversationService::find(&db, conversation.id)
        .await
        .expect("find");
    assert!(!found.active);
}

#[tokio::test]
async fn listing_enriches_with_peer_identity() {
    let Some(db) = common::try_pool().await else {
        return;
    };
    let alice = common::seed_user(&db, "alice").await;
    let bob = common::seed_user(&db, "bob").await;
    ConversationService::get_or_create(&db, alice, bob)
        .await
        .expect("create");

    let summaries = ConversationService::list_for_user(&db, alice)
        .await
        .expect("list");
    let summary = summaries
        .iter()
        .find(|s| s.peer.id == bob)
        .expect("conversation with bob listed");
    assert_eq!(summary.peer.display_name, "bob");
    assert!(summary.peer.email.contains("bob"));
    assert_eq!(summary.unread_count, 0);
}
