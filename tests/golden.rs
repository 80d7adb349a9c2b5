//! Golden tests for the hub kernel.
//!
//! These tests run the public operations end to end against the in-memory
//! store, job sink and activity log.

use std::sync::Arc;

use bip_hub_kernel::{
    chord_map_for, AccountContext, AccountOption, ActivityEvent, BipType, Channel, ChannelResolver, Collection,
    DispatchSummary, EndLife, ExpirySweeper, Hub, HubNode, InMemoryActivityLog, InMemoryDocumentStore,
    InMemoryJobSink, JobActivityLog, JobKind, KernelConfig, KernelError, NetworkStatsAggregator, Pipeline, Reply,
    ShareTranscoder, StoreChannelDirectory, TriggerDispatcher, SHARE_ENTITY,
};
use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

type Directory = StoreChannelDirectory<InMemoryDocumentStore>;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn channel_id(n: u128) -> String {
    Uuid::from_u128(n).to_string()
}

fn make_channel(store: &InMemoryDocumentStore, n: u128, owner: &str, action: &str) -> String {
    let id = channel_id(n);
    store
        .seed_value(Collection::Channel, &Channel::new(id.as_str(), owner, action))
        .unwrap();
    id
}

/// rss.read → slack.post → email.smtp_forward, with a transform on the
/// slack edge that references the rss channel and a deleted channel.
fn build_trigger_pipeline(store: &InMemoryDocumentStore, owner: &str) -> Pipeline {
    let rss = make_channel(store, 1, owner, "rss.read");
    let slack = make_channel(store, 2, owner, "slack.post");
    let email = make_channel(store, 3, owner, "email.smtp_forward");
    let deleted = channel_id(99);

    let hub = Hub::new()
        .with(
            "source",
            HubNode::with_edges([slack.as_str()]).with_transform(
                slack.as_str(),
                "text",
                format!("[%{}#title%] ([%{}#link%])", rss, deleted),
            ),
        )
        .with(slack.as_str(), HubNode::with_edges([email.as_str(), deleted.as_str()]));

    let mut pipeline = Pipeline::new("bip-1", owner, BipType::Trigger)
        .with_hub(hub)
        .with_config("channel_id", rss.as_str());
    pipeline.name = "RSS to Slack".to_string();
    pipeline.note = "Forward feed items".to_string();
    pipeline
}

fn make_transcoder(
    store: &Arc<InMemoryDocumentStore>,
    activity: Arc<InMemoryActivityLog>,
) -> ShareTranscoder<InMemoryDocumentStore, Directory> {
    let directory = Arc::new(StoreChannelDirectory::new(Arc::clone(store)));
    ShareTranscoder::new(Arc::clone(store), directory, activity, &KernelConfig::default())
}

// ─────────────────────────────────────────────────────────────────────────────
// SHARE TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_share_is_idempotent() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let pipeline = build_trigger_pipeline(&store, "alice");
    let account = AccountContext::new("alice", "Alice");
    let activity = Arc::new(InMemoryActivityLog::new());
    let transcoder = make_transcoder(&store, activity.clone());

    let first = transcoder.share(&pipeline, &account).await.unwrap();
    let second = transcoder.share(&pipeline, &account).await.unwrap();

    assert_eq!(store.count(Collection::BipShare), 1, "Re-sharing must not duplicate");
    assert_eq!(first.hub, second.hub);
    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first.manifest_hash, second.manifest_hash);

    // Only the first share records activity.
    let events = activity.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| matches!(e, ActivityEvent::BipShare { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ActivityEvent::UsageCounter { counter, .. } if counter == "share_total")));
}

#[tokio::test]
async fn test_share_is_portable() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let pipeline = build_trigger_pipeline(&store, "alice");
    let transcoder = make_transcoder(&store, Arc::new(InMemoryActivityLog::new()));

    let share = transcoder
        .share(&pipeline, &AccountContext::new("alice", "Alice"))
        .await
        .unwrap();

    // No resolvable channel id survives.
    let body = serde_json::to_string(&share.hub).unwrap();
    assert!(!body.contains(&channel_id(1)));
    assert!(!body.contains(&channel_id(2)));
    assert!(!body.contains(&channel_id(3)));

    assert_eq!(share.hub["source"].edges, vec!["slack.post".to_string()]);
    assert_eq!(
        share.hub["slack-post"].edges,
        vec!["email.smtp_forward".to_string()],
        "Deleted channels are dropped from edges"
    );

    // The unresolvable reference survives verbatim.
    assert_eq!(
        share.hub["source"].transforms["slack-post"]["text"],
        format!("[%rss.read#title%] ([%{}#link%])", channel_id(99))
    );

    assert_eq!(share.config["channel_id"], "rss.read");
    assert_eq!(
        share.manifest.iter().collect::<Vec<_>>(),
        vec!["email.smtp_forward", "rss.read", "slack.post"]
    );
    assert!(!share.manifest.contains("source"));
}

#[tokio::test]
async fn test_cross_owner_unshare_is_not_found() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let pipeline = build_trigger_pipeline(&store, "alice");
    let transcoder = make_transcoder(&store, Arc::new(InMemoryActivityLog::new()));

    let share = transcoder
        .share(&pipeline, &AccountContext::new("alice", "Alice"))
        .await
        .unwrap();
    let share_id = share.id.unwrap();

    let result = transcoder.unshare(&share_id, &AccountContext::new("mallory", "Mallory")).await;
    let reply = Reply::from_result(SHARE_ENTITY, result);
    assert_eq!(reply.status, 404);
    assert_eq!(store.count(Collection::BipShare), 1, "Share must survive a foreign unshare");
}

#[tokio::test]
async fn test_share_activity_goes_to_job_queue() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let pipeline = build_trigger_pipeline(&store, "alice");
    let sink = Arc::new(InMemoryJobSink::new());
    let activity = Arc::new(JobActivityLog::new(sink.clone()));
    let directory = Arc::new(StoreChannelDirectory::new(Arc::clone(&store)));
    let transcoder = ShareTranscoder::new(Arc::clone(&store), directory, activity, &KernelConfig::default());

    transcoder
        .share(&pipeline, &AccountContext::new("alice", "Alice"))
        .await
        .unwrap();

    assert_eq!(sink.jobs_of(JobKind::BipActivity).len(), 1);
    assert_eq!(sink.jobs_of(JobKind::UserStat)[0].payload["type"], "share_total");
}

// ─────────────────────────────────────────────────────────────────────────────
// DISPATCH TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_trigger_all_fires_only_unpaused() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let (live, paused) = (7, 4);
    for i in 0..live + paused {
        let mut pipeline = Pipeline::new(format!("bip-{}", i), "alice", BipType::Trigger);
        pipeline.paused = i >= live;
        store.seed_value(Collection::Bip, &pipeline).unwrap();
    }

    let sink = Arc::new(InMemoryJobSink::new());
    let directory = Arc::new(StoreChannelDirectory::new(Arc::clone(&store)));
    let dispatcher = TriggerDispatcher::new(Arc::clone(&store), directory, sink.clone());

    let summary = dispatcher.trigger_all(None, false).await.unwrap();
    assert_eq!(summary, DispatchSummary::Dispatched { submitted: live, failed: 0 });
    assert_eq!(sink.jobs_of(JobKind::BipTrigger).len(), live);
}

// ─────────────────────────────────────────────────────────────────────────────
// STATS TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_pipeline_chords() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let slack = make_channel(&store, 10, "alice", "slack.post");
    let rss = make_channel(&store, 11, "alice", "rss.read");
    let hub = Hub::new()
        .with("source", HubNode::with_edges([slack.as_str()]))
        .with(slack.as_str(), HubNode::with_edges([rss.as_str()]));
    store
        .seed_value(Collection::Bip, &Pipeline::new("web", "alice", BipType::Http).with_hub(hub))
        .unwrap();

    let directory = Arc::new(StoreChannelDirectory::new(Arc::clone(&store)));
    let stats = NetworkStatsAggregator::new(Arc::clone(&store), directory, &KernelConfig::default());
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

    let chords = stats.generate_account_stats_on("alice", day).await.unwrap();
    assert_eq!(chords.get("bip#http;slack#post"), 1);
    assert_eq!(chords.get("slack#post;rss#read"), 1);
    assert_eq!(chords.len(), 2);

    let rows = store.all(Collection::StatsAccountNetwork);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["owner_id"], "alice");
    assert_eq!(rows[0]["day"], "2024-02-29");
}

#[test]
fn test_stats_never_cross_owners() {
    let store = InMemoryDocumentStore::new();
    let pipeline = build_trigger_pipeline(&store, "alice");
    let mallory = ChannelResolver::new(
        "mallory",
        vec![
            Channel::new(channel_id(1).as_str(), "alice", "rss.read"),
            Channel::new(channel_id(2).as_str(), "alice", "slack.post"),
        ],
    );

    assert!(chord_map_for(&[pipeline], &mallory).is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// EXPIRY TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_expiry_never_touches_other_owners() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
    let expired = EndLife { time: now.timestamp() - 1, imp: 0 };

    store
        .seed_value(Collection::AccountOption, &AccountOption::new("alice", Some("Europe/Paris"), "delete"))
        .unwrap();
    for (id, owner) in [("a1", "alice"), ("a2", "alice"), ("b1", "bob")] {
        let mut pipeline = Pipeline::new(id, owner, BipType::Smtp);
        pipeline.end_life = expired;
        store.seed_value(Collection::Bip, &pipeline).unwrap();
    }

    let sweeper = ExpirySweeper::new(Arc::clone(&store), &KernelConfig::default());
    let summary = sweeper.expire_all(now).await.unwrap();

    assert_eq!(summary.affected(), 2);
    let left = store.all(Collection::Bip);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["owner_id"], "bob");
}

#[tokio::test]
async fn test_unknown_expiry_preference_is_reported() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store
        .seed_value(Collection::AccountOption, &AccountOption::new("alice", None, "shelve"))
        .unwrap();

    let sweeper = ExpirySweeper::new(Arc::clone(&store), &KernelConfig::default());
    let summary = sweeper.expire_all(Utc::now()).await.unwrap();

    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.owner_id, "alice");
    assert!(matches!(
        &failure.result,
        Err(KernelError::PolicyMismatch { value, .. }) if value == "shelve"
    ));
}
