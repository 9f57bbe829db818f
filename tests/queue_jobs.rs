//! 任务队列集成测试
//!
//! 验证任务状态流转、执行槽限制、失败记录和运行报告

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use langsync::translation::config::QueueSettings;
use langsync::translation::queue::{ConcurrencySlots, JobContext, JobOutcome, TranslationJob};
use langsync::translation::storage::{JobStatus, StateStore};
use langsync::translation::TranslationQueue;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{FailingProvider, FakeProvider, FlakyProvider, ManagerBuilder, TestEnvironment};

fn quick_settings(workers: usize) -> QueueSettings {
    QueueSettings {
        max_concurrent: 2,
        workers,
        slot_wait_secs: 1,
        release_delay_secs: 0,
        max_attempts: 3,
    }
}

fn two_file_fixture() -> TestEnvironment {
    let env = TestEnvironment::new();
    env.write_json("lang/en/auth.json", &json!({ "login": "Log in", "logout": "Log out" }));
    env.write_json("lang/en/shop.json", &json!({ "cart": "Cart" }));
    env
}

/// 每个文件一个任务，全部完成后写入状态与报告
#[tokio::test]
async fn test_dispatch_all_completes_every_file() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = ManagerBuilder::new(&env)
        .provider(FakeProvider::new("fake"))
        .build()
        .with_reports(store.reports.clone());

    let queue = TranslationQueue::new(Arc::new(manager), store.monitor.clone(), &quick_settings(2));
    let pool = queue.spawn_workers();

    let ids = queue.dispatch_all("en", "de", None, false).unwrap();
    assert_eq!(ids.len(), 2);

    tokio::time::timeout(Duration::from_secs(10), queue.wait_idle())
        .await
        .expect("队列应该在超时前清空");
    pool.shutdown().await;

    assert_eq!(queue.outstanding(), 0);
    assert_eq!(queue.slots().running(), 0);

    let state = store.monitor.state().unwrap();
    assert_eq!(state.totals.completed, 2);
    assert_eq!(state.totals.pending, 0);
    assert_eq!(state.totals.failed, 0);

    let auth = state.jobs.iter().find(|job| job.file == "auth.json").unwrap();
    assert_eq!(auth.status, JobStatus::Completed);
    assert_eq!(auth.translated, 2);
    assert_eq!(auth.missing, 2);
    assert_eq!(auth.last_key.as_deref(), Some("logout"));
    assert_eq!(auth.provider.as_deref(), Some("fake"));
    assert!(auth.started_at.is_some());
    assert!(auth.completed_at.is_some());

    assert_eq!(
        env.read_json("lang/de/auth.json"),
        json!({ "login": "[de] Log in", "logout": "[de] Log out" })
    );

    let reports = store.reports.all().unwrap();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.from, "en");
        assert_eq!(report.to, "de");
        assert!(ids.contains(report.context.as_ref().unwrap()));
    }
}

/// 翻译失败的任务记为 failed，不会让工作协程退出
#[tokio::test]
async fn test_failed_job_is_recorded() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = ManagerBuilder::new(&env)
        .provider(FailingProvider::new("fake"))
        .build();

    let queue = TranslationQueue::new(Arc::new(manager), store.monitor.clone(), &quick_settings(1));
    let pool = queue.spawn_workers();

    let ids = queue.dispatch_all("en", "fr", None, false).unwrap();
    tokio::time::timeout(Duration::from_secs(10), queue.wait_idle())
        .await
        .expect("队列应该在超时前清空");
    pool.shutdown().await;

    let state = store.monitor.state().unwrap();
    assert_eq!(state.totals.failed, 2);
    for id in &ids {
        let job = store.monitor.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("缺少 API 密钥"));
        assert!(job.failed_at.is_some());
    }
    assert!(!env.exists("lang/fr/auth.json"));
    assert_eq!(queue.slots().running(), 0);
}

/// 拿不到执行槽时延后，超过尝试次数后失败
#[tokio::test]
async fn test_slot_contention_releases_then_fails() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = Arc::new(ManagerBuilder::new(&env).provider(FakeProvider::new("fake")).build());

    let ctx = JobContext {
        manager: manager.clone(),
        monitor: store.monitor.clone(),
        slots: ConcurrencySlots::new(1, Duration::from_millis(20)),
        max_attempts: 2,
    };
    let held = ctx.slots.acquire().await.unwrap().expect("应该拿到唯一的执行槽");

    let file = manager.discover("en").unwrap().remove(0);
    let mut job = TranslationJob::new("en", "it", file, None, false);
    store.monitor.mark_queued(&job.id, job.describe()).unwrap();

    assert_eq!(job.handle(&ctx).await, JobOutcome::Released);
    let record = store.monitor.get(&job.id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Queued);
    assert_eq!(record.attempts, 1);

    match job.handle(&ctx).await {
        JobOutcome::Failed(message) => assert!(message.contains('2')),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.monitor.get(&job.id).unwrap().unwrap().status, JobStatus::Failed);

    drop(held);
    assert!(!env.exists("lang/it/auth.json"));
}

/// 执行槽释放后，延后的任务可以正常完成
#[tokio::test]
async fn test_released_job_completes_after_slot_frees() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = Arc::new(ManagerBuilder::new(&env).provider(FakeProvider::new("fake")).build());

    let ctx = JobContext {
        manager: manager.clone(),
        monitor: store.monitor.clone(),
        slots: ConcurrencySlots::new(1, Duration::from_millis(20)),
        max_attempts: 3,
    };
    let held = ctx.slots.acquire().await.unwrap();

    let file = manager.discover("en").unwrap().remove(1);
    let mut job = TranslationJob::new("en", "es", file, Some("fake".to_string()), false);
    store.monitor.mark_queued(&job.id, job.describe()).unwrap();

    assert_eq!(job.handle(&ctx).await, JobOutcome::Released);
    drop(held);

    match job.handle(&ctx).await {
        JobOutcome::Completed(stats) => {
            assert_eq!(stats.name, "lang/es/shop.json");
            assert_eq!(stats.translated, 1);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let record = store.monitor.get(&job.id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.attempts, 2);
    assert_eq!(record.progress_total, 1);
    assert!(record.duration_ms.is_some());
}

/// 网络类的临时错误在尝试次数内重试
#[tokio::test]
async fn test_transient_failure_is_retried() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let flaky = FlakyProvider::new("fake", 1);
    let manager = Arc::new(ManagerBuilder::new(&env).provider(flaky.clone()).build());

    let ctx = JobContext {
        manager: manager.clone(),
        monitor: store.monitor.clone(),
        slots: ConcurrencySlots::new(1, Duration::from_millis(20)),
        max_attempts: 3,
    };

    let file = manager.discover("en").unwrap().remove(1);
    let mut job = TranslationJob::new("en", "pt", file, None, false);
    store.monitor.mark_queued(&job.id, job.describe()).unwrap();

    assert_eq!(job.handle(&ctx).await, JobOutcome::Released);
    let record = store.monitor.get(&job.id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Running);
    assert!(record.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(ctx.slots.running(), 0);
    assert!(!env.exists("lang/pt/shop.json"));

    assert!(matches!(job.handle(&ctx).await, JobOutcome::Completed(_)));
    let record = store.monitor.get(&job.id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.attempts, 2);
    assert!(record.error.is_none());
    assert_eq!(env.read_json("lang/pt/shop.json"), json!({ "cart": "[pt] Cart" }));
    assert_eq!(flaky.calls(), 2);
}

/// 临时错误的重试同样受尝试次数限制
#[tokio::test]
async fn test_transient_failure_gives_up_after_max_attempts() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = Arc::new(
        ManagerBuilder::new(&env)
            .provider(FlakyProvider::new("fake", usize::MAX))
            .build(),
    );

    let ctx = JobContext {
        manager: manager.clone(),
        monitor: store.monitor.clone(),
        slots: ConcurrencySlots::new(1, Duration::from_millis(20)),
        max_attempts: 2,
    };

    let file = manager.discover("en").unwrap().remove(1);
    let mut job = TranslationJob::new("en", "pt", file, None, false);
    store.monitor.mark_queued(&job.id, job.describe()).unwrap();

    assert_eq!(job.handle(&ctx).await, JobOutcome::Released);
    match job.handle(&ctx).await {
        JobOutcome::Failed(message) => assert!(message.contains("connection reset")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.monitor.get(&job.id).unwrap().unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_state_export_matches_monitor() {
    let env = two_file_fixture();
    let store = StateStore::open(&env.path("state")).unwrap();
    let manager = ManagerBuilder::new(&env).provider(FakeProvider::new("fake")).build();

    let queue = TranslationQueue::new(Arc::new(manager), store.monitor.clone(), &quick_settings(1));
    // 没有启动工作协程，任务停留在 queued
    queue.dispatch_all("en", "nl", None, false).unwrap();
    assert_eq!(queue.outstanding(), 2);

    let path = env.path("exports/state.json");
    store.monitor.export_json(&path).unwrap();
    let exported = env.read_json("exports/state.json");
    assert_eq!(exported["totals"]["pending"], 2);
    assert_eq!(exported["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(exported["jobs"][0]["status"], "queued");
}
