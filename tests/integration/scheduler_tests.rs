use super::*;
use restock_watcher::models::TargetStatus;
use restock_watcher::scheduler::JobStatus;
use tempfile::TempDir;

#[tokio::test]
async fn test_scheduler_monitors_and_persists() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedPage::with_element("sold out"),
        ScriptedPage::with_element("In stock now"),
    ]));
    let notifier = RecordingNotifier::default();
    let (scheduler, store) = create_test_scheduler(dir.path(), renderer.clone(), Arc::new(notifier.clone()))?;

    let target = create_test_target("Monitor", "https://shop.example.com/monitor", RenderingMode::Rendered, 1);
    store.add(target.clone()).await?;

    let scheduled = scheduler.start(store.load().await).await;
    assert_eq!(scheduled, 1);

    let notified = wait_for_condition(|| async { !notifier.sent().is_empty() }, 10).await;
    assert!(notified, "restock alert was never sent");

    scheduler.shutdown().await;

    let stored = store.try_load().await?;
    assert_eq!(stored[0].status, TargetStatus::InStock);
    assert_eq!(
        stored[0].image_url.as_deref(),
        Some("https://shop.example.com/media/item.jpg")
    );
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(renderer.live_sessions.load(Ordering::SeqCst), 0);

    let info = scheduler.get_job_info(&target.id).await.expect("job info kept after shutdown");
    assert_eq!(info.status, JobStatus::Stopped);
    assert_eq!(info.notifications_sent, 1);
    Ok(())
}

#[tokio::test]
async fn test_targets_run_independently() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let renderer = Arc::new(ScriptedRenderer::new(vec![ScriptedPage::with_element("in stock")]));
    let (scheduler, store) = create_test_scheduler(dir.path(), renderer, Arc::new(RecordingNotifier::default()))?;

    let failing = create_test_target("Failing", &mock_server.uri(), RenderingMode::Static, 1);
    let healthy = create_test_target("Healthy", "https://shop.example.com/ok", RenderingMode::Rendered, 1);
    store.save(&[failing.clone(), healthy.clone()]).await?;

    scheduler.start(store.load().await).await;

    let both_ran = wait_for_condition(
        || async {
            let stored = store.try_load().await.unwrap_or_default();
            stored.iter().all(|t| t.last_checked.is_some())
        },
        10,
    )
    .await;
    assert!(both_ran);

    let stats = scheduler.get_stats().await;
    assert_eq!(stats.total_jobs, 2);
    assert!(stats.failed_runs >= 1);
    assert!(stats.completed_runs >= 1);

    scheduler.shutdown().await;

    let stored = store.try_load().await?;
    let status_of = |id: &str| stored.iter().find(|t| t.id == id).map(|t| t.status);
    assert_eq!(status_of(&failing.id), Some(TargetStatus::Error));
    assert_eq!(status_of(&healthy.id), Some(TargetStatus::InStock));
    Ok(())
}

#[tokio::test]
async fn test_sub_floor_interval_is_not_scheduled() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (scheduler, _store) = create_test_scheduler(
        dir.path(),
        Arc::new(ScriptedRenderer::new(Vec::new())),
        Arc::new(RecordingNotifier::default()),
    )?;

    let target = create_test_target("Too Fast", "https://shop.example.com/fast", RenderingMode::Rendered, 0);
    assert!(scheduler.schedule_target(target.clone()).await.is_err());
    assert!(!scheduler.is_scheduled(&target.id).await);
    Ok(())
}

#[tokio::test]
async fn test_removing_target_stops_its_loop() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let renderer = Arc::new(ScriptedRenderer::new(vec![ScriptedPage::with_element("sold out")]));
    let (scheduler, store) = create_test_scheduler(dir.path(), renderer.clone(), Arc::new(RecordingNotifier::default()))?;

    let target = create_test_target("Removed", "https://shop.example.com/removed", RenderingMode::Rendered, 1);
    store.add(target.clone()).await?;
    scheduler.schedule_target(target.clone()).await?;

    assert!(wait_for_condition(|| async { renderer.opened_sessions.load(Ordering::SeqCst) >= 1 }, 5).await);
    store.remove(&target.id).await?;

    let stopped = wait_for_condition(|| async { !scheduler.is_scheduled(&target.id).await }, 5).await;
    assert!(stopped);

    let sessions = renderer.opened_sessions.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(renderer.opened_sessions.load(Ordering::SeqCst), sessions);
    Ok(())
}
