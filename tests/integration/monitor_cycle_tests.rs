use super::*;
use restock_watcher::models::TargetStatus;
use restock_watcher::tracker::AvailabilityState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_rendered_restock_scenario() -> anyhow::Result<()> {
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedPage::with_element("Temporarily unavailable"),
        ScriptedPage::with_element("In Stock"),
        ScriptedPage::with_element("In Stock"),
    ]));
    let notifier = RecordingNotifier::default();
    let monitor = create_test_monitor(renderer.clone(), Arc::new(notifier.clone()))?;
    let target = create_test_target(
        "Graphics Card",
        "https://shop.example.com/gpu",
        RenderingMode::Rendered,
        60,
    );

    let first = monitor.check_target(&target).await;
    assert_eq!(first.status, TargetStatus::OutOfStock);
    assert_eq!(monitor.availability(&target.id).await, AvailabilityState::Unavailable);
    assert!(notifier.sent().is_empty());

    let second = monitor.check_target(&target).await;
    assert_eq!(second.status, TargetStatus::InStock);
    assert_eq!(
        second.image_url.as_deref(),
        Some("https://shop.example.com/media/item.jpg")
    );

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target_name, "Graphics Card");
    assert_eq!(sent[0].url, "https://shop.example.com/gpu");
    assert!(sent[0].text_body().contains("Graphics Card"));

    let third = monitor.check_target(&target).await;
    assert_eq!(third.status, TargetStatus::InStock);
    assert_eq!(notifier.sent().len(), 1);

    assert_eq!(renderer.opened_sessions.load(Ordering::SeqCst), 3);
    assert_eq!(renderer.live_sessions.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_element_wait_miss_then_normal_cycle() -> anyhow::Result<()> {
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedPage::without_element(),
        ScriptedPage::with_element("in stock"),
    ]));
    let notifier = RecordingNotifier::default();
    let monitor = create_test_monitor(renderer.clone(), Arc::new(notifier.clone()))?;
    let target = create_test_target("Lens", "https://shop.example.com/lens", RenderingMode::Rendered, 60);

    let missed = monitor.check_target(&target).await;
    assert_eq!(missed.status, TargetStatus::OutOfStock);
    assert!(missed.error.is_none());

    let next = monitor.check_target(&target).await;
    assert_eq!(next.status, TargetStatus::InStock);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(renderer.live_sessions.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_static_cycle_against_http_server() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kettle"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><img src="/icons/cart.png"><img src="/photos/kettle.jpg"><b>IN STOCK</b></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    let notifier = RecordingNotifier::default();
    let monitor = create_test_monitor(
        Arc::new(ScriptedRenderer::new(Vec::new())),
        Arc::new(notifier.clone()),
    )?;
    let url = format!("{}/kettle", mock_server.uri());
    let target = create_test_target("Kettle", &url, RenderingMode::Static, 60);

    let outcome = monitor.check_target(&target).await;

    assert_eq!(outcome.status, TargetStatus::InStock);
    assert_eq!(
        outcome.image_url,
        Some(format!("{}/photos/kettle.jpg", mock_server.uri()))
    );
    // First observation only
    assert!(notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_page_is_error() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let monitor = create_test_monitor(
        Arc::new(ScriptedRenderer::new(Vec::new())),
        Arc::new(RecordingNotifier::default()),
    )?;
    let target = create_test_target("Gone", &mock_server.uri(), RenderingMode::Static, 60);

    let outcome = monitor.check_target(&target).await;

    assert_eq!(outcome.status, TargetStatus::Error);
    assert!(outcome.error.as_deref().is_some_and(|e| e.contains("HTTP 404")));
    Ok(())
}

#[tokio::test]
async fn test_rendering_failure_is_error() -> anyhow::Result<()> {
    // Nothing scripted: every session fails to open
    let renderer = Arc::new(ScriptedRenderer::new(Vec::new()));
    let monitor = create_test_monitor(renderer.clone(), Arc::new(RecordingNotifier::default()))?;
    let target = create_test_target("Broken", "https://shop.example.com/broken", RenderingMode::Rendered, 60);

    let outcome = monitor.check_target(&target).await;

    assert_eq!(outcome.status, TargetStatus::Error);
    assert_eq!(renderer.live_sessions.load(Ordering::SeqCst), 0);
    Ok(())
}
