use super::*;
use restock_watcher::models::{TargetEdit, TargetStatus};
use restock_watcher::utils::error::PersistenceError;
use tempfile::TempDir;
use validator::Validate;

#[tokio::test]
async fn test_malformed_list_loads_empty() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("products.json");
    tokio::fs::write(&path, r#"[{"name": "Half written""#).await?;
    let store = TargetStore::new(&path);

    assert!(matches!(store.try_load().await, Err(PersistenceError::Malformed(_))));
    assert!(store.load().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_reads_existing_product_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("products.json");
    let legacy = serde_json::json!([
        {
            "name": "Example Product 1",
            "url": "https://example.com/product1",
            "isDynamic": false,
            "stockIndicator": "in stock",
            "elementSelector": "",
            "checkInterval": 300,
            "lastChecked": null,
            "status": "Not Checked",
            "imageUrl": null
        },
        {
            "name": "Example Product 2",
            "url": "https://example.com/product2",
            "isDynamic": true,
            "stockIndicator": "add to cart",
            "elementSelector": "#stock-status",
            "checkInterval": 600,
            "lastChecked": "2024-05-01 08:00:00",
            "status": "Out of Stock",
            "imageUrl": "https://example.com/p2.jpg"
        }
    ]);
    tokio::fs::write(&path, serde_json::to_string_pretty(&legacy)?).await?;

    let store = TargetStore::new(&path);
    let targets = store.try_load().await?;

    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].rendering_mode, RenderingMode::Static);
    assert!(targets[0].element_selector.is_none());
    assert_eq!(targets[1].rendering_mode, RenderingMode::Rendered);
    assert_eq!(targets[1].status, TargetStatus::OutOfStock);
    assert_eq!(targets[1].check_interval, 600);

    // Rewritten in the current format with stable ids
    let raw = tokio::fs::read_to_string(&path).await?;
    assert!(raw.contains("\"renderingMode\": \"rendered\""));
    assert_eq!(store.try_load().await?, targets);
    Ok(())
}

#[tokio::test]
async fn test_check_outcome_round_trips_through_store() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (scheduler, store) = create_test_scheduler(
        dir.path(),
        Arc::new(ScriptedRenderer::new(vec![ScriptedPage::with_element("In Stock")])),
        Arc::new(RecordingNotifier::default()),
    )?;

    let target = create_test_target("Drone", "https://shop.example.com/drone", RenderingMode::Rendered, 60);
    store.add(target.clone()).await?;

    let outcome = scheduler.run_now(&target).await?;
    assert_eq!(outcome.status, TargetStatus::InStock);

    let stored = store.try_load().await?;
    assert_eq!(stored[0].status, TargetStatus::InStock);
    assert_eq!(stored[0].last_checked, Some(outcome.checked_at));
    assert_eq!(stored[0].name, "Drone");
    Ok(())
}

#[tokio::test]
async fn test_blocked_id_rewrite_keeps_valid_list() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("products.json");
    let legacy = serde_json::json!([{
        "name": "Example Product 1",
        "url": "https://example.com/product1",
        "isDynamic": false,
        "stockIndicator": "in stock",
        "checkInterval": 300
    }]);
    tokio::fs::write(&path, serde_json::to_string_pretty(&legacy)?).await?;
    tokio::fs::create_dir(dir.path().join("products.json.tmp")).await?;

    let store = TargetStore::new(&path);
    let targets = store.load().await;

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].url, "https://example.com/product1");
    Ok(())
}

#[tokio::test]
async fn test_edit_through_store_keeps_run_state() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let (scheduler, store) = create_test_scheduler(
        dir.path(),
        Arc::new(ScriptedRenderer::new(vec![ScriptedPage::with_element("In Stock")])),
        Arc::new(RecordingNotifier::default()),
    )?;

    let target = create_test_target("Drone", "https://shop.example.com/drone", RenderingMode::Rendered, 60);
    store.add(target.clone()).await?;
    scheduler.run_now(&target).await?;

    let edit = TargetEdit {
        name: Some("Drone Pro".to_string()),
        element_selector: Some("#availability".to_string()),
        check_interval: Some(120),
        ..Default::default()
    };
    edit.validate()?;

    let found = store.find("Drone").await?.expect("stored target");
    let updated = store
        .update(&found.id, |t| t.apply_edit(edit))
        .await?
        .expect("target still stored");

    assert_eq!(updated.id, target.id);
    assert_eq!(updated.name, "Drone Pro");
    assert_eq!(updated.element_selector.as_deref(), Some("#availability"));
    assert_eq!(updated.check_interval, 120);
    assert_eq!(updated.status, TargetStatus::InStock);
    assert!(updated.last_checked.is_some());

    assert_eq!(store.try_load().await?, vec![updated]);
    assert!(store.find("Drone").await?.is_none());
    Ok(())
}
