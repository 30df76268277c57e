// Integration tests have relaxed clippy settings.
// Production code (src/) must use strict zero-unwrap/panic patterns.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end coordination scenarios.

mod common;

use std::{collections::BTreeMap, time::Duration};

use foreman::{Coordinator, Error, Result};
use foreman_core::{
    DocumentType, MentionTarget, NewDocument, Role, SkillLevel, TaskHistoryEntry, TaskStatus,
};

#[tokio::test]
async fn senior_takes_junior_task_and_concurrent_junior_gets_nothing() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task = f.add_task("Fix cart rounding", "backend_dev", SkillLevel::Junior).await?;
    let senior = f.register("backend_senior_001", "backend_dev", SkillLevel::Senior).await?;
    let junior = f.register("backend_junior_001", "backend_dev", SkillLevel::Junior).await?;
    let role = Role::parse("backend_dev")?;

    let got = f
        .coordinator
        .next_task(&senior, &role, SkillLevel::Senior, Some(Duration::ZERO))
        .await?
        .expect("senior should get the task");
    assert_eq!(got.id, task.id);
    assert_eq!(got.assigned_to.as_ref(), Some(&senior));

    let nothing = f
        .coordinator
        .next_task(&junior, &role, SkillLevel::Junior, Some(Duration::from_millis(60)))
        .await?;
    assert!(nothing.is_none());
    Ok(())
}

#[tokio::test]
async fn qa_rejection_returns_task_to_the_pool() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task = f.add_task("Refund API", "backend_dev", SkillLevel::Senior).await?;
    let dev_a = f.register("dev_a", "backend_dev", SkillLevel::Senior).await?;
    let dev_b = f.register("dev_b", "backend_dev", SkillLevel::Senior).await?;
    let qa = f.register("qa_senior_001", "qa", SkillLevel::Senior).await?;
    let role = Role::parse("backend_dev")?;
    let c = &f.coordinator;

    c.next_task(&dev_a, &role, SkillLevel::Senior, Some(Duration::ZERO))
        .await?
        .expect("dev_a claims");
    c.update_task_status(task.id, &dev_a, TaskStatus::DevDone, Some("ready for QA"))
        .await?;

    c.lock_task(task.id, &qa).await?;
    c.update_task_status(task.id, &qa, TaskStatus::QaDone, None).await?;
    c.lock_task(task.id, &qa).await?;
    let rejected = c
        .update_task_status(task.id, &qa, TaskStatus::Created, Some("refund total is off by one"))
        .await?;
    assert_eq!(rejected.status, TaskStatus::Created);
    assert!(!rejected.is_locked());
    assert!(rejected.assigned_to.is_none());
    assert!(rejected.notes.contains("refund total is off by one"));

    let again = c
        .next_task(&dev_b, &role, SkillLevel::Senior, Some(Duration::ZERO))
        .await?
        .expect("rejected task is selectable again");
    assert_eq!(again.id, task.id);
    assert!(again.is_locked_by(&dev_b));

    let history = c.history(task.id).await?;
    let steps: Vec<_> = history.iter().map(|h| (h.from_status, h.to_status)).collect();
    assert_eq!(
        steps,
        vec![
            (TaskStatus::Created, TaskStatus::UnderWork),
            (TaskStatus::UnderWork, TaskStatus::DevDone),
            (TaskStatus::DevDone, TaskStatus::QaDone),
            (TaskStatus::QaDone, TaskStatus::Created),
            (TaskStatus::Created, TaskStatus::UnderWork),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn mention_round_trip() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let dev = f.register("backend_senior_001", "backend_dev", SkillLevel::Senior).await?;
    let qa = f.register("qa_senior_001", "qa", SkillLevel::Senior).await?;
    let c = &f.coordinator;

    let doc = c
        .create_document(&NewDocument {
            author_id: dev.clone(),
            title: "Refund API ready".into(),
            content: "@qa_senior_001 refunds are on the branch, please verify".into(),
            doc_type: DocumentType::Report,
            expires_at: None,
        })
        .await?;
    assert_eq!(doc.mentions, vec![qa.clone()]);

    let target = MentionTarget::Agent(qa.clone());
    let unread = c.get_mentions(&f.project, &target, true).await?;
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].author_id, dev);

    let read = c.mark_read(unread[0].id).await?;
    assert!(read.read);
    assert!(c.get_mentions(&f.project, &target, true).await?.is_empty());

    // Marking twice is harmless.
    assert!(c.mark_read(unread[0].id).await?.read);

    let by_role = c
        .get_mentions(&f.project, &MentionTarget::Role(Role::parse("qa")?), false)
        .await?;
    assert_eq!(by_role.len(), 1);
    assert!(by_role[0].read);
    Ok(())
}

#[tokio::test]
async fn reprocessing_unchanged_mentions_creates_none() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let dev = f.register("dev_01", "backend_dev", SkillLevel::Senior).await?;
    f.register("qa_senior_001", "qa", SkillLevel::Senior).await?;
    let c = &f.coordinator;

    let content = "@qa_senior_001 @qa_senior_001 see above";
    let doc = c
        .create_document(&NewDocument {
            author_id: dev.clone(),
            title: "Notes".into(),
            content: content.into(),
            doc_type: DocumentType::Note,
            expires_at: None,
        })
        .await?;
    let role = MentionTarget::Role(Role::parse("qa")?);
    assert_eq!(c.get_mentions(&f.project, &role, false).await?.len(), 1);

    c.update_document(doc.id, &dev, Some("Notes v2"), Some(content)).await?;
    c.update_document(doc.id, &dev, None, None).await?;
    assert_eq!(c.get_mentions(&f.project, &role, false).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn change_feed_is_duplicate_safe() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let dev = f.register("dev_01", "backend_dev", SkillLevel::Senior).await?;
    let c = &f.coordinator;
    let origin = chrono::Utc::now() - chrono::Duration::hours(1);

    let task = f.add_task("Feed me", "backend_dev", SkillLevel::Junior).await?;
    c.lock_task(task.id, &dev).await?;

    // Applying the same window twice yields the same state.
    let mut mirror = BTreeMap::new();
    for _ in 0..2 {
        let changes = c.get_changes(&f.project, origin, Some(&dev)).await?;
        for t in changes.tasks {
            mirror.insert(t.id, t);
        }
    }
    assert_eq!(mirror.len(), 1);
    assert!(mirror[&task.id].is_locked_by(&dev));

    let now = chrono::Utc::now();
    let fresh = c.get_changes(&f.project, now, None).await?;
    assert!(fresh.tasks.is_empty());
    assert!(fresh.documents.is_empty());
    assert!(fresh.mentions.is_empty());
    Ok(())
}

/// Fetch history and check it grew by `added` rows without touching the
/// rows already seen.
async fn history_after(
    c: &Coordinator,
    task_id: i64,
    seen: &[TaskHistoryEntry],
    added: usize,
) -> Result<Vec<TaskHistoryEntry>> {
    let history = c.history(task_id).await?;
    assert_eq!(history.len(), seen.len() + added);
    assert_eq!(&history[..seen.len()], seen);
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    Ok(history)
}

#[tokio::test]
async fn history_is_append_only() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task = f.add_task("Audit trail", "backend_dev", SkillLevel::Senior).await?;
    let dev = f.register("dev_a", "backend_dev", SkillLevel::Senior).await?;
    let qa = f.register("qa_01", "qa", SkillLevel::Senior).await?;
    let c = &f.coordinator;

    c.update_task_status(task.id, &dev, TaskStatus::UnderWork, Some("starting"))
        .await?;
    let seen = history_after(c, task.id, &[], 1).await?;

    c.update_task_status(task.id, &dev, TaskStatus::DevDone, Some("done")).await?;
    let seen = history_after(c, task.id, &seen, 1).await?;

    // Locks and refused transitions leave history alone.
    c.lock_task(task.id, &qa).await?;
    c.unlock_task(task.id, &qa).await?;
    assert!(matches!(
        c.update_task_status(task.id, &qa, TaskStatus::Committed, None).await,
        Err(Error::InvalidTransition { .. })
    ));
    let seen = history_after(c, task.id, &seen, 0).await?;

    c.lock_task(task.id, &qa).await?;
    c.update_task_status(task.id, &qa, TaskStatus::QaDone, None).await?;
    c.lock_task(task.id, &qa).await?;
    c.update_task_status(task.id, &qa, TaskStatus::Created, Some("flaky total"))
        .await?;
    let seen = history_after(c, task.id, &seen, 2).await?;

    assert_eq!(seen[0].notes.as_deref(), Some("starting"));
    assert_eq!(seen[0].agent_id, dev);
    assert_eq!(seen[3].notes.as_deref(), Some("flaky total"));
    assert_eq!(seen[3].agent_id, qa);
    Ok(())
}
