// Integration tests have relaxed clippy settings.
// Production code (src/) must use strict zero-unwrap/panic patterns.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]
//! Races between agents on a shared on-disk store.

mod common;

use std::{sync::Arc, time::Duration};

use foreman::{Error, Result};
use foreman_core::{
    AgentId, Complexity, ManualClock, NewTask, Role, SkillLevel, TaskFilter, TaskStatus,
};
use tokio::{sync::Barrier, task::JoinSet};

const CONTENDERS: usize = 8;

#[tokio::test]
async fn concurrent_lock_has_one_winner() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task_id = f.add_task("Contended", "backend_dev", SkillLevel::Junior).await?.id;

    let mut agents = Vec::new();
    for i in 0..CONTENDERS {
        agents.push(
            f.register(&format!("dev_{i:02}"), "backend_dev", SkillLevel::Senior)
                .await?,
        );
    }

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let mut set = JoinSet::new();
    for agent in agents {
        let c = f.coordinator.clone();
        let barrier = Arc::clone(&barrier);
        set.spawn(async move {
            barrier.wait().await;
            c.lock_task(task_id, &agent).await
        });
    }

    let mut winners = 0;
    let mut already_locked = 0;
    while let Some(joined) = set.join_next().await {
        match joined.expect("lock task panicked") {
            Ok(_) => winners += 1,
            Err(Error::AlreadyLocked { .. }) => already_locked += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(already_locked, CONTENDERS - 1);
    assert!(f.coordinator.get_task(task_id).await?.is_locked());
    Ok(())
}

#[tokio::test]
async fn concurrent_next_task_has_one_winner() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task = f.add_task("Only one", "backend_dev", SkillLevel::Junior).await?;

    let mut agents = Vec::new();
    for i in 0..CONTENDERS {
        agents.push(
            f.register(&format!("dev_{i:02}"), "backend_dev", SkillLevel::Senior)
                .await?,
        );
    }

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let mut set = JoinSet::new();
    for agent in agents {
        let c = f.coordinator.clone();
        let barrier = Arc::clone(&barrier);
        set.spawn(async move {
            let role = Role::parse("backend_dev")?;
            barrier.wait().await;
            c.next_task(&agent, &role, SkillLevel::Senior, Some(Duration::ZERO))
                .await
        });
    }

    let mut claimed = Vec::new();
    let mut empty = 0;
    while let Some(joined) = set.join_next().await {
        match joined.expect("selector task panicked")? {
            Some(t) => claimed.push(t),
            None => empty += 1,
        }
    }

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, task.id);
    assert_eq!(claimed[0].status, TaskStatus::UnderWork);
    assert_eq!(empty, CONTENDERS - 1);
    Ok(())
}

#[tokio::test]
async fn one_agent_never_owns_two_active_tasks() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    f.add_task("first", "backend_dev", SkillLevel::Junior).await?;
    f.add_task("second", "backend_dev", SkillLevel::Junior).await?;
    let agent = f.register("dev_solo", "backend_dev", SkillLevel::Senior).await?;

    let barrier = Arc::new(Barrier::new(2));
    let mut set = JoinSet::new();
    for _ in 0..2 {
        let c = f.coordinator.clone();
        let agent = agent.clone();
        let barrier = Arc::clone(&barrier);
        set.spawn(async move {
            let role = Role::parse("backend_dev")?;
            barrier.wait().await;
            c.next_task(&agent, &role, SkillLevel::Senior, Some(Duration::ZERO))
                .await
        });
    }

    let mut claimed = 0;
    let mut busy = 0;
    while let Some(joined) = set.join_next().await {
        match joined.expect("selector task panicked") {
            Ok(Some(_)) => claimed += 1,
            Err(Error::AgentBusy { .. }) => busy += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!((claimed, busy), (1, 1));

    let active = f
        .coordinator
        .list_tasks(
            &TaskFilter::project(f.project.clone())
                .with_status(TaskStatus::UnderWork)
                .with_locked_by(agent.clone()),
        )
        .await?;
    assert_eq!(active.len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_wait_respects_poll_interval_and_deadline() -> Result<()> {
    let mut config = common::fast_config();
    config.selector.poll_interval_ms = 50;
    let f = common::fixture(config).await?;
    let agent = f.register("dev_idle", "backend_dev", SkillLevel::Senior).await?;
    let role = Role::parse("backend_dev")?;
    let wait = Duration::from_millis(200);

    let started = tokio::time::Instant::now();
    let got = f
        .coordinator
        .next_task(&agent, &role, SkillLevel::Senior, Some(wait))
        .await?;
    let elapsed = started.elapsed();

    assert!(got.is_none());
    assert!(elapsed >= Duration::from_millis(50), "returned after {elapsed:?}");
    assert!(elapsed <= wait + Duration::from_secs(2), "returned after {elapsed:?}");
    Ok(())
}

#[tokio::test]
async fn wait_is_clamped_to_max_wait() -> Result<()> {
    let mut config = common::fast_config();
    config.selector.max_wait_secs = 1;
    let f = common::fixture(config).await?;
    let agent: AgentId = f.register("dev_idle", "backend_dev", SkillLevel::Senior).await?;
    let role = Role::parse("backend_dev")?;

    let started = tokio::time::Instant::now();
    let got = f
        .coordinator
        .next_task(&agent, &role, SkillLevel::Senior, Some(Duration::from_secs(3600)))
        .await?;

    assert!(got.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn lock_gate_sees_a_rejection_committed_while_waiting() -> Result<()> {
    let f = common::fixture(common::fast_config()).await?;
    let task_id = f.add_task("Refund API", "backend_dev", SkillLevel::Senior).await?.id;
    let dev = f.register("dev_a", "backend_dev", SkillLevel::Senior).await?;
    let qa = f.register("qa_01", "qa", SkillLevel::Senior).await?;
    let outsider = f.register("fe_junior", "frontend_dev", SkillLevel::Junior).await?;
    let c = &f.coordinator;

    c.update_task_status(task_id, &dev, TaskStatus::UnderWork, None).await?;
    c.update_task_status(task_id, &dev, TaskStatus::DevDone, None).await?;
    c.lock_task(task_id, &qa).await?;
    c.update_task_status(task_id, &qa, TaskStatus::QaDone, None).await?;

    // A rejection sits uncommitted behind the write lock while the outsider
    // asks for the (still qa_done) hand-off lock.
    let mut rejection = c
        .database()
        .pool()
        .begin_with("BEGIN IMMEDIATE")
        .await
        .unwrap();
    sqlx::query("UPDATE tasks SET status = 'created', assigned_to = NULL WHERE id = ?")
        .bind(task_id)
        .execute(&mut *rejection)
        .await
        .unwrap();

    let locker = {
        let c = c.clone();
        let outsider = outsider.clone();
        tokio::spawn(async move { c.lock_task(task_id, &outsider).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    rejection.commit().await.unwrap();

    match locker.await.expect("lock task panicked") {
        Err(Error::PermissionDenied(_)) => {}
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
    let task = c.get_task(task_id).await?;
    assert_eq!(task.status, TaskStatus::Created);
    assert!(!task.is_locked());
    Ok(())
}

#[tokio::test]
async fn change_committed_after_a_read_reaches_the_next_read() -> Result<()> {
    let start = chrono::Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let f = common::fixture_with_clock(common::fast_config(), clock.clone()).await?;
    let c = &f.coordinator;

    // Another writer holds the store's write lock.
    let blocker = c
        .database()
        .pool()
        .begin_with("BEGIN IMMEDIATE")
        .await
        .unwrap();

    let writer = {
        let c = c.clone();
        let task = NewTask {
            feature_id: f.feature_id,
            title: "Late arrival".into(),
            description: String::new(),
            target_role: Role::parse("backend_dev")?,
            target_skill: SkillLevel::Junior,
            difficulty: 1,
            complexity: Complexity::Minor,
            created_by: f.pm.clone(),
        };
        tokio::spawn(async move { c.create_task(&task).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    clock.advance(chrono::Duration::seconds(5));

    let first = c
        .get_changes(&f.project, start - chrono::Duration::seconds(1), None)
        .await?;
    assert!(first.tasks.is_empty());

    blocker.commit().await.unwrap();
    let task = writer.await.expect("writer panicked")?;

    let second = c.get_changes(&f.project, first.cursor, None).await?;
    assert!(
        second.tasks.iter().any(|t| t.id == task.id),
        "task stamped {} was not delivered after cursor {}",
        task.updated_at,
        first.cursor
    );
    Ok(())
}
