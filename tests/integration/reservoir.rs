//! Reservoir behavior against the file-backed store.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use tempfile::TempDir;

use modelquota::quota::{
    CalendarDay, FileStore, ManualClock, QuotaReservoir, Reservation, ResourceSpec,
};

fn day(d: u32) -> CalendarDay {
    NaiveDate::from_ymd_opt(2025, 11, d).expect("valid date")
}

async fn open_reservoir(
    dir: &TempDir,
    resources: Vec<ResourceSpec>,
    clock: &ManualClock,
) -> QuotaReservoir {
    let store = FileStore::open(dir.path()).await.expect("store");
    QuotaReservoir::with_clock(resources, Arc::new(store), Arc::new(clock.clone()))
        .expect("reservoir")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cloned_handles_share_capacity() {
    let temp_dir = TempDir::new().expect("temp dir");
    let clock = ManualClock::new(day(1));
    let reservoir = open_reservoir(
        &temp_dir,
        vec![ResourceSpec::new("pro", 4), ResourceSpec::new("flash", 6)],
        &clock,
    )
    .await;

    let tasks = (0..25).map(|_| {
        let handle = reservoir.clone();
        tokio::spawn(async move { handle.reserve().await })
    });
    let results: Vec<Reservation> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("join").expect("reserve"))
        .collect();

    let granted_to = |name: &str| {
        results
            .iter()
            .filter(|r| r.resource() == Some(name))
            .count()
    };
    assert_eq!(granted_to("pro"), 4);
    assert_eq!(granted_to("flash"), 6);
    assert_eq!(results.iter().filter(|r| !r.is_granted()).count(), 15);

    // Every grant for a resource carries a distinct count.
    let mut pro_counts: Vec<u32> = results
        .iter()
        .filter_map(|r| r.grant())
        .filter(|g| g.resource == "pro")
        .map(|g| g.used)
        .collect();
    pro_counts.sort_unstable();
    assert_eq!(pro_counts, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_restart_then_rollover() {
    let temp_dir = TempDir::new().expect("temp dir");
    let clock = ManualClock::new(day(14));
    let resources = vec![ResourceSpec::new("only", 2)];

    {
        let reservoir = open_reservoir(&temp_dir, resources.clone(), &clock).await;
        for _ in 0..3 {
            reservoir.reserve().await.expect("reserve");
        }
    }

    let reservoir = open_reservoir(&temp_dir, resources, &clock).await;
    let summary = reservoir.summary().await.expect("summary");
    assert!(summary.is_exhausted());
    assert_eq!(summary.resources[0].used, 2);

    clock.advance_days(1);
    let reservation = reservoir.reserve().await.expect("reserve");
    assert_eq!(reservation.grant().map(|g| g.day), Some(day(15)));

    let usage = reservoir.current_usage().await.expect("usage");
    assert_eq!(usage.count("only", day(14)), 2);
    assert_eq!(usage.count("only", day(15)), 1);
}
