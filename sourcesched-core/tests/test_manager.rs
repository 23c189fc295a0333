//! Master manager: initialization, replication and the batch protocol

use sourcesched_core::tests::test_helpers::{single_source_manager, RecordedBatch, RecordingFactory};
use sourcesched_core::{
    ManagerConfig, PartitionStrategy, RunInterval, SourceError, SourceManager, SourceType,
    StatisticsEngineFactory,
};

fn config(threads: usize) -> ManagerConfig {
    ManagerConfig {
        threads,
        ..ManagerConfig::default()
    }
}

#[test]
fn test_single_thread_run_delivers_every_primary() {
    let mut manager = single_source_manager(config(1), 1000.0, &[(0.0, 1.0), (1.0, 2.0)]).unwrap();
    let factory = StatisticsEngineFactory::new();
    let summary = manager.start(&factory).unwrap();

    let stats = factory.statistics();
    assert_eq!(stats.event_count, 2000);
    assert_eq!(stats.run_count(), 2);
    assert_eq!(stats.batch_count, 2);
    assert_eq!(stats.out_of_interval, 0);
    assert_eq!(summary.total_expected(), 2000);
    assert_eq!(summary.total_delivered(), 2000);
    assert_eq!(summary.rounds, 2);
    assert!(!summary.aborted);
    // The master manager is kept after the run
    assert!(manager.master().map_or(false, |m| m.is_exhausted()));
}

#[test]
fn test_multi_thread_totals_match_single_thread() {
    let mut manager = single_source_manager(config(4), 1001.0, &[(0.0, 1.0), (1.0, 3.0)]).unwrap();
    let factory = StatisticsEngineFactory::new();
    let summary = manager.start(&factory).unwrap();

    let expected: Vec<u64> = summary.threads.iter().map(|t| t.expected).collect();
    assert_eq!(expected, vec![251 + 501, 250 + 501, 250 + 500, 250 + 500]);
    assert_eq!(summary.total_delivered(), 1001 + 2002);
    let stats = factory.statistics();
    assert_eq!(stats.event_count, 3003);
    assert_eq!(stats.thread_count, 4);
    assert_eq!(stats.source_events, vec![3003]);
}

#[test]
fn test_contiguous_intervals_partition() {
    let config = ManagerConfig {
        threads: 2,
        partition: PartitionStrategy::ContiguousIntervals,
        ..ManagerConfig::default()
    };
    let intervals = [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0)];
    let mut manager = single_source_manager(config, 10.0, &intervals).unwrap();
    let factory = RecordingFactory::new();
    let summary = manager.start(&factory).unwrap();

    assert_eq!(summary.threads[0].expected, 20);
    assert_eq!(summary.threads[1].expected, 20);
    assert_eq!(summary.rounds, 2);
    assert_eq!(factory.batches().len(), 4);
}

#[test]
fn test_huge_interval_is_split_at_engine_bound() {
    let mut manager = SourceManager::new(config(1));
    manager
        .add_source(SourceType::Generic, "huge")
        .unwrap()
        .set_per_run(3_000_000_000);
    manager.initialize(vec![RunInterval::new(0.0, 1.0)]).unwrap();
    manager.build().unwrap();

    let factory = RecordingFactory::new();
    let summary = manager.start(&factory).unwrap();
    assert_eq!(
        factory.batches(),
        vec![
            RecordedBatch { thread_index: 0, events: i32::MAX },
            RecordedBatch { thread_index: 0, events: (3_000_000_000u64 - i32::MAX as u64) as i32 },
        ]
    );
    assert_eq!(summary.total_delivered(), 3_000_000_000);
    assert_eq!(summary.total_batches(), 2);
}

#[test]
fn test_small_batch_bound() {
    let config = ManagerConfig {
        max_batch_events: 3,
        ..ManagerConfig::default()
    };
    let mut manager = single_source_manager(config, 10.0, &[(0.0, 1.0)]).unwrap();
    let factory = StatisticsEngineFactory::new();
    let summary = manager.start(&factory).unwrap();

    assert_eq!(summary.total_batches(), 4);
    assert_eq!(factory.statistics().event_count, 10);
    assert_eq!(factory.statistics().batch_count, 4);
}

#[test]
fn test_abort_before_start_runs_nothing() {
    let mut manager = single_source_manager(config(2), 100.0, &[(0.0, 1.0)]).unwrap();
    manager.abort_handle().abort();
    let factory = RecordingFactory::new();
    let summary = manager.start(&factory).unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.rounds, 0);
    assert_eq!(summary.total_delivered(), 0);
    assert!(factory.batches().is_empty());
}

#[test]
fn test_engine_failure_stops_the_run() {
    let config = ManagerConfig {
        max_batch_events: 10,
        ..ManagerConfig::default()
    };
    let mut manager = single_source_manager(config, 50.0, &[(0.0, 1.0)]).unwrap();
    let factory = RecordingFactory::failing_on_batch(2);
    let err = manager.start(&factory).unwrap_err();

    assert!(matches!(err, SourceError::Engine(_)));
    assert_eq!(factory.batches().len(), 2);
    assert!(manager.abort_handle().is_aborted());
    assert!(manager.master().is_some());
}

#[test]
fn test_engine_panic_during_setup_ends_the_run() {
    let mut manager = single_source_manager(config(2), 100.0, &[(0.0, 1.0)]).unwrap();
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let factory = RecordingFactory::panicking_on_setup(1);
        let result = manager.start(&factory);
        let _ = done_tx.send((result, factory.batches().len(), manager.master().is_some()));
    });

    let (result, batches, master_kept) = done_rx
        .recv_timeout(std::time::Duration::from_secs(30))
        .expect("start() did not return");
    assert_eq!(result.unwrap_err(), SourceError::WorkerPanicked { thread_index: 1 });
    assert_eq!(batches, 0);
    assert!(master_kept);
}

#[test]
fn test_activity_past_u64_is_rejected_at_initialize() {
    let mut manager = SourceManager::new(config(1));
    manager.add_source(SourceType::Generic, "big").unwrap().set_activity(1e19);
    let err = manager
        .initialize(vec![RunInterval::new(0.0, 1.0), RunInterval::new(1.0, 2.0)])
        .unwrap_err();
    assert!(matches!(err, SourceError::InvalidSource { ref name, .. } if name == "big"));
    assert_eq!(manager.expected_total("big"), Err(SourceError::NotInitialized));
    assert!(!manager.registry().is_frozen());

    // One interval fits
    manager.initialize(vec![RunInterval::new(0.0, 1.0)]).unwrap();
    assert_eq!(manager.expected_total("big"), Ok(10_000_000_000_000_000_000));
}

#[test]
fn test_lifecycle_errors() {
    let mut manager = SourceManager::new(config(1));
    assert_eq!(manager.build().unwrap_err(), SourceError::NotInitialized);
    assert_eq!(
        manager.initialize(vec![RunInterval::new(0.0, 1.0)]),
        Err(SourceError::NoSource)
    );

    manager.add_source(SourceType::Generic, "s").unwrap().set_activity(5.0);
    assert_eq!(
        manager.start(&RecordingFactory::new()).unwrap_err(),
        SourceError::NotInitialized
    );
    assert!(matches!(
        manager.initialize(vec![RunInterval::new(1.0, 0.0)]),
        Err(SourceError::InvalidTiming(_))
    ));

    manager.initialize(vec![RunInterval::new(0.0, 2.0)]).unwrap();
    assert_eq!(manager.expected_total("s"), Ok(10));
    assert_eq!(
        manager.start(&RecordingFactory::new()).unwrap_err(),
        SourceError::NotBuilt
    );
}

#[test]
fn test_zero_threads_is_rejected() {
    let err = single_source_manager(config(0), 1.0, &[(0.0, 1.0)]).unwrap_err();
    assert!(matches!(err, SourceError::InvalidConfig(_)));
}

#[test]
fn test_replicas_use_distinct_streams() {
    let manager = single_source_manager(config(3), 10.0, &[(0.0, 1.0)]).unwrap();
    let seeds: Vec<u64> = (0..3)
        .map(|t| manager.create_thread_manager(t).unwrap().thread_seed())
        .collect();
    assert_ne!(seeds[0], seeds[1]);
    assert_ne!(seeds[1], seeds[2]);
    assert_eq!(manager.master().unwrap().thread_seed(), seeds[0]);
}

#[test]
fn test_thousand_becquerel_over_two_seconds() {
    let mut manager = single_source_manager(config(1), 1000.0, &[(0.0, 2.0)]).unwrap();
    let factory = StatisticsEngineFactory::new();
    manager.start(&factory).unwrap();
    assert_eq!(factory.statistics().event_count, 2000);
}

#[test]
fn test_initialize_checks_overlaps() {
    let mut manager = SourceManager::new(config(1));
    manager.add_source(SourceType::Generic, "s").unwrap().set_activity(1.0);
    assert!(matches!(
        manager.initialize(vec![RunInterval::new(0.0, 10.0), RunInterval::new(5.0, 15.0)]),
        Err(SourceError::InvalidTiming(_))
    ));
    assert!(manager
        .initialize(vec![RunInterval::new(0.0, 10.0), RunInterval::new(10.0, 20.0)])
        .is_ok());
    assert_eq!(manager.expected_total("s"), Ok(20));
}
