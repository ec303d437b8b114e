use hyperion_sort::block::BlockManager;
use hyperion_sort::cache::{AdaptiveCache, CacheKey};
use hyperion_sort::compression::{CompressionOutcome, CompressionSort};
use hyperion_sort::merge::{is_non_decreasing, multiway_merge};
use hyperion_sort::selector::StrategySelector;
use hyperion_sort::{sort, Algorithm, SortConfig, SortEngine, SortResult, Strategy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use tempfile::TempDir;

fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut copy = data.to_vec();
    copy.sort_by(f64::total_cmp);
    copy
}

fn engine(config: SortConfig) -> SortEngine {
    SortEngine::new(config.with_seed(Some(1234))).expect("Failed to build engine")
}

#[test]
fn test_empty_and_single() {
    let engine = engine(SortConfig::default());

    let (data, stats) = engine.sort(&[]);
    assert!(data.is_empty());
    assert_eq!(stats.items_processed, 0);
    assert!(!stats.error_detected);

    let (data, _) = engine.sort(&[5.0]);
    assert_eq!(data, vec![5.0]);
}

#[test]
fn test_forced_radix_on_integers() {
    let engine = engine(SortConfig::default().with_strategy(Strategy::RadixSort));
    let (data, stats) = engine.sort(&[3.0, 1.0, 2.0]);
    assert_eq!(data, vec![1.0, 2.0, 3.0]);
    assert_eq!(stats.algorithm_used, Some(Algorithm::RadixSort));
}

#[test]
fn test_ascending_input_is_unchanged() {
    let engine = engine(SortConfig::default());
    let input: Vec<f64> = (0..5000).map(f64::from).collect();

    let (data, stats) = engine.sort(&input);
    assert_eq!(data, input);
    assert_eq!(stats.strategy_used, Strategy::Adaptive);
    assert!(stats.strategy_used.is_stable_class());
}

#[test]
fn test_two_million_random_integers() -> SortResult<()> {
    let mut rng = StdRng::seed_from_u64(99);
    let input: Vec<f64> = (0..2_000_000)
        .map(|_| rng.gen_range(0..1_000_000_000u64) as f64)
        .collect();

    let config = SortConfig::default().with_seed(Some(1234));
    let expected_strategy = StrategySelector::from_config(&config)?.select(&input);

    let engine = SortEngine::new(config)?;
    let (data, stats) = engine.sort(&input);

    assert!(is_non_decreasing(&data));
    assert_eq!(data, sorted_copy(&input));
    assert_eq!(stats.strategy_used, expected_strategy);
    assert_ne!(stats.strategy_used, Strategy::ExternalSort);
    assert!(!stats.error_detected);
    Ok(())
}

#[test]
fn test_compression_below_threshold_is_noop() -> SortResult<()> {
    let input = vec![9.0, 4.0, 7.0];
    let outcome = CompressionSort::new(10_000).sort(&input)?;
    assert_eq!(outcome, CompressionOutcome::Skipped { data: input.clone() });
    assert_eq!(outcome.ratio(), 1.0);

    let engine = engine(SortConfig::default().with_strategy(Strategy::CompressionSort));
    let (data, stats) = engine.sort(&input);
    assert_eq!(stats.compression_ratio, 1.0);
    assert_eq!(data, vec![4.0, 7.0, 9.0]);
    Ok(())
}

#[test]
fn test_auto_goes_external_above_threshold() -> SortResult<()> {
    let temp_dir = TempDir::new()?;
    let config = SortConfig::default()
        .with_external_sort_threshold(1000)
        .with_external_buffer_size(2048)
        .with_temp_dir(Some(temp_dir.path().to_path_buf()));
    let engine = engine(config);

    let mut rng = StdRng::seed_from_u64(7);
    let input: Vec<f64> = (0..5000).map(|_| rng.gen_range(-50.0..50.0)).collect();
    let (data, stats) = engine.sort(&input);

    assert_eq!(stats.strategy_used, Strategy::ExternalSort);
    assert_eq!(data, sorted_copy(&input));
    assert!(stats.performance.io_operations > 1);
    assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_learned_model_from_file() -> SortResult<()> {
    // Bias alone picks HYBRID
    let json = r#"{
        "weights": [[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],
                    [0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0]],
        "bias": [0, 0, 1, 0, 0, 0]
    }"#;
    let mut model = tempfile::NamedTempFile::new()?;
    model.write_all(json.as_bytes())?;

    let config = SortConfig::default()
        .with_learned_predictor(true)
        .with_predictor_model(Some(model.path().to_path_buf()));
    let engine = engine(config);

    let mut rng = StdRng::seed_from_u64(8);
    let input: Vec<f64> = (0..3000).map(|_| rng.gen::<f64>()).collect();
    let (data, stats) = engine.sort(&input);
    assert_eq!(stats.strategy_used, Strategy::Hybrid);
    assert_eq!(data, sorted_copy(&input));
    Ok(())
}

#[test]
fn test_missing_model_fails_construction() {
    let config = SortConfig::default()
        .with_learned_predictor(true)
        .with_predictor_model(Some("/nonexistent/model.json".into()));
    assert!(SortEngine::new(config).is_err());
}

#[test]
fn test_sort_convenience() -> SortResult<()> {
    let (data, stats) = sort(&[2.0, f64::NEG_INFINITY, -0.0, 1.0], &SortConfig::default())?;
    assert_eq!(data[0], f64::NEG_INFINITY);
    assert!(is_non_decreasing(&data));
    assert_eq!(stats.items_processed, 4);
    Ok(())
}

#[test]
fn test_stream_api() {
    let engine = engine(SortConfig::default().with_chunk_size(Some(1000)));
    let source = (0..3500).map(|i| ((i * 7919) % 3500) as f64);

    let (data, stats) = engine.sort_stream(source);
    assert_eq!(data, (0..3500).map(f64::from).collect::<Vec<_>>());
    assert_eq!(stats.stream_chunks, 4);
    assert_eq!(stats.strategy_used, Strategy::Stream);
}

#[test]
fn test_random_inputs_every_strategy() -> SortResult<()> {
    let temp_dir = TempDir::new()?;
    let mut rng = StdRng::seed_from_u64(2024);

    for len in [1usize, 2, 15, 17, 999, 1001, 4097] {
        let input: Vec<f64> = (0..len).map(|_| rng.gen_range(-1e3..1e3)).collect();
        let expected = sorted_copy(&input);

        for strategy in Strategy::ALL {
            let config = SortConfig::default()
                .with_strategy(strategy)
                .with_worker_count(Some(3))
                .with_temp_dir(Some(temp_dir.path().to_path_buf()));
            let (data, stats) = engine(config).sort(&input);
            assert_eq!(data, expected, "{strategy} on {len} items");
            assert!(!stats.error_detected, "{strategy} on {len} items");
        }
    }
    Ok(())
}

#[test]
fn test_block_round_trip_and_merge() {
    let mut rng = StdRng::seed_from_u64(55);
    let input: Vec<f64> = (0..10_007).map(|_| rng.gen_range(0.0..1.0)).collect();

    for block_size in [1, 7, 1000, 20_000] {
        let manager = BlockManager::new(block_size);
        let blocks = manager.split(&input);
        assert_eq!(sorted_copy(&manager.merge(&blocks)), sorted_copy(&input));

        let sorted_blocks: Vec<Vec<f64>> = blocks.iter().map(|b| sorted_copy(b)).collect();
        let merged = multiway_merge(&sorted_blocks);
        assert_eq!(merged, sorted_copy(&input));
    }

    let none: Vec<Vec<f64>> = Vec::new();
    assert!(multiway_merge(&none).is_empty());
}

#[test]
fn test_cache_bounded_by_capacity() {
    let cache: AdaptiveCache<CacheKey, usize> = AdaptiveCache::new(8);
    for i in 0..500u64 {
        cache.put(CacheKey::Int(i), i as usize);
        assert!(cache.len() <= cache.capacity());
        let _ = cache.get(&CacheKey::Int(i / 2));
    }
}
