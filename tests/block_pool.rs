//! Integration tests for the fixed-block pool

use memobj::{BlockPool, BlockPoolConfig, PoolInitError, MIN_BLOCK_SIZE};

#[test]
fn init_validates_configuration() {
    match BlockPool::new(3, 8) {
        Err(PoolInitError::BlockSizeTooSmall { size: 3, min }) => assert_eq!(min, MIN_BLOCK_SIZE),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        BlockPool::new(64, 0),
        Err(PoolInitError::InvalidBlockCount { count: 0, .. })
    ));
}

#[test]
fn element_size_is_the_configured_block_size() {
    let pool = BlockPool::new(48, 4).unwrap();
    assert_eq!(pool.element_size(), 48);
    assert_eq!(pool.block_count(), 4);
    assert_eq!(pool.capacity(), 192);
}

#[test]
fn every_block_is_handed_out_exactly_once() {
    let pool = BlockPool::new(16, 32).unwrap();
    let mut seen = Vec::new();
    while let Some(idx) = pool.alloc_block() {
        assert!(!seen.contains(&idx), "block {idx} handed out twice");
        seen.push(idx);
    }
    assert_eq!(seen.len(), 32);
    assert!(pool.is_exhausted());

    for idx in seen {
        pool.free_block(idx);
    }
    assert_eq!(pool.free_blocks(), 32);
}

#[test]
fn utilization_tracks_the_high_water_mark() {
    let pool = BlockPool::new(16, 8).unwrap();
    let a = pool.alloc_block().unwrap();
    let b = pool.alloc_block().unwrap();
    let c = pool.alloc_block().unwrap();
    pool.free_block(b);
    pool.free_block(c);

    let stats = pool.stats();
    assert_eq!(stats.max_utilization, 3);
    assert_eq!(stats.free_blocks, 7);
    assert_eq!(stats.block_count, 8);

    pool.free_block(a);
    assert_eq!(pool.stats().max_utilization, 3);
}

#[test]
fn production_config_skips_debug_machinery() {
    let pool = BlockPool::with_config(16, 4, BlockPoolConfig::production()).unwrap();
    let a = pool.alloc_block().unwrap();
    pool.free_block(a);
    assert_eq!(pool.free_blocks(), 4);
}

#[test]
#[should_panic(expected = "double free")]
fn debug_config_catches_double_free() {
    let pool = BlockPool::with_config(16, 4, BlockPoolConfig::debug()).unwrap();
    let a = pool.alloc_block().unwrap();
    pool.free_block(a);
    pool.free_block(a);
}
