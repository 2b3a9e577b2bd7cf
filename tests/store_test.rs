use blockstore::{BlockStore, Geometry, StoreError};

#[test]
fn fresh_store_reports_full_capacity() {
    let store = BlockStore::new();
    assert_eq!(store.total_blocks(), 255);
    assert_eq!(store.free_blocks(), 255);
    assert_eq!(store.used_blocks(), 0);
}

#[test]
fn allocation_scenario_reuses_the_lowest_free_block() {
    let mut store = BlockStore::new();

    assert_eq!(store.allocate().unwrap(), 1);
    store.request(5).unwrap();
    assert_eq!(store.allocate().unwrap(), 2);
    store.release(1);
    assert_eq!(store.allocate().unwrap(), 1);
}

#[test]
fn used_plus_free_always_equals_total() {
    let mut store = BlockStore::new();
    let total = store.total_blocks();

    for _ in 0..20 {
        store.allocate().unwrap();
    }
    assert_eq!(store.used_blocks() + store.free_blocks(), total);

    for block in (2..20).step_by(3) {
        store.release(block);
    }
    assert_eq!(store.used_blocks() + store.free_blocks(), total);

    store.request(100).unwrap();
    assert_eq!(store.used_blocks() + store.free_blocks(), total);
}

#[test]
fn filling_the_store_exhausts_automatic_allocation() {
    let mut store = BlockStore::with_geometry(Geometry {
        block_size: 16,
        block_count: 10,
    })
    .unwrap();

    let mut claimed = 0;
    while store.allocate().is_ok() {
        claimed += 1;
    }
    // The top index is only reachable by explicit request.
    store.request(9).unwrap();
    claimed += 1;

    assert_eq!(claimed, store.total_blocks());
    assert_eq!(store.free_blocks(), 0);
    assert_eq!(store.allocate(), Err(StoreError::Exhausted));
}

#[test]
fn block_content_survives_release_and_reallocation() {
    let mut store = BlockStore::new();
    store.request(12).unwrap();

    let mut content = vec![0u8; 256];
    content[0..5].copy_from_slice(b"hello");
    store.write(12, &content).unwrap();

    // Releasing only clears the occupancy bit, never the bytes.
    store.release(12);
    store.request(12).unwrap();

    let mut out = vec![0u8; 256];
    store.read(12, &mut out).unwrap();
    assert_eq!(out, content);
}

#[test]
fn dumped_image_restores_state_and_content() {
    let mut store = BlockStore::with_geometry(Geometry {
        block_size: 32,
        block_count: 8,
    })
    .unwrap();
    store.request(2).unwrap();
    store.write(2, &vec![0x7E; 32]).unwrap();

    let mut image = Vec::new();
    store.dump_image(&mut image).unwrap();

    let restored = BlockStore::load_image(std::io::Cursor::new(image)).unwrap();
    assert_eq!(restored.used_blocks(), 1);
    assert_eq!(restored.free_blocks(), store.free_blocks());
    let mut out = vec![0; 32];
    restored.read(2, &mut out).unwrap();
    assert_eq!(out, vec![0x7E; 32]);
}
