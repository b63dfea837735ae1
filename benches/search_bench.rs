//! Benchmark for the record-number search path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempfile::tempdir;

use colstore::{
    search, ChildRef, DiskManager, FixedLeaf, InternalPage, LeafPage, Node, PageCache, Recno,
    SearchContext, SearchCursor, Tree, Update,
};

fn build_tree(cache: &PageCache, leaves: u64, per_leaf: u64) -> Tree {
    let mut children = vec![];
    for i in 0..leaves {
        let start = 1 + i * per_leaf;
        let mut leaf = FixedLeaf::new(Recno::new(start), 8, vec![0u8; (per_leaf * 8) as usize]);
        if i == leaves - 1 {
            for k in 0..32 {
                leaf.append_mut().insert(
                    Recno::new(start + per_leaf + k * 2),
                    Update::Value(vec![0u8; 8]),
                );
            }
        }
        let page_id = cache.install(Node::Leaf(LeafPage::Fixed(leaf))).unwrap();
        children.push(ChildRef {
            start: Recno::new(start),
            child: page_id,
        });
    }
    let root = cache
        .install(Node::Internal(InternalPage::new(children)))
        .unwrap();
    Tree::new(root)
}

fn bench_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let disk = DiskManager::create(dir.path().join("bench.db")).unwrap();
    let cache = PageCache::new(128, disk);
    let tree = build_tree(&cache, 64, 256);
    let ctx = SearchContext {
        cache: &cache,
        tree: &tree,
    };
    let max = 64 * 256;

    c.bench_function("search_resident_tree", |b| {
        let mut cursor = SearchCursor::new();
        let mut target = 1u64;
        b.iter(|| {
            target = target % max + 7919;
            let recno = Recno::new(target.min(max));
            search(&ctx, &mut cursor, black_box(recno), false).unwrap();
            black_box(cursor.recno());
        });
    });

    c.bench_function("search_append_overlay", |b| {
        let mut cursor = SearchCursor::new();
        let mut offset = 0u64;
        b.iter(|| {
            offset = (offset + 1) % 64;
            let recno = Recno::new(max + 1 + offset);
            search(&ctx, &mut cursor, black_box(recno), false).unwrap();
            black_box(cursor.outcome());
        });
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
