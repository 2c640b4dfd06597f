use criterion::{black_box, criterion_group, criterion_main, Criterion};

use certchain_core::{block_hash, IssueRequest, PrevLink, RecordId, Timestamp};

fn bench_hashing(c: &mut Criterion) {
    let issued = Timestamp::now();
    let provisional = IssueRequest::new("Alice", "Algorithms")
        .expect("valid request")
        .draft(issued)
        .assign_id(RecordId(1));
    let payload = provisional.canonical_payload().expect("payload encodes");
    let previous = PrevLink::Block(provisional.provisional_hash);

    c.bench_function("content_hash", |b| {
        b.iter(|| {
            IssueRequest::new(black_box("Alice"), black_box("Algorithms"))
                .expect("valid request")
                .draft(issued)
        })
    });

    c.bench_function("block_hash", |b| {
        b.iter(|| block_hash(black_box(&payload), black_box(&previous), black_box(&issued)))
    });
}

criterion_group!(benches, bench_hashing);
criterion_main!(benches);
