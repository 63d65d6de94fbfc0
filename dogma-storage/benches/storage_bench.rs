// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dogma_core::{Author, Change, Markup, Revision};
use dogma_storage::{ObjectStore, RepoHandle};
use serde_json::json;

fn bench_push_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_engine_push");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let handle = RepoHandle::new_empty();
                for i in 0..size {
                    let changes = vec![Change::UpsertJson {
                        path: format!("/file-{i}.json"),
                        content: json!({"i": i}),
                    }];
                    handle
                        .push(
                            Revision::head(),
                            Author::new("bench"),
                            "bench push",
                            None,
                            Markup::Plaintext,
                            black_box(changes),
                            false,
                        )
                        .unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_snapshot_materialization(c: &mut Criterion) {
    let handle = RepoHandle::new_empty();
    for i in 0..1000 {
        handle
            .push(
                Revision::head(),
                Author::new("bench"),
                "seed",
                None,
                Markup::Plaintext,
                vec![Change::UpsertJson { path: format!("/file-{i}.json"), content: json!({"i": i}) }],
                false,
            )
            .unwrap();
    }

    c.bench_function("snapshot_clone_1000_entries", |b| {
        b.iter(|| black_box(handle.snapshot()));
    });
}

fn bench_object_store_put(c: &mut Criterion) {
    let store = ObjectStore::new();
    let blob = dogma_storage::Blob::new(vec![0u8; 4096]);

    c.bench_function("object_store_put_idempotent", |b| {
        b.iter(|| black_box(store.put(&blob)));
    });
}

criterion_group!(
    benches,
    bench_push_throughput,
    bench_snapshot_materialization,
    bench_object_store_put
);
criterion_main!(benches);
