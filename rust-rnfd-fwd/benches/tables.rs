use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_rnfd_common::packet::{Data, Interest};
use rust_rnfd_common::Name;
use rust_rnfd_fwd::tables::name_tree::NameTree;
use rust_rnfd_fwd::tables::pit::Pit;
use std::time::Duration;

const SUPPRESSION: Duration = Duration::from_millis(10);

fn bench_pit(c: &mut Criterion) {
    c.bench_function("pit insert+find", |b| {
        let interests: Vec<Interest> = (0..1024)
            .map(|i| {
                Interest::new(Name::from_uri(&format!("/bench/app/{}/{}", i % 32, i)).unwrap())
                    .with_nonce(i)
            })
            .collect();
        b.iter(|| {
            let mut tree = NameTree::new();
            let mut pit = Pit::new();
            for interest in &interests {
                pit.insert(&mut tree, interest, SUPPRESSION);
            }
            for interest in &interests {
                black_box(pit.find(&tree, interest));
            }
        });
    });

    c.bench_function("pit data match", |b| {
        let mut tree = NameTree::new();
        let mut pit = Pit::new();
        for i in 0..1024u32 {
            let interest =
                Interest::new(Name::from_uri(&format!("/bench/app/{}", i % 64)).unwrap())
                    .with_nonce(i)
                    .with_can_be_prefix(true);
            pit.insert(&mut tree, &interest, SUPPRESSION);
        }
        let data = Data::new(Name::from_uri("/bench/app/7/seg/0").unwrap(), "payload");
        b.iter(|| black_box(pit.find_all_data_matches(&tree, &data)));
    });
}

criterion_group!(benches, bench_pit);
criterion_main!(benches);
