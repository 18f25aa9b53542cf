use ark_bn254::Fr;
use criterion::{criterion_group, criterion_main, Criterion};
use poseidon_gadget::{poseidon_hash, Poseidon128, Poseidon128Spec, Protoboard};

pub fn bench_poseidon128(c: &mut Criterion) {
    let mut group = c.benchmark_group("Poseidon128");
    group.sample_size(100);

    // Chain of hashes, starting from a random value
    group.bench_function("native_hash", |b| {
        let mut hash: Fr = rand::random();
        b.iter(|| {
            hash = poseidon_hash::<Fr, Poseidon128Spec>(&[hash]);
        })
    });

    group.bench_function("stamp_and_witness", |b| {
        let input_value: Fr = rand::random();
        b.iter(|| {
            let mut pb = Protoboard::<Fr>::new();
            let input = pb.allocate_variable();
            let gadget = Poseidon128::<1, 1>::new(&mut pb, [input], "bench");
            gadget.generate_constraints(&mut pb);
            pb.set_val(input, input_value);
            gadget.generate_witness(&mut pb);
            pb.val(gadget.result())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_poseidon128);
criterion_main!(benches);
