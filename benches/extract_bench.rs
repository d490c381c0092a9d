use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unbundle::builder::{BundleBuilder, RecordWriter};
use unbundle::bundle::Bundle;
use unbundle::cursor::Endian;
use unbundle::decode::pixel::unpacker_for;
use unbundle::extract::{Extractor, MemorySink};
use unbundle::schema::TypeTag;

fn bench_block_unpack(c: &mut Criterion) {
    // 256x256 of repeating blocks.
    let dxt1: Vec<u8> = [0x00, 0xF8, 0x1F, 0x00, 0xE4, 0xE4, 0xE4, 0xE4].repeat(64 * 64);
    let dxt5: Vec<u8> = [0xFF, 0x00, 0x49, 0x92, 0x24, 0x49, 0x92, 0x24, 0x00, 0xF8, 0x1F, 0x00, 0xE4, 0xE4, 0xE4, 0xE4]
        .repeat(64 * 64);
    let (bc1, bc3) = (unpacker_for(10).unwrap(), unpacker_for(12).unwrap());

    c.bench_function("dxt1_unpack_256", |b| b.iter(|| bc1.unpack(black_box(&dxt1), 256, 256).unwrap()));
    c.bench_function("dxt5_unpack_256", |b| b.iter(|| bc3.unpack(black_box(&dxt5), 256, 256).unwrap()));
}

fn bench_extract_to_memory(c: &mut Criterion) {
    let pixels = vec![0x7Fu8; 64 * 64 * 4];
    let mut b = BundleBuilder::new(2);
    for id in 1..=64u64 {
        let name = format!("tex{id}");
        let record = RecordWriter::new(TypeTag::TEXTURE_2D, id, Endian::Little)
            .string(&name)
            .int32(64)
            .int32(64)
            .int32(4)
            .int32(1)
            .bytes(&pixels)
            .reference(0)
            .finish();
        b.add_entry(&name, TypeTag::TEXTURE_2D, record);
    }
    let bundle = Bundle::from_bytes("bench", b.build().unwrap()).unwrap();

    c.bench_function("extract_64_textures", |bch| {
        bch.iter(|| {
            let extractor = Extractor::new(MemorySink::new());
            black_box(bundle.extract_with(&extractor))
        })
    });
}

criterion_group!(benches, bench_block_unpack, bench_extract_to_memory);
criterion_main!(benches);
