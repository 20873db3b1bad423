use charcard::png::{write_chunks, PngChunk, CHUNK_IEND};
use charcard::{
    read_card, repair_card, write_card_to_charx, write_card_to_png, AssetData, CharacterCard, Lorebook,
    LorebookEntry, ReadOptions, WriteCharxOptions, WritePngOptions,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn base_png() -> Vec<u8> {
    let ihdr = PngChunk::new(*b"IHDR", vec![0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
    let idat = PngChunk::new(*b"IDAT", vec![0u8; 256 * 1024]);
    write_chunks(&[ihdr, idat, PngChunk::new(CHUNK_IEND, Vec::new())])
}

fn sample_card() -> CharacterCard {
    let mut card = CharacterCard::default();
    card.data.name = "Bench".into();
    card.data.description = "A long description. ".repeat(500);
    card.data.character_book = Some(Lorebook {
        entries: (0..200)
            .map(|i| LorebookEntry {
                keys: vec![format!("key{i}")],
                content: format!("@@depth {i}\n@@role system\nEntry {i} body text"),
                insertion_order: i,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    });
    card
}

fn bench_png(c: &mut Criterion) {
    let image = base_png();
    let card = sample_card();
    let embedded = write_card_to_png(&card, &image, &WritePngOptions::default()).unwrap();

    c.bench_function("png_embed", |b| {
        b.iter(|| write_card_to_png(black_box(&card), black_box(&image), &WritePngOptions::default()).unwrap())
    });
    c.bench_function("png_extract", |b| b.iter(|| read_card(black_box(&embedded), &ReadOptions::default()).unwrap()));
    c.bench_function("png_repair", |b| b.iter(|| repair_card(black_box(&embedded))));
}

fn bench_charx(c: &mut Criterion) {
    let card = sample_card();
    let opts = WriteCharxOptions {
        assets: (0..8)
            .map(|i| AssetData {
                asset_type: "emotion".into(),
                name:       format!("e{i}"),
                ext:        "png".into(),
                data:       vec![i as u8; 128 * 1024],
            })
            .collect(),
    };
    let packed = write_card_to_charx(&card, &opts).unwrap();

    c.bench_function("charx_pack_1mb", |b| b.iter(|| write_card_to_charx(black_box(&card), &opts).unwrap()));
    c.bench_function("charx_unpack_1mb", |b| b.iter(|| read_card(black_box(&packed), &ReadOptions::default()).unwrap()));
}

criterion_group!(benches, bench_png, bench_charx);
criterion_main!(benches);
