use criterion::{Criterion, black_box, criterion_group, criterion_main};
use study_tutor::services::TextChunker;

fn lecture_notes(paragraphs: usize) -> String {
    let paragraph = "Photosynthesis converts light energy into chemical energy. \
        Chlorophyll absorbs mostly blue and red light, reflecting green. \
        The light-dependent reactions take place in the thylakoid membranes, \
        while the Calvin cycle fixes carbon in the stroma.\n\n";
    paragraph.repeat(paragraphs)
}

fn bench_split(c: &mut Criterion) {
    let chunker = TextChunker::with_defaults();
    let short = lecture_notes(4);
    let long = lecture_notes(400);

    c.bench_function("split_short_notes", |b| {
        b.iter(|| chunker.split(black_box(&short)))
    });
    c.bench_function("split_long_notes", |b| {
        b.iter(|| chunker.split(black_box(&long)))
    });
}

criterion_group!(benches, bench_split);
criterion_main!(benches);
