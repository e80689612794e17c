use criterion::{black_box, criterion_group, criterion_main, Criterion};
use diagramshot::scaffold::{scaffold_html, RenderJob};
use diagramshot::RenderRequest;

const BODY: &[u8] = br#"{"code":"graph TD; A-->B; A-->C; B-->D; C-->D;","theme":"default","scale":2,"padding":16}"#;

fn bench_validate_request(c: &mut Criterion) {
    c.bench_function("validate_request", |b| {
        b.iter(|| RenderRequest::from_http(black_box(Some("application/json")), black_box(BODY)).unwrap())
    });
}

fn bench_build_page_inputs(c: &mut Criterion) {
    let req = RenderRequest::from_http(Some("application/json"), BODY).unwrap();

    c.bench_function("build_page_inputs", |b| {
        b.iter(|| {
            let html = scaffold_html(black_box(&req.background), req.padding);
            let job = RenderJob::new(&req.code, &req.theme, &req.font_family);
            (html, job.to_script().unwrap())
        })
    });
}

criterion_group!(benches, bench_validate_request, bench_build_page_inputs);
criterion_main!(benches);
