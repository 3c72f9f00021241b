use criterion::*;
use relaxng_model::datatype::Registry;
use relaxng_model::json::{self, JsonOptions};
use relaxng_model::{Compiler, CompilerOptions, RelaxError, Resource, ResourceLoader};
use url::Url;

struct Generated(String);

impl ResourceLoader for Generated {
    fn load(&self, url: &Url) -> Result<Resource, RelaxError> {
        Ok(Resource::new(url.clone(), self.0.clone()))
    }
}

// a grammar with many definitions, each combining the usual pattern kinds
fn schema(defines: usize) -> String {
    let mut s = String::from(
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes"><start><ref name="d0"/></start>"#,
    );
    for i in 0..defines {
        s.push_str(&format!(
            r#"<define name="d{i}"><element name="e{i}"><optional><attribute name="a"><data type="integer"><param name="minInclusive">{i}</param></data></attribute></optional><interleave><zeroOrMore><element name="t{i}"><text/></element></zeroOrMore><choice><value>x{i}</value><ref name="d{next}"/></choice></interleave></element></define>"#,
            i = i,
            next = (i + 1) % defines
        ));
    }
    s.push_str("</grammar>");
    s
}

fn relaxng_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let text = schema(200);
    let url = Url::parse("mem:/bench.rng").expect("url");
    group.bench_function("compile_200_defines", |b| {
        b.iter(|| {
            let mut compiler =
                Compiler::new(Generated(text.clone()), CompilerOptions::default());
            compiler.compile(&url).expect("compiler.compile()");
        });
    });

    let mut compiler = Compiler::new(Generated(text.clone()), CompilerOptions::default());
    let schema = compiler.compile(&url).expect("compiler.compile()");
    let registry = Registry::builtin();
    let options = JsonOptions::default();
    let written = json::write(&schema.grammar, &options);
    group.bench_function("json_write", |b| {
        b.iter(|| json::write(&schema.grammar, &options));
    });
    group.bench_function("json_read", |b| {
        b.iter(|| json::read(&written, &registry).expect("json::read()"));
    });
    group.finish();
}

criterion_group!(benches, relaxng_compile);
criterion_main!(benches);
