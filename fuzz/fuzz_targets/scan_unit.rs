#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use apicov::classfile::{
    self, AccessFlags, ClassWriter, CodeWriter, InvokeKind, MethodDecl, MethodWriter,
};
use apicov::diagnostics::ScanLog;
use apicov::engine::{self, CoverageEngine};
use apicov::exclusion::BaseExclusion;
use apicov::surface::{SurfaceCatalog, SurfaceDecl, SurfaceKind};

const OWNERS: [&str; 3] = ["com.acme.Api", "com.acme.Impl", "com.acme.Other"];
const METHODS: [(&str, &str); 3] = [("put", "(I)V"), ("put", "(J)V"), ("get", "()I")];

/// Bytecode built from a few invoke shapes and raw filler
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Line(u16),
    Invoke { kind: u8, owner: u8, method: u8 },
    Raw(Vec<u8>),
}

#[derive(Arbitrary, Debug)]
struct FuzzMethod {
    line_table: bool,
    ops: Vec<FuzzOp>,
}

#[derive(Arbitrary, Debug)]
struct FuzzUnit {
    methods: Vec<FuzzMethod>,
    annotated: bool,
}

fn catalog() -> SurfaceCatalog {
    let mut catalog = SurfaceCatalog::new();
    let methods = METHODS
        .iter()
        .map(|(name, desc)| {
            MethodDecl::new(*name, *desc, AccessFlags(AccessFlags::PUBLIC))
        })
        .collect();
    catalog.insert(SurfaceDecl {
        name: OWNERS[0].to_string(),
        kind: SurfaceKind::Interface,
        supers: Vec::new(),
        methods,
    });
    catalog.insert(SurfaceDecl {
        name: OWNERS[1].to_string(),
        kind: SurfaceKind::Class,
        supers: vec![OWNERS[0].to_string()],
        methods: Vec::new(),
    });
    catalog.insert(SurfaceDecl {
        name: "com.acme.Marker".to_string(),
        kind: SurfaceKind::Annotation,
        supers: Vec::new(),
        methods: Vec::new(),
    });
    catalog
}

fuzz_target!(|input: FuzzUnit| {
    let mut writer = ClassWriter::new("com.acme.FuzzTest");
    if input.annotated {
        writer = writer.annotate("com.acme.Marker", &[]);
    }
    for (i, method) in input.methods.iter().enumerate() {
        let mut code = CodeWriter::new();
        if !method.line_table {
            code = code.without_line_table();
        }
        for op in &method.ops {
            code = match op {
                FuzzOp::Line(line) => code.line(*line),
                FuzzOp::Invoke { kind, owner, method } => {
                    let kind = match kind % 4 {
                        0 => InvokeKind::Virtual,
                        1 => InvokeKind::Special,
                        2 => InvokeKind::Static,
                        _ => InvokeKind::Interface,
                    };
                    let owner = OWNERS[*owner as usize % OWNERS.len()];
                    let (name, desc) = METHODS[*method as usize % METHODS.len()];
                    code.invoke(kind, owner, name, desc)
                }
                FuzzOp::Raw(bytes) => code.raw(bytes),
            };
        }
        writer = writer.method(MethodWriter::new(&format!("m{i}"), "()V").code(code));
    }
    let bytes = writer.finish();
    let Ok(unit) = classfile::open_unit(&bytes) else {
        return;
    };

    let catalog = catalog();
    let exclusion = BaseExclusion::new();
    let mut log = ScanLog::new();
    let Ok(tracked) = CoverageEngine::new(&catalog, &exclusion)
        .track(&["com.acme.Api", "com.acme.Impl", "com.acme.Marker"], &mut log)
    else {
        return;
    };
    let mut report = tracked.seed_report();
    let seeded = report.tracked_count();
    engine::scan_unit(&tracked, &unit, &mut report, &mut log);
    // Recording never adds a key
    assert_eq!(report.tracked_count(), seeded);
});
