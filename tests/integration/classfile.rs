mod common;

use apicov::classfile::{
    self, ClassWriter, CodeWriter, InstructionKind, InvokeKind, MAX_MAJOR_VERSION,
    MIN_MAJOR_VERSION, MethodWriter, SymbolEntry, UnitError,
};
use apicov::surface::{SurfaceDecl, SurfaceKind};

#[test]
fn store_test_fixture_parses() {
    let unit = classfile::open_unit(&common::store_test()).unwrap();
    assert_eq!(unit.name, "com.acme.StoreTest");
    assert_eq!(unit.super_name.as_deref(), Some("java.lang.Object"));
    assert_eq!(unit.source_file.as_deref(), Some("StoreTest.java"));
    assert_eq!(unit.annotations.len(), 1);
    assert_eq!(unit.annotations[0].type_name, "com.acme.Slow");

    let names: Vec<&str> = unit.methods().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["<init>", "testPut", "testCaching"]);
    assert!(unit.methods()[1].annotations[0].sets("value"));
}

#[test]
fn every_invoke_resolves_to_a_method_reference() {
    let unit = classfile::open_unit(&common::store_test()).unwrap();
    let mut owners = Vec::new();
    for method in unit.methods() {
        let body = method.code().unwrap();
        for instruction in body.instructions() {
            let instruction = instruction.unwrap();
            let Some(slot) = instruction.invoked_slot() else {
                continue;
            };
            let member = unit.symbol(slot).and_then(SymbolEntry::member).unwrap();
            owners.push(format!("{}.{}", member.owner, member.name));
        }
    }
    assert_eq!(
        owners,
        vec![
            "java.lang.Object.<init>",
            "com.acme.Store.put",
            "com.acme.Store.put",
            "com.acme.Store.put",
            "com.acme.CachingStore.get",
            "com.acme.CachingStore.flush",
        ]
    );
}

#[test]
fn interface_and_class_references_are_distinguished() {
    let unit = classfile::open_unit(&common::store_test()).unwrap();
    let interface_refs = unit
        .symbol_table()
        .filter(|(_, entry)| matches!(entry, SymbolEntry::InterfaceMethodRef(_)))
        .count();
    let method_refs = unit
        .symbol_table()
        .filter(|(_, entry)| matches!(entry, SymbolEntry::MethodRef(_)))
        .count();
    // Store.put is one constant however often it is called
    assert_eq!(interface_refs, 1);
    assert_eq!(method_refs, 3);
}

#[test]
fn switches_do_not_desynchronize_the_stream() {
    // tableswitch at offset 0: 3 bytes of padding, default, low=0, high=1, two offsets
    let mut switch = vec![0xaa, 0, 0, 0];
    for value in [0i32, 0, 1, 0, 0] {
        switch.extend_from_slice(&value.to_be_bytes());
    }
    let bytes = ClassWriter::new("com.acme.Switchy")
        .method(MethodWriter::new("pick", "(I)V").code(
            CodeWriter::new()
                .line(3)
                .raw(&switch)
                .line(8)
                .invoke_static("com.acme.Store", "open", "()V")
                .return_void(),
        ))
        .finish();
    let unit = classfile::open_unit(&bytes).unwrap();
    let body = unit.methods()[0].code().unwrap();
    let instructions: Vec<_> = body.instructions().map(Result::unwrap).collect();

    assert_eq!(instructions.len(), 3);
    assert_eq!(instructions[0].len, 24);
    let invoke = &instructions[1];
    assert_eq!(invoke.offset, 24);
    assert!(matches!(
        invoke.kind,
        InstructionKind::Invoke { kind: InvokeKind::Static, .. }
    ));
    assert_eq!(body.line_for(invoke.offset), Some(8));
    assert_eq!(body.line_for(0), Some(3));
}

#[test]
fn version_bounds() {
    for major in [MIN_MAJOR_VERSION, MAX_MAJOR_VERSION] {
        let bytes = ClassWriter::new("com.acme.V").version(major).finish();
        assert_eq!(classfile::open_unit(&bytes).unwrap().major_version, major);
    }
    for major in [MIN_MAJOR_VERSION - 1, MAX_MAJOR_VERSION + 1] {
        let bytes = ClassWriter::new("com.acme.V").version(major).finish();
        assert!(matches!(
            classfile::open_unit(&bytes),
            Err(UnitError::UnsupportedVersion { .. })
        ));
    }
}

#[test]
fn corrupt_fixture_is_rejected_without_panicking() {
    let err = classfile::open_unit(b"not a class file").unwrap_err();
    assert!(matches!(err, UnitError::InvalidMagic(_)));
    assert!(!classfile::is_class_file(b"not a class file"));
}

#[test]
fn parameter_annotations_are_kept_per_parameter() {
    let bytes = ClassWriter::new("com.acme.Handlers")
        .method(
            MethodWriter::new("handle", "(Ljava/lang/String;I)V")
                .annotate_parameter(1, "com.acme.Positive", &[])
                .code(CodeWriter::new().line(30).return_void()),
        )
        .finish();
    let unit = classfile::open_unit(&bytes).unwrap();
    let method = &unit.methods()[0];
    assert_eq!(method.parameter_annotations.len(), 2);
    assert!(method.parameter_annotations[0].is_empty());
    assert_eq!(method.parameter_annotations[1][0].type_name, "com.acme.Positive");
    assert_eq!(method.signature(), "handle(java.lang.String, int)");
}

#[test]
fn compiled_types_become_surface_declarations() {
    let class = classfile::open_unit(
        &ClassWriter::new("com.acme.FileStore")
            .extends("com.acme.AbstractStore")
            .implements("com.acme.Store")
            .finish(),
    )
    .unwrap();
    let decl = SurfaceDecl::from_unit(class);
    assert_eq!(decl.kind, SurfaceKind::Class);
    assert_eq!(decl.supers, vec!["com.acme.AbstractStore", "com.acme.Store"]);

    let annotation = classfile::open_unit(&ClassWriter::annotation_type("com.acme.Slow").finish()).unwrap();
    let decl = SurfaceDecl::from_unit(annotation);
    assert_eq!(decl.kind, SurfaceKind::Annotation);
    assert!(decl.supers.is_empty());
}
