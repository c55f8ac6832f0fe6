// Property tests for the class-file reader
//
// The scanner feeds every file under the root to `open_unit`, so the reader
// must reject anything malformed with an error and never panic.

use apicov::classfile::{self, ClassWriter, CodeWriter, MethodWriter};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][A-Za-z0-9]{0,10}"
}

/// `(line, owner, name)` call sites for one method body.
fn calls() -> impl Strategy<Value = Vec<(u16, String, String)>> {
    prop::collection::vec((1u16..5000, "[A-Z][a-z]{0,6}", identifier()), 0..8)
}

fn sample_unit(methods: &[(String, Vec<(u16, String, String)>)]) -> Vec<u8> {
    let mut writer = ClassWriter::new("com.acme.Sample").source_file("Sample.java");
    for (name, calls) in methods {
        let mut code = CodeWriter::new();
        for (line, owner, method) in calls {
            code = code
                .line(*line)
                .invoke_virtual(&format!("com.acme.{owner}"), method, "()V");
        }
        writer = writer.method(MethodWriter::new(name, "()V").code(code.return_void()));
    }
    writer.finish()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn open_unit_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = classfile::open_unit(&bytes);
    }

    #[test]
    fn open_unit_never_panics_on_a_valid_header(tail in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52];
        bytes.extend(tail);
        let _ = classfile::open_unit(&bytes);
    }

    #[test]
    fn mutated_units_never_panic(
        methods in prop::collection::vec((identifier(), calls()), 1..4),
        flips in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
    ) {
        let mut bytes = sample_unit(&methods);
        for (index, value) in flips {
            let at = index.index(bytes.len());
            bytes[at] = value;
        }
        if let Ok(unit) = classfile::open_unit(&bytes) {
            for method in unit.methods() {
                if let Some(body) = method.code() {
                    for instruction in body.instructions().flatten() {
                        let _ = body.line_for(instruction.offset);
                    }
                }
            }
        }
    }

    #[test]
    fn truncated_units_are_errors(
        methods in prop::collection::vec((identifier(), calls()), 1..3),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = sample_unit(&methods);
        let len = cut.index(bytes.len());
        prop_assert!(classfile::open_unit(&bytes[..len]).is_err());
    }

    #[test]
    fn written_calls_are_read_back_in_order(methods in prop::collection::vec((identifier(), calls()), 1..4)) {
        let unit = classfile::open_unit(&sample_unit(&methods)).unwrap();
        prop_assert_eq!(unit.methods().len(), methods.len());

        for (method, (_, calls)) in unit.methods().iter().zip(&methods) {
            let body = method.code().unwrap();
            let mut seen = Vec::new();
            for instruction in body.instructions() {
                let instruction = instruction.unwrap();
                if let Some(slot) = instruction.invoked_slot() {
                    let member = unit.symbol(slot).and_then(|entry| entry.member()).unwrap();
                    seen.push((
                        body.line_for(instruction.offset).unwrap(),
                        member.owner.clone(),
                        member.name.clone(),
                    ));
                }
            }
            let expected: Vec<(u32, String, String)> = calls
                .iter()
                .map(|(line, owner, name)| (u32::from(*line), format!("com.acme.{owner}"), name.clone()))
                .collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
