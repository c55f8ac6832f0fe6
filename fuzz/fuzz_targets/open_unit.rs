#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary bytes should never panic
    let Ok(unit) = apicov::classfile::open_unit(data) else {
        return;
    };
    for method in unit.methods() {
        let Some(body) = method.code() else {
            continue;
        };
        for instruction in body.instructions() {
            let Ok(instruction) = instruction else {
                break;
            };
            let _ = body.line_for(instruction.offset);
            if let Some(slot) = instruction.invoked_slot() {
                let _ = unit.symbol(slot);
            }
        }
    }
});
