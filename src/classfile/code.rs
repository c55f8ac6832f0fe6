//! Method bodies: instruction decoding and the offset to line mapping.

use super::UnitError;

/// One `LineNumberTable` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineEntry {
    pub start_pc: u16,
    pub line: u16,
}

/// The bytecode of one method plus its line table, if the compiler emitted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBody {
    code: Vec<u8>,
    lines: Option<Vec<LineEntry>>,
}

impl CodeBody {
    pub fn new(code: Vec<u8>, lines: Option<Vec<LineEntry>>) -> Self {
        let lines = lines.map(|mut table| {
            table.sort_by_key(|entry| entry.start_pc);
            table
        });
        Self { code, lines }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn has_line_table(&self) -> bool {
        self.lines.as_ref().is_some_and(|table| !table.is_empty())
    }

    /// Decode instructions front to back. Decoding stops after the first error.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            pos: 0,
            failed: false,
        }
    }

    /// Source line of the instruction at `offset`.
    ///
    /// Picks the last entry starting at or before `offset`; an offset before
    /// every entry maps to the first one.
    pub fn line_for(&self, offset: usize) -> Option<u32> {
        let table = self.lines.as_ref()?;
        let first = table.first()?;
        let idx = table.partition_point(|entry| entry.start_pc as usize <= offset);
        let entry = if idx == 0 { first } else { &table[idx - 1] };
        Some(entry.line as u32)
    }

    /// Line of the method's first instruction.
    pub fn first_line(&self) -> Option<u32> {
        self.line_for(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeKind {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0xb6 => Some(InvokeKind::Virtual),
            0xb7 => Some(InvokeKind::Special),
            0xb8 => Some(InvokeKind::Static),
            0xb9 => Some(InvokeKind::Interface),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            InvokeKind::Virtual => 0xb6,
            InvokeKind::Special => 0xb7,
            InvokeKind::Static => 0xb8,
            InvokeKind::Interface => 0xb9,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            InvokeKind::Virtual => "invokevirtual",
            InvokeKind::Special => "invokespecial",
            InvokeKind::Static => "invokestatic",
            InvokeKind::Interface => "invokeinterface",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// A method invocation whose operand is constant pool `slot`.
    Invoke { kind: InvokeKind, slot: u16 },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset within the method's code.
    pub offset: usize,
    pub opcode: u8,
    /// Encoded length including operands and switch padding.
    pub len: usize,
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn invoked_slot(&self) -> Option<u16> {
        match self.kind {
            InstructionKind::Invoke { slot, .. } => Some(slot),
            InstructionKind::Other => None,
        }
    }
}

/// Lazy instruction decoder returned by [`CodeBody::instructions`].
pub struct Instructions<'a> {
    code: &'a [u8],
    pos: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, UnitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        match decode_at(self.code, self.pos) {
            Ok(instruction) => {
                self.pos += instruction.len;
                Some(Ok(instruction))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn decode_at(code: &[u8], offset: usize) -> Result<Instruction, UnitError> {
    let opcode = code[offset];
    let len = instruction_length(code, offset)?;
    let available = code.len() - offset;
    if len > available {
        return Err(UnitError::Truncated {
            context: "instruction",
            offset,
            expected: len,
            available,
        });
    }
    let kind = match InvokeKind::from_opcode(opcode) {
        Some(kind) => InstructionKind::Invoke {
            kind,
            slot: u16::from_be_bytes([code[offset + 1], code[offset + 2]]),
        },
        None => InstructionKind::Other,
    };
    Ok(Instruction {
        offset,
        opcode,
        len,
        kind,
    })
}

/// Encoded length of the instruction at `offset`.
fn instruction_length(code: &[u8], offset: usize) -> Result<usize, UnitError> {
    let opcode = code[offset];
    let len = match opcode {
        0x00..=0x0f => 1,              // nop, constants
        0x10 => 2,                     // bipush
        0x11 => 3,                     // sipush
        0x12 => 2,                     // ldc
        0x13 | 0x14 => 3,              // ldc_w, ldc2_w
        0x15..=0x19 => 2,              // loads with index
        0x1a..=0x35 => 1,              // short loads, array loads
        0x36..=0x3a => 2,              // stores with index
        0x3b..=0x83 => 1,              // short stores, stack, arithmetic
        0x84 => 3,                     // iinc
        0x85..=0x98 => 1,              // conversions, comparisons
        0x99..=0xa8 => 3,              // branches, goto, jsr
        0xa9 => 2,                     // ret
        0xaa => tableswitch_length(code, offset)?,
        0xab => lookupswitch_length(code, offset)?,
        0xac..=0xb1 => 1,              // returns
        0xb2..=0xb8 => 3,              // field access, invokes
        0xb9 | 0xba => 5,              // invokeinterface, invokedynamic
        0xbb => 3,                     // new
        0xbc => 2,                     // newarray
        0xbd => 3,                     // anewarray
        0xbe | 0xbf => 1,              // arraylength, athrow
        0xc0 | 0xc1 => 3,              // checkcast, instanceof
        0xc2 | 0xc3 => 1,              // monitorenter, monitorexit
        0xc4 => match code.get(offset + 1).copied() {
            Some(0x84) => 6,
            Some(_) => 4,
            None => {
                return Err(UnitError::Truncated {
                    context: "wide instruction",
                    offset,
                    expected: 2,
                    available: 1,
                });
            }
        },
        0xc5 => 4,                     // multianewarray
        0xc6 | 0xc7 => 3,              // ifnull, ifnonnull
        0xc8 | 0xc9 => 5,              // goto_w, jsr_w
        0xca | 0xfe | 0xff => 1,       // breakpoint, impdep1, impdep2
        _ => return Err(UnitError::InvalidOpcode { opcode, offset }),
    };
    Ok(len)
}

/// Start of the 4-byte aligned operands after a switch opcode.
fn switch_operands(offset: usize) -> usize {
    let pad = (4 - (offset + 1) % 4) % 4;
    offset + 1 + pad
}

fn tableswitch_length(code: &[u8], offset: usize) -> Result<usize, UnitError> {
    let base = switch_operands(offset);
    let low = read_i32(code, base + 4, offset)? as i64;
    let high = read_i32(code, base + 8, offset)? as i64;
    if high < low {
        return Err(UnitError::Malformed {
            context: "tableswitch",
            offset,
        });
    }
    let jumps = ((high - low + 1) as usize).saturating_mul(4);
    Ok((base + 12).saturating_add(jumps) - offset)
}

fn lookupswitch_length(code: &[u8], offset: usize) -> Result<usize, UnitError> {
    let base = switch_operands(offset);
    let pairs = read_i32(code, base + 4, offset)?;
    if pairs < 0 {
        return Err(UnitError::Malformed {
            context: "lookupswitch",
            offset,
        });
    }
    let table = (pairs as usize).saturating_mul(8);
    Ok((base + 8).saturating_add(table) - offset)
}

fn read_i32(code: &[u8], at: usize, offset: usize) -> Result<i32, UnitError> {
    match code.get(at..at + 4) {
        Some(b) => Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(UnitError::Truncated {
            context: "switch operands",
            offset,
            expected: at + 4 - offset,
            available: code.len() - offset,
        }),
    }
}
