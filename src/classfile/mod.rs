//! Reader for compiled JVM class files.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! [4B magic 0xCAFEBABE] [2B minor] [2B major]
//! [2B pool count] [constant pool entries, slots 1..count]
//! [2B access] [2B this_class] [2B super_class] [2B n + n*2B interfaces]
//! [2B n + fields] [2B n + methods] [2B n + class attributes]
//! ```
//!
//! A parsed [`ClassUnit`] owns everything it needs; the input bytes can be
//! dropped as soon as [`open_unit`] returns.

mod code;
mod writer;

pub use code::{CodeBody, Instruction, InstructionKind, Instructions, InvokeKind, LineEntry};
pub use writer::{ClassWriter, CodeWriter, MethodWriter};

use crate::descriptor;

/// Magic number at the start of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Oldest supported major version (JDK 1.1).
pub const MIN_MAJOR_VERSION: u16 = 45;

/// Newest supported major version (Java 25).
pub const MAX_MAJOR_VERSION: u16 = 69;

/// Nesting limit for annotation element values.
const MAX_ANNOTATION_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("invalid magic number {0:#010x}: expected 0xcafebabe")]
    InvalidMagic(u32),
    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("truncated {context} at offset {offset}: expected {expected} bytes, got {available}")]
    Truncated {
        context: &'static str,
        offset: usize,
        expected: usize,
        available: usize,
    },
    #[error("unknown constant pool tag {tag} in slot {slot}")]
    UnknownConstantTag { slot: u16, tag: u8 },
    #[error("constant pool slot {slot} is not a valid {expected}")]
    BadConstantIndex { slot: u16, expected: &'static str },
    #[error("invalid modified UTF-8 in constant pool slot {slot}")]
    InvalidUtf8 { slot: u16 },
    #[error("invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },
    #[error("malformed {context} at offset {offset}")]
    Malformed { context: &'static str, offset: usize },
    #[error("{0} unexpected bytes after the last class attribute")]
    TrailingBytes(usize),
}

/// Access and property flags of a class or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub fn is_annotation(self) -> bool {
        self.contains(Self::ANNOTATION)
    }
}

/// One constant pool slot, as seen by the coverage analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolEntry {
    MethodRef(MemberRef),
    InterfaceMethodRef(MemberRef),
    /// Any other tag, the unused slot 0, and the second half of long/double constants.
    Other,
}

impl SymbolEntry {
    pub fn member(&self) -> Option<&MemberRef> {
        match self {
            SymbolEntry::MethodRef(member) | SymbolEntry::InterfaceMethodRef(member) => Some(member),
            SymbolEntry::Other => None,
        }
    }
}

/// A resolved method reference: `owner.name:descriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Dotted name of the referenced type.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// A runtime-visible annotation and the element names it sets explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub type_name: String,
    pub members: Vec<String>,
}

impl Annotation {
    pub fn sets(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// A method declared by a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub deprecated: bool,
    pub annotations: Vec<Annotation>,
    pub parameter_annotations: Vec<Vec<Annotation>>,
    pub code: Option<CodeBody>,
}

impl MethodDecl {
    /// A body-less declaration, as produced by surface declaration files.
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: AccessFlags) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access,
            deprecated: false,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            code: None,
        }
    }

    pub fn code(&self) -> Option<&CodeBody> {
        self.code.as_ref()
    }

    /// Human-readable signature; falls back to the bare name for unparsable descriptors.
    pub fn signature(&self) -> String {
        descriptor::humanize(&self.name, &self.descriptor).unwrap_or_else(|_| self.name.clone())
    }
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassUnit {
    pub minor_version: u16,
    pub major_version: u16,
    pub access: AccessFlags,
    /// Dotted binary name (`com.acme.Outer$Inner`).
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub annotations: Vec<Annotation>,
    symbols: Vec<SymbolEntry>,
    methods: Vec<MethodDecl>,
}

impl ClassUnit {
    /// Constant pool slots `1..count` in order. Slot numbers are only
    /// meaningful within this unit.
    pub fn symbol_table(&self) -> impl Iterator<Item = (u16, &SymbolEntry)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .skip(1)
            .map(|(slot, entry)| (slot as u16, entry))
    }

    pub fn symbol(&self, slot: u16) -> Option<&SymbolEntry> {
        self.symbols.get(slot as usize)
    }

    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    pub fn into_methods(self) -> Vec<MethodDecl> {
        self.methods
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_annotation(&self) -> bool {
        self.access.is_annotation()
    }

    pub fn is_deprecated_annotation(annotation: &Annotation) -> bool {
        annotation.type_name == "java.lang.Deprecated"
    }
}

/// Check whether a byte slice starts with the class file magic number.
pub fn is_class_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == MAGIC.to_be_bytes()
}

/// Parse a complete class file.
pub fn open_unit(bytes: &[u8]) -> Result<ClassUnit, UnitError> {
    let mut r = ByteReader::new(bytes);

    let magic = r.u4("header")?;
    if magic != MAGIC {
        return Err(UnitError::InvalidMagic(magic));
    }
    let minor_version = r.u2("header")?;
    let major_version = r.u2("header")?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
        return Err(UnitError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let pool = ConstantPool::parse(&mut r)?;

    let access = AccessFlags(r.u2("class header")?);
    let name = pool.class_name(r.u2("class header")?)?;
    let super_index = r.u2("class header")?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(pool.class_name(super_index)?)
    };

    let interface_count = r.u2("interfaces")?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(r.u2("interfaces")?)?);
    }

    let field_count = r.u2("fields")?;
    for _ in 0..field_count {
        r.take(6, "field")?;
        skip_attributes(&mut r)?;
    }

    let method_count = r.u2("methods")?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(parse_method(&mut r, &pool)?);
    }

    let mut source_file = None;
    let mut annotations = Vec::new();
    let attribute_count = r.u2("class attributes")?;
    for _ in 0..attribute_count {
        let (attr_name, mut body) = read_attribute(&mut r, &pool)?;
        match attr_name {
            "SourceFile" => source_file = Some(pool.utf8(body.u2("SourceFile")?)?.to_string()),
            "RuntimeVisibleAnnotations" => annotations = parse_annotations(&mut body, &pool)?,
            _ => {}
        }
    }

    if r.remaining() != 0 {
        return Err(UnitError::TrailingBytes(r.remaining()));
    }

    Ok(ClassUnit {
        minor_version,
        major_version,
        access,
        name,
        super_name,
        interfaces,
        source_file,
        annotations,
        symbols: pool.symbols()?,
        methods,
    })
}

fn parse_method(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<MethodDecl, UnitError> {
    let access = AccessFlags(r.u2("method")?);
    let name = pool.utf8(r.u2("method")?)?.to_string();
    let descriptor = pool.utf8(r.u2("method")?)?.to_string();
    let mut method = MethodDecl::new(name, descriptor, access);

    let attribute_count = r.u2("method attributes")?;
    for _ in 0..attribute_count {
        let (attr_name, mut body) = read_attribute(r, pool)?;
        match attr_name {
            "Code" => method.code = Some(parse_code(&mut body, pool)?),
            "Deprecated" => method.deprecated = true,
            "RuntimeVisibleAnnotations" => {
                method.annotations = parse_annotations(&mut body, pool)?;
                if method.annotations.iter().any(ClassUnit::is_deprecated_annotation) {
                    method.deprecated = true;
                }
            }
            "RuntimeVisibleParameterAnnotations" => {
                let count = body.u1("parameter annotations")?;
                let mut params = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    params.push(parse_annotations(&mut body, pool)?);
                }
                method.parameter_annotations = params;
            }
            _ => {}
        }
    }
    Ok(method)
}

fn parse_code(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<CodeBody, UnitError> {
    r.take(4, "Code")?; // max_stack, max_locals
    let code_length = r.u4("Code")? as usize;
    let code = r.take(code_length, "bytecode")?.to_vec();
    let exception_count = r.u2("exception table")? as usize;
    r.take(exception_count * 8, "exception table")?;

    let mut lines: Option<Vec<LineEntry>> = None;
    let attribute_count = r.u2("Code attributes")?;
    for _ in 0..attribute_count {
        let (attr_name, mut body) = read_attribute(r, pool)?;
        if attr_name == "LineNumberTable" {
            let count = body.u2("LineNumberTable")?;
            let table = lines.get_or_insert_with(Vec::new);
            for _ in 0..count {
                let start_pc = body.u2("LineNumberTable")?;
                let line = body.u2("LineNumberTable")?;
                table.push(LineEntry { start_pc, line });
            }
        }
    }
    Ok(CodeBody::new(code, lines))
}

fn read_attribute<'a, 'p>(
    r: &mut ByteReader<'a>,
    pool: &'p ConstantPool,
) -> Result<(&'p str, ByteReader<'a>), UnitError> {
    let name = pool.utf8(r.u2("attribute")?)?;
    let length = r.u4("attribute")? as usize;
    let offset = r.position();
    let body = r.take(length, "attribute body")?;
    Ok((name, ByteReader::at(body, offset)))
}

fn skip_attributes(r: &mut ByteReader<'_>) -> Result<(), UnitError> {
    let count = r.u2("attributes")?;
    for _ in 0..count {
        r.take(2, "attribute")?;
        let length = r.u4("attribute")? as usize;
        r.take(length, "attribute body")?;
    }
    Ok(())
}

fn parse_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Annotation>, UnitError> {
    let count = r.u2("annotations")?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let type_descriptor = pool.utf8(r.u2("annotation")?)?;
        let pair_count = r.u2("annotation")?;
        let mut members = Vec::with_capacity(pair_count as usize);
        for _ in 0..pair_count {
            members.push(pool.utf8(r.u2("annotation element")?)?.to_string());
            skip_element_value(r, 0)?;
        }
        annotations.push(Annotation {
            type_name: type_name_from_descriptor(type_descriptor),
            members,
        });
    }
    Ok(annotations)
}

fn skip_element_value(r: &mut ByteReader<'_>, depth: usize) -> Result<(), UnitError> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(UnitError::Malformed {
            context: "annotation nesting",
            offset: r.position(),
        });
    }
    let offset = r.position();
    match r.u1("element value")? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            r.take(2, "element value")?;
        }
        b'e' => {
            r.take(4, "element value")?;
        }
        b'@' => {
            r.take(2, "nested annotation")?;
            let pair_count = r.u2("nested annotation")?;
            for _ in 0..pair_count {
                r.take(2, "nested annotation")?;
                skip_element_value(r, depth + 1)?;
            }
        }
        b'[' => {
            let count = r.u2("element array")?;
            for _ in 0..count {
                skip_element_value(r, depth + 1)?;
            }
        }
        _ => {
            return Err(UnitError::Malformed {
                context: "element value tag",
                offset,
            });
        }
    }
    Ok(())
}

/// `Lcom/acme/Marker;` -> `com.acme.Marker`.
fn type_name_from_descriptor(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(descriptor)
        .replace('/', ".")
}

// ── Constant pool ───────────────────────────────────────────────────────────

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(Debug, Clone)]
enum Constant {
    Unusable,
    Utf8(String),
    Class { name: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MemberRef { tag: u8, class: u16, name_and_type: u16 },
    Other,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self, UnitError> {
        let count = r.u2("constant pool")?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut slot: u16 = 1;
        while slot < count {
            let tag = r.u1("constant pool")?;
            let entry = match tag {
                TAG_UTF8 => {
                    let length = r.u2("Utf8 constant")? as usize;
                    let bytes = r.take(length, "Utf8 constant")?;
                    Constant::Utf8(
                        decode_modified_utf8(bytes).ok_or(UnitError::InvalidUtf8 { slot })?,
                    )
                }
                TAG_CLASS => Constant::Class {
                    name: r.u2("Class constant")?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: r.u2("NameAndType constant")?,
                    descriptor: r.u2("NameAndType constant")?,
                },
                TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF => Constant::MemberRef {
                    tag,
                    class: r.u2("member reference")?,
                    name_and_type: r.u2("member reference")?,
                },
                TAG_INTEGER | TAG_FLOAT => {
                    r.take(4, "numeric constant")?;
                    Constant::Other
                }
                TAG_LONG | TAG_DOUBLE => {
                    r.take(8, "wide constant")?;
                    Constant::Other
                }
                TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                    r.take(2, "constant")?;
                    Constant::Other
                }
                TAG_METHOD_HANDLE => {
                    r.take(3, "MethodHandle constant")?;
                    Constant::Other
                }
                TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                    r.take(4, "dynamic constant")?;
                    Constant::Other
                }
                _ => return Err(UnitError::UnknownConstantTag { slot, tag }),
            };
            entries.push(entry);
            slot += 1;
            if matches!(tag, TAG_LONG | TAG_DOUBLE) {
                // 8-byte constants take two slots; the second is unusable.
                entries.push(Constant::Unusable);
                slot += 1;
            }
        }
        // A trailing long/double may claim one slot past `count`.
        entries.truncate(count.max(1) as usize);
        Ok(Self { entries })
    }

    fn get(&self, slot: u16) -> Option<&Constant> {
        self.entries.get(slot as usize)
    }

    fn utf8(&self, slot: u16) -> Result<&str, UnitError> {
        match self.get(slot) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(UnitError::BadConstantIndex {
                slot,
                expected: "Utf8 constant",
            }),
        }
    }

    /// Dotted class name of a `Class` constant.
    fn class_name(&self, slot: u16) -> Result<String, UnitError> {
        match self.get(slot) {
            Some(Constant::Class { name }) => Ok(self.utf8(*name)?.replace('/', ".")),
            _ => Err(UnitError::BadConstantIndex {
                slot,
                expected: "Class constant",
            }),
        }
    }

    fn name_and_type(&self, slot: u16) -> Result<(&str, &str), UnitError> {
        match self.get(slot) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(UnitError::BadConstantIndex {
                slot,
                expected: "NameAndType constant",
            }),
        }
    }

    /// Resolve every slot into the view the coverage analysis needs.
    fn symbols(&self) -> Result<Vec<SymbolEntry>, UnitError> {
        self.entries
            .iter()
            .map(|entry| match entry {
                Constant::MemberRef {
                    tag,
                    class,
                    name_and_type,
                } if *tag != TAG_FIELDREF => {
                    let (name, descriptor) = self.name_and_type(*name_and_type)?;
                    let member = MemberRef {
                        owner: self.class_name(*class)?,
                        name: name.to_string(),
                        descriptor: descriptor.to_string(),
                    };
                    Ok(if *tag == TAG_METHODREF {
                        SymbolEntry::MethodRef(member)
                    } else {
                        SymbolEntry::InterfaceMethodRef(member)
                    })
                }
                _ => Ok(SymbolEntry::Other),
            })
            .collect()
    }
}

/// Decode the JVM's modified UTF-8 (`0xC0 0x80` for NUL, surrogate pairs as
/// two 3-byte sequences).
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_owned());
    }
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes, i + 1)?;
            units.push(((b & 0x1F) << 6) | b2);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes, i + 1)?;
            let b3 = continuation(bytes, i + 2)?;
            units.push(((b & 0x0F) << 12) | (b2 << 6) | b3);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], index: usize) -> Option<u16> {
    let b = *bytes.get(index)?;
    (b & 0xC0 == 0x80).then_some((b & 0x3F) as u16)
}

// ── Byte reader ─────────────────────────────────────────────────────────────

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Offset of `data[0]` within the whole class file, for error messages.
    base: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    fn at(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    fn position(&self) -> usize {
        self.base + self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], UnitError> {
        if self.remaining() < n {
            return Err(UnitError::Truncated {
                context,
                offset: self.position(),
                expected: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u1(&mut self, context: &'static str) -> Result<u8, UnitError> {
        Ok(self.take(1, context)?[0])
    }

    fn u2(&mut self, context: &'static str) -> Result<u16, UnitError> {
        let b = self.take(2, context)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self, context: &'static str) -> Result<u32, UnitError> {
        let b = self.take(4, context)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
