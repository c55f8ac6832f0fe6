//! Assembles well-formed class files.
//!
//! Used for test fixtures, benchmark corpora and fuzz seeds. Output always
//! round-trips through [`open_unit`](super::open_unit).

use std::collections::HashMap;

use super::{AccessFlags, InvokeKind, LineEntry, MAGIC};

const DEFAULT_MAJOR_VERSION: u16 = 52;

pub struct ClassWriter {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access: u16,
    major_version: u16,
    source_file: Option<String>,
    annotations: Vec<AnnotationSpec>,
    methods: Vec<MethodWriter>,
    pool: PoolBuilder,
}

impl ClassWriter {
    /// A public class extending `java.lang.Object`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            access: AccessFlags::PUBLIC,
            major_version: DEFAULT_MAJOR_VERSION,
            source_file: None,
            annotations: Vec::new(),
            methods: Vec::new(),
            pool: PoolBuilder::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name).access(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
    }

    pub fn annotation_type(name: &str) -> Self {
        Self::interface(name)
            .access(
                AccessFlags::PUBLIC
                    | AccessFlags::INTERFACE
                    | AccessFlags::ABSTRACT
                    | AccessFlags::ANNOTATION,
            )
            .implements("java.lang.annotation.Annotation")
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    pub fn version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub fn annotate(mut self, type_name: &str, members: &[&str]) -> Self {
        self.annotations.push(AnnotationSpec::new(type_name, members));
        self
    }

    pub fn method(mut self, method: MethodWriter) -> Self {
        self.methods.push(method);
        self
    }

    /// Reserve a `Methodref` constant up front and return its slot.
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.pool.member_ref(TAG_METHODREF, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.pool.member_ref(TAG_INTERFACE_METHODREF, owner, name, descriptor)
    }

    /// Add a `Long` constant, which occupies two slots.
    pub fn long_constant(&mut self, value: i64) -> u16 {
        self.pool.long(value)
    }

    pub fn finish(mut self) -> Vec<u8> {
        let pool = &mut self.pool;
        let mut body = Vec::new();

        put_u2(&mut body, self.access);
        let this_class = pool.class(&self.name);
        put_u2(&mut body, this_class);
        let super_class = self.super_name.as_deref().map_or(0, |name| pool.class(name));
        put_u2(&mut body, super_class);
        put_u2(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            let slot = pool.class(interface);
            put_u2(&mut body, slot);
        }

        put_u2(&mut body, 0); // fields

        put_u2(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            method.write(pool, &mut body);
        }

        let mut attributes = Vec::new();
        if let Some(file) = &self.source_file {
            let index = pool.utf8(file);
            attributes.push(("SourceFile", index.to_be_bytes().to_vec()));
        }
        if !self.annotations.is_empty() {
            attributes.push((
                "RuntimeVisibleAnnotations",
                encode_annotations(pool, &self.annotations),
            ));
        }
        write_attributes(pool, &mut body, &attributes);

        let mut out = Vec::with_capacity(body.len() + pool.bytes.len() + 10);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        put_u2(&mut out, 0);
        put_u2(&mut out, self.major_version);
        put_u2(&mut out, pool.next_slot);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

pub struct MethodWriter {
    name: String,
    descriptor: String,
    access: u16,
    deprecated: bool,
    annotations: Vec<AnnotationSpec>,
    parameter_annotations: Vec<Vec<AnnotationSpec>>,
    code: Option<CodeWriter>,
}

impl MethodWriter {
    /// A public method without a body.
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: AccessFlags::PUBLIC,
            deprecated: false,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            code: None,
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    /// Emit a `Deprecated` attribute.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn annotate(mut self, type_name: &str, members: &[&str]) -> Self {
        self.annotations.push(AnnotationSpec::new(type_name, members));
        self
    }

    pub fn annotate_parameter(mut self, index: usize, type_name: &str, members: &[&str]) -> Self {
        if self.parameter_annotations.len() <= index {
            self.parameter_annotations.resize_with(index + 1, Vec::new);
        }
        self.parameter_annotations[index].push(AnnotationSpec::new(type_name, members));
        self
    }

    pub fn code(mut self, code: CodeWriter) -> Self {
        self.code = Some(code);
        self
    }

    fn write(&self, pool: &mut PoolBuilder, out: &mut Vec<u8>) {
        put_u2(out, self.access);
        let name = pool.utf8(&self.name);
        put_u2(out, name);
        let descriptor = pool.utf8(&self.descriptor);
        put_u2(out, descriptor);

        let mut attributes = Vec::new();
        if let Some(code) = &self.code {
            attributes.push(("Code", code.encode(pool)));
        }
        if self.deprecated {
            attributes.push(("Deprecated", Vec::new()));
        }
        if !self.annotations.is_empty() {
            attributes.push((
                "RuntimeVisibleAnnotations",
                encode_annotations(pool, &self.annotations),
            ));
        }
        if !self.parameter_annotations.is_empty() {
            let mut body = vec![self.parameter_annotations.len() as u8];
            for annotations in &self.parameter_annotations {
                body.extend_from_slice(&encode_annotations(pool, annotations));
            }
            attributes.push(("RuntimeVisibleParameterAnnotations", body));
        }
        write_attributes(pool, out, &attributes);
    }
}

enum CodeOp {
    Line(u16),
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        descriptor: String,
    },
    Raw(Vec<u8>),
}

/// Straight-line bytecode with optional line markers.
pub struct CodeWriter {
    ops: Vec<CodeOp>,
    line_table: bool,
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            line_table: true,
        }
    }

    /// Omit the `LineNumberTable` attribute; `line` markers are ignored.
    pub fn without_line_table(mut self) -> Self {
        self.line_table = false;
        self
    }

    /// Attribute the following instructions to `line`.
    pub fn line(mut self, line: u16) -> Self {
        self.ops.push(CodeOp::Line(line));
        self
    }

    pub fn invoke(mut self, kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Self {
        self.ops.push(CodeOp::Invoke {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    pub fn invoke_virtual(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Virtual, owner, name, descriptor)
    }

    pub fn invoke_special(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Special, owner, name, descriptor)
    }

    pub fn invoke_static(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Static, owner, name, descriptor)
    }

    pub fn invoke_interface(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.invoke(InvokeKind::Interface, owner, name, descriptor)
    }

    /// Append raw bytecode verbatim.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.ops.push(CodeOp::Raw(bytes.to_vec()));
        self
    }

    pub fn return_void(self) -> Self {
        self.raw(&[0xb1])
    }

    fn encode(&self, pool: &mut PoolBuilder) -> Vec<u8> {
        let mut code = Vec::new();
        let mut lines = Vec::new();
        for op in &self.ops {
            match op {
                CodeOp::Line(line) => lines.push(LineEntry {
                    start_pc: code.len() as u16,
                    line: *line,
                }),
                CodeOp::Invoke {
                    kind,
                    owner,
                    name,
                    descriptor,
                } => {
                    let tag = if *kind == InvokeKind::Interface {
                        TAG_INTERFACE_METHODREF
                    } else {
                        TAG_METHODREF
                    };
                    let slot = pool.member_ref(tag, owner, name, descriptor);
                    code.push(kind.opcode());
                    put_u2(&mut code, slot);
                    if *kind == InvokeKind::Interface {
                        code.extend_from_slice(&[1, 0]);
                    }
                }
                CodeOp::Raw(bytes) => code.extend_from_slice(bytes),
            }
        }

        let mut out = Vec::new();
        put_u2(&mut out, 8); // max_stack
        put_u2(&mut out, 8); // max_locals
        put_u4(&mut out, code.len() as u32);
        out.extend_from_slice(&code);
        put_u2(&mut out, 0); // exception table

        let mut attributes = Vec::new();
        if self.line_table {
            let mut table = Vec::new();
            put_u2(&mut table, lines.len() as u16);
            for entry in &lines {
                put_u2(&mut table, entry.start_pc);
                put_u2(&mut table, entry.line);
            }
            attributes.push(("LineNumberTable", table));
        }
        write_attributes(pool, &mut out, &attributes);
        out
    }
}

struct AnnotationSpec {
    type_name: String,
    members: Vec<String>,
}

impl AnnotationSpec {
    fn new(type_name: &str, members: &[&str]) -> Self {
        Self {
            type_name: type_name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Members are written as string constants holding their own name.
fn encode_annotations(pool: &mut PoolBuilder, annotations: &[AnnotationSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u2(&mut out, annotations.len() as u16);
    for annotation in annotations {
        let descriptor = format!("L{};", annotation.type_name.replace('.', "/"));
        let type_index = pool.utf8(&descriptor);
        put_u2(&mut out, type_index);
        put_u2(&mut out, annotation.members.len() as u16);
        for member in &annotation.members {
            let index = pool.utf8(member);
            put_u2(&mut out, index);
            out.push(b's');
            put_u2(&mut out, index);
        }
    }
    out
}

fn write_attributes(pool: &mut PoolBuilder, out: &mut Vec<u8>, attributes: &[(&str, Vec<u8>)]) {
    put_u2(out, attributes.len() as u16);
    for (name, body) in attributes {
        let index = pool.utf8(name);
        put_u2(out, index);
        put_u4(out, body.len() as u32);
        out.extend_from_slice(body);
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

const TAG_UTF8: u8 = 1;
const TAG_LONG: u8 = 5;
const TAG_CLASS: u8 = 7;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Class(String),
    NameAndType(u16, u16),
    Member(u8, u16, u16),
}

/// Constant pool under construction; identical constants share a slot.
struct PoolBuilder {
    bytes: Vec<u8>,
    next_slot: u16,
    slots: HashMap<PoolKey, u16>,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next_slot: 1,
            slots: HashMap::new(),
        }
    }

    fn intern(&mut self, key: PoolKey, width: u16, encoded: &[u8]) -> u16 {
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        let slot = self.next_slot;
        self.bytes.extend_from_slice(encoded);
        self.next_slot += width;
        self.slots.insert(key, slot);
        slot
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut encoded = vec![TAG_UTF8];
        put_u2(&mut encoded, value.len() as u16);
        encoded.extend_from_slice(value.as_bytes());
        self.intern(PoolKey::Utf8(value.to_string()), 1, &encoded)
    }

    /// `name` is dotted; the pool stores the internal slash form.
    fn class(&mut self, name: &str) -> u16 {
        let internal = name.replace('.', "/");
        let name_index = self.utf8(&internal);
        let mut encoded = vec![TAG_CLASS];
        put_u2(&mut encoded, name_index);
        self.intern(PoolKey::Class(internal), 1, &encoded)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut encoded = vec![TAG_NAME_AND_TYPE];
        put_u2(&mut encoded, name_index);
        put_u2(&mut encoded, descriptor_index);
        self.intern(
            PoolKey::NameAndType(name_index, descriptor_index),
            1,
            &encoded,
        )
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let nat_index = self.name_and_type(name, descriptor);
        let mut encoded = vec![tag];
        put_u2(&mut encoded, class_index);
        put_u2(&mut encoded, nat_index);
        self.intern(PoolKey::Member(tag, class_index, nat_index), 1, &encoded)
    }

    /// Longs are never deduplicated.
    fn long(&mut self, value: i64) -> u16 {
        let slot = self.next_slot;
        self.bytes.push(TAG_LONG);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.next_slot += 2;
        slot
    }
}
