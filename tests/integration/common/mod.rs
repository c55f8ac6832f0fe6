#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use apicov::classfile::{ClassWriter, CodeWriter, MethodWriter};
use tempfile::TempDir;

pub fn apicov() -> Command {
    Command::new(env!("CARGO_BIN_EXE_apicov"))
}

/// Surface declarations shared by the integration tests.
pub const STORE_SURFACES: &str = r#"
[[surface]]
name = "com.acme.Store"
kind = "interface"

[[surface.method]]
name = "put"
params = ["java.lang.String", "int"]

[[surface.method]]
name = "put"
params = ["java.lang.String", "long"]

[[surface.method]]
name = "get"
params = ["java.lang.String"]
returns = "int"

[[surface.method]]
name = "clear"

[[surface.method]]
name = "legacy"
deprecated = true

[[surface.method]]
name = "equals"
params = ["java.lang.Object"]
returns = "boolean"

[[surface]]
name = "com.acme.CachingStore"
extends = ["com.acme.Store"]

[[surface.method]]
name = "flush"

[[surface]]
name = "com.acme.Slow"
kind = "annotation"

[[surface]]
name = "com.acme.Timeout"
kind = "annotation"

[[surface.method]]
name = "value"
returns = "long"
"#;

pub const PUT_INT: &str = "(Ljava/lang/String;I)V";
pub const PUT_LONG: &str = "(Ljava/lang/String;J)V";
pub const GET: &str = "(Ljava/lang/String;)I";

/// A scratch project: `classes/` holds the compiled tree to scan.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("classes")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn classes(&self) -> PathBuf {
        self.dir.path().join("classes")
    }

    /// Write a file relative to the project directory.
    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write a compiled class under `classes/` at the path its name implies.
    pub fn write_class(&self, name: &str, bytes: Vec<u8>) -> PathBuf {
        self.write(&format!("classes/{}.class", name.replace('.', "/")), bytes)
    }

    pub fn write_surfaces(&self) -> PathBuf {
        self.write("surfaces.toml", STORE_SURFACES)
    }
}

/// `com.acme.StoreTest`: exercises the store through the interface and a
/// subclass, and carries both tracked annotations.
pub fn store_test() -> Vec<u8> {
    ClassWriter::new("com.acme.StoreTest")
        .source_file("StoreTest.java")
        .annotate("com.acme.Slow", &[])
        .method(MethodWriter::new("<init>", "()V").code(
            CodeWriter::new()
                .line(7)
                .raw(&[0x2a]) // aload_0
                .invoke_special("java.lang.Object", "<init>", "()V")
                .return_void(),
        ))
        .method(
            MethodWriter::new("testPut", "()V")
                .annotate("com.acme.Timeout", &["value"])
                .code(
                    CodeWriter::new()
                        .line(12)
                        .invoke_interface("com.acme.Store", "put", PUT_INT)
                        .line(13)
                        .invoke_interface("com.acme.Store", "put", PUT_INT)
                        .invoke_interface("com.acme.Store", "put", PUT_INT)
                        .return_void(),
                ),
        )
        .method(
            MethodWriter::new("testCaching", "(Ljava/lang/String;)V").code(
                CodeWriter::new()
                    .line(20)
                    .invoke_virtual("com.acme.CachingStore", "get", GET)
                    .raw(&[0x57]) // pop
                    .line(21)
                    .invoke_virtual("com.acme.CachingStore", "flush", "()V")
                    .return_void(),
            ),
        )
        .finish()
}

/// `com.acme.other.NoLines`: compiled without debug information.
pub fn no_lines() -> Vec<u8> {
    ClassWriter::new("com.acme.other.NoLines")
        .method(
            MethodWriter::new("run", "()V").code(
                CodeWriter::new()
                    .without_line_table()
                    .invoke_interface("com.acme.Store", "clear", "()V")
                    .return_void(),
            ),
        )
        .finish()
}

/// The standard tree: two scannable units, one corrupt file and a stray
/// non-class file.
pub fn store_project() -> Project {
    let project = Project::new();
    project.write_surfaces();
    project.write_class("com.acme.StoreTest", store_test());
    project.write_class("com.acme.other.NoLines", no_lines());
    project.write("classes/com/acme/Broken.class", b"not a class file");
    project.write("classes/com/acme/README.txt", "ignored");
    project
}
