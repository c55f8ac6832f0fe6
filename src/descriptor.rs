//! JVM method descriptors.
//!
//! Converts between a method signature (`JavaType` return + parameters) and the
//! compact descriptor encoding stored in class files, e.g.
//! `(ILjava/lang/String;[[J)V`, and renders descriptors as human-readable
//! signatures for reports.
//!
//! Descriptors are the identity of a tracked method: two overloads that differ
//! only in a parameter type have different descriptors. `humanize` output is
//! for display and is never compared.

use std::fmt;

/// A type as it appears in a method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JavaType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Reference type, stored by its dotted binary name (`java.util.Map$Entry`).
    Object(String),
    Array(Box<JavaType>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("truncated descriptor `{descriptor}`")]
    Truncated { descriptor: String },
    #[error("unknown type code '{code}' at offset {offset} in `{descriptor}`")]
    UnknownCode {
        descriptor: String,
        code: char,
        offset: usize,
    },
    #[error("expected {expected} at offset {offset} in `{descriptor}`")]
    Unexpected {
        descriptor: String,
        expected: &'static str,
        offset: usize,
    },
    #[error("void used as a parameter or array element in `{descriptor}`")]
    MisplacedVoid { descriptor: String },
    #[error("cannot resolve type `{0}`")]
    Unresolved(String),
    #[error("invalid type name `{0}`")]
    InvalidTypeName(String),
}

impl JavaType {
    /// The primitive (or void) type for a single-letter descriptor code.
    pub fn from_code(code: char) -> Option<JavaType> {
        Some(match code {
            'V' => JavaType::Void,
            'Z' => JavaType::Boolean,
            'B' => JavaType::Byte,
            'C' => JavaType::Char,
            'S' => JavaType::Short,
            'I' => JavaType::Int,
            'J' => JavaType::Long,
            'F' => JavaType::Float,
            'D' => JavaType::Double,
            _ => return None,
        })
    }

    /// Source keyword for primitives and void.
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            JavaType::Void => "void",
            JavaType::Boolean => "boolean",
            JavaType::Byte => "byte",
            JavaType::Char => "char",
            JavaType::Short => "short",
            JavaType::Int => "int",
            JavaType::Long => "long",
            JavaType::Float => "float",
            JavaType::Double => "double",
            JavaType::Object(_) | JavaType::Array(_) => return None,
        })
    }

    fn from_keyword(keyword: &str) -> Option<JavaType> {
        Some(match keyword {
            "void" => JavaType::Void,
            "boolean" => JavaType::Boolean,
            "byte" => JavaType::Byte,
            "char" => JavaType::Char,
            "short" => JavaType::Short,
            "int" => JavaType::Int,
            "long" => JavaType::Long,
            "float" => JavaType::Float,
            "double" => JavaType::Double,
            _ => return None,
        })
    }

    pub fn object(name: impl Into<String>) -> JavaType {
        JavaType::Object(name.into())
    }

    pub fn array_of(element: JavaType) -> JavaType {
        JavaType::Array(Box::new(element))
    }

    /// Append this type's descriptor encoding to `out`.
    pub fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaType::Object(name) => {
                out.push('L');
                out.extend(name.chars().map(|c| if c == '.' { '/' } else { c }));
                out.push(';');
            }
            JavaType::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
            primitive => out.push(primitive.code()),
        }
    }

    fn code(&self) -> char {
        match self {
            JavaType::Void => 'V',
            JavaType::Boolean => 'Z',
            JavaType::Byte => 'B',
            JavaType::Char => 'C',
            JavaType::Short => 'S',
            JavaType::Int => 'I',
            JavaType::Long => 'J',
            JavaType::Float => 'F',
            JavaType::Double => 'D',
            JavaType::Object(_) => 'L',
            JavaType::Array(_) => '[',
        }
    }

    /// Parse a source-style type name: `int`, `java.lang.String`, `byte[][]`.
    pub fn parse_source_name(name: &str) -> Result<JavaType, DescriptorError> {
        let trimmed = name.trim();
        let mut base = trimmed;
        let mut depth = 0;
        while let Some(rest) = base.strip_suffix("[]") {
            base = rest.trim_end();
            depth += 1;
        }
        if base.is_empty() || !base.split('.').all(is_identifier) {
            return Err(DescriptorError::InvalidTypeName(trimmed.to_string()));
        }
        let mut ty = JavaType::from_keyword(base).unwrap_or_else(|| JavaType::object(base));
        if ty == JavaType::Void && depth > 0 {
            return Err(DescriptorError::InvalidTypeName(trimmed.to_string()));
        }
        for _ in 0..depth {
            ty = JavaType::array_of(ty);
        }
        Ok(ty)
    }

    /// Last segment of an object name (`String` for `java.lang.String`).
    fn simple_name(&self) -> String {
        match self {
            JavaType::Object(name) => name.rsplit('.').next().unwrap_or(name).to_string(),
            JavaType::Array(element) => format!("{}[]", element.simple_name()),
            other => other.to_string(),
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Object(name) => f.write_str(name),
            JavaType::Array(element) => write!(f, "{element}[]"),
            primitive => f.write_str(primitive.keyword().unwrap_or("?")),
        }
    }
}

/// Resolves reference type names found while decoding a descriptor.
pub trait TypeContext {
    /// `name` is the dotted binary name of a class or interface.
    fn resolve(&self, name: &str) -> Result<JavaType, DescriptorError>;
}

/// Accepts every reference type name as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenTypes;

impl TypeContext for OpenTypes {
    fn resolve(&self, name: &str) -> Result<JavaType, DescriptorError> {
        Ok(JavaType::object(name))
    }
}

/// Encode a method signature as a descriptor.
pub fn encode(return_type: &JavaType, params: &[JavaType]) -> String {
    let mut out = String::from("(");
    for param in params {
        param.write_descriptor(&mut out);
    }
    out.push(')');
    return_type.write_descriptor(&mut out);
    out
}

/// Decode a method descriptor into `(return type, parameter types)`.
pub fn decode(
    descriptor: &str,
    ctx: &dyn TypeContext,
) -> Result<(JavaType, Vec<JavaType>), DescriptorError> {
    let mut cursor = Cursor { descriptor, pos: 0 };
    cursor.expect(b'(', "'('")?;
    let mut params = Vec::new();
    loop {
        match cursor.peek() {
            Some(b')') => {
                cursor.pos += 1;
                break;
            }
            Some(_) => {
                let param = cursor.field_type(ctx)?;
                if param == JavaType::Void {
                    return Err(DescriptorError::MisplacedVoid {
                        descriptor: descriptor.to_string(),
                    });
                }
                params.push(param);
            }
            None => return Err(cursor.truncated()),
        }
    }
    let return_type = cursor.field_type(ctx)?;
    if cursor.pos != descriptor.len() {
        return Err(DescriptorError::Unexpected {
            descriptor: descriptor.to_string(),
            expected: "end of descriptor",
            offset: cursor.pos,
        });
    }
    Ok((return_type, params))
}

/// Render `name(type1, type2)` for display.
pub fn humanize(name: &str, descriptor: &str) -> Result<String, DescriptorError> {
    let (_, params) = decode(descriptor, &OpenTypes)?;
    Ok(format!("{name}({})", join_types(&params)))
}

/// Render `Return name(type1, type2)`, with the return type's simple name.
pub fn humanize_full(name: &str, descriptor: &str) -> Result<String, DescriptorError> {
    let (return_type, params) = decode(descriptor, &OpenTypes)?;
    Ok(format!(
        "{} {name}({})",
        return_type.simple_name(),
        join_types(&params)
    ))
}

fn join_types(types: &[JavaType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

struct Cursor<'a> {
    descriptor: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.descriptor.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), DescriptorError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(DescriptorError::Unexpected {
                descriptor: self.descriptor.to_string(),
                expected,
                offset: self.pos,
            }),
            None => Err(self.truncated()),
        }
    }

    fn truncated(&self) -> DescriptorError {
        DescriptorError::Truncated {
            descriptor: self.descriptor.to_string(),
        }
    }

    fn field_type(&mut self, ctx: &dyn TypeContext) -> Result<JavaType, DescriptorError> {
        let start = self.pos;
        let code = self.peek().ok_or_else(|| self.truncated())?;
        self.pos += 1;
        match code {
            b'[' => {
                let element = self.field_type(ctx)?;
                if element == JavaType::Void {
                    return Err(DescriptorError::MisplacedVoid {
                        descriptor: self.descriptor.to_string(),
                    });
                }
                Ok(JavaType::array_of(element))
            }
            b'L' => {
                let rest = &self.descriptor[self.pos..];
                let end = rest.find(';').ok_or_else(|| self.truncated())?;
                if end == 0 {
                    return Err(DescriptorError::Unexpected {
                        descriptor: self.descriptor.to_string(),
                        expected: "class name",
                        offset: self.pos,
                    });
                }
                let name = rest[..end].replace('/', ".");
                self.pos += end + 1;
                ctx.resolve(&name)
            }
            other => {
                // `start` is always a char boundary: every accepted code is ASCII.
                let code = self.descriptor[start..].chars().next().unwrap_or(other as char);
                JavaType::from_code(code).ok_or_else(|| DescriptorError::UnknownCode {
                    descriptor: self.descriptor.to_string(),
                    code,
                    offset: start,
                })
            }
        }
    }
}
