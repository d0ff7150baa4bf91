//! Schema merging over the registered joiner configs.
//!
//! Each service's SDL fragment is parsed on its own, cleaned of references to
//! types nobody declares, then merged with the others into one type map.
//! Problems never abort the build; they are collected per service in
//! [`NotFound`] and the rest of the schema is kept.

mod clean;
mod merge;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;

use crate::registry::ModuleRegistry;

pub const BUILTIN_SCALARS: [&str; 5] = ["ID", "String", "Int", "Float", "Boolean"];

/// Service name → entry (`Type.field`, `Type`, or `<schema>`) → reason.
pub type NotFound = IndexMap<String, IndexMap<String, String>>;

/// Merged type map, keyed by type name.
pub type EntitiesMap = IndexMap<String, TypeDef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    fn keyword(self) -> &'static str {
        match self {
            TypeKind::Scalar => "scalar",
            TypeKind::Object => "type",
            TypeKind::Interface => "interface",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
            TypeKind::InputObject => "input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentDef {
    pub name: String,
    /// Rendered type, e.g. `[String!]`.
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldDef>,
    /// Union members.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    /// Enum values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Services whose fragments contributed to this type.
    pub services: Vec<String>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            directives: Vec::new(),
            implements: Vec::new(),
            fields: IndexMap::new(),
            members: Vec::new(),
            values: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.kind == TypeKind::Scalar && BUILTIN_SCALARS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergedSchema {
    types: EntitiesMap,
}

impl MergedSchema {
    pub fn type_map(&self) -> &EntitiesMap {
        &self.types
    }

    pub fn into_type_map(self) -> EntitiesMap {
        self.types
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Render the merged schema back to SDL, built-in scalars omitted.
    pub fn to_sdl(&self) -> String {
        let mut out = String::new();
        for ty in self.types.values().filter(|t| !t.is_builtin()) {
            if !out.is_empty() {
                out.push('\n');
            }
            render_type(&mut out, ty);
        }
        out
    }
}

fn render_type(out: &mut String, ty: &TypeDef) {
    if let Some(desc) = &ty.description {
        let _ = writeln!(out, "\"\"\"{desc}\"\"\"");
    }
    let _ = write!(out, "{} {}", ty.kind.keyword(), ty.name);
    if !ty.implements.is_empty() {
        let _ = write!(out, " implements {}", ty.implements.join(" & "));
    }
    for d in &ty.directives {
        let _ = write!(out, " {d}");
    }
    match ty.kind {
        TypeKind::Scalar => out.push('\n'),
        TypeKind::Union => {
            let _ = writeln!(out, " = {}", ty.members.join(" | "));
        }
        TypeKind::Enum => {
            out.push_str(" {\n");
            for v in &ty.values {
                let _ = writeln!(out, "  {v}");
            }
            out.push_str("}\n");
        }
        TypeKind::Object | TypeKind::Interface | TypeKind::InputObject => {
            out.push_str(" {\n");
            for f in ty.fields.values() {
                out.push_str("  ");
                out.push_str(&f.name);
                if !f.arguments.is_empty() {
                    let args: Vec<String> = f
                        .arguments
                        .iter()
                        .map(|a| match &a.default_value {
                            Some(d) => format!("{}: {} = {}", a.name, a.ty, d),
                            None => format!("{}: {}", a.name, a.ty),
                        })
                        .collect();
                    let _ = write!(out, "({})", args.join(", "));
                }
                let _ = write!(out, ": {}", f.ty);
                for d in &f.directives {
                    let _ = write!(out, " {d}");
                }
                out.push('\n');
            }
            out.push_str("}\n");
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaBuild {
    pub schema: MergedSchema,
    pub not_found: NotFound,
}

/// Clean and merge every fragment registered in `registry`, in registry order.
pub fn build_schema(registry: &ModuleRegistry) -> SchemaBuild {
    build_schema_from_fragments(&registry.schema_fragments())
}

/// Clean and merge `(service, sdl)` fragments in the given order.
pub fn build_schema_from_fragments(fragments: &[(String, String)]) -> SchemaBuild {
    let mut not_found = NotFound::new();
    let cleaned = clean::clean_fragments(fragments, &mut not_found);
    let types = merge::merge_fragments(cleaned, &mut not_found);

    let issues: usize = not_found.values().map(IndexMap::len).sum();
    if issues > 0 {
        tracing::warn!(
            issues,
            services = ?not_found.keys().collect::<Vec<_>>(),
            "Schema merged with unresolved entries"
        );
    }
    tracing::debug!(types = types.len(), "Schema merged");

    SchemaBuild {
        schema: MergedSchema { types },
        not_found,
    }
}

fn report(not_found: &mut NotFound, service: &str, entry: String, reason: String) {
    tracing::debug!(service, entry = %entry, reason = %reason, "Schema entry dropped");
    not_found
        .entry(service.to_owned())
        .or_default()
        .insert(entry, reason);
}

#[cfg(test)]
mod tests;
