use async_graphql::parser::{parse_schema, Positioned};
use async_graphql::parser::types::{
    BaseType, ConstDirective, FieldDefinition, InputValueDefinition, Type, TypeDefinition,
    TypeKind as ParsedKind, TypeSystemDefinition,
};
use std::collections::HashSet;

use super::{report, ArgumentDef, FieldDef, NotFound, TypeDef, TypeKind, BUILTIN_SCALARS};

/// A parsed type definition; `extend` marks `extend type ...` blocks.
pub(super) struct CleanType {
    pub extend: bool,
    pub def: TypeDef,
}

pub(super) struct CleanFragment {
    pub service: String,
    pub types: Vec<CleanType>,
}

fn base_name(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => base_name(inner),
    }
}

fn render_directive(d: &ConstDirective) -> String {
    if d.arguments.is_empty() {
        return format!("@{}", d.name.node);
    }
    let args: Vec<String> = d
        .arguments
        .iter()
        .map(|(name, value)| format!("{}: {}", name.node, value.node))
        .collect();
    format!("@{}({})", d.name.node, args.join(", "))
}

fn convert_argument(arg: &InputValueDefinition) -> ArgumentDef {
    ArgumentDef {
        name: arg.name.node.to_string(),
        ty: arg.ty.node.to_string(),
        default_value: arg.default_value.as_ref().map(|v| v.node.to_string()),
    }
}

fn convert_field(field: &FieldDefinition) -> FieldDef {
    FieldDef {
        name: field.name.node.to_string(),
        ty: field.ty.node.to_string(),
        arguments: field
            .arguments
            .iter()
            .map(|a| convert_argument(&a.node))
            .collect(),
        directives: field
            .directives
            .iter()
            .map(|d| render_directive(&d.node))
            .collect(),
    }
}

fn convert_input_field(field: &InputValueDefinition) -> FieldDef {
    FieldDef {
        name: field.name.node.to_string(),
        ty: field.ty.node.to_string(),
        arguments: Vec::new(),
        directives: field
            .directives
            .iter()
            .map(|d| render_directive(&d.node))
            .collect(),
    }
}

/// A field together with the type names it references.
struct Candidate {
    field: FieldDef,
    return_type: String,
    args: Vec<(String, String)>,
}

fn convert(def: &TypeDefinition, service: &str) -> (CleanType, Vec<Candidate>) {
    let name = def.name.node.to_string();
    let kind = match &def.kind {
        ParsedKind::Scalar => TypeKind::Scalar,
        ParsedKind::Object(_) => TypeKind::Object,
        ParsedKind::Interface(_) => TypeKind::Interface,
        ParsedKind::Union(_) => TypeKind::Union,
        ParsedKind::Enum(_) => TypeKind::Enum,
        ParsedKind::InputObject(_) => TypeKind::InputObject,
    };
    let mut out = TypeDef::new(name, kind);
    out.description = def.description.as_ref().map(|d| d.node.clone());
    out.directives = def
        .directives
        .iter()
        .map(|d| render_directive(&d.node))
        .collect();
    out.services.push(service.to_owned());

    let field_candidates = |fields: &[Positioned<FieldDefinition>]| {
        fields
            .iter()
            .map(|f| Candidate {
                field: convert_field(&f.node),
                return_type: base_name(&f.node.ty.node).to_owned(),
                args: f
                    .node
                    .arguments
                    .iter()
                    .map(|a| {
                        (
                            a.node.name.node.to_string(),
                            base_name(&a.node.ty.node).to_owned(),
                        )
                    })
                    .collect(),
            })
            .collect::<Vec<_>>()
    };

    let candidates = match &def.kind {
        ParsedKind::Object(obj) => {
            out.implements = obj.implements.iter().map(|i| i.node.to_string()).collect();
            field_candidates(&obj.fields)
        }
        ParsedKind::Interface(iface) => {
            out.implements = iface
                .implements
                .iter()
                .map(|i| i.node.to_string())
                .collect();
            field_candidates(&iface.fields)
        }
        ParsedKind::InputObject(input) => input
            .fields
            .iter()
            .map(|f| Candidate {
                field: convert_input_field(&f.node),
                return_type: base_name(&f.node.ty.node).to_owned(),
                args: Vec::new(),
            })
            .collect(),
        ParsedKind::Union(u) => {
            out.members = u.members.iter().map(|m| m.node.to_string()).collect();
            Vec::new()
        }
        ParsedKind::Enum(e) => {
            out.values = e.values.iter().map(|v| v.node.value.node.to_string()).collect();
            Vec::new()
        }
        ParsedKind::Scalar => Vec::new(),
    };

    (
        CleanType {
            extend: def.extend,
            def: out,
        },
        candidates,
    )
}

/// Parse every fragment, then drop (and report) whatever references a type
/// that no fragment declares.
pub(super) fn clean_fragments(
    fragments: &[(String, String)],
    not_found: &mut NotFound,
) -> Vec<CleanFragment> {
    let mut parsed = Vec::new();
    for (service, sdl) in fragments {
        if sdl.trim().is_empty() {
            continue;
        }
        match parse_schema(sdl) {
            Ok(doc) => {
                let types: Vec<_> = doc
                    .definitions
                    .into_iter()
                    .filter_map(|d| match d {
                        TypeSystemDefinition::Type(t) => Some(t.node),
                        _ => {
                            tracing::debug!(service = %service, "Ignoring non-type definition");
                            None
                        }
                    })
                    .collect();
                parsed.push((service.clone(), types));
            }
            Err(e) => report(
                not_found,
                service,
                "<schema>".to_owned(),
                format!("Invalid schema: {e}"),
            ),
        }
    }

    let mut known: HashSet<String> = BUILTIN_SCALARS.iter().map(|s| (*s).to_owned()).collect();
    for (_, types) in &parsed {
        for t in types.iter().filter(|t| !t.extend) {
            known.insert(t.name.node.to_string());
        }
    }

    parsed
        .into_iter()
        .map(|(service, types)| {
            let mut kept = Vec::new();
            for def in &types {
                let (mut clean, candidates) = convert(def, &service);
                let type_name = clean.def.name.clone();

                if clean.extend && !known.contains(&type_name) {
                    report(
                        not_found,
                        &service,
                        type_name.clone(),
                        format!("Cannot extend type \"{type_name}\": type not found"),
                    );
                    continue;
                }

                for c in candidates {
                    let entry = format!("{}.{}", type_name, c.field.name);
                    if !known.contains(&c.return_type) {
                        report(
                            not_found,
                            &service,
                            entry,
                            format!("Type \"{}\" not found", c.return_type),
                        );
                        continue;
                    }
                    if let Some((arg, ty)) = c.args.iter().find(|(_, ty)| !known.contains(ty)) {
                        report(
                            not_found,
                            &service,
                            format!("{entry}({arg})"),
                            format!("Type \"{ty}\" not found"),
                        );
                        continue;
                    }
                    clean.def.fields.insert(c.field.name.clone(), c.field);
                }

                let members = std::mem::take(&mut clean.def.members);
                for m in members {
                    if known.contains(&m) {
                        clean.def.members.push(m);
                    } else {
                        report(
                            not_found,
                            &service,
                            format!("{type_name}.{m}"),
                            format!("Union member \"{m}\" not found"),
                        );
                    }
                }

                let interfaces = std::mem::take(&mut clean.def.implements);
                for i in interfaces {
                    if known.contains(&i) {
                        clean.def.implements.push(i);
                    } else {
                        report(
                            not_found,
                            &service,
                            format!("{type_name}.{i}"),
                            format!("Interface \"{i}\" not found"),
                        );
                    }
                }

                kept.push(clean);
            }
            CleanFragment {
                service,
                types: kept,
            }
        })
        .collect()
}
