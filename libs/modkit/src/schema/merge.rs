use super::clean::{CleanFragment, CleanType};
use super::{report, EntitiesMap, NotFound, TypeDef, TypeKind, BUILTIN_SCALARS};

fn push_unique(into: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

fn absorb(existing: &mut TypeDef, incoming: TypeDef) {
    let TypeDef {
        name,
        description,
        directives,
        implements,
        fields,
        members,
        values,
        services,
        ..
    } = incoming;

    if existing.description.is_none() {
        existing.description = description;
    }
    for (field_name, field) in fields {
        match existing.fields.get(&field_name) {
            Some(current) if current.ty != field.ty => tracing::warn!(
                type_name = %name,
                field = %field_name,
                kept = %current.ty,
                ignored = %field.ty,
                "Conflicting field definition, keeping the first one"
            ),
            Some(_) => {}
            None => {
                existing.fields.insert(field_name, field);
            }
        }
    }
    push_unique(&mut existing.directives, directives);
    push_unique(&mut existing.implements, implements);
    push_unique(&mut existing.members, members);
    push_unique(&mut existing.values, values);
    push_unique(&mut existing.services, services);
}

fn merge_one(types: &mut EntitiesMap, service: &str, clean: CleanType, not_found: &mut NotFound) {
    let incoming = clean.def;
    match types.get_mut(&incoming.name) {
        Some(existing) if existing.kind != incoming.kind => {
            let reason = format!(
                "Conflicts with an existing {:?} definition of \"{}\"",
                existing.kind, incoming.name
            );
            report(not_found, service, incoming.name, reason);
        }
        Some(existing) => absorb(existing, incoming),
        None => {
            types.insert(incoming.name.clone(), incoming);
        }
    }
}

/// Merge cleaned fragments in order. Definitions go first so that an
/// `extend` block registered before its base type still lands on it.
pub(super) fn merge_fragments(fragments: Vec<CleanFragment>, not_found: &mut NotFound) -> EntitiesMap {
    let mut types = EntitiesMap::new();
    for scalar in BUILTIN_SCALARS {
        types.insert(scalar.to_owned(), TypeDef::new(scalar, TypeKind::Scalar));
    }

    let mut extensions = Vec::new();
    for fragment in fragments {
        for clean in fragment.types {
            if clean.extend {
                extensions.push((fragment.service.clone(), clean));
            } else {
                merge_one(&mut types, &fragment.service, clean, not_found);
            }
        }
    }
    for (service, clean) in extensions {
        merge_one(&mut types, &service, clean, not_found);
    }

    types
}
