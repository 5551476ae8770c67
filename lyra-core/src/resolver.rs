//! Reference resolver - binds the template's internal cross-references
//!
//! Three passes: environment substitution, label association resolution, and
//! endpoint binding on notification rules. Reference defects are collected
//! and reported together; unbound environment references are non-fatal here
//! and only fail a real apply.

use std::collections::BTreeMap;

use crate::error::{Error, Result, ValidationDefect};
use crate::kind::Kind;
use crate::resource::{EnvRefValue, StackResource};
use crate::template::{ResourceSpec, Template, TemplateObject};

/// A template with environment values bound and references checked
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub template: Template,
    /// Env-ref keys that had neither a caller-supplied value nor a default
    pub missing_env_refs: Vec<String>,
}

/// Resolve a template against caller-supplied environment values and the
/// resources already owned by the bound stack.
pub fn resolve(
    template: &Template,
    env: &BTreeMap<String, EnvRefValue>,
    stack_resources: &[StackResource],
) -> Result<ResolvedTemplate> {
    let mut objects: Vec<TemplateObject> = template.objects().to_vec();
    let mut defects = Vec::new();
    let mut missing_env_refs = Vec::new();

    for object in &mut objects {
        substitute_env_refs(object, env, &mut defects, &mut missing_env_refs);
    }

    let resolved = Template::new(objects);

    for object in resolved.objects() {
        resolve_associations(&resolved, object, stack_resources, &mut defects);
        if let ResourceSpec::NotificationRule(rule) = &object.spec {
            let bound = resolved.contains(Kind::NotificationEndpoint, &rule.endpoint_name)
                || stack_owns(stack_resources, Kind::NotificationEndpoint, &rule.endpoint_name);
            if !bound {
                defects.push(
                    ValidationDefect::new(
                        "endpointName",
                        format!("references missing endpoint \"{}\"", rule.endpoint_name),
                    )
                    .for_resource(Kind::NotificationRule, &object.meta_name),
                );
            }
        }
    }

    if !defects.is_empty() {
        return Err(Error::Validation(defects));
    }

    missing_env_refs.sort();
    missing_env_refs.dedup();

    Ok(ResolvedTemplate {
        template: resolved,
        missing_env_refs,
    })
}

fn stack_owns(stack_resources: &[StackResource], kind: Kind, meta_name: &str) -> bool {
    stack_resources
        .iter()
        .any(|r| r.kind.matches(kind) && r.meta_name == meta_name)
}

fn substitute_env_refs(
    object: &mut TemplateObject,
    env: &BTreeMap<String, EnvRefValue>,
    defects: &mut Vec<ValidationDefect>,
    missing: &mut Vec<String>,
) {
    let kind = object.kind();
    let meta_name = object.meta_name.clone();
    for env_ref in object.env_refs.clone() {
        let value = env
            .get(&env_ref.key)
            .cloned()
            .or(env_ref.default_value.clone());
        let Some(value) = value else {
            missing.push(env_ref.key.clone());
            continue;
        };
        let value = value.as_display_string();
        match env_ref.field.as_str() {
            "metadata.name" => object.meta_name = value,
            "spec.name" => set_spec_name(&mut object.spec, value),
            "spec.description" => set_spec_description(&mut object.spec, value),
            other => defects.push(
                ValidationDefect::new(
                    "envRefs",
                    format!("\"{other}\" is not a substitutable field"),
                )
                .for_resource(kind, &meta_name),
            ),
        }
    }
}

fn set_spec_name(spec: &mut ResourceSpec, value: String) {
    match spec {
        ResourceSpec::Bucket(s) => s.name = Some(value),
        ResourceSpec::Check(s) => s.base_mut().name = Some(value),
        ResourceSpec::Dashboard(s) => s.name = Some(value),
        ResourceSpec::Label(s) => s.name = Some(value),
        ResourceSpec::NotificationEndpoint(s) => s.base_mut().name = Some(value),
        ResourceSpec::NotificationRule(s) => s.name = Some(value),
        ResourceSpec::Task(s) => s.name = Some(value),
        ResourceSpec::Telegraf(s) => s.name = Some(value),
        ResourceSpec::Variable(s) => s.name = Some(value),
    }
}

fn set_spec_description(spec: &mut ResourceSpec, value: String) {
    match spec {
        ResourceSpec::Bucket(s) => s.description = Some(value),
        ResourceSpec::Check(s) => s.base_mut().description = Some(value),
        ResourceSpec::Dashboard(s) => s.description = Some(value),
        ResourceSpec::Label(s) => s.description = Some(value),
        ResourceSpec::NotificationEndpoint(s) => s.base_mut().description = Some(value),
        ResourceSpec::NotificationRule(s) => s.description = Some(value),
        ResourceSpec::Task(s) => s.description = Some(value),
        ResourceSpec::Telegraf(s) => s.description = Some(value),
        ResourceSpec::Variable(s) => s.description = Some(value),
    }
}

fn resolve_associations(
    template: &Template,
    object: &TemplateObject,
    stack_resources: &[StackResource],
    defects: &mut Vec<ValidationDefect>,
) {
    for association in &object.associations {
        if association.kind != Kind::Label {
            defects.push(
                ValidationDefect::new(
                    "associations",
                    format!("association kind {} is not a label", association.kind),
                )
                .for_resource(object.kind(), &object.meta_name),
            );
            continue;
        }
        // A label carrying associations would let the label graph loop back
        // on itself; labels are always leaves.
        if object.kind() == Kind::Label {
            defects.push(
                ValidationDefect::new("associations", "labels cannot carry associations")
                    .for_resource(Kind::Label, &object.meta_name),
            );
            continue;
        }
        let known = template.contains(Kind::Label, &association.name)
            || stack_owns(stack_resources, Kind::Label, &association.name);
        if !known {
            defects.push(
                ValidationDefect::new(
                    "associations",
                    format!("references missing label \"{}\"", association.name),
                )
                .for_resource(object.kind(), &object.meta_name),
            );
        }
    }
}
