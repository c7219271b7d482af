//! Security policy decisions.
//!
//! Pure functions of the request and the instance configuration. Nothing
//! here touches a connection or keeps state between calls; a confirmed
//! resend is evaluated from scratch like any other request.

use crate::db::sql::Plan;
use crate::models::{InstanceConfig, OperationClass, OperationRequest, SchemaScope};

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
    RequireConfirmation,
}

/// Decide whether a validated request may run on an instance.
pub fn evaluate(
    request: &OperationRequest,
    instance: &InstanceConfig,
    confirmed: bool,
) -> Decision {
    let class = request.class();

    if instance.read_only && !class.is_read() {
        return Decision::Deny(format!(
            "instance '{}' is read-only; {} is a {} operation",
            instance.prefix, request.name, class
        ));
    }

    if !class.is_read()
        && !request.operation.schemas_resolved()
        && instance.allowed_schemas != SchemaScope::Any
    {
        return Decision::Deny(format!(
            "schema not permitted: could not determine the schemas changed by {} \
             on instance '{}' (allowed: {})",
            request.operation.target(),
            instance.prefix,
            instance.allowed_schemas
        ));
    }

    let system_schemas = instance.db_type.system_schemas();
    for schema in request.operation.schemas() {
        if class.is_read() && system_schemas.contains(&schema.as_str()) {
            continue;
        }
        if !instance.allowed_schemas.permits(&schema) {
            return Decision::Deny(format!(
                "schema '{}' is not permitted on instance '{}' (allowed: {})",
                schema, instance.prefix, instance.allowed_schemas
            ));
        }
    }

    match class {
        OperationClass::Destructive if !confirmed => Decision::RequireConfirmation,
        _ => Decision::Allow,
    }
}

/// Text returned with `ConfirmationRequired`.
pub fn confirmation_preview(
    request: &OperationRequest,
    instance: &InstanceConfig,
    plan: &Plan,
) -> String {
    let database = plan
        .database
        .as_deref()
        .or(request.database.as_ref().map(|d| d.as_str()))
        .or(instance.database.as_deref())
        .unwrap_or("default");
    format!(
        "[{label}] Confirmation required for destructive operation '{op}'\n\
         Instance: {prefix}\n\
         Database: {database}\n\
         Target: {target}\n\
         Statement: {sql}\n\n\
         This cannot be undone. To proceed, resend the identical call with \"confirm\": true.",
        label = instance.label,
        op = request.name,
        prefix = instance.prefix,
        database = database,
        target = request.operation.target(),
        sql = plan.statement.sql,
    )
}
