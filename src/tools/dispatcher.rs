//! Tool invocation pipeline.
//!
//! One call runs: route lookup, argument validation, statement planning,
//! policy, connection lease, execution, formatting. Any failure stops the
//! pipeline, and nothing reaches the database before execution.

use crate::db::executor::QueryExecutor;
use crate::db::registry::Registry;
use crate::db::sql;
use crate::error::{DbError, DbResult};
use crate::models::Ident;
use crate::tools::catalog::RouteTable;
use crate::tools::format;
use crate::tools::policy::{self, Decision};
use rmcp::model::JsonObject;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// A tool as advertised to the client.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: JsonObject,
}

/// Remove the `confirm` flag from a call's arguments.
///
/// The flag is a property of the invocation, not of the operation, so it
/// never reaches argument validation.
pub fn take_confirm(args: &mut JsonObject) -> DbResult<bool> {
    match args.remove("confirm") {
        None | Some(JsonValue::Null) => Ok(false),
        Some(JsonValue::Bool(confirmed)) => Ok(confirmed),
        Some(_) => Err(DbError::invalid_argument("confirm", "must be a boolean")),
    }
}

/// Routes tool calls to instances and runs them.
pub struct Dispatcher {
    registry: Arc<Registry>,
    routes: RouteTable,
}

impl Dispatcher {
    /// Build the route table for every registered instance.
    pub fn new(registry: Arc<Registry>) -> DbResult<Self> {
        let instances = registry.instances();
        let routes = RouteTable::build(instances.iter().map(|i| i.as_ref()))?;
        info!(
            instances = instances.len(),
            tools = routes.len(),
            "Routes built"
        );
        Ok(Self { registry, routes })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Every tool, grouped by instance.
    pub fn tools(&self) -> DbResult<Vec<ToolDescriptor>> {
        self.routes
            .tool_names()
            .into_iter()
            .map(|(name, route)| {
                let instance = self.registry.resolve(&route.prefix)?;
                Ok(ToolDescriptor {
                    name,
                    description: route.operation.describe_for(&instance),
                    input_schema: route.operation.input_schema(),
                })
            })
            .collect()
    }

    /// Run one tool call and return its rendered output.
    pub async fn handle(
        &self,
        tool: &str,
        args: JsonObject,
        confirmed: bool,
        cancel: &CancellationToken,
    ) -> DbResult<String> {
        let span = info_span!("invocation", id = %Uuid::new_v4(), tool = %tool);
        async move {
            let start = Instant::now();
            let result = self.dispatch(tool, args, confirmed, cancel).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => info!(elapsed_ms, outcome = "ok", "Tool call finished"),
                Err(e) => warn!(
                    elapsed_ms,
                    outcome = e.kind().as_str(),
                    error = %e,
                    "Tool call failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        tool: &str,
        args: JsonObject,
        confirmed: bool,
        cancel: &CancellationToken,
    ) -> DbResult<String> {
        let route = self.routes.lookup(tool)?;
        let instance = self.registry.resolve(&route.prefix)?;
        let request = route.operation.parse(&instance, args)?;
        let plan = sql::plan(&request, &instance)?;

        let class = request.class();
        info!(
            operation = request.name,
            instance = %instance.prefix,
            class = %class,
            "Dispatching"
        );

        match policy::evaluate(&request, &instance, confirmed) {
            Decision::Allow => {}
            Decision::Deny(reason) => return Err(DbError::policy_denied(reason)),
            Decision::RequireConfirmation => {
                return Err(DbError::confirmation_required(
                    policy::confirmation_preview(&request, &instance, &plan),
                ));
            }
        }

        let database = plan
            .database
            .as_deref()
            .or(request.database.as_ref().map(Ident::as_str));
        let mut lease = self
            .registry
            .connection_for(&instance.prefix, database)
            .await?;
        if let Some(target) = &plan.evict {
            lease.evict(target).await;
        }

        let output = QueryExecutor::for_instance(&instance)
            .run(&plan, &mut lease, cancel)
            .await?;
        Ok(format::render(
            &instance,
            lease.database(),
            &request.operation,
            &plan,
            &output,
        ))
    }
}
