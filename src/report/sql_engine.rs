//! SQL-backed report engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use super::context::ReportContext;
use super::definition::{
    is_empty_input, parse_dir, unwrap_payload, ChartType, GroupBy, MetricType, NormalizedDefinition,
    OrderBy, ReportDefinition, MAX_LIMIT,
};
use super::engine::ReportEngine;
use super::error::{ReportError, ReportValidationError};
use super::format::{group_label, metric_value};
use super::result::{ReportResult, ValidationOutcome};
use super::saved_filter::SavedFilterStore;
use crate::catalog::{EntityMeta, FieldCatalog, FieldDef, FieldType};
use crate::exec::QueryExecutor;
use crate::filter::{merge_filters, normalize, FilterNode, FilterTranslator};
use crate::sql::{
    avg, col, count_star, max, min, raw_sql, sum, table_col, Bucket, Dialect, Expr, ExprExt, OrderByExpr,
    Query, SqlDialect, TableRef,
};

/// Registry name of the SQL engine.
pub const SQL_ENGINE: &str = "sql";

/// Report engine that compiles definitions to SQL and runs them through a
/// [`QueryExecutor`].
#[derive(Clone)]
pub struct SqlReportEngine {
    catalog: Arc<dyn FieldCatalog>,
    executor: Arc<dyn QueryExecutor>,
    saved_filters: Arc<dyn SavedFilterStore>,
}

/// Everything `run` needs once a definition has passed validation.
struct Plan<'a> {
    definition: ReportDefinition,
    entity: &'a EntityMeta,
    table: String,
    base_filters: Option<FilterNode>,
    stage_filters: Vec<Option<FilterNode>>,
}

struct Checked<'a> {
    outcome: ValidationOutcome,
    plan: Option<Plan<'a>>,
}

impl SqlReportEngine {
    pub fn new(
        catalog: Arc<dyn FieldCatalog>,
        executor: Arc<dyn QueryExecutor>,
        saved_filters: Arc<dyn SavedFilterStore>,
    ) -> Self {
        Self {
            catalog,
            executor,
            saved_filters,
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    async fn check(&self, raw: &Value, ctx: &ReportContext) -> Checked<'_> {
        let mut def = NormalizedDefinition::from_value(unwrap_payload(raw));
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let entity = if def.entity.is_empty() {
            errors.push("Entity is required".to_string());
            None
        } else {
            let meta = self.catalog.get(&def.entity);
            if meta.is_none() {
                errors.push(format!("Entity '{}' not found", def.entity));
            }
            if self.catalog.is_protected(&def.entity) {
                errors.push(format!("Entity '{}' is not available for reporting", def.entity));
            }
            meta
        };
        let field = |name: &str| entity.and_then(|meta| meta.field(name));

        let chart_type = ChartType::parse(&def.chart_type);
        if chart_type.is_none() {
            errors.push("Chart type is required".to_string());
        }

        if MetricType::parse(&def.metric.metric_type).is_none() {
            errors.push(format!("Metric '{}' is not supported", def.metric.metric_type));
        }
        if def.metric.metric_type != MetricType::Count.as_str() {
            match def.metric.field.as_deref() {
                None => errors.push("Metric field is required for this metric type".to_string()),
                Some(name) => match field(name) {
                    None => errors.push(format!("Metric field '{name}' not found")),
                    Some(f) if !f.is_numeric() => {
                        errors.push(format!("Metric field '{name}' must be numeric"))
                    }
                    Some(_) => {}
                },
            }
        }

        let bucket = def.group_by.bucket.clone();
        if Bucket::parse(&bucket).is_none() {
            errors.push(format!("Bucket '{bucket}' is not supported"));
        }
        let bucketed = bucket != Bucket::None.as_str();
        match def.group_by.field.as_deref() {
            Some(name) => match field(name) {
                None => errors.push(format!("Group field '{name}' not found")),
                Some(f) if bucketed && !f.is_temporal() => {
                    errors.push(format!("Bucket '{bucket}' requires a date/datetime field"))
                }
                Some(_) => {}
            },
            None if bucketed => {
                warnings.push("Bucket ignored because no group field was selected".to_string());
                def.group_by.bucket = Bucket::None.to_string();
            }
            None => {}
        }

        if OrderBy::parse(&def.order.by).is_none() {
            warnings.push(format!(
                "Order by '{}' is not supported; defaulting to value",
                def.order.by
            ));
            def.order.by = "value".to_string();
        }
        if parse_dir(&def.order.dir).is_none() {
            warnings.push(format!(
                "Order direction '{}' is not supported; defaulting to desc",
                def.order.dir
            ));
            def.order.dir = "desc".to_string();
        }

        if let Some(limit) = def.limit {
            if limit <= 0 {
                warnings.push("Limit must be greater than zero; ignoring".to_string());
                def.limit = None;
            } else if limit > MAX_LIMIT {
                warnings.push(format!("Limit capped at {MAX_LIMIT}"));
                def.limit = Some(MAX_LIMIT);
            }
        }

        if def.group_by.field.is_none() {
            if def.limit.is_some() {
                warnings.push("Limit ignored because no group field is selected".to_string());
            }
            warnings.push("Ordering ignored because no group field is selected".to_string());
        }

        let is_funnel = chart_type == Some(ChartType::Funnel);
        if is_funnel {
            def.group_by.field = None;
            def.group_by.bucket = Bucket::None.to_string();
            if def.funnel_stages.is_empty() {
                errors.push("Funnel charts require at least one stage".to_string());
            }
        }

        let mut base_filters = None;
        let mut stage_filters = Vec::new();
        if let Some(meta) = entity {
            let table = def.entity.to_lowercase();
            let translator = FilterTranslator::new(&meta.fields, &table);
            let check_filters = !meta.fields.is_empty();

            base_filters = self
                .resolve_filters(def.filters.as_ref(), def.filter_id.as_deref(), &def.entity, ctx)
                .await;
            if check_filters {
                if !is_empty_input(def.filters.as_ref()) && base_filters.is_none() {
                    errors.push("Filters could not be parsed".to_string());
                }
                if let (Some(id), None) = (&def.filter_id, &base_filters) {
                    errors.push(format!("Stored filter '{id}' not found"));
                }
                if let Some(filters) = &base_filters {
                    errors.extend(translator.validate(filters));
                }
            }

            if is_funnel {
                for (i, stage) in def.funnel_stages.iter().enumerate() {
                    let n = i + 1;
                    let resolved = self
                        .resolve_filters(stage.filters.as_ref(), stage.filter_id.as_deref(), &def.entity, ctx)
                        .await;
                    if check_filters {
                        if !is_empty_input(stage.filters.as_ref()) && resolved.is_none() {
                            errors.push(format!("Stage {n}: filters could not be parsed"));
                        }
                        if stage.filter_id.is_some() && resolved.is_none() {
                            errors.push(format!("Stage {n}: stored filter not found"));
                        }
                        if let Some(filters) = &resolved {
                            errors.extend(
                                translator
                                    .validate(filters)
                                    .into_iter()
                                    .map(|e| format!("Stage {n}: {e}")),
                            );
                        }
                    }
                    stage_filters.push(resolved);
                }
            }
        }

        let plan = match (errors.is_empty(), entity) {
            (true, Some(meta)) => match ReportDefinition::from_normalized(&def) {
                Some(definition) => Some(Plan {
                    definition,
                    entity: meta,
                    table: def.entity.to_lowercase(),
                    base_filters,
                    stage_filters,
                }),
                None => {
                    errors.push("Report definition could not be interpreted".to_string());
                    None
                }
            },
            _ => None,
        };

        if !errors.is_empty() {
            debug!(entity = %def.entity, errors = ?errors, "report definition rejected");
        }

        Checked {
            outcome: ValidationOutcome {
                valid: errors.is_empty(),
                errors,
                warnings,
                definition: def,
            },
            plan,
        }
    }

    /// Inline filters win. Missing or unparseable inline filters fall back
    /// to the stored filter.
    async fn resolve_filters(
        &self,
        inline: Option<&Value>,
        filter_id: Option<&str>,
        entity: &str,
        ctx: &ReportContext,
    ) -> Option<FilterNode> {
        let inline = inline.filter(|v| !is_empty_input(Some(v))).and_then(normalize);
        match (inline, filter_id.filter(|id| !id.is_empty())) {
            (Some(filters), _) => Some(filters),
            (None, Some(id)) => self.load_stored_filter(entity, id, ctx).await,
            (None, None) => None,
        }
    }

    /// Load a stored filter owned by the requesting user for this entity.
    /// Any mismatch or failure reads as "not found".
    async fn load_stored_filter(&self, entity: &str, id: &str, ctx: &ReportContext) -> Option<FilterNode> {
        let user = ctx.user_id.as_deref().filter(|u| !u.is_empty())?;

        let record = match self.saved_filters.get(id, &ctx.query_context()).await {
            Ok(record) => record?,
            Err(e) => {
                warn!(filter_id = %id, error = %e, "stored filter lookup failed");
                return None;
            }
        };

        if record.owner != user || record.entity != entity {
            debug!(filter_id = %id, "stored filter not visible to requester");
            return None;
        }

        match record.decoded_definition() {
            definition @ (Value::Array(_) | Value::Object(_)) => normalize(&definition),
            _ => None,
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    async fn run_aggregate(
        &self,
        plan: &Plan<'_>,
        translator: &FilterTranslator<'_>,
        mut warnings: Vec<String>,
        normalized: NormalizedDefinition,
        ctx: &ReportContext,
    ) -> Result<ReportResult, ReportError> {
        let def = &plan.definition;
        let dialect = self.executor.dialect();

        let mut query = Query::new().from(TableRef::new(&plan.table));
        if let Some(filters) = &plan.base_filters {
            query = translator.apply(query, filters);
        }
        query = query.add_select(metric_expr(def, &plan.table).alias("value"));

        let group_field = def.group_by.as_ref().and_then(|g| plan.entity.field(&g.field));
        if let Some(group) = &def.group_by {
            let label = match self.relationship_label(&plan.table, group, group_field, &mut warnings) {
                Some((label, related, on)) => {
                    query = query.left_join(related, on);
                    label
                }
                None => bucket_label(&plan.table, group, group_field, dialect),
            };

            let order_key = match def.order_by {
                OrderBy::Label => label.clone(),
                OrderBy::Value => col("value"),
            };
            query = query
                .add_select(label.clone().alias("label"))
                .group_by(vec![label])
                .order_by(vec![OrderByExpr::new(order_key, def.order_dir)]);
            if let Some(limit) = def.limit {
                query = query.limit(limit);
            }
        }

        let compiled = query.compile(dialect);
        let rows = self.executor.fetch_all(&compiled, &ctx.query_context()).await?;
        debug!(rows = rows.len(), "aggregate query returned");

        let mut points: Vec<(String, f64)> = rows
            .iter()
            .map(|row| {
                let label = match def.group_by {
                    Some(_) => group_label(row.get("label"), group_field),
                    None => normalized.total_label(),
                };
                (label, metric_value(row.get("value")))
            })
            .collect();
        if points.is_empty() && def.group_by.is_none() {
            points.push((normalized.total_label(), 0.0));
        }

        Ok(ReportResult::from_points(def.series_label(), points, normalized, warnings))
    }

    async fn run_funnel(
        &self,
        plan: &Plan<'_>,
        translator: &FilterTranslator<'_>,
        warnings: Vec<String>,
        normalized: NormalizedDefinition,
        ctx: &ReportContext,
    ) -> Result<ReportResult, ReportError> {
        let def = &plan.definition;
        let dialect = self.executor.dialect();
        let mut points = Vec::with_capacity(def.funnel_stages.len());

        for (i, stage) in def.funnel_stages.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(ReportError::Cancelled);
            }

            let stage_filters = plan.stage_filters.get(i).and_then(Option::as_ref);
            let mut query = Query::new().from(TableRef::new(&plan.table));
            if let Some(filters) = merge_filters(plan.base_filters.as_ref(), stage_filters) {
                query = translator.apply(query, &filters);
            }
            query = query.add_select(metric_expr(def, &plan.table).alias("value"));

            let rows = self
                .executor
                .fetch_all(&query.compile(dialect), &ctx.query_context())
                .await?;
            let value = rows.first().map_or(0.0, |row| metric_value(row.get("value")));
            debug!(stage = %stage.label, value, "funnel stage computed");
            points.push((stage.label.clone(), value));
        }

        Ok(ReportResult::from_points(def.series_label(), points, normalized, warnings))
    }

    /// Join target for relationship group fields, resolving labels to the
    /// related entity's `name`. `None` means label by the raw column.
    fn relationship_label(
        &self,
        table: &str,
        group: &GroupBy,
        field: Option<&FieldDef>,
        warnings: &mut Vec<String>,
    ) -> Option<(Expr, TableRef, Expr)> {
        let field = field.filter(|f| f.field_type == Some(FieldType::Relationship))?;
        let related = field.entity.as_deref().filter(|e| !e.is_empty())?.to_lowercase();

        if self.catalog.is_protected(&related) {
            warnings.push(format!(
                "Relationship '{}' points to a protected entity; using id for labels",
                group.field
            ));
            return None;
        }
        let has_name = self
            .catalog
            .get(&related)
            .is_some_and(|meta| meta.fields.contains_key("name"));
        if !has_name {
            warnings.push(format!(
                "Relationship '{}' lacks a name field; using id for labels",
                group.field
            ));
            return None;
        }

        let alias = format!("{related}_rel");
        let on = table_col(table, &group.field).eq(table_col(&alias, "id"));
        Some((
            table_col(&alias, "name"),
            TableRef::new(&related).with_alias(&alias),
            on,
        ))
    }
}

/// `COUNT(*)`, or `SUM("table"."field")` etc.
fn metric_expr(def: &ReportDefinition, table: &str) -> Expr {
    match (def.metric.kind, def.metric.field.as_deref()) {
        (MetricType::Count, _) | (_, None) => count_star(),
        (MetricType::Sum, Some(field)) => sum(table_col(table, field)),
        (MetricType::Avg, Some(field)) => avg(table_col(table, field)),
        (MetricType::Min, Some(field)) => min(table_col(table, field)),
        (MetricType::Max, Some(field)) => max(table_col(table, field)),
    }
}

/// Group column, wrapped in the dialect's bucket expression for bucketed
/// date/datetime fields.
fn bucket_label(table: &str, group: &GroupBy, field: Option<&FieldDef>, dialect: Dialect) -> Expr {
    let column = table_col(table, &group.field);
    if group.bucket.is_none() || !field.is_some_and(FieldDef::is_temporal) {
        return column;
    }
    raw_sql(dialect.label_expr(&column.to_sql(dialect), group.bucket))
}

#[async_trait]
impl ReportEngine for SqlReportEngine {
    fn name(&self) -> &str {
        SQL_ENGINE
    }

    async fn validate(&self, definition: &Value, ctx: &ReportContext) -> ValidationOutcome {
        self.check(definition, ctx).await.outcome
    }

    async fn run(&self, definition: &Value, ctx: &ReportContext) -> Result<ReportResult, ReportError> {
        let span = info_span!(
            "report.run",
            entity = tracing::field::Empty,
            chart_type = tracing::field::Empty
        );

        async move {
            let Checked { outcome, plan } = self.check(definition, ctx).await;
            let span = tracing::Span::current();
            span.record("entity", outcome.definition.entity.as_str());
            span.record("chart_type", outcome.definition.chart_type.as_str());

            let plan = match plan {
                Some(plan) if outcome.valid => plan,
                _ => {
                    return Err(ReportValidationError {
                        errors: outcome.errors,
                        warnings: outcome.warnings,
                        definition: Box::new(outcome.definition),
                    }
                    .into())
                }
            };

            let translator = FilterTranslator::new(&plan.entity.fields, &plan.table);
            let result = match plan.definition.chart_type {
                ChartType::Funnel => {
                    self.run_funnel(&plan, &translator, outcome.warnings, outcome.definition, ctx)
                        .await
                }
                _ => {
                    self.run_aggregate(&plan, &translator, outcome.warnings, outcome.definition, ctx)
                        .await
                }
            };

            match &result {
                Ok(report) => info!(
                    points = report.labels.len(),
                    total = report.meta.total,
                    "report completed"
                ),
                Err(e) => warn!(error = %e, "report failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for SqlReportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlReportEngine")
            .field("dialect", &self.executor.dialect())
            .finish_non_exhaustive()
    }
}
