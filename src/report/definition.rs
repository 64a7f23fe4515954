//! Report definitions.
//!
//! A request body is first normalized into a [`NormalizedDefinition`]: a
//! forgiving, string-typed view that keeps invalid values so validation
//! can report them and echo the corrected definition back. Once validation
//! passes, it converts into the typed [`ReportDefinition`] the engine runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::value_text;
use crate::filter::coerce::is_numeric;
use crate::sql::{Bucket, SortDir};

/// Largest accepted `limit`.
pub const MAX_LIMIT: i64 = 200;

// =============================================================================
// Normalized (string-typed) definition
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBySpec {
    pub field: Option<String>,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub by: String,
    pub dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    pub label: String,
    pub filters: Option<Value>,
    pub filter_id: Option<String>,
}

/// Definition after defaulting and case-folding, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDefinition {
    pub entity: String,
    pub chart_type: String,
    pub metric: MetricSpec,
    pub group_by: GroupBySpec,
    pub filters: Option<Value>,
    pub filter_id: Option<String>,
    pub order: OrderSpec,
    pub limit: Option<i64>,
    pub title: Option<String>,
    pub funnel_stages: Vec<StageSpec>,
}

impl NormalizedDefinition {
    /// Normalize a raw request definition. Never fails; anything
    /// unrecognizable becomes a default that validation will flag.
    pub fn from_value(raw: &Value) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);

        let metric = match obj.get("metric") {
            Some(Value::Object(m)) => MetricSpec {
                metric_type: lower_or(m.get("type"), "count"),
                field: non_empty_text(m.get("field")),
            },
            other => MetricSpec {
                metric_type: lower_or(other, "count"),
                field: None,
            },
        };

        let group_by = match obj.get("groupBy") {
            Some(Value::Object(g)) => {
                let bucket = lower_or(g.get("bucket"), "none");
                GroupBySpec {
                    field: non_empty_text(g.get("field")),
                    bucket: Bucket::parse(&bucket).map_or(bucket, |b| b.to_string()),
                }
            }
            _ => GroupBySpec {
                field: None,
                bucket: Bucket::None.to_string(),
            },
        };

        let order = match obj.get("order") {
            Some(Value::Object(o)) => OrderSpec {
                by: lower_or(o.get("by"), "value"),
                dir: lower_or(o.get("dir"), "desc"),
            },
            _ => OrderSpec {
                by: "value".to_string(),
                dir: "desc".to_string(),
            },
        };

        let stages = first_present(obj, &["funnelStages", "funnel_stages"])
            .and_then(Value::as_array)
            .map(|stages| {
                stages
                    .iter()
                    .enumerate()
                    .map(|(i, stage)| StageSpec::from_value(i + 1, stage))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            entity: text(obj.get("entity")).unwrap_or_default(),
            chart_type: lower_or(obj.get("chartType"), ""),
            metric,
            group_by,
            filters: obj.get("filters").filter(|v| !v.is_null()).cloned(),
            filter_id: first_present(obj, &["filterId", "filter_id"]).and_then(|v| non_empty_text(Some(v))),
            order,
            limit: obj.get("limit").filter(|v| !v.is_null()).map(coerce_limit),
            title: text(obj.get("title")),
            funnel_stages: stages,
        }
    }

    /// Label used for the single row of an ungrouped report.
    pub fn total_label(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => "Total".to_string(),
        }
    }
}

impl StageSpec {
    fn from_value(index: usize, raw: &Value) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);
        let label = text(obj.get("label"))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("Stage {index}"));
        Self {
            label,
            filters: obj.get("filters").filter(|v| !v.is_null()).cloned(),
            filter_id: first_present(obj, &["filterId", "filter_id"]).and_then(|v| non_empty_text(Some(v))),
        }
    }
}

/// Unwrap request bodies that nest the definition under `definition` or
/// `reportDefinition`.
pub fn unwrap_payload(body: &Value) -> &Value {
    ["definition", "reportDefinition"]
        .iter()
        .find_map(|key| body.get(key).filter(|v| v.is_object()))
        .unwrap_or(body)
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

/// Scalar as text; `None` for null, arrays and objects.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => Some(value_text(other)),
    }
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    text(value).filter(|s| !s.is_empty())
}

fn lower_or(value: Option<&Value>, default: &str) -> String {
    text(value)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| default.to_string())
}

fn coerce_limit(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) if is_numeric(s) => s.trim().parse::<f64>().map(|f| f.trunc() as i64).unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// PHP-style emptiness used for "was anything supplied" checks: null,
/// `false`, `0`, `""`, `"0"` and empty containers.
pub(crate) fn is_empty_input(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty() || s == "0",
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

// =============================================================================
// Typed definition
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Pie,
    Bar,
    Line,
    Funnel,
}

impl ChartType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pie" => Some(ChartType::Pie),
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "funnel" => Some(ChartType::Funnel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Pie => "pie",
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Funnel => "funnel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl MetricType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "count" => Some(MetricType::Count),
            "sum" => Some(MetricType::Sum),
            "avg" => Some(MetricType::Avg),
            "min" => Some(MetricType::Min),
            "max" => Some(MetricType::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Count => "count",
            MetricType::Sum => "sum",
            MetricType::Avg => "avg",
            MetricType::Min => "min",
            MetricType::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Value,
    Label,
}

impl OrderBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "value" => Some(OrderBy::Value),
            "label" => Some(OrderBy::Label),
            _ => None,
        }
    }
}

pub(crate) fn parse_dir(s: &str) -> Option<SortDir> {
    match s {
        "asc" => Some(SortDir::Asc),
        "desc" => Some(SortDir::Desc),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: MetricType,
    /// Required for everything but `count`.
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub field: String,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunnelStage {
    pub label: String,
    pub filters: Option<Value>,
    pub filter_id: Option<String>,
}

/// A validated report definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    pub entity: String,
    pub chart_type: ChartType,
    pub metric: Metric,
    pub group_by: Option<GroupBy>,
    pub order_by: OrderBy,
    pub order_dir: SortDir,
    pub limit: Option<u64>,
    pub title: Option<String>,
    pub funnel_stages: Vec<FunnelStage>,
}

impl ReportDefinition {
    /// Typed view of a definition that passed validation. Returns `None`
    /// if any enum is still out of range.
    pub fn from_normalized(def: &NormalizedDefinition) -> Option<Self> {
        let group_by = match &def.group_by.field {
            Some(field) => Some(GroupBy {
                field: field.clone(),
                bucket: Bucket::parse(&def.group_by.bucket)?,
            }),
            None => None,
        };
        Some(Self {
            entity: def.entity.clone(),
            chart_type: ChartType::parse(&def.chart_type)?,
            metric: Metric {
                kind: MetricType::parse(&def.metric.metric_type)?,
                field: def.metric.field.clone(),
            },
            group_by,
            order_by: OrderBy::parse(&def.order.by).unwrap_or_default(),
            order_dir: parse_dir(&def.order.dir).unwrap_or(SortDir::Desc),
            limit: def.limit.and_then(|l| u64::try_from(l).ok()),
            title: def.title.clone(),
            funnel_stages: def
                .funnel_stages
                .iter()
                .map(|s| FunnelStage {
                    label: s.label.clone(),
                    filters: s.filters.clone(),
                    filter_id: s.filter_id.clone(),
                })
                .collect(),
        })
    }

    /// `Count`, or e.g. `SUM of amount`.
    pub fn series_label(&self) -> String {
        match self.metric.kind {
            MetricType::Count => "Count".to_string(),
            kind => format!(
                "{} of {}",
                kind.as_str().to_uppercase(),
                self.metric.field.as_deref().unwrap_or("value")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let def = NormalizedDefinition::from_value(&json!({"entity": "orders", "chartType": "PIE"}));
        assert_eq!(def.chart_type, "pie");
        assert_eq!(def.metric.metric_type, "count");
        assert_eq!(def.metric.field, None);
        assert_eq!(def.group_by.field, None);
        assert_eq!(def.group_by.bucket, "none");
        assert_eq!(def.order.by, "value");
        assert_eq!(def.order.dir, "desc");
        assert_eq!(def.limit, None);
        assert!(def.funnel_stages.is_empty());
    }

    #[test]
    fn test_scalar_metric_and_aliases() {
        let def = NormalizedDefinition::from_value(&json!({
            "entity": "orders",
            "metric": "SUM",
            "filter_id": 42,
            "funnel_stages": [{"label": "  ", "filter_id": "f1"}, "junk"],
            "groupBy": {"field": "", "bucket": "Month"}
        }));
        assert_eq!(def.metric.metric_type, "sum");
        assert_eq!(def.filter_id.as_deref(), Some("42"));
        assert_eq!(def.group_by.field, None);
        assert_eq!(def.group_by.bucket, "month");
        assert_eq!(def.funnel_stages.len(), 2);
        assert_eq!(def.funnel_stages[0].label, "Stage 1");
        assert_eq!(def.funnel_stages[0].filter_id.as_deref(), Some("f1"));
        assert_eq!(def.funnel_stages[1].label, "Stage 2");
    }

    #[test]
    fn test_limit_coercion() {
        let limit = |v: Value| NormalizedDefinition::from_value(&json!({"limit": v})).limit;
        assert_eq!(limit(json!(12)), Some(12));
        assert_eq!(limit(json!(7.9)), Some(7));
        assert_eq!(limit(json!(" 15 ")), Some(15));
        assert_eq!(limit(json!("ten")), Some(0));
        assert_eq!(limit(json!(null)), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let def = NormalizedDefinition::from_value(&json!({"entity": "orders", "chartType": "bar"}));
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["chartType"], "bar");
        assert_eq!(value["groupBy"]["bucket"], "none");
        assert_eq!(value["metric"]["type"], "count");
        assert!(value.get("orderSupplied").is_none());
    }

    #[test]
    fn test_unwrap_payload() {
        let inner = json!({"entity": "orders"});
        assert_eq!(unwrap_payload(&json!({"definition": inner.clone()})), &inner);
        assert_eq!(unwrap_payload(&json!({"reportDefinition": inner.clone()})), &inner);
        assert_eq!(unwrap_payload(&inner), &inner);
    }

    #[test]
    fn test_is_empty_input() {
        assert!(is_empty_input(None));
        assert!(is_empty_input(Some(&json!({}))));
        assert!(is_empty_input(Some(&json!("0"))));
        assert!(!is_empty_input(Some(&json!({"a": 1}))));
        assert!(!is_empty_input(Some(&json!("x"))));
    }

    #[test]
    fn test_typed_definition_and_series_label() {
        let normalized = NormalizedDefinition::from_value(&json!({
            "entity": "orders",
            "chartType": "bar",
            "metric": {"type": "sum", "field": "amount"},
            "groupBy": {"field": "created_at", "bucket": "month"},
            "order": {"by": "label", "dir": "asc"},
            "limit": 5
        }));
        let def = ReportDefinition::from_normalized(&normalized).unwrap();
        assert_eq!(def.chart_type, ChartType::Bar);
        assert_eq!(def.metric.kind, MetricType::Sum);
        assert_eq!(
            def.group_by,
            Some(GroupBy {
                field: "created_at".into(),
                bucket: Bucket::Month
            })
        );
        assert_eq!(def.order_by, OrderBy::Label);
        assert_eq!(def.order_dir, SortDir::Asc);
        assert_eq!(def.limit, Some(5));
        assert_eq!(def.series_label(), "SUM of amount");

        let bad = NormalizedDefinition::from_value(&json!({"entity": "orders", "chartType": "radar"}));
        assert!(ReportDefinition::from_normalized(&bad).is_none());
    }
}
