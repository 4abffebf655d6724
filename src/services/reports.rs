//! Read-only workshop reports. Each returns columns, typed rows and an
//! optional chart; the aggregation itself lives in pure `build_*` functions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::DateRangeParams,
    entities::{
        repair_operation, repair_order, repair_part, sales_invoice, sales_invoice_item,
        stock_entry, stock_entry_detail, timesheet, timesheet_detail, DocStatus,
        RepairOrderStatus,
    },
    errors::ServiceError,
};

pub const AGING_BUCKETS: [&str; 5] = ["<=1d", "2-3d", "4-7d", "8-14d", ">14d"];
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportColumn {
    pub label: &'static str,
    pub fieldname: &'static str,
    pub fieldtype: &'static str,
}

const fn column(label: &'static str, fieldname: &'static str, fieldtype: &'static str) -> ReportColumn {
    ReportColumn {
        label,
        fieldname,
        fieldtype,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChartDataset {
    pub name: String,
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportChart {
    #[serde(rename = "type")]
    pub chart_type: &'static str,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Report<R> {
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<R>,
    pub chart: Option<ReportChart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfitabilityRow {
    pub repair_order: String,
    pub customer: String,
    pub invoiced: Decimal,
    pub actual: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PartsConsumptionRow {
    pub repair_order: String,
    pub item_code: String,
    pub qty: Decimal,
    pub valuation_rate: Decimal,
    pub extended_cost: Decimal,
    pub billable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UtilizationRow {
    pub employee: String,
    pub logged_hours: Decimal,
    pub capacity_hours: Decimal,
    pub standard_hours: Decimal,
    pub utilization: Decimal,
    pub efficiency: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WipAgingRow {
    pub repair_order: String,
    pub status: RepairOrderStatus,
    pub days_in_status: i64,
    pub bucket: &'static str,
    pub sla_delivery_by: Option<DateTime<Utc>>,
    pub advisor: Option<String>,
    pub vehicle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RepeatRepairRow {
    pub vehicle: String,
    pub first_ro: String,
    pub first_date: NaiveDate,
    pub return_ro: String,
    pub return_date: NaiveDate,
    pub days_between: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub repair_orders: u64,
}

/// Invoiced amount per repair order from submitted invoice lines.
pub fn build_job_profitability(
    orders: &[repair_order::Model],
    invoiced_by_order: &HashMap<Uuid, Decimal>,
) -> Report<ProfitabilityRow> {
    let rows = orders
        .iter()
        .map(|ro| {
            let invoiced = invoiced_by_order.get(&ro.id).copied().unwrap_or_default();
            ProfitabilityRow {
                repair_order: ro.name.clone(),
                customer: ro.customer.clone(),
                invoiced,
                actual: ro.total_job_cost,
                profit: invoiced - ro.total_job_cost,
            }
        })
        .collect();

    Report {
        columns: vec![
            column("Repair Order", "repair_order", "Link"),
            column("Customer", "customer", "Data"),
            column("Invoiced Amount", "invoiced", "Currency"),
            column("Actual Cost", "actual", "Currency"),
            column("Profit", "profit", "Currency"),
        ],
        rows,
        chart: None,
    }
}

/// One issued stock line: which order, which item, how much, at what rate.
#[derive(Debug, Clone)]
pub struct IssuedLine {
    pub repair_order_id: Uuid,
    pub item_code: String,
    pub qty: Decimal,
    pub valuation_rate: Decimal,
}

/// Groups issued lines by (order, item). An item counts as FoC only when the
/// parts plan marks it free of charge and never billable.
pub fn build_parts_consumption(
    issued: &[IssuedLine],
    plan: &[repair_part::Model],
    order_names: &HashMap<Uuid, String>,
) -> Report<PartsConsumptionRow> {
    let mut plan_flags: HashMap<(Uuid, &str), (bool, bool)> = HashMap::new();
    for part in plan {
        let entry = plan_flags
            .entry((part.repair_order_id, part.item_code.as_str()))
            .or_default();
        entry.0 |= part.is_billable;
        entry.1 |= part.is_foc;
    }

    let mut groups: BTreeMap<(String, String), (Uuid, Decimal, Decimal, u32)> = BTreeMap::new();
    for line in issued {
        let name = order_names
            .get(&line.repair_order_id)
            .cloned()
            .unwrap_or_else(|| line.repair_order_id.to_string());
        let group = groups
            .entry((name, line.item_code.clone()))
            .or_insert((line.repair_order_id, Decimal::ZERO, Decimal::ZERO, 0));
        group.1 += line.qty;
        group.2 += line.valuation_rate;
        group.3 += 1;
    }

    let mut total_billable = Decimal::ZERO;
    let mut total_foc = Decimal::ZERO;
    let rows: Vec<PartsConsumptionRow> = groups
        .into_iter()
        .map(|((repair_order, item_code), (ro_id, qty, rate_sum, lines))| {
            let valuation_rate = rate_sum / Decimal::from(lines);
            let extended_cost = qty * valuation_rate;
            let is_foc = matches!(
                plan_flags.get(&(ro_id, item_code.as_str())),
                Some((false, true))
            );
            if is_foc {
                total_foc += extended_cost;
            } else {
                total_billable += extended_cost;
            }
            PartsConsumptionRow {
                repair_order,
                item_code,
                qty,
                valuation_rate: valuation_rate.round_dp(2),
                extended_cost: extended_cost.round_dp(2),
                billable: if is_foc { "FoC" } else { "Billable" }.to_string(),
            }
        })
        .collect();

    Report {
        columns: vec![
            column("Repair Order", "repair_order", "Link"),
            column("Item Code", "item_code", "Link"),
            column("Qty Issued", "qty", "Float"),
            column("Valuation Rate", "valuation_rate", "Currency"),
            column("Extended Cost", "extended_cost", "Currency"),
            column("Billable", "billable", "Data"),
        ],
        rows,
        chart: Some(ReportChart {
            chart_type: "pie",
            labels: vec!["Billable".to_string(), "FoC".to_string()],
            datasets: vec![ChartDataset {
                name: "Cost".to_string(),
                values: vec![total_billable.round_dp(2), total_foc.round_dp(2)],
            }],
        }),
    }
}

/// Hours one technician logged, and the standard time of the tasks they worked on.
#[derive(Debug, Clone, Default)]
pub struct TechnicianHours {
    pub logged: Decimal,
    pub standard: Decimal,
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * HUNDRED).round_dp(2)
    }
}

pub fn build_technician_utilization(
    hours: &BTreeMap<String, TechnicianHours>,
    capacity: Decimal,
) -> Report<UtilizationRow> {
    let rows: Vec<UtilizationRow> = hours
        .iter()
        .map(|(employee, h)| UtilizationRow {
            employee: employee.clone(),
            logged_hours: h.logged.round_dp(2),
            capacity_hours: capacity,
            standard_hours: h.standard.round_dp(2),
            utilization: percent(h.logged, capacity),
            efficiency: percent(h.standard, h.logged),
        })
        .collect();

    let chart = ReportChart {
        chart_type: "bar",
        labels: rows.iter().map(|r| r.employee.clone()).collect(),
        datasets: vec![
            ChartDataset {
                name: "Utilization %".to_string(),
                values: rows.iter().map(|r| r.utilization).collect(),
            },
            ChartDataset {
                name: "Efficiency %".to_string(),
                values: rows.iter().map(|r| r.efficiency).collect(),
            },
        ],
    };

    Report {
        columns: vec![
            column("Employee", "employee", "Data"),
            column("Logged Hours", "logged_hours", "Float"),
            column("Capacity Hours", "capacity_hours", "Float"),
            column("Standard Hours", "standard_hours", "Float"),
            column("Utilization %", "utilization", "Percent"),
            column("Efficiency %", "efficiency", "Percent"),
        ],
        rows,
        chart: Some(chart),
    }
}

/// Capacity for a date window: whole days times the working day, or a
/// standard week when the window is open.
pub fn capacity_hours(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    workday_hours: u32,
    weekly_capacity_hours: u32,
) -> Decimal {
    match (from, to) {
        (Some(from), Some(to)) => {
            let days = (to - from).num_days() + 1;
            Decimal::from(days.max(0)) * Decimal::from(workday_hours)
        }
        _ => Decimal::from(weekly_capacity_hours),
    }
}

pub fn aging_bucket(days: i64) -> &'static str {
    match days {
        d if d <= 1 => AGING_BUCKETS[0],
        2..=3 => AGING_BUCKETS[1],
        4..=7 => AGING_BUCKETS[2],
        8..=14 => AGING_BUCKETS[3],
        _ => AGING_BUCKETS[4],
    }
}

pub fn build_wip_aging(orders: &[repair_order::Model], today: DateTime<Utc>) -> Report<WipAgingRow> {
    let mut counts = [0u32; 5];
    let rows: Vec<WipAgingRow> = orders
        .iter()
        .filter(|ro| ro.status.is_open())
        .map(|ro| {
            let days = (today - ro.status_changed_at).num_days().max(0);
            let bucket = aging_bucket(days);
            if let Some(slot) = AGING_BUCKETS.iter().position(|b| *b == bucket) {
                counts[slot] += 1;
            }
            WipAgingRow {
                repair_order: ro.name.clone(),
                status: ro.status,
                days_in_status: days,
                bucket,
                sla_delivery_by: ro.sla_delivery_by,
                advisor: ro.advisor.clone(),
                vehicle: ro.vehicle.clone(),
            }
        })
        .collect();

    Report {
        columns: vec![
            column("RO ID", "repair_order", "Link"),
            column("Status", "status", "Data"),
            column("Days in Status", "days_in_status", "Int"),
            column("Bucket", "bucket", "Data"),
            column("SLA Due", "sla_delivery_by", "Datetime"),
            column("Advisor", "advisor", "Data"),
            column("Vehicle", "vehicle", "Data"),
        ],
        rows,
        chart: Some(ReportChart {
            chart_type: "bar",
            labels: AGING_BUCKETS.iter().map(|b| b.to_string()).collect(),
            datasets: vec![ChartDataset {
                name: "ROs".to_string(),
                values: counts.iter().map(|c| Decimal::from(*c)).collect(),
            }],
        }),
    }
}

/// Pairs each later order of a vehicle with its first order in the window.
/// `orders` must be sorted by creation time.
pub fn build_repeat_repairs(orders: &[repair_order::Model]) -> Report<RepeatRepairRow> {
    let mut by_vehicle: BTreeMap<&str, Vec<&repair_order::Model>> = BTreeMap::new();
    for ro in orders {
        by_vehicle.entry(ro.vehicle.as_str()).or_default().push(ro);
    }

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut values = Vec::new();
    for (vehicle, visits) in by_vehicle {
        let Some((first, returns)) = visits.split_first() else {
            continue;
        };
        if returns.is_empty() {
            continue;
        }
        for ret in returns {
            rows.push(RepeatRepairRow {
                vehicle: vehicle.to_string(),
                first_ro: first.name.clone(),
                first_date: first.created_at.date_naive(),
                return_ro: ret.name.clone(),
                return_date: ret.created_at.date_naive(),
                days_between: (ret.created_at - first.created_at).num_days(),
            });
        }
        labels.push(vehicle.to_string());
        values.push(Decimal::from(returns.len()));
    }

    Report {
        columns: vec![
            column("Vehicle", "vehicle", "Data"),
            column("First RO", "first_ro", "Link"),
            column("First Visit", "first_date", "Date"),
            column("Return RO", "return_ro", "Link"),
            column("Return Date", "return_date", "Date"),
            column("Days Between", "days_between", "Int"),
        ],
        rows,
        chart: Some(ReportChart {
            chart_type: "bar",
            labels,
            datasets: vec![ChartDataset {
                name: "Returns".to_string(),
                values,
            }],
        }),
    }
}

pub fn build_vehicle_timeline(orders: &[repair_order::Model]) -> Vec<TimelinePoint> {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ro in orders.iter().filter(|ro| ro.docstatus != DocStatus::Cancelled) {
        *per_day.entry(ro.created_at.date_naive()).or_default() += 1;
    }
    per_day
        .into_iter()
        .map(|(date, repair_orders)| TimelinePoint {
            date,
            repair_orders,
        })
        .collect()
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    workday_hours: u32,
    weekly_capacity_hours: u32,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, workday_hours: u32, weekly_capacity_hours: u32) -> Self {
        Self {
            db,
            workday_hours,
            weekly_capacity_hours,
        }
    }

    #[instrument(skip(self))]
    pub async fn job_profitability(
        &self,
        customer: Option<&str>,
    ) -> Result<Report<ProfitabilityRow>, ServiceError> {
        let db = &*self.db;
        let mut query = repair_order::Entity::find().order_by_asc(repair_order::Column::Name);
        if let Some(customer) = customer {
            query = query.filter(repair_order::Column::Customer.eq(customer));
        }
        let orders = query.all(db).await?;

        let submitted: Vec<Uuid> = sales_invoice::Entity::find()
            .filter(sales_invoice::Column::Docstatus.eq(DocStatus::Submitted))
            .all(db)
            .await?
            .into_iter()
            .map(|si| si.id)
            .collect();

        let mut invoiced: HashMap<Uuid, Decimal> = HashMap::new();
        if !submitted.is_empty() {
            let lines = sales_invoice_item::Entity::find()
                .filter(sales_invoice_item::Column::SalesInvoiceId.is_in(submitted))
                .filter(sales_invoice_item::Column::RepairOrderId.is_not_null())
                .all(db)
                .await?;
            for line in lines {
                if let Some(ro_id) = line.repair_order_id {
                    *invoiced.entry(ro_id).or_default() += line.net_amount;
                }
            }
        }

        Ok(build_job_profitability(&orders, &invoiced))
    }

    #[instrument(skip(self))]
    pub async fn parts_consumption(
        &self,
        range: &DateRangeParams,
    ) -> Result<Report<PartsConsumptionRow>, ServiceError> {
        let (start, end) = range.to_datetime_range()?;
        let db = &*self.db;

        let mut query = stock_entry::Entity::find()
            .filter(stock_entry::Column::Purpose.eq(stock_entry::PURPOSE_MATERIAL_ISSUE))
            .filter(stock_entry::Column::Docstatus.eq(DocStatus::Submitted))
            .filter(stock_entry::Column::RepairOrderId.is_not_null());
        if let Some(start) = start {
            query = query.filter(stock_entry::Column::PostingDate.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(stock_entry::Column::PostingDate.lt(end));
        }
        let entries = query.all(db).await?;
        let entry_orders: HashMap<Uuid, Uuid> = entries
            .iter()
            .filter_map(|e| e.repair_order_id.map(|ro| (e.id, ro)))
            .collect();

        let issued: Vec<IssuedLine> = if entry_orders.is_empty() {
            Vec::new()
        } else {
            stock_entry_detail::Entity::find()
                .filter(
                    stock_entry_detail::Column::StockEntryId
                        .is_in(entry_orders.keys().copied().collect::<Vec<_>>()),
                )
                .all(db)
                .await?
                .into_iter()
                .filter_map(|d| {
                    entry_orders.get(&d.stock_entry_id).map(|ro| IssuedLine {
                        repair_order_id: *ro,
                        item_code: d.item_code,
                        qty: d.qty,
                        valuation_rate: d.valuation_rate,
                    })
                })
                .collect()
        };

        let order_ids: Vec<Uuid> = entry_orders
            .values()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let (plan, names) = if order_ids.is_empty() {
            (Vec::new(), HashMap::new())
        } else {
            let plan = repair_part::Entity::find()
                .filter(repair_part::Column::RepairOrderId.is_in(order_ids.clone()))
                .all(db)
                .await?;
            let names = repair_order::Entity::find()
                .filter(repair_order::Column::Id.is_in(order_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|ro| (ro.id, ro.name))
                .collect();
            (plan, names)
        };

        Ok(build_parts_consumption(&issued, &plan, &names))
    }

    #[instrument(skip(self))]
    pub async fn technician_utilization(
        &self,
        range: &DateRangeParams,
        employee: Option<&str>,
    ) -> Result<Report<UtilizationRow>, ServiceError> {
        let (start, end) = range.to_datetime_range()?;
        let db = &*self.db;

        let mut query = timesheet::Entity::find()
            .filter(timesheet::Column::Docstatus.eq(DocStatus::Submitted));
        if let Some(employee) = employee {
            query = query.filter(timesheet::Column::Employee.eq(employee));
        }
        let sheets: HashMap<Uuid, String> = query
            .all(db)
            .await?
            .into_iter()
            .map(|ts| (ts.id, ts.employee))
            .collect();

        let mut hours: BTreeMap<String, TechnicianHours> = BTreeMap::new();
        if !sheets.is_empty() {
            let mut details = timesheet_detail::Entity::find().filter(
                timesheet_detail::Column::TimesheetId
                    .is_in(sheets.keys().copied().collect::<Vec<_>>()),
            );
            if let Some(start) = start {
                details = details.filter(timesheet_detail::Column::FromTime.gte(start));
            }
            if let Some(end) = end {
                details = details.filter(timesheet_detail::Column::ToTime.lte(end));
            }
            let details = details.all(db).await?;

            let mut tasks_by_employee: HashMap<String, HashSet<Uuid>> = HashMap::new();
            for detail in &details {
                let Some(employee) = sheets.get(&detail.timesheet_id) else {
                    continue;
                };
                hours.entry(employee.clone()).or_default().logged += detail.hours;
                if let Some(task_id) = detail.task_id {
                    tasks_by_employee
                        .entry(employee.clone())
                        .or_default()
                        .insert(task_id);
                }
            }

            let all_tasks: Vec<Uuid> = tasks_by_employee.values().flatten().copied().collect();
            if !all_tasks.is_empty() {
                let minutes_by_task: HashMap<Uuid, i32> = repair_operation::Entity::find()
                    .filter(repair_operation::Column::TaskId.is_in(all_tasks))
                    .all(db)
                    .await?
                    .into_iter()
                    .filter_map(|op| op.task_id.map(|t| (t, op.planned_minutes)))
                    .collect();
                for (employee, tasks) in tasks_by_employee {
                    let minutes: i64 = tasks
                        .iter()
                        .filter_map(|t| minutes_by_task.get(t))
                        .map(|m| i64::from(*m))
                        .sum();
                    if let Some(entry) = hours.get_mut(&employee) {
                        entry.standard = Decimal::from(minutes) / Decimal::from(60);
                    }
                }
            }
        }

        let capacity = capacity_hours(
            start.map(|s| s.date_naive()),
            end.and_then(|e| e.date_naive().pred_opt()),
            self.workday_hours,
            self.weekly_capacity_hours,
        );
        Ok(build_technician_utilization(&hours, capacity))
    }

    #[instrument(skip(self))]
    pub async fn wip_aging(&self, today: DateTime<Utc>) -> Result<Report<WipAgingRow>, ServiceError> {
        let orders = repair_order::Entity::find()
            .filter(
                repair_order::Column::Status
                    .is_not_in([RepairOrderStatus::Closed, RepairOrderStatus::Cancelled]),
            )
            .order_by_asc(repair_order::Column::StatusChangedAt)
            .all(&*self.db)
            .await?;
        Ok(build_wip_aging(&orders, today))
    }

    #[instrument(skip(self))]
    pub async fn repeat_repairs(
        &self,
        days: u32,
        today: DateTime<Utc>,
    ) -> Result<Report<RepeatRepairRow>, ServiceError> {
        let since = today - Duration::days(i64::from(days));
        let orders = repair_order::Entity::find()
            .filter(repair_order::Column::CreatedAt.gte(since))
            .order_by_asc(repair_order::Column::Vehicle)
            .order_by_asc(repair_order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(build_repeat_repairs(&orders))
    }

    #[instrument(skip(self))]
    pub async fn vehicle_timeline(
        &self,
        vehicle: &str,
        today: DateTime<Utc>,
    ) -> Result<Vec<TimelinePoint>, ServiceError> {
        let since = today - Duration::days(365);
        let orders = repair_order::Entity::find()
            .filter(repair_order::Column::Vehicle.eq(vehicle))
            .filter(repair_order::Column::CreatedAt.gt(since))
            .filter(repair_order::Column::Docstatus.ne(DocStatus::Cancelled))
            .all(&*self.db)
            .await?;
        Ok(build_vehicle_timeline(&orders))
    }
}
