use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use plotters::prelude::*;

use finsight_core::transaction::{Flow, Transaction};

use crate::catalog::Variant;
use crate::error::RenderError;
use crate::renderer::{Figure, RenderOutput, RenderRequest, ReportRenderer};

const DEFAULT_CANVAS: (u32, u32) = (1100, 500);

const SERIES_COLORS: [RGBColor; 8] = [
    BLUE,
    RED,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 165, 0),
    RGBColor(128, 0, 128),
    RGBColor(139, 69, 19),
];

fn chart_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Failed(e.to_string())
}

fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

// ── Series math ───────────────────────────────────────────────

/// Running totals per group, in input order. Correct only over a
/// date-ascending dataset; the fan-out sorts before dispatch.
fn cumulative_by_group<F>(
    rows: &[Transaction],
    select: F,
) -> BTreeMap<String, Vec<(NaiveDate, f64)>>
where
    F: Fn(&Transaction) -> Option<(String, f64)>,
{
    let mut series: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        if let Some((key, value)) = select(row) {
            let total = totals.entry(key.clone()).or_insert(0.0);
            *total += value;
            series.entry(key).or_default().push((row.date, *total));
        }
    }
    series
}

fn month_bucket(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn monthly_totals(rows: &[Transaction], flow: Flow) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows.iter().filter(|t| t.flow == flow) {
        *totals.entry(month_bucket(row.date)).or_insert(0.0) += row.amount.abs();
    }
    totals.into_iter().collect()
}

fn grouped_values<F>(rows: &[Transaction], select: F) -> Vec<(String, [f64; 5])>
where
    F: Fn(&Transaction) -> Option<(String, f64)>,
{
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some((key, value)) = select(row) {
            grouped.entry(key).or_default().push(value);
        }
    }
    grouped
        .into_iter()
        .filter_map(|(key, mut values)| quartiles(&mut values).map(|q| (key, q)))
        .collect()
}

/// Five-number summary [min, q1, median, q3, max] with linear
/// interpolation between ranks.
fn quartiles(values: &mut [f64]) -> Option<[f64; 5]> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = |p: f64| -> f64 {
        let position = p * (values.len() - 1) as f64;
        let lo = position.floor() as usize;
        let hi = position.ceil() as usize;
        let frac = position - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };
    Some([values[0], rank(0.25), rank(0.5), rank(0.75), values[values.len() - 1]])
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span.abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min - span * 0.05, max + span * 0.05)
    }
}

// ── Drawing ───────────────────────────────────────────────────

fn draw_line_chart(
    request: &RenderRequest,
    series: &BTreeMap<String, Vec<(NaiveDate, f64)>>,
    y_desc: &str,
) -> Result<RenderOutput, RenderError> {
    let points: Vec<&(NaiveDate, f64)> = series.values().flatten().collect();
    if points.is_empty() {
        return Ok(RenderOutput::Empty);
    }
    let start = points.iter().map(|(d, _)| *d).min().unwrap_or_default();
    let end = points.iter().map(|(d, _)| *d).max().unwrap_or_default();
    let x_max = ((end - start).num_days() as f64).max(1.0);
    let y_lo = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min).min(0.0);
    let y_hi = points.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max).max(0.0);
    let (y_lo, y_hi) = padded(y_lo, y_hi);

    let (width, height) = request.canvas_size.unwrap_or(DEFAULT_CANVAS);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&request.display_id, ("sans-serif", 22).into_font())
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(0f64..x_max, y_lo..y_hi)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_label_formatter(&|offset: &f64| {
                (start + Duration::days(offset.round() as i64)).format("%Y-%m-%d").to_string()
            })
            .y_desc(y_desc)
            .draw()
            .map_err(chart_err)?;
        for (idx, line_points) in series.values().enumerate() {
            let color = series_color(idx);
            chart
                .draw_series(LineSeries::new(
                    line_points
                        .iter()
                        .map(|(date, value)| ((*date - start).num_days() as f64, *value)),
                    &color,
                ))
                .map_err(chart_err)?;
        }
        root.present().map_err(chart_err)?;
    }
    Ok(RenderOutput::Figure(Figure::new(svg)))
}

fn draw_bar_chart(
    request: &RenderRequest,
    bars: &[(String, f64)],
    y_desc: &str,
) -> Result<RenderOutput, RenderError> {
    if bars.is_empty() {
        return Ok(RenderOutput::Empty);
    }
    let y_lo = bars.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min).min(0.0);
    let y_hi = bars.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max).max(0.0);
    let (y_lo, y_hi) = padded(y_lo, y_hi);

    let (width, height) = request.canvas_size.unwrap_or(DEFAULT_CANVAS);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&request.display_id, ("sans-serif", 22).into_font())
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(0f64..bars.len() as f64, y_lo..y_hi)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_labels(bars.len().min(12))
            .x_label_formatter(&|x: &f64| {
                bars.get(x.floor() as usize)
                    .map(|(label, _)| label.clone())
                    .unwrap_or_default()
            })
            .y_desc(y_desc)
            .draw()
            .map_err(chart_err)?;
        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
                Rectangle::new(
                    [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, *value)],
                    series_color(i).filled(),
                )
            }))
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
    }
    Ok(RenderOutput::Figure(Figure::new(svg)))
}

/// Two bars per month bucket: income up, expenses down (signed).
fn draw_paired_bar_chart(
    request: &RenderRequest,
    income: &[(String, f64)],
    expenses: &[(String, f64)],
) -> Result<RenderOutput, RenderError> {
    let mut months: Vec<String> = income.iter().chain(expenses).map(|(m, _)| m.clone()).collect();
    months.sort();
    months.dedup();
    if months.is_empty() {
        return Ok(RenderOutput::Empty);
    }
    let lookup = |pairs: &[(String, f64)], month: &str| -> f64 {
        pairs.iter().find(|(m, _)| m == month).map(|(_, v)| *v).unwrap_or(0.0)
    };
    let y_hi = months.iter().map(|m| lookup(income, m)).fold(0.0, f64::max);
    let y_lo = months.iter().map(|m| -lookup(expenses, m)).fold(0.0, f64::min);
    let (y_lo, y_hi) = padded(y_lo, y_hi);

    let (width, height) = request.canvas_size.unwrap_or(DEFAULT_CANVAS);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&request.display_id, ("sans-serif", 22).into_font())
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(0f64..months.len() as f64, y_lo..y_hi)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_labels(months.len().min(12))
            .x_label_formatter(&|x: &f64| {
                months.get(x.floor() as usize).cloned().unwrap_or_default()
            })
            .y_desc("amount")
            .draw()
            .map_err(chart_err)?;
        chart
            .draw_series(months.iter().enumerate().map(|(i, month)| {
                let x = i as f64;
                Rectangle::new(
                    [(x + 0.1, 0.0), (x + 0.45, lookup(income, month))],
                    GREEN.filled(),
                )
            }))
            .map_err(chart_err)?;
        chart
            .draw_series(months.iter().enumerate().map(|(i, month)| {
                let x = i as f64;
                Rectangle::new(
                    [(x + 0.55, 0.0), (x + 0.9, -lookup(expenses, month))],
                    RED.filled(),
                )
            }))
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
    }
    Ok(RenderOutput::Figure(Figure::new(svg)))
}

/// One five-number box with whiskers per group.
fn draw_distribution_chart(
    request: &RenderRequest,
    groups: &[(String, [f64; 5])],
    y_desc: &str,
) -> Result<RenderOutput, RenderError> {
    if groups.is_empty() {
        return Ok(RenderOutput::Empty);
    }
    let y_lo = groups.iter().map(|(_, q)| q[0]).fold(f64::INFINITY, f64::min);
    let y_hi = groups.iter().map(|(_, q)| q[4]).fold(f64::NEG_INFINITY, f64::max);
    let (y_lo, y_hi) = padded(y_lo, y_hi);

    let (width, height) = request.canvas_size.unwrap_or(DEFAULT_CANVAS);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&request.display_id, ("sans-serif", 22).into_font())
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(0f64..groups.len() as f64, y_lo..y_hi)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_labels(groups.len().min(12))
            .x_label_formatter(&|x: &f64| {
                groups
                    .get(x.floor() as usize)
                    .map(|(label, _)| label.clone())
                    .unwrap_or_default()
            })
            .y_desc(y_desc)
            .draw()
            .map_err(chart_err)?;
        for (i, (_, [min, q1, median, q3, max])) in groups.iter().enumerate() {
            let center = i as f64 + 0.5;
            let color = series_color(i);
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(center, *min), (center, *max)],
                    color,
                )))
                .map_err(chart_err)?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(i as f64 + 0.3, *q1), (i as f64 + 0.7, *q3)],
                    color.mix(0.4).filled(),
                )))
                .map_err(chart_err)?;
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(i as f64 + 0.3, *median), (i as f64 + 0.7, *median)],
                    BLACK,
                )))
                .map_err(chart_err)?;
        }
        root.present().map_err(chart_err)?;
    }
    Ok(RenderOutput::Figure(Figure::new(svg)))
}

// ── Renderers ─────────────────────────────────────────────────

fn ledger_rows<'a>(request: &'a RenderRequest) -> Result<&'a [Transaction], RenderError> {
    request
        .data
        .ledger()
        .ok_or_else(|| RenderError::failed("report expects ledger data"))
}

/// Cumulative income against cumulative expenses over the range.
pub struct IncomeVsExpensesOverTime;

impl ReportRenderer for IncomeVsExpensesOverTime {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let rows = ledger_rows(request)?;
        if rows.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        match request.variant.unwrap_or(Variant::Line) {
            Variant::Line => {
                let series = cumulative_by_group(rows, |t| {
                    Some((t.flow.as_str().to_string(), t.amount.abs()))
                });
                draw_line_chart(request, &series, "cumulative amount")
            }
            Variant::Bar => draw_paired_bar_chart(
                request,
                &monthly_totals(rows, Flow::Income),
                &monthly_totals(rows, Flow::Expense),
            ),
            Variant::Violin => {
                let groups =
                    grouped_values(rows, |t| Some((t.flow.as_str().to_string(), t.amount)));
                draw_distribution_chart(request, &groups, "amount")
            }
        }
    }
}

/// Per-category breakdown for one flow direction (top-level category c1).
pub struct CategoryBreakdown {
    pub flow: Flow,
}

impl CategoryBreakdown {
    fn select(&self, t: &Transaction) -> Option<(String, f64)> {
        if t.flow != self.flow {
            return None;
        }
        t.c1.clone().map(|category| (category, t.amount.abs()))
    }
}

impl ReportRenderer for CategoryBreakdown {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let rows = ledger_rows(request)?;
        if rows.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        match request.variant.unwrap_or(Variant::Line) {
            Variant::Line => {
                let series = cumulative_by_group(rows, |t| self.select(t));
                draw_line_chart(request, &series, "cumulative amount")
            }
            Variant::Bar => {
                let mut totals: BTreeMap<String, f64> = BTreeMap::new();
                for row in rows {
                    if let Some((category, value)) = self.select(row) {
                        *totals.entry(category).or_insert(0.0) += value;
                    }
                }
                let bars: Vec<(String, f64)> = totals.into_iter().collect();
                draw_bar_chart(request, &bars, "total amount")
            }
            Variant::Violin => {
                let groups = grouped_values(rows, |t| self.select(t));
                draw_distribution_chart(request, &groups, "amount")
            }
        }
    }
}

/// How often each top-level category transacts.
pub struct TransactionFrequency;

impl ReportRenderer for TransactionFrequency {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let rows = ledger_rows(request)?;
        if rows.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        match request.variant.unwrap_or(Variant::Line) {
            Variant::Line | Variant::Violin => {
                let series = cumulative_by_group(rows, |t| t.c1.clone().map(|c| (c, 1.0)));
                draw_line_chart(request, &series, "cumulative transactions")
            }
            Variant::Bar => {
                let mut counts: BTreeMap<String, f64> = BTreeMap::new();
                for row in rows {
                    if let Some(category) = &row.c1 {
                        *counts.entry(category.clone()).or_insert(0.0) += 1.0;
                    }
                }
                let bars: Vec<(String, f64)> = counts.into_iter().collect();
                draw_bar_chart(request, &bars, "transactions")
            }
        }
    }
}

/// Total moved per calendar month for one flow direction.
pub struct MonthlyTotals {
    pub flow: Flow,
}

impl ReportRenderer for MonthlyTotals {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let rows = ledger_rows(request)?;
        if rows.is_empty() {
            return Ok(RenderOutput::Empty);
        }
        let bars = monthly_totals(rows, self.flow);
        draw_bar_chart(request, &bars, "total amount")
    }
}
