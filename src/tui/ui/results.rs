//! Results view: the six predictions and the E2 percentile charts.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};

use crate::domain::features::MONITORING_ROUNDS;
use crate::domain::{Assessment, BaselineChart, E2TrendChart, BASELINE_UNAVAILABLE};
use crate::tui::styles::MedicalTheme;

/// Headroom above the highest plotted value.
const Y_HEADROOM: f64 = 1.15;

#[derive(Debug, Clone)]
pub enum ResultsView {
    Complete(Box<Assessment>),
    Error(String),
}

/// Plot coordinates for one chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    /// Vertical P25–P75 segments, one per position
    pub bands: Vec<[(f64, f64); 2]>,
    /// Median points (trend) or the horizontal median line (baseline)
    pub medians: Vec<(f64, f64)>,
    /// Patient values
    pub points: Vec<(f64, f64)>,
    /// Join the medians into a line instead of plotting points
    pub median_line: bool,
    pub y_max: f64,
}

/// Points for the trend chart. Round `n` is plotted at `x = n`.
#[must_use]
pub fn trend_series(chart: &E2TrendChart) -> Series {
    let mut series = Series::default();
    for marker in &chart.markers {
        let x = marker.round as f64;
        if let Some(band) = marker.band {
            series.bands.push([(x, band.p25), (x, band.p75)]);
        }
        if let Some(median) = marker.median {
            series.medians.push((x, median));
        }
        series.points.push((x, marker.value));
    }
    series.y_max = y_max(&series);
    series
}

/// Points for the baseline chart: band at `x = 1`, median across `[0.5, 1.5]`.
#[must_use]
pub fn baseline_series(chart: &BaselineChart) -> Series {
    let mut series = Series::default();
    if let Some(band) = chart.band {
        series.bands.push([(1.0, band.p25), (1.0, band.p75)]);
    }
    if let Some(median) = chart.median {
        series.medians = vec![(0.5, median), (1.5, median)];
        series.median_line = true;
    }
    series.points.push((1.0, chart.value));
    series.y_max = y_max(&series);
    series
}

fn y_max(series: &Series) -> f64 {
    let highest = series
        .bands
        .iter()
        .flatten()
        .chain(&series.medians)
        .chain(&series.points)
        .map(|(_, y)| *y)
        .fold(0.0_f64, f64::max);

    if highest > 0.0 {
        highest * Y_HEADROOM
    } else {
        1.0
    }
}

/// Seven evenly spaced x labels over `[0.5, 3.5]`, round names at the whole numbers.
fn trend_x_labels(chart: &E2TrendChart) -> Vec<Span<'static>> {
    (0..=2 * MONITORING_ROUNDS)
        .map(|i| {
            if i % 2 == 1 {
                let round = i / 2 + 1;
                chart
                    .markers
                    .iter()
                    .find(|m| m.round == round)
                    .map_or_else(|| Span::raw(""), |m| Span::styled(m.label.clone(), MedicalTheme::text()))
            } else {
                Span::raw("")
            }
        })
        .collect()
}

fn y_labels(y_max: f64) -> Vec<Span<'static>> {
    [0.0, y_max / 2.0, y_max]
        .iter()
        .map(|v| Span::styled(format!("{v:.0}"), MedicalTheme::text_muted()))
        .collect()
}

/// Band, median and patient datasets borrowing from `series`.
fn datasets<'a>(series: &'a Series, point_style: ratatui::style::Style) -> Vec<Dataset<'a>> {
    let mut sets: Vec<Dataset<'a>> = series
        .bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let set = Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(MedicalTheme::band())
                .data(band);
            if i == 0 {
                set.name("P25–P75")
            } else {
                set
            }
        })
        .collect();

    if !series.medians.is_empty() {
        let graph_type = if series.median_line {
            GraphType::Line
        } else {
            GraphType::Scatter
        };
        sets.push(
            Dataset::default()
                .name("P50")
                .marker(symbols::Marker::Dot)
                .graph_type(graph_type)
                .style(MedicalTheme::median())
                .data(&series.medians),
        );
    }

    sets.push(
        Dataset::default()
            .name("Patient")
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(point_style)
            .data(&series.points),
    );
    sets
}

/// Render the results screen
pub fn render_results(f: &mut Frame, area: Rect, view: &ResultsView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(area);

    render_results_header(f, chunks[0]);
    match view {
        ResultsView::Complete(assessment) => render_assessment(f, chunks[1], assessment),
        ResultsView::Error(message) => render_error(f, chunks[1], message),
    }
    render_results_footer(f, chunks[2]);
}

fn render_results_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Prediction Results", MedicalTheme::title()),
        Span::styled(
            " │ Model recommendations and E2 reference percentiles",
            MedicalTheme::text_secondary(),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_assessment(f: &mut Frame, area: Rect, assessment: &Assessment) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Predictions
            Constraint::Min(10),   // Charts
            Constraint::Length(6), // Explanations
        ])
        .split(area);

    render_summary(f, chunks[0], assessment);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);
    render_trend_chart(f, charts[0], &assessment.e2_trend);
    render_baseline_chart(f, charts[1], assessment.baseline.as_ref());

    render_explanations(f, chunks[2], assessment);
}

fn render_summary(f: &mut Frame, area: Rect, assessment: &Assessment) {
    let lines: Vec<Line> = assessment
        .prediction
        .summary_lines()
        .into_iter()
        .map(|line| match line.split_once(": ") {
            Some((name, value)) => Line::from(vec![
                Span::styled(format!(" {name}: "), MedicalTheme::text_secondary()),
                Span::styled(value.to_string(), MedicalTheme::value()),
            ]),
            None => Line::from(Span::styled(line, MedicalTheme::text())),
        })
        .collect();

    let block = Block::default()
        .title(Span::styled(" Recommendations ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border_focused());

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn chart_block(title: &str) -> Block<'_> {
    Block::default()
        .title(Span::styled(format!(" {title} "), MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border())
}

fn render_trend_chart(f: &mut Frame, area: Rect, chart: &E2TrendChart) {
    if chart.is_empty() {
        render_notice(
            f,
            area,
            "E2 trend across monitoring",
            "No reference data available for the monitoring rounds.",
        );
        return;
    }

    let series = trend_series(chart);
    // Color by the last round, which is the one the clinician acts on.
    let rank = chart.markers.last().and_then(|m| m.percentile_rank);
    let widget = Chart::new(datasets(&series, MedicalTheme::percentile(rank)))
        .block(chart_block("E2 trend across monitoring"))
        .x_axis(
            Axis::default()
                .style(MedicalTheme::text_muted())
                .bounds([0.5, MONITORING_ROUNDS as f64 + 0.5])
                .labels(trend_x_labels(chart)),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("pg/mL", MedicalTheme::text_muted()))
                .style(MedicalTheme::text_muted())
                .bounds([0.0, series.y_max])
                .labels(y_labels(series.y_max)),
        );

    f.render_widget(widget, area);
}

fn render_baseline_chart(f: &mut Frame, area: Rect, chart: Option<&BaselineChart>) {
    let Some(chart) = chart else {
        render_notice(f, area, "Baseline E2", BASELINE_UNAVAILABLE);
        return;
    };

    let series = baseline_series(chart);
    let widget = Chart::new(datasets(&series, MedicalTheme::percentile(chart.percentile_rank)))
        .block(chart_block("Baseline E2"))
        .x_axis(
            Axis::default()
                .style(MedicalTheme::text_muted())
                .bounds([0.5, 1.5])
                .labels(vec![
                    Span::raw(""),
                    Span::styled("Baseline", MedicalTheme::text()),
                    Span::raw(""),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("pg/mL", MedicalTheme::text_muted()))
                .style(MedicalTheme::text_muted())
                .bounds([0.0, series.y_max])
                .labels(y_labels(series.y_max)),
        );

    f.render_widget(widget, area);
}

fn render_notice(f: &mut Frame, area: Rect, title: &str, message: &str) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, MedicalTheme::warning())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(chart_block(title));

    f.render_widget(content, area);
}

fn render_explanations(f: &mut Frame, area: Rect, assessment: &Assessment) {
    let mut lines: Vec<Line> = assessment
        .e2_trend
        .markers
        .iter()
        .map(|m| {
            Line::from(vec![
                Span::styled(format!(" {} ", m.annotation()), MedicalTheme::percentile(m.percentile_rank)),
                Span::styled(m.explanation(), MedicalTheme::text_secondary()),
            ])
        })
        .collect();

    let baseline_style = if assessment.baseline.is_some() {
        MedicalTheme::text_secondary()
    } else {
        MedicalTheme::warning()
    };
    lines.push(Line::from(Span::styled(
        format!(" {}", assessment.baseline_explanation()),
        baseline_style,
    )));

    let block = Block::default()
        .title(Span::styled(" Percentiles ", MedicalTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(MedicalTheme::border());

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_error(f: &mut Frame, area: Rect, message: &str) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("! Prediction failed", MedicalTheme::danger())),
        Line::from(""),
        Line::from(Span::styled(message, MedicalTheme::text())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(MedicalTheme::danger()),
    );

    f.render_widget(content, area);
}

fn render_results_footer(f: &mut Frame, area: Rect) {
    let content = Line::from(vec![
        Span::styled("[Esc] ", MedicalTheme::key_hint()),
        Span::styled("New Patient ", MedicalTheme::key_desc()),
        Span::styled("[Ctrl+Q] ", MedicalTheme::key_hint()),
        Span::styled("Quit", MedicalTheme::key_desc()),
    ]);

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}
