//! Patient data entry: baseline values and three monitoring rounds.
//!
//! Blank fields are sent as absent and become 0.0 during assembly.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use zeroize::Zeroize;

use crate::domain::features::{feature_spec, FeatureSpec, CORE_DISPLAY_ORDER, DYNAMIC_FEATURES};
use crate::domain::FeatureInput;
use crate::tui::styles::MedicalTheme;

/// Fields per monitoring round (E2, LH, FSH, P, Day).
const ROUND_FIELDS: usize = 5;

/// One editable field.
#[derive(Debug, Clone)]
pub struct FormField {
    pub spec: FeatureSpec,
    pub value: String,
}

/// A titled column of consecutive fields.
#[derive(Debug, Clone, Copy)]
struct Group {
    title: &'static str,
    start: usize,
    len: usize,
    /// Split into monitoring rounds of `ROUND_FIELDS`
    rounds: bool,
}

const GROUPS: [Group; 3] = [
    Group {
        title: "Baseline",
        start: 0,
        len: 10,
        rounds: false,
    },
    Group {
        title: "Monitoring rounds",
        start: 10,
        len: 15,
        rounds: true,
    },
    Group {
        title: "Follicle (round 3)",
        start: 25,
        len: 3,
        rounds: false,
    },
];

pub struct FormState {
    /// Display order: baseline, rounds 1–3, follicle measurements
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    pub error_message: Option<String>,
}

impl Default for FormState {
    fn default() -> Self {
        let fields = CORE_DISPLAY_ORDER
            .iter()
            .filter_map(|key| feature_spec(key))
            .chain(DYNAMIC_FEATURES.iter())
            .map(|spec| FormField {
                spec: *spec,
                value: String::new(),
            })
            .collect();

        Self {
            fields,
            selected_field: 0,
            error_message: None,
        }
    }
}

impl FormState {
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    pub fn prev_field(&mut self) {
        self.selected_field = self
            .selected_field
            .checked_sub(1)
            .unwrap_or(self.fields.len() - 1);
    }

    /// Jump to the first field of the next column.
    pub fn next_group(&mut self) {
        let current = self.group_index();
        self.selected_field = GROUPS[(current + 1) % GROUPS.len()].start;
    }

    /// Jump to the first field of the previous column.
    pub fn prev_group(&mut self) {
        let current = self.group_index();
        self.selected_field = GROUPS[(current + GROUPS.len() - 1) % GROUPS.len()].start;
    }

    fn group_index(&self) -> usize {
        GROUPS
            .iter()
            .position(|g| (g.start..g.start + g.len).contains(&self.selected_field))
            .unwrap_or(0)
    }

    /// Digits, `.` and `-` only.
    pub fn input_char(&mut self, c: char) {
        if c.is_ascii_digit() || c == '.' || c == '-' {
            self.fields[self.selected_field].value.push(c);
            self.error_message = None;
        }
    }

    pub fn delete_char(&mut self) {
        self.fields[self.selected_field].value.pop();
    }

    pub fn clear_field(&mut self) {
        self.fields[self.selected_field].value.zeroize();
    }

    /// Wipe every field buffer.
    pub fn clear_sensitive(&mut self) {
        for field in &mut self.fields {
            field.value.zeroize();
        }
        self.error_message = None;
        self.selected_field = 0;
    }

    /// Parse the filled-in fields. Blank fields are left out.
    ///
    /// # Errors
    /// Returns a message naming the first field that is not a number.
    pub fn to_feature_input(&self) -> Result<FeatureInput, String> {
        let mut input = FeatureInput::new();
        for field in &self.fields {
            let text = field.value.trim();
            if text.is_empty() {
                continue;
            }
            let value: f64 = text
                .parse()
                .map_err(|_| format!("{}: Invalid number", field.spec.label))?;
            input.set(field.spec.key, value);
        }
        Ok(input)
    }

    /// A typical antagonist-cycle patient, for demonstration.
    pub fn load_sample_data(&mut self) {
        const SAMPLE: [(&str, &str); 28] = [
            ("年龄", "32"),
            ("体重指数", "21.5"),
            ("(基础内分泌)FSH", "6.8"),
            ("(基础内分泌)LH", "4.2"),
            ("(基础内分泌)PRL", "12.5"),
            ("(基础内分泌)E2", "38"),
            ("(基础内分泌)T", "0.35"),
            ("(基础内分泌)AMH", "3.2"),
            ("左窦卵泡数", "8"),
            ("右窦卵泡数", "9"),
            ("血E2_1", "180"),
            ("血LH_1", "2.1"),
            ("血FSH_1", "9.5"),
            ("血P_1", "0.4"),
            ("Day_1", "5"),
            ("血E2_2", "620"),
            ("血LH_2", "1.8"),
            ("血FSH_2", "11.2"),
            ("血P_2", "0.6"),
            ("Day_2", "8"),
            ("血E2_3", "1450"),
            ("血LH_3", "1.5"),
            ("血FSH_3", "12"),
            ("血P_3", "0.9"),
            ("Day_3", "10"),
            ("最大卵泡测定日3", "10"),
            ("左侧最大卵泡直径3", "17.5"),
            ("右侧最大卵巢直径3", "16"),
        ];

        for field in &mut self.fields {
            if let Some((_, v)) = SAMPLE.iter().find(|(k, _)| *k == field.spec.key) {
                field.value.zeroize();
                field.value.push_str(v);
            }
        }
        self.error_message = None;
    }
}

/// Render the data entry form
pub fn render_form(f: &mut Frame, area: Rect, state: &FormState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form
            Constraint::Length(3), // Footer/error
        ])
        .split(area);

    render_form_header(f, chunks[0]);
    render_form_fields(f, chunks[1], state);
    render_form_footer(f, chunks[2], state);
}

fn render_form_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Gn Starting Protocol", MedicalTheme::title()),
        Span::styled(
            " │ Baseline values and up to three monitoring rounds (blank = 0)",
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

fn render_form_fields(f: &mut Frame, area: Rect, state: &FormState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(36),
            Constraint::Percentage(36),
            Constraint::Percentage(28),
        ])
        .split(area);

    for (group, column) in GROUPS.iter().zip(columns.iter()) {
        render_group(f, *column, group, state);
    }
}

fn field_line(field: &FormField, selected: bool) -> Line<'_> {
    let label_style = if selected {
        MedicalTheme::selected()
    } else {
        MedicalTheme::text_secondary()
    };

    let value = if field.value.is_empty() {
        Span::styled("—", MedicalTheme::text_muted())
    } else {
        Span::styled(field.value.as_str(), MedicalTheme::text())
    };

    Line::from(vec![
        Span::styled(format!(" {:<16}", field.spec.label), label_style),
        Span::raw(" "),
        value,
        if selected {
            Span::styled("▌", MedicalTheme::cursor())
        } else {
            Span::raw("")
        },
        Span::styled(format!(" {}", field.spec.unit), MedicalTheme::text_muted()),
    ])
}

fn render_group(f: &mut Frame, area: Rect, group: &Group, state: &FormState) {
    let focused = (group.start..group.start + group.len).contains(&state.selected_field);
    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", group.title),
            if focused {
                MedicalTheme::subtitle()
            } else {
                MedicalTheme::text_secondary()
            },
        ))
        .borders(Borders::ALL)
        .border_style(if focused {
            MedicalTheme::border_focused()
        } else {
            MedicalTheme::border()
        });

    let mut lines = Vec::with_capacity(group.len + 3);
    for i in group.start..group.start + group.len {
        let Some(field) = state.fields.get(i) else {
            break;
        };
        if group.rounds && (i - group.start) % ROUND_FIELDS == 0 {
            let round = (i - group.start) / ROUND_FIELDS + 1;
            lines.push(Line::from(Span::styled(
                format!(" Round {round}"),
                MedicalTheme::subtitle(),
            )));
        }
        lines.push(field_line(field, i == state.selected_field));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_form_footer(f: &mut Frame, area: Rect, state: &FormState) {
    let content = if let Some(err) = &state.error_message {
        Line::from(vec![
            Span::styled("! ", MedicalTheme::danger()),
            Span::styled(err.as_str(), MedicalTheme::danger()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[↑↓] ", MedicalTheme::key_hint()),
            Span::styled("Navigate ", MedicalTheme::key_desc()),
            Span::styled("[←→] ", MedicalTheme::key_hint()),
            Span::styled("Column ", MedicalTheme::key_desc()),
            Span::styled("[Enter] ", MedicalTheme::key_hint()),
            Span::styled("Predict ", MedicalTheme::key_desc()),
            Span::styled("[S] ", MedicalTheme::key_hint()),
            Span::styled("Sample Data ", MedicalTheme::key_desc()),
            Span::styled("[Del] ", MedicalTheme::key_hint()),
            Span::styled("Clear Field ", MedicalTheme::key_desc()),
            Span::styled("[C] ", MedicalTheme::key_hint()),
            Span::styled("Clear All ", MedicalTheme::key_desc()),
            Span::styled("[Ctrl+Q] ", MedicalTheme::key_hint()),
            Span::styled("Quit", MedicalTheme::key_desc()),
        ])
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::all_feature_keys;
    use crate::domain::FeatureVectors;

    #[test]
    fn test_form_covers_every_feature_once() {
        let state = FormState::default();
        assert_eq!(state.fields.len(), 28);

        let mut keys: Vec<&str> = state.fields.iter().map(|f| f.spec.key).collect();
        keys.sort_unstable();
        let mut expected: Vec<&str> = all_feature_keys().collect();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        // Display order differs from model order for the baseline block.
        assert_eq!(state.fields[3].spec.key, "(基础内分泌)LH");
        assert_eq!(GROUPS.iter().map(|g| g.len).sum::<usize>(), 28);
    }

    #[test]
    fn test_input_filters_characters() {
        let mut state = FormState::default();
        for c in "3a2.5-x".chars() {
            state.input_char(c);
        }
        assert_eq!(state.fields[0].value, "32.5-");
        state.delete_char();
        assert_eq!(state.fields[0].value, "32.5");
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let mut state = FormState::default();
        state.input_char('3');
        state.input_char('4');

        let input = state.to_feature_input().expect("valid form");
        assert_eq!(input.len(), 1);
        assert_eq!(input.get("年龄"), Some(34.0));

        let vectors = FeatureVectors::assemble(&input);
        assert!(vectors.all[1..].iter().all(|v| v.abs() < f64::EPSILON));
    }

    #[test]
    fn test_invalid_number_names_the_field() {
        let mut state = FormState::default();
        state.selected_field = 1;
        state.input_char('-');

        let err = state.to_feature_input().expect_err("lone minus is not a number");
        assert_eq!(err, "BMI: Invalid number");
    }

    #[test]
    fn test_negative_values_pass_through() {
        let mut state = FormState::default();
        for c in "-5".chars() {
            state.input_char(c);
        }
        let input = state.to_feature_input().expect("valid form");
        assert_eq!(input.get("年龄"), Some(-5.0));
    }

    #[test]
    fn test_sample_data_fills_every_field() {
        let mut state = FormState::default();
        state.load_sample_data();

        assert!(state.fields.iter().all(|f| !f.value.is_empty()));
        let input = state.to_feature_input().expect("sample parses");
        assert_eq!(input.len(), 28);
        assert_eq!(input.get("血E2_3"), Some(1450.0));
    }

    #[test]
    fn test_clear_sensitive() {
        let mut state = FormState::default();
        state.load_sample_data();
        state.selected_field = 7;
        state.error_message = Some("x".into());

        state.clear_sensitive();

        assert!(state.fields.iter().all(|f| f.value.is_empty()));
        assert_eq!(state.selected_field, 0);
        assert!(state.error_message.is_none());
    }

    #[test]
    fn test_navigation_wraps_and_jumps_columns() {
        let mut state = FormState::default();
        state.prev_field();
        assert_eq!(state.selected_field, 27);
        state.next_field();
        assert_eq!(state.selected_field, 0);

        state.next_group();
        assert_eq!(state.selected_field, 10);
        state.next_group();
        assert_eq!(state.selected_field, 25);
        state.next_group();
        assert_eq!(state.selected_field, 0);
        state.prev_group();
        assert_eq!(state.selected_field, 25);
    }
}
