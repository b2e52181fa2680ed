//! Main TUI application state machine.
//!
//! Two screens: the data entry form and the results view. Assessment runs
//! synchronously on submit; model evaluation is in-process and fast.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::application::{AssessmentService, ModelContext};

use super::ui::{
    form::{render_form, FormState},
    render_disclaimer,
    results::{render_results, ResultsView},
};

/// Current screen/view in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Form,
    Results,
}

/// Main application state
pub struct App {
    screen: Screen,
    should_quit: bool,
    assessment_service: AssessmentService,
    form_state: FormState,
    /// Last submission outcome; `None` until the first submit
    results: Option<ResultsView>,
}

impl App {
    /// Build the application around loaded artifacts.
    #[must_use]
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self {
            screen: Screen::Form,
            should_quit: false,
            assessment_service: AssessmentService::new(context),
            form_state: FormState::default(),
            results: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);
        self.form_state.clear_sensitive();

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.draw(terminal)?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn draw<B: Backend>(&self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(3)])
                .split(f.area());

            match (self.screen, &self.results) {
                (Screen::Results, Some(view)) => render_results(f, chunks[0], view),
                _ => render_form(f, chunks[0], &self.form_state),
            }

            render_disclaimer(f, chunks[1]);
        })?;
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        // Global quit handling
        if key == KeyCode::Char('q') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Form => self.handle_form_key(key),
            Screen::Results => self.handle_results_key(key),
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::BackTab => self.form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.form_state.next_field(),
            KeyCode::Left => self.form_state.prev_group(),
            KeyCode::Right => self.form_state.next_group(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.form_state.load_sample_data(),
            KeyCode::Char('c') | KeyCode::Char('C') => self.form_state.clear_sensitive(),
            KeyCode::Char(c) => self.form_state.input_char(c),
            KeyCode::Backspace => self.form_state.delete_char(),
            KeyCode::Delete => self.form_state.clear_field(),
            KeyCode::Enter => self.submit_form(),
            _ => {}
        }
    }

    fn handle_results_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.results = None;
                self.screen = Screen::Form;
            }
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let input = match self.form_state.to_feature_input() {
            Ok(input) => input,
            Err(e) => {
                self.form_state.error_message = Some(e);
                return;
            }
        };

        match self.assessment_service.assess(&input) {
            Ok(assessment) => {
                // Form values stay so the next submit recomputes from them.
                self.results = Some(ResultsView::Complete(Box::new(assessment)));
            }
            Err(e) => {
                tracing::error!("Assessment failed: {}", e);
                self.results = Some(ResultsView::Error(e.to_string()));
            }
        }
        self.screen = Screen::Results;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::artifacts::{fixtures, load_context, VerifyPolicy};
    use crate::application::prediction::tests::stub_context;
    use crate::domain::QuantileMethod;
    use ratatui::backend::TestBackend;
    use tempfile::TempDir;

    fn fixture_app() -> (TempDir, App) {
        let dir = TempDir::new().expect("tempdir");
        let key = fixtures::write_signed(dir.path());
        let context = load_context(
            dir.path(),
            &VerifyPolicy::Verify(key.verifying_key()),
            QuantileMethod::Midpoint,
        )
        .expect("fixture artifacts load");
        (dir, App::new(Arc::new(context)))
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    #[test]
    fn test_submit_shows_results_and_keeps_form_values() {
        let (_dir, mut app) = fixture_app();
        type_str(&mut app, "30");
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(app.screen, Screen::Results);
        match &app.results {
            Some(ResultsView::Complete(assessment)) => {
                assert!((assessment.prediction.starting_dose - 160.0).abs() < 1e-9);
            }
            other => panic!("expected a completed assessment, got {other:?}"),
        }
        assert_eq!(app.form_state.fields[0].value, "30");

        let mut terminal = Terminal::new(TestBackend::new(140, 50)).unwrap();
        app.draw(&mut terminal).expect("draw results");

        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(app.screen, Screen::Form);
        assert!(app.results.is_none());
        assert_eq!(app.form_state.fields[0].value, "30");
        assert!(app.form_state.fields[1..].iter().all(|f| f.value.is_empty()));
    }

    #[test]
    fn test_edit_after_results_recomputes_from_current_values() {
        let (_dir, mut app) = fixture_app();
        type_str(&mut app, "30");
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE);

        // Change age only; everything else is kept.
        app.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        type_str(&mut app, "5");
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        match &app.results {
            Some(ResultsView::Complete(assessment)) => {
                assert!((assessment.prediction.starting_dose - 170.0).abs() < 1e-9);
            }
            other => panic!("expected a completed assessment, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_field_stays_on_form() {
        let (_dir, mut app) = fixture_app();
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);
        type_str(&mut app, "2..5");
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(app.screen, Screen::Form);
        assert_eq!(app.form_state.error_message.as_deref(), Some("BMI: Invalid number"));
        // Input is kept so it can be corrected.
        assert_eq!(app.form_state.fields[1].value, "2..5");
    }

    #[test]
    fn test_model_error_is_shown_on_results_screen() {
        // Drug class 5 is outside the stub encoder.
        let mut app = App::new(Arc::new(stub_context(0, 5)));
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(app.screen, Screen::Results);
        assert!(matches!(app.results, Some(ResultsView::Error(_))));
    }

    #[test]
    fn test_shortcuts() {
        let (_dir, mut app) = fixture_app();
        app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE);
        assert!(app.form_state.fields.iter().all(|f| !f.value.is_empty()));

        app.handle_key(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(app.form_state.fields.iter().all(|f| f.value.is_empty()));

        app.handle_key(KeyCode::Right, KeyModifiers::NONE);
        assert_eq!(app.form_state.selected_field, 10);

        app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);
        app.handle_key(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }
}
