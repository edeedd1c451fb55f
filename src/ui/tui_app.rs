use crate::app_state::{AppState, Mode};
use crate::error::AppResult;
use crate::ui::format_buffer::CursorDirection;
use crate::ui::render::assemble;
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    widgets::Paragraph,
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tracing::{debug, info};
use tui_input::{backend::crossterm::EventHandler, Input};

pub struct TuiApp {
    state: AppState,
    input: Input,
}

impl TuiApp {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            input: Input::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn input_value(&self) -> &str {
        self.input.value()
    }

    pub fn run(mut self) -> Result<()> {
        if let Err(e) = enable_raw_mode() {
            return Err(anyhow::anyhow!("Failed to enable raw mode: {}", e));
        }

        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
            let _ = disable_raw_mode();
            return Err(anyhow::anyhow!("Failed to setup terminal: {}", e));
        }

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = match Terminal::new(backend) {
            Ok(t) => t,
            Err(e) => {
                let _ = disable_raw_mode();
                return Err(anyhow::anyhow!("Failed to create terminal: {}", e));
            }
        };

        let res = self.run_app(&mut terminal);

        // Always restore terminal, even on error
        let _ = disable_raw_mode();
        let _ = execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = terminal.show_cursor();

        match res {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("TUI error: {}", e)),
        }
    }

    fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.draw(|f| self.ui(f))?;

        loop {
            if !event::poll(Duration::from_millis(50))? {
                continue;
            }
            match event::read()? {
                Event::Key(key) => {
                    // Only handle presses, so toggles don't fire twice
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        info!(target: "termsql", "Quit requested");
                        break;
                    }
                }
                Event::Mouse(mouse) => self.handle_mouse(mouse),
                Event::Resize(_, _) => {}
                _ => continue,
            }
            terminal.draw(|f| self.ui(f))?;
        }
        Ok(())
    }

    /// Dispatch one key press. Returns true when the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        let result = match self.state.mode.clone() {
            Mode::Table => return self.handle_table_key(key),
            Mode::Selection | Mode::Message(_) => {
                self.state.exit_to_default_view();
                Ok(())
            }
            Mode::EditLine => self.handle_edit_line_key(key),
            Mode::Format {
                command_focus: true,
            } => self.handle_format_command_key(key),
            Mode::Format {
                command_focus: false,
            } => {
                self.handle_format_buffer_key(key);
                Ok(())
            }
        };

        if let Err(e) = result {
            self.state.report_error(e);
        }
        self.sync_input();
        false
    }

    fn handle_table_key(&mut self, key: KeyEvent) -> bool {
        self.state.clear_status();
        if key.code == KeyCode::Char('q') {
            return true;
        }
        if self.handle_navigation_key(key.code) {
            return false;
        }

        let state = &mut self.state;
        let result = match key.code {
            KeyCode::Enter => {
                state.enter_selection();
                Ok(())
            }
            KeyCode::Char('u') => state.undo(),
            KeyCode::Char('r') => state.redo(),
            KeyCode::Char('p') => state.export_view(),
            KeyCode::Char('?') => state.run_command(":h"),
            KeyCode::Char('i') | KeyCode::Char('e') => state.begin_inline_edit(false).map(|text| {
                let cursor = text.chars().count();
                self.input = Input::new(text).with_cursor(cursor);
            }),
            KeyCode::Char(':') => state.begin_inline_edit(true).map(|text| {
                self.input = Input::new(text).with_cursor(1);
            }),
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.state.report_error(e);
        }
        false
    }

    /// Cursor, scroll and view toggles. Returns false for any other key.
    fn handle_navigation_key(&mut self, code: KeyCode) -> bool {
        let state = &mut self.state;
        match code {
            KeyCode::Char('w') | KeyCode::Up => state.cursor_up(),
            KeyCode::Char('s') | KeyCode::Down => state.cursor_down(),
            KeyCode::Char('a') | KeyCode::Left => state.cursor_left(),
            KeyCode::Char('d') | KeyCode::Right => state.cursor_right(),
            KeyCode::Char('j') => state.next_table(),
            KeyCode::Char('k') => state.previous_table(),
            KeyCode::Char('h') => state.scroll_left(),
            KeyCode::Char('l') => state.scroll_right(),
            KeyCode::Char('m') => state.scroll_down(),
            KeyCode::Char('n') => state.scroll_up(),
            KeyCode::PageDown => state.page_down(),
            KeyCode::PageUp => state.page_up(),
            KeyCode::Char('c') => state.toggle_expanded_column(),
            KeyCode::Char('b') => state.toggle_border(),
            _ => return false,
        }
        true
    }

    fn handle_edit_line_key(&mut self, key: KeyEvent) -> AppResult<()> {
        match key.code {
            KeyCode::Esc => {
                self.state.exit_to_default_view();
                Ok(())
            }
            KeyCode::Enter => {
                let value = self.input.value().to_string();
                self.state.submit_edit_line(&value)
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                Ok(())
            }
        }
    }

    fn handle_format_command_key(&mut self, key: KeyEvent) -> AppResult<()> {
        match key.code {
            KeyCode::Esc => {
                self.state.mode = Mode::Format {
                    command_focus: false,
                };
                Ok(())
            }
            KeyCode::Enter => {
                let value = self.input.value().to_string();
                let result = self.state.submit_format_command(&value);
                if let Mode::Format { .. } = self.state.mode {
                    self.state.mode = Mode::Format {
                        command_focus: false,
                    };
                }
                result
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                Ok(())
            }
        }
    }

    fn handle_format_buffer_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.state.mode = Mode::Format {
                command_focus: true,
            };
            self.input = Input::new(":".to_string()).with_cursor(1);
            return;
        }

        let Some(buffer) = self.state.format_buffer_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up => buffer.move_cursor(CursorDirection::Up),
            KeyCode::Down => buffer.move_cursor(CursorDirection::Down),
            KeyCode::Left => buffer.move_cursor(CursorDirection::Left),
            KeyCode::Right => buffer.move_cursor(CursorDirection::Right),
            KeyCode::Home => buffer.move_cursor(CursorDirection::Home),
            KeyCode::End => buffer.move_cursor(CursorDirection::End),
            KeyCode::Enter => buffer.insert_newline(),
            KeyCode::Tab => buffer.insert_tab(),
            KeyCode::Backspace => buffer.backspace(),
            KeyCode::Delete => buffer.delete(),
            KeyCode::Char(c) => buffer.insert_char(c),
            _ => {}
        }
    }

    /// Drop the input line once no mode is using it
    fn sync_input(&mut self) {
        if !self.input_open() {
            self.input.reset();
        }
    }

    fn input_open(&self) -> bool {
        matches!(
            self.state.mode,
            Mode::EditLine
                | Mode::Format {
                    command_focus: true
                }
        )
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.state.mode != Mode::Table {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => self.state.scroll_down(),
            MouseEventKind::ScrollUp => self.state.scroll_up(),
            MouseEventKind::Moved => self
                .state
                .scroll
                .set_pointer(usize::from(mouse.column), usize::from(mouse.row)),
            MouseEventKind::Down(MouseButton::Left) => {
                self.state
                    .scroll
                    .set_pointer(usize::from(mouse.column), usize::from(mouse.row));
                debug!(target: "navigation", "Click at {},{}", mouse.column, mouse.row);
                self.state.enter_selection();
            }
            _ => {}
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let area = f.area();
        self.state.set_terminal_size(area.width, area.height);

        let input = self
            .input_open()
            .then(|| (self.input.value().to_string(), self.input.visual_cursor()));
        let snapshot = self.state.frame_snapshot(input);
        let frame = assemble(&snapshot);

        let geometry = self.state.geometry;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(geometry.header_height as u16),
                Constraint::Min(1),
                Constraint::Length(geometry.footer_height as u16),
            ])
            .split(area);

        f.render_widget(Paragraph::new(frame.header), chunks[0]);
        f.render_widget(Paragraph::new(frame.body), chunks[1]);
        f.render_widget(Paragraph::new(frame.footer), chunks[2]);

        if let Some((_, cursor)) = snapshot.footer.input {
            // "> " prefix on the input line
            let x = chunks[2].x + 2 + cursor as u16;
            f.set_cursor_position((x.min(area.width.saturating_sub(1)), chunks[2].y + 1));
        }
    }
}
